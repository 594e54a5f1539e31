// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fatal-signal handling. A process-wide, weak, non-owning reference to
//! the `Engine` is installed at startup; the handler's only job is to
//! call `Engine::exit` and then terminate the process. Installation is
//! a no-op if called twice.

use crate::engine::Engine;
use log::error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, Weak};

static ENGINE: OnceLock<Mutex<Weak<Mutex<Engine>>>> = OnceLock::new();
static HANDLED: AtomicBool = AtomicBool::new(false);

/// Registers `engine` as the target of the signal handler and installs
/// handlers for SIGHUP/SIGINT/SIGQUIT/SIGSEGV (mirroring the original's
/// registration list).
#[cfg(unix)]
pub fn install(engine: &std::sync::Arc<Mutex<Engine>>) -> crate::result::Result<()> {
    use nix::sys::signal::{self, SigHandler, Signal};

    ENGINE.get_or_init(|| Mutex::new(Weak::new()));
    *ENGINE.get().unwrap().lock().unwrap() = std::sync::Arc::downgrade(engine);

    unsafe {
        for sig in [Signal::SIGHUP, Signal::SIGINT, Signal::SIGQUIT, Signal::SIGSEGV] {
            signal::signal(sig, SigHandler::Handler(handle))
                .map_err(|e| crate::result::Error::Target(format!("sigaction {sig}: {e}")))?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install(engine: &std::sync::Arc<Mutex<Engine>>) -> crate::result::Result<()> {
    ENGINE.get_or_init(|| Mutex::new(Weak::new()));
    *ENGINE.get().unwrap().lock().unwrap() = std::sync::Arc::downgrade(engine);
    Ok(())
}

extern "C" fn handle(signum: i32) {
    if HANDLED.swap(true, Ordering::SeqCst) {
        return;
    }
    error!("fatal signal {signum} received, detaching");
    if let Some(lock) = ENGINE.get()
        && let Ok(weak) = lock.lock()
        && let Some(engine) = weak.upgrade()
        && let Ok(mut engine) = engine.lock()
    {
        let _ = engine.exit();
    }
    std::process::exit(1);
}
