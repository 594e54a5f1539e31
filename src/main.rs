// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use clap::Parser;
use mempatch::cli::Args;
use mempatch::config::Config;
use mempatch::engine::Engine;
use mempatch::port::MemoryPort;
use mempatch::{repl, signal};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

fn main() -> ExitCode {
    let args = Args::parse();
    let verbosity = args.verbose;
    let config: Config = args.into();

    env_logger::Builder::new()
        .filter_level(match verbosity {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_env("RUST_LOG")
        .init();

    #[cfg(unix)]
    let port: Arc<dyn MemoryPort + Send + Sync> =
        Arc::new(mempatch::port::UnixPort::new(config.pid, config.without_ptrace));
    #[cfg(windows)]
    let port: Arc<dyn MemoryPort + Send + Sync> = match mempatch::port::WindowsPort::new(config.pid) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    let engine = Arc::new(Mutex::new(Engine::new(port, config.clone())));
    if let Err(e) = signal::install(&engine) {
        eprintln!("warning: failed to install signal handler: {e}");
    }

    if let Err(e) = engine.lock().unwrap().attach() {
        eprintln!("error: failed to attach to pid {}: {e}", config.pid);
        return ExitCode::from(1);
    }

    let code = repl::run(&engine, &config);
    ExitCode::from(code as u8)
}
