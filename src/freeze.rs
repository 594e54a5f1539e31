// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background worker that pins a target address to a fixed value by
//! rewriting it every millisecond until told to stop.

use crate::address::Address;
use crate::port::MemoryPort;
use crate::value::TypedValue;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A running or joined freeze loop for one `(address, value)` target.
pub struct FreezeWorker {
    addr: Address,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FreezeWorker {
    /// Spawns the background loop. `port` must support attach-less
    /// writes, or already be running without ptrace, since the write
    /// path here always passes `freeze_flag = true`.
    pub fn start(addr: Address, value: TypedValue, port: Arc<dyn MemoryPort + Send + Sync>) -> FreezeWorker {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let handle = thread::spawn(move || {
            let bytes = value.bytes().to_vec();
            loop {
                if stop_clone.load(Ordering::Relaxed) {
                    break;
                }
                match port.write(addr, &bytes, true) {
                    Ok(n) if n == bytes.len() => {}
                    Ok(n) => {
                        warn!("freeze at {addr:#x}: short write ({n}/{}), stopping", bytes.len());
                        break;
                    }
                    Err(e) => {
                        warn!("freeze at {addr:#x}: write failed ({e}), stopping");
                        break;
                    }
                }
                thread::sleep(Duration::from_millis(1));
            }
            info!("freeze worker for {addr:#x} exited");
        });
        FreezeWorker { addr, stop, handle: Some(handle) }
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    /// Sets the stop flag and joins the background thread.
    pub fn terminate(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for FreezeWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Range, RegionSet};
    use crate::result::Result;
    use std::sync::Mutex;

    struct FakePort {
        mem: Mutex<Vec<u8>>,
    }

    impl MemoryPort for FakePort {
        fn attach(&self) -> Result<()> {
            Ok(())
        }
        fn detach(&self) -> Result<()> {
            Ok(())
        }
        fn enumerate_regions(&self, _scope: &str, _ignore: &[&str]) -> Result<RegionSet> {
            Ok(Vec::new())
        }
        fn read(&self, range: &Range) -> Result<Vec<u8>> {
            let mem = self.mem.lock().unwrap();
            Ok(mem[range.start as usize..range.end as usize].to_vec())
        }
        fn read_cached(&self, sub: &Range, _p: &Range) -> Result<Vec<u8>> {
            self.read(sub)
        }
        fn write(&self, addr: Address, bytes: &[u8], _freeze: bool) -> Result<usize> {
            let mut mem = self.mem.lock().unwrap();
            mem[addr as usize..addr as usize + bytes.len()].copy_from_slice(bytes);
            Ok(bytes.len())
        }
    }

    #[test]
    fn freeze_reverts_external_overwrite() {
        let port: Arc<dyn MemoryPort + Send + Sync> =
            Arc::new(FakePort { mem: Mutex::new(vec![0u8; 16]) });
        let value = TypedValue::encode(crate::value::ValueType::I32Le, "999").unwrap();
        let worker = FreezeWorker::start(0, value.clone(), port.clone());

        thread::sleep(Duration::from_millis(5));
        port.write(0, &[1, 2, 3, 4], false).unwrap();
        thread::sleep(Duration::from_millis(10));

        let current = port.read(&Range::new(0, 4, "")).unwrap();
        assert_eq!(current, value.bytes());

        worker.terminate();
    }
}
