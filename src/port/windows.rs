// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Windows backend: `ReadProcessMemory`/`WriteProcessMemory` for I/O,
//! `VirtualQueryEx` for region enumeration. `attach`/`detach` are no-ops
//! — the debug API needs no ptrace-style stop/continue dance for
//! ordinary read/write access.

use super::{region_allowed, MemoryPort, RegionCache};
use crate::address::{Address, Range, RegionSet};
use crate::result::{Error, Result};
use std::mem::{size_of, MaybeUninit};
use std::sync::Mutex;
use winapi::shared::minwindef::{FALSE, LPCVOID, LPVOID};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::memoryapi::{ReadProcessMemory, VirtualQueryEx, WriteProcessMemory};
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::winnt::{
    MEMORY_BASIC_INFORMATION, PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE,
    PAGE_EXECUTE_WRITECOPY, PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY, PROCESS_ALL_ACCESS,
};

pub struct WindowsPort {
    #[allow(dead_code)]
    pid: u32,
    handle: winapi::um::winnt::HANDLE,
    cache: Mutex<RegionCache>,
}

unsafe impl Send for WindowsPort {}
unsafe impl Sync for WindowsPort {}

impl WindowsPort {
    pub fn new(pid: i32) -> Result<WindowsPort> {
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, FALSE, pid as u32) };
        if handle.is_null() || handle == INVALID_HANDLE_VALUE {
            return Err(Error::Target(format!(
                "OpenProcess({pid}) failed, error {}",
                unsafe { GetLastError() }
            )));
        }
        Ok(WindowsPort { pid: pid as u32, handle, cache: Mutex::new(RegionCache::default()) })
    }
}

impl Drop for WindowsPort {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.handle);
        }
    }
}

fn perm_flags(protect: u32) -> (bool, bool, bool) {
    let readable = protect
        & (PAGE_READONLY
            | PAGE_READWRITE
            | PAGE_WRITECOPY
            | PAGE_EXECUTE_READ
            | PAGE_EXECUTE_READWRITE
            | PAGE_EXECUTE_WRITECOPY)
        != 0;
    let writable =
        protect & (PAGE_READWRITE | PAGE_WRITECOPY | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY) != 0;
    let executable = protect & (PAGE_EXECUTE | PAGE_EXECUTE_READ | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY) != 0;
    (readable, writable, executable)
}

impl MemoryPort for WindowsPort {
    fn attach(&self) -> Result<()> {
        self.cache.lock().unwrap().invalidate();
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        Ok(())
    }

    fn enumerate_regions(&self, scope: &str, ignore_list: &[&str]) -> Result<RegionSet> {
        let mut out = RegionSet::new();
        let mut addr: usize = 0;
        loop {
            let mut info = MaybeUninit::<MEMORY_BASIC_INFORMATION>::uninit();
            let written = unsafe {
                VirtualQueryEx(
                    self.handle,
                    addr as LPCVOID,
                    info.as_mut_ptr(),
                    size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            if written == 0 {
                break;
            }
            let info = unsafe { info.assume_init() };
            let region_start = info.BaseAddress as u64;
            let region_end = region_start + info.RegionSize as u64;
            let (readable, writable, _exec) = perm_flags(info.Protect);
            let is_committed = info.State == winapi::um::winnt::MEM_COMMIT;
            if is_committed && readable && writable {
                let pathname = format!("region@{region_start:#x}");
                if region_allowed(&pathname, scope, ignore_list) {
                    out.push(Range::new(region_start, region_end, pathname));
                }
            }
            let next = region_start + info.RegionSize as u64;
            if next <= addr as u64 {
                break;
            }
            addr = next as usize;
        }
        Ok(out)
    }

    fn read(&self, range: &Range) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; range.len()];
        let mut read: usize = 0;
        let ok = unsafe {
            ReadProcessMemory(
                self.handle,
                range.start as LPCVOID,
                buf.as_mut_ptr() as LPVOID,
                buf.len(),
                &mut read,
            )
        };
        if ok == 0 && read == 0 {
            return Err(Error::Target(format!(
                "ReadProcessMemory({:#x}) failed, error {}",
                range.start,
                unsafe { GetLastError() }
            )));
        }
        buf.truncate(read);
        Ok(buf)
    }

    fn read_cached(&self, sub_range: &Range, parent_range: &Range) -> Result<Vec<u8>> {
        let refill = {
            let cache = self.cache.lock().unwrap();
            match &cache.parent {
                Some(p) => p != parent_range,
                None => true,
            }
        };
        if refill {
            let bytes = self.read(parent_range)?;
            let mut cache = self.cache.lock().unwrap();
            cache.bytes = bytes;
            cache.parent = Some(parent_range.clone());
        }
        let cache = self.cache.lock().unwrap();
        let off = (sub_range.start - parent_range.start) as usize;
        let end = off + sub_range.len();
        if end > cache.bytes.len() {
            return Err(Error::PartialIo {
                expected: sub_range.len(),
                actual: cache.bytes.len().saturating_sub(off),
            });
        }
        Ok(cache.bytes[off..end].to_vec())
    }

    fn write(&self, addr: Address, bytes: &[u8], _freeze_flag: bool) -> Result<usize> {
        let mut written: usize = 0;
        let ok = unsafe {
            WriteProcessMemory(
                self.handle,
                addr as LPVOID,
                bytes.as_ptr() as LPCVOID,
                bytes.len(),
                &mut written,
            )
        };
        if ok == 0 && written == 0 {
            return Err(Error::Target(format!(
                "WriteProcessMemory({addr:#x}) failed, error {}",
                unsafe { GetLastError() }
            )));
        }
        Ok(written)
    }

    fn supports_freeze_while_attached(&self) -> bool {
        true
    }
}
