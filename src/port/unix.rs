// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unix backend: `ptrace` attach/detach over every thread of the
//! target, positioned reads via `/proc/<pid>/mem`, and word-sized
//! `PTRACE_POKEDATA` writes with a tail-merge for unaligned lengths.

use super::{region_allowed, MemoryPort, RegionCache};
use crate::address::{Address, Range, RegionSet};
use crate::result::{Error, Result};
use nix::sys::ptrace;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::sync::Mutex;

const WORD: usize = std::mem::size_of::<i64>();

pub struct UnixPort {
    pid: Pid,
    without_ptrace: bool,
    attached_tids: Mutex<Vec<Pid>>,
    cache: Mutex<RegionCache>,
}

impl UnixPort {
    pub fn new(pid: i32, without_ptrace: bool) -> UnixPort {
        UnixPort {
            pid: Pid::from_raw(pid),
            without_ptrace,
            attached_tids: Mutex::new(Vec::new()),
            cache: Mutex::new(RegionCache::default()),
        }
    }

    fn task_ids(&self) -> Result<Vec<Pid>> {
        let dir = format!("/proc/{}/task", self.pid);
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| Error::Target(format!("{dir}: {e}")))? {
            let entry = entry.map_err(|e| Error::Target(e.to_string()))?;
            if let Some(name) = entry.file_name().to_str()
                && let Ok(tid) = name.parse::<i32>()
            {
                ids.push(Pid::from_raw(tid));
            }
        }
        Ok(ids)
    }

    fn mem_file(&self, write: bool) -> Result<File> {
        let path = format!("/proc/{}/mem", self.pid);
        let mut opts = OpenOptions::new();
        opts.read(true);
        if write {
            opts.write(true);
        }
        opts.open(&path).map_err(|e| Error::Target(format!("{path}: {e}")))
    }
}

impl MemoryPort for UnixPort {
    fn attach(&self) -> Result<()> {
        if self.without_ptrace {
            return Ok(());
        }
        let tids = self.task_ids()?;
        for tid in &tids {
            ptrace::attach(*tid)
                .map_err(|e| Error::Target(format!("PTRACE_ATTACH {tid}: {e}")))?;
            waitpid(*tid, None).map_err(|e| Error::Target(format!("waitpid {tid}: {e}")))?;
        }
        *self.attached_tids.lock().unwrap() = tids;
        self.cache.lock().unwrap().invalidate();
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        if self.without_ptrace {
            return Ok(());
        }
        for tid in self.attached_tids.lock().unwrap().drain(..) {
            let _ = ptrace::detach(tid, None);
        }
        Ok(())
    }

    fn enumerate_regions(&self, scope: &str, ignore_list: &[&str]) -> Result<RegionSet> {
        let path = format!("/proc/{}/maps", self.pid);
        let content = fs::read_to_string(&path).map_err(|e| Error::Target(format!("{path}: {e}")))?;
        let mut out = RegionSet::new();
        for line in content.lines() {
            let mut fields = line.splitn(6, ' ');
            let addrs = fields.next().unwrap_or("");
            let perms = fields.next().unwrap_or("");
            let pathname = fields.last().unwrap_or("").trim();

            let Some((start_s, end_s)) = addrs.split_once('-') else { continue };
            let (Ok(start), Ok(end)) = (
                Address::from_str_radix(start_s, 16),
                Address::from_str_radix(end_s, 16),
            ) else {
                continue;
            };

            let perm_bytes = perms.as_bytes();
            if perm_bytes.len() < 4 {
                continue;
            }
            let readable = perm_bytes[0] == b'r';
            let writable = perm_bytes[1] == b'w';
            let shared = perm_bytes[3] == b's';
            if !(readable && writable && !shared) {
                continue;
            }
            if !region_allowed(pathname, scope, ignore_list) {
                continue;
            }
            out.push(Range::new(start, end, pathname));
        }
        Ok(out)
    }

    fn read(&self, range: &Range) -> Result<Vec<u8>> {
        let file = self.mem_file(false)?;
        let mut buf = vec![0u8; range.len()];
        let n = file
            .read_at(&mut buf, range.start)
            .map_err(|e| Error::Target(format!("read /proc/{}/mem: {e}", self.pid)))?;
        buf.truncate(n);
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

    fn write(&self, addr: Address, bytes: &[u8], freeze_flag: bool) -> Result<usize> {
        if self.without_ptrace || freeze_flag {
            return self.write_via_proc_mem(addr, bytes);
        }
        self.write_via_pokedata(addr, bytes)
    }

    fn supports_freeze_while_attached(&self) -> bool {
        false
    }

    fn without_ptrace(&self) -> bool {
        self.without_ptrace
    }
}

impl UnixPort {
    fn write_via_proc_mem(&self, addr: Address, bytes: &[u8]) -> Result<usize> {
        let file = self.mem_file(true)?;
        file.write_at(bytes, addr)
            .map_err(|e| Error::Target(format!("write /proc/{}/mem: {e}", self.pid)))
    }

    /// Writes in `WORD`-sized chunks via `PTRACE_POKEDATA`. A write
    /// whose length isn't a multiple of `WORD` tail-merges: the final
    /// partial word is filled in from a read of the remaining bytes at
    /// that address, rather than reading past the requested end.
    fn write_via_pokedata(&self, addr: Address, bytes: &[u8]) -> Result<usize> {
        let full_words = bytes.len() / WORD;
        let tail_len = bytes.len() % WORD;

        for i in 0..full_words {
            let off = i * WORD;
            let mut word_bytes = [0u8; WORD];
            word_bytes.copy_from_slice(&bytes[off..off + WORD]);
            let word = i64::from_ne_bytes(word_bytes);
            ptrace::write(self.pid, (addr as usize + off) as *mut _, word)
                .map_err(|e| Error::Target(format!("PTRACE_POKEDATA: {e}")))?;
        }

        if tail_len > 0 {
            let tail_addr = addr + (full_words * WORD) as u64;
            let existing = self.read(&Range::new(tail_addr, tail_addr + WORD as u64, ""));
            let mut merged = match existing {
                Ok(e) if e.len() == WORD => e,
                _ => {
                    return Err(Error::PartialIo { expected: WORD, actual: 0 });
                }
            };
            merged[..tail_len].copy_from_slice(&bytes[full_words * WORD..]);
            let word = i64::from_ne_bytes(merged.try_into().unwrap());
            ptrace::write(self.pid, tail_addr as *mut _, word)
                .map_err(|e| Error::Target(format!("PTRACE_POKEDATA tail: {e}")))?;
        }
        Ok(bytes.len())
    }
}
