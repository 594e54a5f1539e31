// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform-abstract memory I/O: attach/detach, bounded read/write,
//! writable-region enumeration, and a read-through region cache.

use crate::address::{Address, Range, RegionSet};
use crate::result::Result;
use bitflags::bitflags;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::UnixPort;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsPort;

bitflags! {
    /// Permission bits of a mapped region, shared between the Unix
    /// `/proc/<pid>/maps` parser and the Windows `VirtualQueryEx` walk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Perm: u8 {
        const READ = 0b0001;
        const WRITE = 0b0010;
        const EXEC = 0b0100;
        const SHARED = 0b1000;
    }
}

/// Pathname prefixes of system libraries never worth scanning.
pub const DEFAULT_IGNORE_LIST: &[&str] =
    &["/system/lib/", "/lib/x86_64-linux-gnu/", "/usr/lib/"];

/// Cached parent region plus the bytes last read for it.
#[derive(Default)]
pub struct RegionCache {
    pub(crate) parent: Option<Range>,
    pub(crate) bytes: Vec<u8>,
}

impl RegionCache {
    pub fn invalidate(&mut self) {
        self.parent = None;
        self.bytes.clear();
    }
}

/// A platform backend for reading/writing a target process's memory.
///
/// Takes `&self` throughout (not `&mut self`): the port is shared
/// between the foreground `Engine` and every background
/// `FreezeWorker`, so any state that mutates (attach status, the
/// region cache) lives behind interior mutability in the
/// implementation.
pub trait MemoryPort {
    fn attach(&self) -> Result<()>;
    fn detach(&self) -> Result<()>;

    /// Yields only regions that are read+write, non-shared, don't match
    /// any ignore-list prefix, and (if `scope` is non-empty) contain
    /// `scope` as a substring of their pathname.
    fn enumerate_regions(&self, scope: &str, ignore_list: &[&str]) -> Result<RegionSet>;

    /// Reads up to `range.len()` bytes, returning however many were
    /// actually read (a short read is not an error at this layer).
    fn read(&self, range: &Range) -> Result<Vec<u8>>;

    /// Reads `sub_range` via the region cache: refills the cache by
    /// reading all of `parent_range` when it differs from what's
    /// cached, then slices out `sub_range`. The cache is invalidated
    /// on every `attach`.
    fn read_cached(&self, sub_range: &Range, parent_range: &Range) -> Result<Vec<u8>>;

    /// Writes `bytes` at `range.start`, returning the number of bytes
    /// written. `freeze_flag` permits the write when the port is not
    /// currently attached (required by the freeze loop in
    /// attach-less mode).
    fn write(&self, addr: Address, bytes: &[u8], freeze_flag: bool) -> Result<usize>;

    /// Hex+ASCII formatted dump of `range`.
    fn dump(&self, range: &Range) -> Result<String> {
        let bytes = self.read(range)?;
        Ok(format_dump(range.start, &bytes))
    }

    /// True if this backend can service a `freeze` without requiring
    /// attach-less mode (only the Windows backend; ptrace requires the
    /// target stopped and is therefore incompatible with concurrent
    /// freeze writes).
    fn supports_freeze_while_attached(&self) -> bool {
        false
    }

    fn without_ptrace(&self) -> bool {
        false
    }
}

pub fn format_dump(base: Address, bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:#010x}  ", base + (row * 16) as u64));
        for b in chunk {
            out.push_str(&format!("{b:02x} "));
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str(" |");
        for &b in chunk {
            let c = b as char;
            out.push(if c.is_ascii_graphic() || c == ' ' { c } else { '.' });
        }
        out.push_str("|\n");
    }
    out
}

pub fn region_allowed(path: &str, scope: &str, ignore_list: &[&str]) -> bool {
    if ignore_list.iter().any(|p| path.contains(p)) {
        return false;
    }
    if !scope.is_empty() && !path.contains(scope) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_list_blocks_system_libs() {
        assert!(!region_allowed("/usr/lib/libc.so", "", DEFAULT_IGNORE_LIST));
    }

    #[test]
    fn scope_filters_by_substring() {
        assert!(region_allowed("/home/user/target", "target", &[]));
        assert!(!region_allowed("/home/user/other", "target", &[]));
    }

    #[test]
    fn empty_scope_allows_everything_not_ignored() {
        assert!(region_allowed("/home/user/anything", "", &[]));
    }
}
