// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Patcher: owns the candidate set, region set, snapshot handle,
//! and freeze workers, and implements every scan/refine/mutate
//! operation the REPL dispatches to.

use crate::address::{fit_range, Address, Range, RegionSet};
use crate::config::Config;
use crate::freeze::FreezeWorker;
use crate::port::{MemoryPort, DEFAULT_IGNORE_LIST};
use crate::result::{Error, Result};
use crate::scanner::{float_fuzzy_search, rolling_hash_search};
use crate::serializer::{self, SaveFile};
use crate::snapshot::Snapshot;
use crate::value::{TypedValue, ValueType};
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

/// A `(address, typed-value)` pair under consideration during
/// refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub addr: Address,
    pub value: TypedValue,
}

/// Above this many live candidates, `filter` reads through the region
/// cache instead of issuing one positioned read per candidate.
const CACHED_FILTER_THRESHOLD: usize = 10_000;

/// Which direction `diff` compares the current value against the
/// prior one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Start,
    Upper,
    Lower,
    Same,
    Change,
    End,
}

impl DiffMode {
    pub fn parse(s: &str) -> Result<DiffMode> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(DiffMode::Start),
            "upper" => Ok(DiffMode::Upper),
            "lower" => Ok(DiffMode::Lower),
            "same" => Ok(DiffMode::Same),
            "change" => Ok(DiffMode::Change),
            "end" => Ok(DiffMode::End),
            other => Err(Error::Usage(format!("unknown diff mode '{other}'"))),
        }
    }

    fn holds(&self, new: i32, old: i32) -> bool {
        match self {
            DiffMode::Upper => new > old,
            DiffMode::Lower => new < old,
            DiffMode::Same => new == old,
            DiffMode::Change => new != old,
            DiffMode::Start | DiffMode::End => unreachable!(),
        }
    }
}

pub struct Engine {
    port: Arc<dyn MemoryPort + Send + Sync>,
    regions: RegionSet,
    candidates: Vec<Candidate>,
    snapshot: Option<Snapshot>,
    freeze_workers: Vec<FreezeWorker>,
    scope: String,
    config: Config,
}

impl Engine {
    pub fn new(port: Arc<dyn MemoryPort + Send + Sync>, config: Config) -> Engine {
        Engine {
            port,
            regions: RegionSet::new(),
            candidates: Vec::new(),
            snapshot: None,
            freeze_workers: Vec::new(),
            scope: String::new(),
            config,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn regions(&self) -> &[Range] {
        &self.regions
    }

    pub fn attach(&mut self) -> Result<()> {
        self.port.attach()
    }

    pub fn detach(&mut self) -> Result<()> {
        self.port.detach()
    }

    fn refresh_regions(&mut self) -> Result<()> {
        self.port.attach()?;
        self.regions = self.port.enumerate_regions(&self.scope, DEFAULT_IGNORE_LIST)?;
        Ok(())
    }

    pub fn lookup(&mut self, typed: TypedValue) -> Result<usize> {
        let start = Instant::now();
        self.candidates.clear();
        self.refresh_regions()?;

        let mut bytes_scanned = 0usize;
        for region in self.regions.clone() {
            let bytes = match self.port.read(&region) {
                Ok(b) => b,
                Err(e) => {
                    warn!("lookup: skipping region {region}: {e}");
                    continue;
                }
            };
            bytes_scanned += bytes.len();
            let offsets = self.scan(&typed, &bytes);
            for off in offsets {
                self.candidates.push(Candidate { addr: region.start + off as u64, value: typed.clone() });
            }
        }

        info!(
            "lookup: {:.3}s, {bytes_scanned} bytes scanned, {} regions, {} candidates",
            start.elapsed().as_secs_f64(),
            self.regions.len(),
            self.candidates.len()
        );
        Ok(self.candidates.len())
    }

    fn scan(&self, typed: &TypedValue, haystack: &[u8]) -> Vec<usize> {
        if typed.ty() == ValueType::F32FuzzyLe {
            let mut needle = [0u8; 4];
            needle.copy_from_slice(typed.bytes());
            float_fuzzy_search(haystack, &needle)
        } else {
            rolling_hash_search(haystack, typed.bytes())
        }
    }

    pub fn filter(&mut self, typed: TypedValue) -> Result<usize> {
        let start = Instant::now();
        self.refresh_regions()?;
        let use_cache = self.candidates.len() >= CACHED_FILTER_THRESHOLD;

        let mut survivors = Vec::with_capacity(self.candidates.len());
        for c in self.candidates.drain(..) {
            let footprint = typed.footprint() as u64;
            let range = Range::new(c.addr, c.addr + footprint, "");
            let Some(parent) = self.regions.iter().find(|r| r.contains(c.addr)) else {
                continue;
            };
            let mem = if use_cache {
                self.port.read_cached(&range, parent)
            } else {
                self.port.read(&range)
            };
            let Ok(mem) = mem else { continue };
            if typed.matches(&mem) {
                survivors.push(Candidate { addr: c.addr, value: typed.clone() });
            }
        }
        self.candidates = survivors;

        info!(
            "filter: {:.3}s, {} candidates remain",
            start.elapsed().as_secs_f64(),
            self.candidates.len()
        );
        Ok(self.candidates.len())
    }

    /// Finds, for every prior candidate, its nearest-by-address match
    /// in a fresh `lookup`, via a two-pointer sweep over both sorted
    /// sequences. Keeps at most `k` of the closest pairs.
    pub fn pair_filter(&mut self, typed: TypedValue, k: usize) -> Result<usize> {
        let mut prior: Vec<Candidate> = self.candidates.clone();
        prior.sort_by_key(|c| c.addr);

        self.lookup(typed)?;
        let mut fresh: Vec<Candidate> = std::mem::take(&mut self.candidates);
        fresh.sort_by_key(|c| c.addr);

        let mut pairs: Vec<(u64, Candidate)> = Vec::new();
        let mut j = 0usize;
        for p in &prior {
            while j + 1 < fresh.len()
                && dist(fresh[j + 1].addr, p.addr) <= dist(fresh[j].addr, p.addr)
            {
                j += 1;
            }
            if let Some(nc) = fresh.get(j) {
                pairs.push((dist(nc.addr, p.addr), nc.clone()));
            }
        }
        pairs.sort_by_key(|(d, _)| *d);
        pairs.truncate(k);
        self.candidates = pairs.into_iter().map(|(_, c)| c).collect();
        Ok(self.candidates.len())
    }

    /// Writes `typed` to every surviving candidate and verifies the
    /// write with a readback. Writes are independent; a mismatch is
    /// reported per-candidate and does not abort the rest.
    pub fn change(&mut self, typed: TypedValue) -> Result<usize> {
        let mut changed = 0;
        for c in &mut self.candidates {
            match self.port.write(c.addr, typed.bytes(), false) {
                Ok(n) if n == typed.bytes().len() => {
                    if let Err(e) = verify(self.port.as_ref(), c.addr, typed.bytes()) {
                        warn!("change: {e}");
                        continue;
                    }
                    c.value = typed.clone();
                    changed += 1;
                }
                Ok(n) => warn!("change: short write at {:#x} ({n}/{})", c.addr, typed.bytes().len()),
                Err(e) => warn!("change: write failed at {:#x}: {e}", c.addr),
            }
        }
        Ok(changed)
    }

    /// Single-address `change`.
    pub fn replace(&self, addr: Address, typed: &TypedValue) -> Result<()> {
        let n = self.port.write(addr, typed.bytes(), false)?;
        if n != typed.bytes().len() {
            return Err(Error::PartialIo { expected: typed.bytes().len(), actual: n });
        }
        verify(self.port.as_ref(), addr, typed.bytes())
    }

    pub fn diff(&mut self, mode: DiffMode) -> Result<usize> {
        match mode {
            DiffMode::Start => self.diff_start().map(|_| 0),
            DiffMode::End => {
                self.snapshot = None;
                Ok(0)
            }
            other => self.diff_compare(other),
        }
    }

    fn diff_start(&mut self) -> Result<()> {
        self.refresh_regions()?;
        let mut snap = Snapshot::create(&self.config.storage_prefix)?;
        for region in self.regions.clone() {
            let bytes = self.port.read(&region)?;
            snap.push(region, &bytes)?;
        }
        self.snapshot = Some(snap);
        Ok(())
    }

    fn diff_compare(&mut self, mode: DiffMode) -> Result<usize> {
        self.candidates.clear();
        if let Some(mut snap) = self.snapshot.take() {
            self.refresh_regions()?;
            let entries = snap.entries().to_vec();
            for entry in entries {
                let clipped = fit_range(&self.regions, entry.range());
                if clipped.is_empty() {
                    continue;
                }
                let old_full = snap.bytes_of(&entry)?;
                let new_full = self.port.read(&clipped)?;
                let old_off = (clipped.start - entry.range().start) as usize;
                let n = old_full.len().min(new_full.len() + old_off);
                let mut i = 0;
                while i + 4 <= n.saturating_sub(old_off) {
                    let old4: [u8; 4] = old_full[old_off + i..old_off + i + 4].try_into().unwrap();
                    let new4: [u8; 4] = new_full[i..i + 4].try_into().unwrap();
                    let old = i32::from_le_bytes(old4);
                    let new = i32::from_le_bytes(new4);
                    if mode.holds(new, old) {
                        self.candidates.push(Candidate {
                            addr: clipped.start + i as u64,
                            value: TypedValue::new(ValueType::I32Le, new4.to_vec()),
                        });
                    }
                    i += 4;
                }
            }
        } else if !self.candidates.is_empty() {
            let prior = std::mem::take(&mut self.candidates);
            for c in prior {
                if c.value.footprint() != 4 {
                    continue;
                }
                let range = Range::new(c.addr, c.addr + 4, "");
                let Ok(mem) = self.port.read(&range) else { continue };
                if mem.len() != 4 {
                    continue;
                }
                let old4: [u8; 4] = c.value.bytes().try_into().unwrap();
                let new4: [u8; 4] = mem.as_slice().try_into().unwrap();
                let old = i32::from_le_bytes(old4);
                let new = i32::from_le_bytes(new4);
                if mode.holds(new, old) {
                    self.candidates
                        .push(Candidate { addr: c.addr, value: TypedValue::new(ValueType::I32Le, new4.to_vec()) });
                }
            }
        }
        Ok(self.candidates.len())
    }

    pub fn scope(&mut self, substr: &str) {
        self.scope = substr.to_string();
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let file = SaveFile {
            pid: self.config.pid,
            last_process_time: now_unix(),
            regions: self.regions.clone(),
            candidates: self.candidates.clone(),
        };
        std::fs::write(path, serializer::save(&file))?;
        Ok(())
    }

    pub fn load(&mut self, path: &str) -> Result<()> {
        let data = std::fs::read(path)?;
        let file = serializer::load(&data, self.config.pid)?;
        self.regions = file.regions;
        self.candidates = file.candidates;
        Ok(())
    }

    pub fn dump(&self, addr: Address, len: u64) -> Result<String> {
        let requested = Range::new(addr, addr + len, "");
        let fitted = fit_range(&self.regions, &requested);
        if fitted.is_empty() {
            return Err(Error::Usage(format!("{addr:#x}+{len:#x} is not in any known region")));
        }
        self.port.dump(&fitted)
    }

    pub fn dumpall(&mut self, path: &str) -> Result<()> {
        self.refresh_regions()?;
        let mut out = serializer::dumpall_header(self.config.pid, &self.regions);
        for region in self.regions.clone() {
            out.extend(self.port.read(&region)?);
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    pub fn freeze(&mut self, addr: Address, typed: TypedValue) -> Result<()> {
        if !self.config.without_ptrace && !self.port.supports_freeze_while_attached() {
            return Err(Error::Usage(
                "freeze requires attach-less mode (-w); ptrace cannot write while the target runs".into(),
            ));
        }
        self.freeze_workers.push(FreezeWorker::start(addr, typed, self.port.clone()));
        Ok(())
    }

    pub fn freeze_terminate(&mut self) {
        for worker in self.freeze_workers.drain(..) {
            worker.terminate();
        }
    }

    pub fn exit(&mut self) -> Result<()> {
        self.freeze_terminate();
        self.port.detach()
    }
}

fn dist(a: Address, b: Address) -> u64 {
    a.abs_diff(b)
}

fn verify(port: &dyn MemoryPort, addr: Address, wrote: &[u8]) -> Result<()> {
    let range = Range::new(addr, addr + wrote.len() as u64, "");
    let read = port.read(&range)?;
    if read != wrote {
        return Err(Error::Verification { addr, wrote: wrote.to_vec(), read });
    }
    Ok(())
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakePort {
        mem: Mutex<Vec<u8>>,
        regions: RegionSet,
    }

    impl MemoryPort for FakePort {
        fn attach(&self) -> Result<()> {
            Ok(())
        }
        fn detach(&self) -> Result<()> {
            Ok(())
        }
        fn enumerate_regions(&self, _scope: &str, _ignore: &[&str]) -> Result<RegionSet> {
            Ok(self.regions.clone())
        }
        fn read(&self, range: &Range) -> Result<Vec<u8>> {
            let mem = self.mem.lock().unwrap();
            Ok(mem[range.start as usize..range.end as usize].to_vec())
        }
        fn read_cached(&self, sub: &Range, _parent: &Range) -> Result<Vec<u8>> {
            self.read(sub)
        }
        fn write(&self, addr: Address, bytes: &[u8], _freeze: bool) -> Result<usize> {
            let mut mem = self.mem.lock().unwrap();
            mem[addr as usize..addr as usize + bytes.len()].copy_from_slice(bytes);
            Ok(bytes.len())
        }
        fn supports_freeze_while_attached(&self) -> bool {
            true
        }
    }

    fn test_engine(mem: Vec<u8>) -> Engine {
        let len = mem.len() as u64;
        let port: Arc<dyn MemoryPort + Send + Sync> = Arc::new(FakePort {
            mem: Mutex::new(mem),
            regions: vec![Range::new(0, len, "test")],
        });
        Engine::new(port, Config { pid: 1, without_ptrace: true, ..Config::default() })
    }

    #[test]
    fn lookup_finds_needle() {
        let mut mem = vec![0u8; 32];
        mem[8..12].copy_from_slice(&123456789i32.to_le_bytes());
        let mut engine = test_engine(mem);
        let typed = TypedValue::encode(ValueType::I32Le, "123456789").unwrap();
        let n = engine.lookup(typed).unwrap();
        assert_eq!(n, 1);
        assert_eq!(engine.candidates()[0].addr, 8);
    }

    #[test]
    fn filter_retains_only_matching() {
        let mut mem = vec![0u8; 32];
        mem[0..4].copy_from_slice(&100i32.to_le_bytes());
        mem[4..8].copy_from_slice(&200i32.to_le_bytes());
        let mut engine = test_engine(mem);
        engine.candidates = vec![
            Candidate { addr: 0, value: TypedValue::encode(ValueType::I32Le, "100").unwrap() },
            Candidate { addr: 4, value: TypedValue::encode(ValueType::I32Le, "100").unwrap() },
        ];
        let typed = TypedValue::encode(ValueType::I32Le, "100").unwrap();
        let n = engine.filter(typed).unwrap();
        assert_eq!(n, 1);
        assert_eq!(engine.candidates()[0].addr, 0);
    }

    #[test]
    fn refinement_monotonicity_lookup_then_filter() {
        let mut mem = vec![0u8; 32];
        mem[0..4].copy_from_slice(&55i32.to_le_bytes());
        let mut engine = test_engine(mem);
        let typed = TypedValue::encode(ValueType::I32Le, "55").unwrap();
        engine.lookup(typed.clone()).unwrap();
        let before = engine.candidates().to_vec();
        engine.filter(typed).unwrap();
        assert_eq!(before, engine.candidates());
    }

    #[test]
    fn replace_writes_and_verifies() {
        let mem = vec![0u8; 16];
        let engine = test_engine(mem);
        let typed = TypedValue::encode(ValueType::Hex, "deadbeef").unwrap();
        engine.replace(0, &typed).unwrap();
        let read_back = engine.port.read(&Range::new(0, 4, "")).unwrap();
        assert_eq!(read_back, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn diff_same_after_unchanged_region() {
        let mem = vec![7u8; 16];
        let mut engine = test_engine(mem);
        engine.diff(DiffMode::Start).unwrap();
        let n = engine.diff(DiffMode::Same).unwrap();
        assert_eq!(n, 4);
    }

    #[test]
    fn pair_filter_keeps_k_nearest() {
        let mut mem = vec![0u8; 64];
        mem[0..4].copy_from_slice(&100i32.to_le_bytes());
        mem[40..44].copy_from_slice(&100i32.to_le_bytes());
        let mut engine = test_engine(mem);
        engine.candidates = vec![Candidate { addr: 2, value: TypedValue::encode(ValueType::I32Le, "0").unwrap() }];
        let typed = TypedValue::encode(ValueType::I32Le, "100").unwrap();
        let n = engine.pair_filter(typed, 1).unwrap();
        assert_eq!(n, 1);
        assert_eq!(engine.candidates()[0].addr, 0);
    }
}
