// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plain-text, purely positional persistence format for engine state.
//! Every integer field is preceded by `_`; every variable-length field
//! is preceded by its own `_<len>` so the reader never needs a
//! separator to find the next field's start.

use crate::address::{Address, Range, RegionSet};
use crate::engine::Candidate;
use crate::result::{Error, Result};
use crate::value::{TypedValue, ValueType};

pub struct Writer {
    buf: Vec<u8>,
}

impl Default for Writer {
    fn default() -> Writer {
        Writer::new()
    }
}

impl Writer {
    pub fn new() -> Writer {
        Writer { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn uint(&mut self, n: u64) -> &mut Self {
        self.buf.push(b'_');
        self.buf.extend(n.to_string().as_bytes());
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.uint(data.len() as u64);
        self.buf.extend_from_slice(data);
        self
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes());
        self
    }

    pub fn range(&mut self, r: &Range) -> &mut Self {
        self.uint(r.start).uint(r.end).text(&r.comment);
        self
    }

    pub fn typed_value(&mut self, v: &TypedValue) -> &mut Self {
        self.text(v.ty().name()).bytes(v.bytes());
        self
    }

    pub fn candidate(&mut self, c: &Candidate) -> &mut Self {
        self.uint(c.addr).typed_value(&c.value);
        self
    }

    pub fn region_set(&mut self, regions: &RegionSet) -> &mut Self {
        self.uint(regions.len() as u64);
        for r in regions {
            self.range(r);
        }
        self
    }

    pub fn candidates(&mut self, candidates: &[Candidate]) -> &mut Self {
        self.uint(candidates.len() as u64);
        for c in candidates {
            self.candidate(c);
        }
        self
    }
}

pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, pos: 0 }
    }

    pub fn uint(&mut self) -> Result<u64> {
        if self.data.get(self.pos) != Some(&b'_') {
            return Err(Error::Usage("malformed save file: expected '_'".into()));
        }
        self.pos += 1;
        let start = self.pos;
        while self.data.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::Usage("malformed save file: expected digits".into()));
        }
        let s = std::str::from_utf8(&self.data[start..self.pos]).unwrap();
        s.parse().map_err(|_| Error::Usage("malformed save file: bad integer".into()))
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.uint()? as usize;
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(Error::PartialIo { expected: len, actual: self.data.len() - self.pos });
        }
        let out = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }

    pub fn text(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.bytes()?).into_owned())
    }

    pub fn range(&mut self) -> Result<Range> {
        let start = self.uint()?;
        let end = self.uint()?;
        let comment = self.text()?;
        Ok(Range::new(start, end, comment))
    }

    pub fn typed_value(&mut self) -> Result<TypedValue> {
        let type_name = self.text()?;
        let ty = ValueType::parse(&type_name)?;
        let bytes = self.bytes()?;
        Ok(TypedValue::new(ty, bytes))
    }

    pub fn candidate(&mut self) -> Result<Candidate> {
        let addr = self.uint()? as Address;
        let value = self.typed_value()?;
        Ok(Candidate { addr, value })
    }

    pub fn region_set(&mut self) -> Result<RegionSet> {
        let n = self.uint()?;
        (0..n).map(|_| self.range()).collect()
    }

    pub fn candidates(&mut self) -> Result<Vec<Candidate>> {
        let n = self.uint()?;
        (0..n).map(|_| self.candidate()).collect()
    }
}

/// The full engine-state record: everything written by `save` and read
/// back by `load`.
pub struct SaveFile {
    pub pid: i32,
    pub last_process_time: u64,
    pub regions: RegionSet,
    pub candidates: Vec<Candidate>,
}

pub fn save(file: &SaveFile) -> Vec<u8> {
    let mut w = Writer::new();
    w.uint(file.pid as u64)
        .uint(file.last_process_time)
        .region_set(&file.regions)
        .candidates(&file.candidates);
    w.into_bytes()
}

/// Parses a save file. Returns an error if `current_pid` disagrees with
/// the pid recorded at capture time.
pub fn load(data: &[u8], current_pid: i32) -> Result<SaveFile> {
    let mut r = Reader::new(data);
    let pid = r.uint()? as i32;
    if pid != current_pid {
        return Err(Error::Usage(format!(
            "save file was captured for pid {pid}, current target is {current_pid}"
        )));
    }
    let last_process_time = r.uint()?;
    let regions = r.region_set()?;
    let candidates = r.candidates()?;
    Ok(SaveFile { pid, last_process_time, regions, candidates })
}

/// Writes the `dumpall` header (`_<pid>` then the serialized
/// `RegionSet`); the raw region bytes follow, written by the caller,
/// one after another with no length prefix between them.
pub fn dumpall_header(pid: i32, regions: &RegionSet) -> Vec<u8> {
    let mut w = Writer::new();
    w.uint(pid as u64).region_set(regions);
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    #[test]
    fn save_load_round_trip() {
        let file = SaveFile {
            pid: 42,
            last_process_time: 1_700_000_000,
            regions: vec![Range::new(0x1000, 0x2000, "/bin/foo")],
            candidates: vec![Candidate {
                addr: 0x1500,
                value: TypedValue::encode(ValueType::I32Le, "123456789").unwrap(),
            }],
        };
        let bytes = save(&file);
        let loaded = load(&bytes, 42).unwrap();
        assert_eq!(loaded.pid, 42);
        assert_eq!(loaded.regions, file.regions);
        assert_eq!(loaded.candidates.len(), 1);
        assert_eq!(loaded.candidates[0].addr, 0x1500);
    }

    #[test]
    fn load_rejects_pid_mismatch() {
        let file = SaveFile { pid: 42, last_process_time: 0, regions: vec![], candidates: vec![] };
        let bytes = save(&file);
        assert!(load(&bytes, 99).is_err());
    }

    #[test]
    fn comment_with_underscores_round_trips() {
        let mut w = Writer::new();
        w.range(&Range::new(1, 2, "weird_comment_with_under_scores"));
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let range = r.range().unwrap();
        assert_eq!(range.comment, "weird_comment_with_under_scores");
    }
}
