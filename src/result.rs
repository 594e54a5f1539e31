// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Crate-wide error taxonomy.
//!
//! Every fallible operation in `mempatch` returns one of these variants.
//! The REPL boundary (`crate::repl`) is the only place that turns an
//! `Err` into a printed diagnostic; nothing below it panics on a target
//! or I/O failure.

use std::io;

/// Error taxonomy, per the recovery policy: everything here is recovered
/// locally by the REPL loop except [`Error::Signal`], which is fatal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad command, bad argument, unknown type, misaligned diff footprint.
    #[error("usage: {0}")]
    Usage(String),

    /// Attach/detach syscall failure, `/proc` open failure, `maps` parse
    /// failure, or a platform read/write primitive failure.
    #[error("target error: {0}")]
    Target(String),

    /// A short read or write; the caller skips the affected region or
    /// candidate rather than aborting the whole operation.
    #[error("partial I/O: expected {expected} bytes, got {actual}")]
    PartialIo { expected: usize, actual: usize },

    /// A post-write readback did not match what was written.
    #[error("verification failed at {addr:#x}: wrote {wrote:02x?}, read back {read:02x?}")]
    Verification { addr: u64, wrote: Vec<u8>, read: Vec<u8> },

    /// A fatal signal was received; all freeze workers are terminated and
    /// the process detaches before exiting.
    #[error("fatal signal {0}")]
    Signal(i32),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
