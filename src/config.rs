// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Aggregate of mutable, run-wide state threaded into the `Engine` and
//! the REPL loop: the target pid, the I/O mode, and default paths.

#[derive(Debug, Clone)]
pub struct Config {
    pub pid: i32,
    /// `-w`: write via `/proc/<pid>/mem` instead of `PTRACE_POKEDATA`,
    /// skipping attach/detach entirely. Required for `freeze` on Unix.
    pub without_ptrace: bool,
    /// `-l`: plain `read_line` REPL, no editing affordances.
    pub line_mode: bool,
    pub storage_prefix: String,
    pub default_save_path: String,
    pub default_dump_path: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            pid: 0,
            without_ptrace: false,
            line_mode: false,
            storage_prefix: ".".to_string(),
            default_save_path: "./mempatch_state.txt".to_string(),
            default_dump_path: "./mempatch_dump.dat".to_string(),
        }
    }
}
