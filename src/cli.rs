// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line flags.

use crate::config::Config;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mempatch", about = "Interactive external memory scanner/patcher")]
pub struct Args {
    /// pid of the target process
    #[arg(short = 'p', long = "pid")]
    pub pid: i32,

    /// attach-less write mode: write via /proc/<pid>/mem instead of
    /// PTRACE_POKEDATA; required for freeze
    #[arg(short = 'w', long = "no-ptrace")]
    pub no_ptrace: bool,

    /// plain line-reader REPL, no editing affordances
    #[arg(short = 'l', long = "line-mode")]
    pub line_mode: bool,

    /// directory for scratch/state files
    #[arg(long = "storage-prefix", default_value = ".")]
    pub storage_prefix: String,

    /// raise logging verbosity; repeatable
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl From<Args> for Config {
    fn from(args: Args) -> Config {
        Config {
            pid: args.pid,
            without_ptrace: args.no_ptrace,
            line_mode: args.line_mode,
            storage_prefix: args.storage_prefix.clone(),
            default_save_path: format!("{}/mempatch_state.txt", args.storage_prefix),
            default_dump_path: format!("{}/mempatch_dump.dat", args.storage_prefix),
        }
    }
}
