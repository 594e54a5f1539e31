// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interactive external memory scanner/patcher for a running process.

pub mod address;
pub mod cli;
pub mod config;
pub mod engine;
pub mod freeze;
pub mod port;
pub mod repl;
pub mod result;
pub mod scanner;
pub mod serializer;
pub mod signal;
pub mod snapshot;
pub mod value;
