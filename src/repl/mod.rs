// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command loop: tokenize a line by whitespace, dispatch to the
//! matching command module, print the result or the error, continue.

use crate::config::Config;
use crate::engine::Engine;
use crate::result::{Error, Result};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

mod change;
mod diff_cmd;
mod dump_cmd;
mod dumpall_cmd;
mod filter;
mod freeze_cmd;
mod help;
mod lookup;
mod pair_filter;
mod replace;
mod save_cmd;
mod scope_cmd;

/// Runs one command. Case-insensitive name, with `l`/`f`/`c` aliasing
/// `lookup`/`filter`/`change` per the CLI surface.
fn dispatch(engine: &mut Engine, config: &Config, name: &str, args: &[&str]) -> Result<DispatchResult> {
    let result = match name.to_ascii_lowercase().as_str() {
        "attach" => engine.attach().map(|_| "attached".to_string()),
        "detach" => engine.detach().map(|_| "detached".to_string()),
        "clear" => {
            engine.clear();
            Ok("cleared".to_string())
        }
        "lookup" | "l" => lookup::run(engine, args),
        "filter" | "f" => filter::run(engine, args),
        "pair_filter" => pair_filter::run(engine, args),
        "change" | "c" => change::run(engine, args),
        "replace" => replace::run(engine, args),
        "freeze" => freeze_cmd::freeze(engine, args),
        "freeze_terminate" => freeze_cmd::freeze_terminate(engine, args),
        "diff" => diff_cmd::run(engine, args),
        "scope" => scope_cmd::run(engine, args),
        "result" => Ok(format_candidates(engine)),
        "dump" => dump_cmd::run(engine, args),
        "dumpall" => dumpall_cmd::run(engine, config, args),
        "save" => save_cmd::save(engine, config, args),
        "load" => save_cmd::load(engine, config, args),
        "help" => Ok(help::TEXT.to_string()),
        "exit" | "quit" => {
            engine.exit()?;
            return Ok(DispatchResult::Exit);
        }
        other => Err(Error::Usage(format!("unknown command '{other}'"))),
    }?;
    Ok(DispatchResult::Output(result))
}

enum DispatchResult {
    Output(String),
    Exit,
}

fn format_candidates(engine: &Engine) -> String {
    let mut out = String::new();
    for c in engine.candidates() {
        out.push_str(&format!("{:#x}  {} ({})\n", c.addr, c.value.decode(), c.value.ty()));
    }
    out.push_str(&format!("{} candidates\n", engine.candidates().len()));
    out
}

fn tokenize(line: &str) -> Option<(&str, Vec<&str>)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.split_whitespace();
    let cmd = parts.next()?;
    Some((cmd, parts.collect()))
}

/// Runs the REPL loop to completion. Exit code 0 on a clean `exit`, 1
/// if stdin closes without one.
///
/// Takes the engine behind a shared `Mutex` and locks it only for the
/// duration of each dispatched command, not across the whole
/// (blocking) read loop: the engine is also reachable from the signal
/// handler installed by `signal::install`, which must be able to
/// acquire the lock and call `Engine::exit` even while the REPL is
/// idle waiting on stdin between commands.
pub fn run(engine: &Arc<Mutex<Engine>>, config: &Config) -> i32 {
    let stdin = io::stdin();
    print!("> ");
    let _ = io::stdout().flush();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let Some((cmd, args)) = tokenize(&line) else {
            print!("> ");
            let _ = io::stdout().flush();
            continue;
        };
        let result = {
            let mut engine = engine.lock().unwrap();
            dispatch(&mut engine, config, cmd, &args)
        };
        match result {
            Ok(DispatchResult::Output(text)) => {
                if !text.is_empty() {
                    println!("{text}");
                }
            }
            Ok(DispatchResult::Exit) => return 0,
            Err(e) => println!("error: {e}"),
        }
        print!("> ");
        let _ = io::stdout().flush();
    }
    1
}
