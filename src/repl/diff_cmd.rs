// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::engine::{DiffMode, Engine};
use crate::result::{Error, Result};

pub fn run(engine: &mut Engine, args: &[&str]) -> Result<String> {
    if args.len() != 1 {
        return Err(Error::Usage("diff <start|upper|lower|same|change|end>".into()));
    }
    let mode = DiffMode::parse(args[0])?;
    let n = engine.diff(mode)?;
    Ok(format!("{n} candidates"))
}
