// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::engine::Engine;
use crate::result::{Error, Result};
use crate::value::{TypedValue, ValueType};

pub fn run(engine: &mut Engine, args: &[&str]) -> Result<String> {
    if args.len() != 3 {
        return Err(Error::Usage("pair_filter <type> <value> <count>".into()));
    }
    let typed = TypedValue::encode(ValueType::parse(args[0])?, args[1])?;
    let k: usize = args[2]
        .parse()
        .map_err(|_| Error::Usage(format!("not a count: '{}'", args[2])))?;
    let n = engine.pair_filter(typed, k)?;
    Ok(format!("{n} candidates remain"))
}
