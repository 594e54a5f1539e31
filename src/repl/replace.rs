// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::engine::Engine;
use crate::result::{Error, Result};
use crate::value::{TypedValue, ValueType};

pub fn run(engine: &mut Engine, args: &[&str]) -> Result<String> {
    if args.len() != 3 {
        return Err(Error::Usage("replace <hexaddr> <type> <value>".into()));
    }
    let addr = u64::from_str_radix(args[0].trim_start_matches("0x"), 16)
        .map_err(|_| Error::Usage(format!("not a hex address: '{}'", args[0])))?;
    let typed = TypedValue::encode(ValueType::parse(args[1])?, args[2])?;
    engine.replace(addr, &typed)?;
    Ok(format!("Change: {addr:#x} -> {}", typed.decode()))
}
