// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::engine::Engine;
use crate::result::{Error, Result};

pub fn run(engine: &mut Engine, args: &[&str]) -> Result<String> {
    if args.len() != 2 {
        return Err(Error::Usage("dump <hexaddr> <hexlen>".into()));
    }
    let addr = u64::from_str_radix(args[0].trim_start_matches("0x"), 16)
        .map_err(|_| Error::Usage(format!("not a hex address: '{}'", args[0])))?;
    let len = u64::from_str_radix(args[1].trim_start_matches("0x"), 16)
        .map_err(|_| Error::Usage(format!("not a hex length: '{}'", args[1])))?;
    engine.dump(addr, len)
}
