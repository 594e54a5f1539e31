// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::engine::Engine;
use crate::result::Result;

pub fn run(engine: &mut Engine, args: &[&str]) -> Result<String> {
    let substr = args.first().copied().unwrap_or("");
    engine.scope(substr);
    if substr.is_empty() {
        Ok("scope cleared".into())
    } else {
        Ok(format!("scope set to '{substr}'"))
    }
}
