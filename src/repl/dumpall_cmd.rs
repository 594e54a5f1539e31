// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::Config;
use crate::engine::Engine;
use crate::result::Result;

pub fn run(engine: &mut Engine, config: &Config, args: &[&str]) -> Result<String> {
    let path = args.first().copied().unwrap_or(config.default_dump_path.as_str());
    engine.dumpall(path)?;
    Ok(format!("dumped to {path}"))
}
