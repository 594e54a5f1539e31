// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::Config;
use crate::engine::Engine;
use crate::result::Result;

pub fn save(engine: &mut Engine, config: &Config, args: &[&str]) -> Result<String> {
    let path = args.first().copied().unwrap_or(config.default_save_path.as_str());
    engine.save(path)?;
    Ok(format!("saved to {path}"))
}

pub fn load(engine: &mut Engine, config: &Config, args: &[&str]) -> Result<String> {
    let path = args.first().copied().unwrap_or(config.default_save_path.as_str());
    engine.load(path)?;
    Ok(format!(
        "loaded {} regions, {} candidates from {path}",
        engine.regions().len(),
        engine.candidates().len()
    ))
}
