//! Locating and loading `lockstep.toml`.

use std::path::Path;

use lockstep_config::{load_config, load_config_from_str, LockstepConfig, CONFIG_FILE};

use crate::GlobalArgs;

/// Loads the configuration named by `--config`, else `./lockstep.toml`,
/// else the defaults.
pub fn load_settings(global: &GlobalArgs) -> Result<LockstepConfig, Box<dyn std::error::Error>> {
    match &global.config {
        Some(path) => load_file(path),
        None => {
            let cwd = std::env::current_dir()?;
            if cwd.join(CONFIG_FILE).is_file() {
                Ok(load_config(&cwd)?)
            } else {
                Ok(LockstepConfig::default())
            }
        }
    }
}

fn load_file(path: &Path) -> Result<LockstepConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Ok(load_config_from_str(&content)?)
}
