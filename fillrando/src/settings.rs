use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RandomizerSettings {
    // Number of placement attempts before giving up on a seed.
    pub attempts: usize,
    // Attempt n may evict up to n / backtrack_divisor placed items.
    pub backtrack_divisor: usize,
    // The progress tracker is called every this many attempts.
    pub progress_interval: usize,
    // Unique items may only be placed in unique slots.
    pub preserve_unique_checks: bool,
}

impl Default for RandomizerSettings {
    fn default() -> Self {
        RandomizerSettings {
            attempts: 200,
            backtrack_divisor: 5,
            progress_interval: 10,
            preserve_unique_checks: false,
        }
    }
}

impl RandomizerSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.backtrack_divisor > 0, "backtrack_divisor must be positive");
        ensure!(self.progress_interval > 0, "progress_interval must be positive");
        Ok(())
    }

    pub fn backtrack_budget(&self, attempt_num: usize) -> usize {
        attempt_num / self.backtrack_divisor
    }
}

pub fn parse_randomizer_settings(settings_json: &str) -> Result<RandomizerSettings> {
    let mut des = serde_json::Deserializer::from_str(settings_json);
    let settings: RandomizerSettings = serde_path_to_error::deserialize(&mut des)?;
    settings.validate()?;
    Ok(settings)
}
