//! Runner configuration.
use std::{fs, path::Path};

use orca::{constants::DELAY_FREQUENCY, prelude::*};
use serde::Deserialize;

use crate::error::AppError;

/// Settings for a headless run, loaded from a YAML file.
///
/// ```yaml
/// steps_per_frame: 9
/// rng_seed: 42
/// max_frames: 600
/// throttle: false
/// keys:
///   - { frame: 10, key: 5, pressed: true }
///   - { frame: 12, key: 5, pressed: false }
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub vm: Chip8Conf,
    /// Frames per second when throttled.
    pub frame_rate: u64,
    /// Stop after this many frames. Runs until the program halts when absent.
    pub max_frames: Option<u64>,
    /// Pace frames to wall clock time.
    pub throttle: bool,
    /// Scripted keypad input.
    pub keys: Vec<KeyEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KeyEvent {
    /// Frame at which the change is sampled.
    pub frame: u64,
    pub key: KeyCode,
    pub pressed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vm: Chip8Conf::default(),
            frame_rate: DELAY_FREQUENCY,
            max_frames: None,
            throttle: false,
            keys: vec![],
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, AppError> {
        let mut config: Config = serde_yaml::from_str(text)?;
        config.keys.sort_by_key(|event| event.frame);
        Ok(config)
    }
}
