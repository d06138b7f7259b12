//! Headless IO devices.
use log::{debug, info};
use orca::prelude::*;

use crate::config::KeyEvent;

/// Devices that replay a scripted keypad timeline and
/// keep the last presented frame in memory.
pub struct Headless {
    frame: u64,
    keys: KeyState,
    script: Vec<KeyEvent>,
    cursor: usize,
    display: Vec<bool>,
    buzzing: bool,
}

impl Headless {
    /// `script` must be sorted by frame.
    pub fn new(script: Vec<KeyEvent>) -> Self {
        Self {
            frame: 0,
            keys: KeyState::empty(),
            script,
            cursor: 0,
            display: vec![],
            buzzing: false,
        }
    }

    /// Number of frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    pub fn display(&self) -> &[bool] {
        &self.display
    }

    pub fn is_buzzing(&self) -> bool {
        self.buzzing
    }
}

impl Devices for Headless {
    fn poll_keys(&mut self) -> KeyState {
        while let Some(event) = self.script.get(self.cursor) {
            if event.frame > self.frame {
                break;
            }
            debug!(
                "frame {}: {} {}",
                self.frame,
                event.key,
                if event.pressed { "down" } else { "up" }
            );
            self.keys.set(event.key, event.pressed);
            self.cursor += 1;
        }

        self.keys
    }

    fn draw(&mut self, display: Chip8DisplayBuffer<'_>) {
        self.display.clear();
        self.display.extend_from_slice(display);
        self.frame += 1;
    }

    fn buzz(&mut self, state: bool) {
        info!("buzzer {}", if state { "on" } else { "off" });
        self.buzzing = state;
    }
}
