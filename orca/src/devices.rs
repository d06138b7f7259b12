//! IO device interface
use crate::{constants::*, cpu::Chip8DisplayBuffer};

/// Hooks to provide IO devices to the virtual machine.
///
/// Implemented by the host and driven once per frame by
/// [`Chip8Vm::run_frame`](crate::prelude::Chip8Vm::run_frame).
pub trait Devices {
    /// Sample the keyboard. Called at the start of every frame.
    fn poll_keys(&mut self) -> KeyState;

    /// Blit the display buffer to screen output.
    fn draw(&mut self, display: Chip8DisplayBuffer<'_>);

    /// Turn the sound buzzer on or off.
    fn buzz(&mut self, state: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(try_from = "u8"))]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        match key_id {
            0 => Ok(Self::Key0),
            1 => Ok(Self::Key1),
            2 => Ok(Self::Key2),
            3 => Ok(Self::Key3),
            4 => Ok(Self::Key4),
            5 => Ok(Self::Key5),
            6 => Ok(Self::Key6),
            7 => Ok(Self::Key7),
            8 => Ok(Self::Key8),
            9 => Ok(Self::Key9),
            10 => Ok(Self::KeyA),
            11 => Ok(Self::KeyB),
            12 => Ok(Self::KeyC),
            13 => Ok(Self::KeyD),
            14 => Ok(Self::KeyE),
            15 => Ok(Self::KeyF),
            _ => Err(InvalidKeyCode(key_id)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidKeyCode(pub u8);

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "keycode must be in range 0 <= keycode < 16, got {}",
            self.0
        )
    }
}

/// Snapshot of the 16-key keypad. Pressed is a 1 bit, released is a 0 bit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyState(pub u16);

impl KeyState {
    /// No keys pressed.
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub fn is_pressed(&self, key_id: u8) -> bool {
        key_id < KEY_COUNT && self.0 & (1 << key_id) != 0
    }

    #[inline]
    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.0 |= 1 << key.as_u8();
        } else {
            self.0 &= !(1 << key.as_u8());
        }
    }

    /// Builder style variant of [`KeyState::set`] that presses the key.
    #[must_use]
    pub fn with(mut self, key: KeyCode) -> Self {
        self.set(key, true);
        self
    }

    #[inline]
    pub fn any(&self) -> bool {
        self.0 != 0
    }

    /// Lowest numbered key that is pressed down.
    #[inline]
    pub fn first(&self) -> Option<u8> {
        if self.any() {
            Some(self.0.trailing_zeros() as u8)
        } else {
            None
        }
    }
}

impl From<[bool; KEY_COUNT as usize]> for KeyState {
    fn from(keys: [bool; KEY_COUNT as usize]) -> Self {
        let bits = keys
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .fold(0u16, |acc, (k, _)| acc | (1 << k));
        Self(bits)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keycode_conversion() {
        for key_id in 0..KEY_COUNT {
            let key = KeyCode::try_from(key_id).unwrap();
            assert_eq!(key.as_u8(), key_id);
        }
        assert_eq!(KeyCode::try_from(16), Err(InvalidKeyCode(16)));
        assert_eq!(KeyCode::KeyA.to_string(), "ka");
    }

    #[test]
    fn test_first_key_is_lowest() {
        let keys = KeyState::empty().with(KeyCode::KeyC).with(KeyCode::Key3);
        assert_eq!(keys.first(), Some(3));
        assert!(keys.is_pressed(0xC));
        assert!(!keys.is_pressed(0x4));
        assert!(!keys.is_pressed(0x20));
        assert_eq!(KeyState::empty().first(), None);
    }

    #[test]
    fn test_from_bool_array() {
        let mut raw = [false; 16];
        raw[0] = true;
        raw[15] = true;
        assert_eq!(KeyState::from(raw), KeyState(0b10000000_00000001));
    }
}
