//! Virtual keypad keys and access code handling.
//!
//! Keys carry the active-low Classic series row/column encoding: a 0 bit
//! in the code pulls the data line low during that bit slot of the
//! panel's command. The alarm keys (fire/aux/panic) additionally start a
//! cooldown on the transmitter because the panel mis-reads keys sent
//! immediately after them.

use crate::error::{KeybusError, Result};
use crate::proto::constants::{
    KEY_0, KEY_1, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_8, KEY_9, KEY_AUX, KEY_FIRE,
    KEY_HASH, KEY_PANIC, KEY_STAR,
};

/// Maximum access code length in digits.
pub const ACCESS_CODE_DIGITS: usize = 6;

/// A single keypad key with its wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Key {
    code: u8,
    alarm: bool,
}

impl Key {
    /// The 8-bit active-low wire code.
    #[inline(always)]
    pub const fn code(self) -> u8 {
        self.code
    }

    /// Whether this is one of the fire/aux/panic alarm keys.
    #[inline(always)]
    pub const fn is_alarm(self) -> bool {
        self.alarm
    }

    const fn regular(code: u8) -> Self {
        Self { code, alarm: false }
    }

    const fn alarm(code: u8) -> Self {
        Self { code, alarm: true }
    }
}

impl TryFrom<char> for Key {
    type Error = KeybusError;

    fn try_from(key: char) -> Result<Self> {
        match key {
            '0' => Ok(Key::regular(KEY_0)),
            '1' => Ok(Key::regular(KEY_1)),
            '2' => Ok(Key::regular(KEY_2)),
            '3' => Ok(Key::regular(KEY_3)),
            '4' => Ok(Key::regular(KEY_4)),
            '5' => Ok(Key::regular(KEY_5)),
            '6' => Ok(Key::regular(KEY_6)),
            '7' => Ok(Key::regular(KEY_7)),
            '8' => Ok(Key::regular(KEY_8)),
            '9' => Ok(Key::regular(KEY_9)),
            '*' => Ok(Key::regular(KEY_STAR)),
            '#' => Ok(Key::regular(KEY_HASH)),
            'F' | 'f' => Ok(Key::alarm(KEY_FIRE)),
            'A' | 'a' => Ok(Key::alarm(KEY_AUX)),
            'P' | 'p' => Ok(Key::alarm(KEY_PANIC)),
            other => Err(KeybusError::InvalidKey(other)),
        }
    }
}

/// A key decoded from captured keypad/module traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeypadKey {
    /// A digit key `0`-`9`.
    Digit(char),
    /// The `*` key.
    Star,
    /// The `#` key.
    Hash,
    /// Keypad fire alarm.
    FireAlarm,
    /// Keypad auxiliary alarm.
    AuxAlarm,
    /// Keypad panic alarm.
    PanicAlarm,
}

impl KeypadKey {
    /// Decode a captured module byte, if it is a known key code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            KEY_0 => Some(Self::Digit('0')),
            KEY_1 => Some(Self::Digit('1')),
            KEY_2 => Some(Self::Digit('2')),
            KEY_3 => Some(Self::Digit('3')),
            KEY_4 => Some(Self::Digit('4')),
            KEY_5 => Some(Self::Digit('5')),
            KEY_6 => Some(Self::Digit('6')),
            KEY_7 => Some(Self::Digit('7')),
            KEY_8 => Some(Self::Digit('8')),
            KEY_9 => Some(Self::Digit('9')),
            KEY_STAR => Some(Self::Star),
            KEY_HASH => Some(Self::Hash),
            KEY_FIRE => Some(Self::FireAlarm),
            KEY_AUX => Some(Self::AuxAlarm),
            KEY_PANIC => Some(Self::PanicAlarm),
            _ => None,
        }
    }

    /// Whether this key is a digit (masked by `hide_keypad_digits`).
    pub const fn is_digit(self) -> bool {
        matches!(self, Self::Digit(_))
    }
}

/// The stay access code and its derived arming sequences.
///
/// Away arming appends `*1` (bypass toggle close), night arming prefixes
/// `*9` (no-entry-delay arming). Both are precomputed at construction so
/// the write path never formats strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCodes {
    stay: heapless::String<ACCESS_CODE_DIGITS>,
    away: heapless::String<8>,
    night: heapless::String<8>,
}

impl AccessCodes {
    /// Store an access code of up to 6 digits. An empty code is allowed
    /// and disables the stay/away/night macro keys.
    pub fn new(access_code: &str) -> Result<Self> {
        let stay: heapless::String<ACCESS_CODE_DIGITS> = access_code
            .try_into()
            .map_err(|_| KeybusError::AccessCodeTooLong)?;

        let mut away = heapless::String::new();
        // Infallible: 6 + 2 fits the capacity.
        let _ = away.push_str(&stay);
        let _ = away.push_str("*1");

        let mut night = heapless::String::new();
        let _ = night.push_str("*9");
        let _ = night.push_str(&stay);

        Ok(Self { stay, away, night })
    }

    /// The stored stay code.
    pub fn stay(&self) -> &str {
        &self.stay
    }

    /// Stay code plus `*1`.
    pub fn away(&self) -> &str {
        &self.away
    }

    /// `*9` plus the stay code.
    pub fn night(&self) -> &str {
        &self.night
    }

    /// Whether the stay/away/night macro keys expand.
    ///
    /// Codes shorter than 4 digits pass the macro characters through to
    /// the plain key lookup instead (which rejects them).
    pub fn macros_enabled(&self) -> bool {
        self.stay.len() >= 4
    }
}
