//! Protocol constants: sizes, timing windows, key codes, status codes.

// =============================================================================
// Sizes
// =============================================================================

/// Maximum command length in bytes on each channel.
pub const DATA_SIZE: usize = 8;

/// Capacity of the panel frame ring shared between ISR and foreground.
pub const BUFFER_SIZE: usize = 10;

// =============================================================================
// Timing
// =============================================================================

/// Clock-high duration that marks the idle between commands (µs).
pub const FRAME_IDLE_US: u32 = 2000;

/// No clock activity for this long means the Keybus is disconnected (ms).
pub const KEYBUS_TIMEOUT_MS: u32 = 3000;

/// Wait between completed virtual keypad writes (ms).
pub const WRITE_WAIT_MS: u32 = 50;

/// Cooldown after an alarm key write before the next key is accepted (ms).
pub const WRITE_COOLDOWN_MS: u32 = 500;

/// A light seen ON within this window of an OFF observation is blinking (ms).
pub const BLINK_ON_WINDOW_MS: u32 = 600;

/// A blinking light with no ON observation for this long stops blinking (ms).
pub const BLINK_OFF_WINDOW_MS: u32 = 1200;

/// Armed light continuously off this long releases the exit delay (ms).
pub const EXIT_DELAY_RELEASE_MS: u32 = 400;

/// Minimum spacing between keypad fire/aux/panic latches (ms).
pub const KEYPAD_ALARM_DEBOUNCE_MS: u32 = 1000;

/// Beep-off quiet period that confirms a stay-to-away transition (ms).
pub const STAY_TO_AWAY_QUIET_MS: u32 = 2000;

/// Longest beep still counted as a normal keypress acknowledgement (ms).
pub const BEEP_KEYPRESS_MS: u32 = 90;

/// Beeps up to this duration (and past the keypress window) mean lockout (ms).
pub const BEEP_LOCKOUT_MS: u32 = 800;

/// Beeps below this duration (and past the lockout window) mean an invalid
/// code or unavailable function (ms).
pub const BEEP_INVALID_MS: u32 = 1200;

// =============================================================================
// Keypad key codes
// =============================================================================
//
// Active-low row/column encoding: a 0 bit pulls the data line low during
// that bit slot. Digit codes carry exactly one 0 per nibble.

/// Key code for `0`.
pub const KEY_0: u8 = 0xD7;
/// Key code for `1`.
pub const KEY_1: u8 = 0xBE;
/// Key code for `2`.
pub const KEY_2: u8 = 0xDE;
/// Key code for `3`.
pub const KEY_3: u8 = 0xEE;
/// Key code for `4`.
pub const KEY_4: u8 = 0xBD;
/// Key code for `5`.
pub const KEY_5: u8 = 0xDD;
/// Key code for `6`.
pub const KEY_6: u8 = 0xED;
/// Key code for `7`.
pub const KEY_7: u8 = 0xBB;
/// Key code for `8`.
pub const KEY_8: u8 = 0xDB;
/// Key code for `9`.
pub const KEY_9: u8 = 0xEB;
/// Key code for `*`.
pub const KEY_STAR: u8 = 0xB7;
/// Key code for `#`.
pub const KEY_HASH: u8 = 0xE7;
/// Keypad fire alarm key code.
pub const KEY_FIRE: u8 = 0x3F;
/// Keypad auxiliary alarm key code.
pub const KEY_AUX: u8 = 0x5F;
/// Keypad panic alarm key code.
pub const KEY_PANIC: u8 = 0x6F;

// =============================================================================
// PowerSeries compatibility status codes
// =============================================================================

/// Partition ready.
pub const STATUS_PARTITION_READY: u8 = 0x01;
/// Zones open.
pub const STATUS_ZONES_OPEN: u8 = 0x03;
/// Armed stay.
pub const STATUS_ARMED_STAY: u8 = 0x04;
/// Armed away.
pub const STATUS_ARMED_AWAY: u8 = 0x05;
/// Armed with no entry delay.
pub const STATUS_ARMED_NO_ENTRY_DELAY: u8 = 0x06;
/// Exit delay in progress.
pub const STATUS_EXIT_DELAY: u8 = 0x08;
/// Function not available.
pub const STATUS_FUNCTION_UNAVAILABLE: u8 = 0x0E;
/// Keypad lockout.
pub const STATUS_KEYPAD_LOCKOUT: u8 = 0x10;
/// Alarm.
pub const STATUS_ALARM: u8 = 0x11;
/// Disarmed.
pub const STATUS_DISARMED: u8 = 0x3E;
/// Invalid access code.
pub const STATUS_INVALID_CODE: u8 = 0x8F;
/// Installer programming.
pub const STATUS_PROGRAMMING: u8 = 0xE4;
