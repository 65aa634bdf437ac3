//! High-level Keybus interface.
//!
//! [`Keybus`] ties the pieces together: it owns the shared capture state
//! behind a `critical_section::Mutex`, forwards the two interrupt entry
//! points into it, and runs the foreground side - liveness monitoring,
//! frame draining, startup warmup, virtual keypad write scheduling, and
//! the partition status decoder.
//!
//! # Example
//!
//! ```rust,no_run
//! use keybus_classic::{Config, Keybus, MockPlatform};
//!
//! let mut keybus = Keybus::new(MockPlatform::new(), Config::with_access_code(true, "1234"))?;
//! keybus.begin();
//!
//! // keybus.on_clock_edge() / keybus.on_sample_timer() from ISRs...
//!
//! if keybus.poll() {
//!     if keybus.status.armed_changed {
//!         keybus.status.armed_changed = false;
//!         // ...
//!     }
//! }
//! # Ok::<(), keybus_classic::KeybusError>(())
//! ```

use core::cell::RefCell;
use core::fmt::{self, Write};

use critical_section::Mutex;

use crate::capture::Capture;
use crate::error::{KeybusError, Result};
use crate::hal::Platform;
use crate::proto::constants::{DATA_SIZE, KEYBUS_TIMEOUT_MS, WRITE_COOLDOWN_MS};
use crate::proto::frame::Frame;
use crate::proto::keys::{AccessCodes, Key, KeypadKey};
use crate::status::decoder::{Decoder, PartitionState};

/// Capacity of the pending multi-key write buffer.
const KEY_QUEUE_CAPACITY: usize = 32;

/// Interface configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config<'a> {
    /// Whether a write pin is wired for virtual keypad use.
    pub virtual_keypad: bool,
    /// Access code of up to 6 digits; empty disables the stay/away/night
    /// macro keys.
    pub access_code: &'a str,
}

impl Config<'static> {
    /// Capture-only configuration: no virtual keypad, no access code.
    pub const fn capture_only() -> Self {
        Self {
            virtual_keypad: false,
            access_code: "",
        }
    }
}

impl<'a> Config<'a> {
    /// Configuration with an access code for the macro keys.
    pub const fn with_access_code(virtual_keypad: bool, access_code: &'a str) -> Self {
        Self {
            virtual_keypad,
            access_code,
        }
    }
}

/// DSC Classic series Keybus interface.
pub struct Keybus<P: Platform> {
    shared: Mutex<RefCell<Capture<P>>>,

    /// Decoded partition status. Callers clear the `*_changed` flags
    /// after consuming, or use [`snapshot`](Keybus::snapshot).
    pub status: PartitionState,

    /// Mask keypad digits in the module print helpers.
    pub hide_keypad_digits: bool,
    /// Suppress the aggregate `status_changed` flag.
    pub pause_status: bool,

    decoder: Decoder,
    access_codes: AccessCodes,
    virtual_keypad: bool,

    // Frame layout: index of the light/status byte, latched from the
    // first valid frame (1 = PC1500/PC1550, 2 = PC3000).
    status_byte: usize,
    startup_cycle: bool,
    previous_keybus: bool,
    panel_buffer_index: usize,

    // Foreground copies of the frame being decoded and the last module
    // command, for the print helpers.
    panel_data: [u8; DATA_SIZE],
    pc16_data: [u8; DATA_SIZE],
    panel_byte_count: u8,
    module_data: [u8; DATA_SIZE],
    module_bit_count: u8,
    module_byte_count: u8,

    // Virtual keypad write scheduling.
    write_ready: bool,
    pending_keys: heapless::String<KEY_QUEUE_CAPACITY>,
    pending_cursor: usize,
    keys_pending: bool,
    write_alarm: bool,
    last_alarm_write_ms: u32,
}

impl<P: Platform> Keybus<P> {
    /// Create an interface over `platform`.
    ///
    /// # Errors
    ///
    /// [`KeybusError::AccessCodeTooLong`](crate::KeybusError::AccessCodeTooLong)
    /// when the access code exceeds 6 digits.
    pub fn new(platform: P, config: Config<'_>) -> Result<Self> {
        let access_codes = AccessCodes::new(config.access_code)?;
        Ok(Self {
            shared: Mutex::new(RefCell::new(Capture::new(platform, config.virtual_keypad))),
            status: PartitionState::new(),
            hide_keypad_digits: false,
            pause_status: false,
            decoder: Decoder::new(),
            access_codes,
            virtual_keypad: config.virtual_keypad,
            status_byte: 1,
            startup_cycle: true,
            previous_keybus: false,
            panel_buffer_index: 1,
            panel_data: [0; DATA_SIZE],
            pc16_data: [0; DATA_SIZE],
            panel_byte_count: 0,
            module_data: [0; DATA_SIZE],
            module_bit_count: 0,
            module_byte_count: 0,
            write_ready: false,
            pending_keys: heapless::String::new(),
            pending_cursor: 0,
            keys_pending: false,
            write_alarm: false,
            last_alarm_write_ms: 0,
        })
    }

    /// Start capturing. The integrator attaches the clock change
    /// interrupt and the one-shot timer around this call.
    pub fn begin(&mut self) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).enable());
        bus_log!(info, "keybus capture started");
    }

    /// Stop capturing: the sample timer is disarmed and the interrupt
    /// entry points become inert, so the integrator can detach at
    /// leisure. Capture buffers are zeroed; foreground status is kept,
    /// and a following [`begin`](Keybus::begin) resumes cleanly.
    pub fn stop(&mut self) {
        critical_section::with(|cs| {
            let mut capture = self.shared.borrow_ref_mut(cs);
            capture.disable();
            capture.ring.clear();
        });
        self.panel_buffer_index = 1;
        bus_log!(info, "keybus capture stopped");
    }

    /// Clock-line change interrupt entry point.
    pub fn on_clock_edge(&self) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).on_clock_edge());
    }

    /// One-shot sample timer interrupt entry point.
    pub fn on_sample_timer(&self) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).on_sample_timer());
    }

    /// Run `f` with exclusive access to the platform.
    pub fn with_platform<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        critical_section::with(|cs| f(&mut self.shared.borrow_ref_mut(cs).platform))
    }

    /// Foreground poll. Call at least every 50 ms.
    ///
    /// Returns `true` when status changed: either the Keybus
    /// connected/disconnected, or a frame was decoded. Check
    /// [`status`](Keybus::status) afterwards.
    pub fn poll(&mut self) -> bool {
        // Keybus liveness from the last frame-boundary timestamp.
        let (now_ms, keybus_time) = critical_section::with(|cs| {
            let capture = self.shared.borrow_ref(cs);
            (capture.platform.millis(), capture.keybus_time_ms)
        });
        self.status.keybus_connected = now_ms.wrapping_sub(keybus_time) <= KEYBUS_TIMEOUT_MS;
        if self.previous_keybus != self.status.keybus_connected {
            self.previous_keybus = self.status.keybus_connected;
            self.status.keybus_changed = true;
            if !self.pause_status {
                self.status.status_changed = true;
            }
            if !self.status.keybus_connected {
                bus_log!(warn, "keybus disconnected");
                return true;
            }
            bus_log!(info, "keybus connected");
        }

        // Multi-key writes advance one key per completed write.
        if self.keys_pending {
            self.advance_pending_keys();
        }

        let Some(frame) = self.take_frame() else {
            return false;
        };
        self.panel_data = frame.panel;
        self.pc16_data = frame.pc16;
        self.panel_byte_count = frame.byte_count;

        // Waits at startup for valid data before latching the frame
        // layout and accepting writes.
        if self.startup_cycle {
            if self.panel_byte_count < 2 || self.pc16_data[0] == 0xFF {
                return false;
            }
            self.startup_cycle = false;
            self.write_ready = true;
            if self.panel_byte_count == 3 {
                // Three-byte frames: PC3000 layout.
                self.status_byte = 2;
            }
            bus_log!(debug, "frame layout latched: status byte {}", self.status_byte);
        }

        self.write_ready = !self.is_write_pending();

        let star_key_detected =
            critical_section::with(|cs| self.shared.borrow_ref(cs).star_key_detected);
        let feedback = self.decoder.process(
            &mut self.status,
            &self.panel_data,
            &self.pc16_data,
            self.status_byte,
            star_key_detected,
            self.pause_status,
            now_ms,
        );
        critical_section::with(|cs| {
            let mut capture = self.shared.borrow_ref_mut(cs);
            capture.light_blink = feedback.light_blink;
            capture.ready_light = feedback.ready_light;
            if feedback.clear_star_key {
                capture.star_key_detected = false;
            }
        });

        true
    }

    /// Copy the next buffered frame out; reset the ring once drained.
    fn take_frame(&mut self) -> Option<Frame> {
        critical_section::with(|cs| {
            let mut capture = self.shared.borrow_ref_mut(cs);
            if capture.ring.is_empty() {
                return None;
            }
            let index = self.panel_buffer_index - 1;
            let frame = match capture.ring.get(index) {
                Some(frame) => *frame,
                None => {
                    self.panel_buffer_index = 1;
                    capture.ring.clear();
                    return None;
                }
            };
            self.panel_buffer_index += 1;
            if self.panel_buffer_index > capture.ring.len() {
                self.panel_buffer_index = 1;
                capture.ring.clear();
            }
            Some(frame)
        })
    }

    /// Mark every observable as changed, so the next reads resynchronize
    /// a consumer from current state.
    pub fn reset_status(&mut self) {
        self.status.mark_all_changed();
    }

    /// Copy the partition status and clear its change flags in one step,
    /// avoiding read-before-clear races in the caller.
    pub fn snapshot(&mut self) -> PartitionState {
        let snapshot = self.status;
        self.status.clear_changed();
        snapshot
    }

    /// Whether the interface is past startup with no write in progress.
    pub fn write_ready(&self) -> bool {
        self.write_ready
    }

    /// Sticky flag: the frame ring filled and a frame was dropped.
    pub fn buffer_overflow(&self) -> bool {
        critical_section::with(|cs| self.shared.borrow_ref(cs).buffer_overflow)
    }

    /// Clear the overflow flag.
    pub fn clear_buffer_overflow(&self) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).buffer_overflow = false);
    }

    /// Enable or disable keypad/module data capture.
    pub fn set_process_module_data(&self, enabled: bool) {
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).process_module_data = enabled);
    }

    /// Fetch the latest captured module command, if any.
    ///
    /// Returns `true` when a command of at least 8 bits is available in
    /// the module buffer for the print helpers. Deeper module decoding
    /// is left to the caller.
    pub fn handle_module(&mut self) -> bool {
        let snapshot =
            critical_section::with(|cs| self.shared.borrow_ref_mut(cs).take_module_snapshot());
        let Some(frame) = snapshot else {
            return false;
        };
        self.module_data = frame.panel;
        self.module_bit_count = frame.bit_count;
        self.module_byte_count = frame.byte_count;
        self.module_bit_count >= 8
    }

    // =========================================================================
    // Virtual keypad writes
    // =========================================================================

    /// Send a single key, blocking while a previous write drains.
    ///
    /// `S`/`W`/`N` expand to the stay, away (stay + `*1`), and night
    /// (`*9` + stay) sequences when an access code of at least 4 digits
    /// is configured. Unknown keys are dropped silently.
    ///
    /// # Errors
    ///
    /// [`KeybusError::WriteDisabled`] when no write pin is configured.
    pub fn write(&mut self, key: char) -> Result<()> {
        if !self.virtual_keypad {
            return Err(KeybusError::WriteDisabled);
        }
        while self.is_write_pending() {
            self.poll();
        }

        if let Some(sequence) = self.expand_macro(key) {
            self.write_str(&sequence, false)
        } else {
            self.set_write_key(key);
            Ok(())
        }
    }

    /// Send a key sequence.
    ///
    /// One key goes out per panel command; the rest drain across
    /// subsequent [`poll`](Keybus::poll) calls, or within this call when
    /// `blocking` is set.
    ///
    /// # Errors
    ///
    /// [`KeybusError::WriteDisabled`] when no write pin is configured;
    /// [`KeybusError::KeyBufferFull`] when `keys` exceeds the pending
    /// buffer.
    pub fn write_str(&mut self, keys: &str, blocking: bool) -> Result<()> {
        if !self.virtual_keypad {
            return Err(KeybusError::WriteDisabled);
        }
        while self.is_write_pending() {
            self.poll();
        }

        let mut chars = keys.chars();
        if let (Some(only), None) = (chars.next(), chars.next()) {
            return self.write(only);
        }

        self.pending_keys = keys
            .try_into()
            .map_err(|_| KeybusError::KeyBufferFull)?;
        self.pending_cursor = 0;
        if !self.pending_keys.is_empty() {
            self.keys_pending = true;
            self.write_ready = false;
        }

        if blocking {
            while self.keys_pending {
                self.advance_pending_keys();
                self.poll();
            }
        } else {
            self.advance_pending_keys();
        }
        Ok(())
    }

    fn expand_macro(&self, key: char) -> Option<heapless::String<8>> {
        if !self.access_codes.macros_enabled() {
            return None;
        }
        let sequence = match key {
            's' | 'S' => self.access_codes.stay(),
            'w' | 'W' => self.access_codes.away(),
            'n' | 'N' => self.access_codes.night(),
            _ => return None,
        };
        // Infallible: the sequences are at most 8 bytes by construction.
        sequence.try_into().ok()
    }

    /// Hand the next queued key to the transmitter once the previous one
    /// completed. Keys falling into the alarm-key cooldown are dropped,
    /// like on a real keypad bounced by the panel.
    fn advance_pending_keys(&mut self) {
        if self.write_key_pending() || !self.keys_pending {
            return;
        }
        if self.pending_cursor < self.pending_keys.len() {
            let key = self.pending_keys.as_bytes()[self.pending_cursor] as char;
            self.set_write_key(key);
            self.pending_cursor += 1;
            if self.pending_cursor >= self.pending_keys.len() {
                self.keys_pending = false;
                self.pending_cursor = 0;
            }
        }
    }

    /// Queue a key code for the ISR-side transmitter. Alarm keys start
    /// the 500 ms cooldown that keeps the panel from mis-reading
    /// whatever follows them.
    fn set_write_key(&mut self, key: char) {
        let now_ms = self.millis();
        let cooldown_over = now_ms.wrapping_sub(self.last_alarm_write_ms) > WRITE_COOLDOWN_MS
            || now_ms <= WRITE_COOLDOWN_MS;
        if self.write_key_pending() || !cooldown_over {
            return;
        }

        // Unknown keys are dropped without complaint, but once an alarm
        // key has armed the cooldown, every accepted call refreshes it.
        let key = Key::try_from(key).ok();
        if key.is_some_and(|key| key.is_alarm()) {
            self.write_alarm = true;
        }
        if self.write_alarm {
            self.last_alarm_write_ms = now_ms;
        }
        let Some(key) = key else {
            return;
        };
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).queue_key(key.code()));
        self.write_ready = false;
    }

    fn is_write_pending(&self) -> bool {
        self.keys_pending || self.write_key_pending()
    }

    fn write_key_pending(&self) -> bool {
        critical_section::with(|cs| self.shared.borrow_ref(cs).write_key_pending)
    }

    fn millis(&self) -> u32 {
        critical_section::with(|cs| self.shared.borrow_ref(cs).platform.millis())
    }

    // =========================================================================
    // Diagnostic printing
    // =========================================================================

    /// Render the current panel frame as a human-readable status line.
    pub fn print_panel_message<W: Write>(&self, sink: &mut W) -> fmt::Result {
        let status_b = self.panel_data[self.status_byte];
        sink.write_str("Lights: ")?;
        if status_b != 0 {
            for (bit, name) in [
                (7, "Ready "),
                (6, "Armed "),
                (5, "Memory "),
                (4, "Bypass "),
                (3, "Trouble "),
                (2, "Program "),
                (1, "Fire "),
            ] {
                if (status_b >> bit) & 1 == 1 {
                    sink.write_str(name)?;
                }
            }
        } else {
            sink.write_str("none ")?;
        }
        if status_b & 1 == 1 {
            sink.write_str("| Beep ")?;
        }

        sink.write_str("| Status: ")?;
        let pc16_b = self.pc16_data[self.status_byte];
        if pc16_b != 0 {
            for (bit, name) in [
                (7, "Trouble "),
                (6, "Bypassed zones "),
                (5, "Armed (Side A) "),
                (4, "Armed (Side B) "),
                (3, "Keypad Panic alarm "),
                (2, "Keypad Aux alarm "),
                (1, "Keypad Fire alarm "),
                (0, "Alarm "),
            ] {
                if (pc16_b >> bit) & 1 == 1 {
                    sink.write_str(name)?;
                }
            }
        } else {
            sink.write_str("none ")?;
        }

        sink.write_str("| Zone lights: ")?;
        if (1..=self.status_byte).all(|group| self.panel_data[self.status_byte - group] == 0) {
            sink.write_str("none ")?;
        } else {
            for group in 1..=self.status_byte {
                let zone_byte = self.panel_data[self.status_byte - group];
                for bit in (0u8..8).rev() {
                    if (zone_byte >> bit) & 1 == 1 {
                        write!(sink, "{} ", (8 - bit as usize) + (group - 1) * 8)?;
                    }
                }
            }
        }

        let alarm_byte = self.pc16_data[self.status_byte - 1];
        if alarm_byte & 0xFE != 0 {
            sink.write_str("| Zone alarm: ")?;
            for bit in (2u8..8).rev() {
                if (alarm_byte >> bit) & 1 == 1 {
                    // The PC3000 packs zone groups into two bits.
                    if self.status_byte == 2 && bit == 3 {
                        sink.write_str("5-8 ")?;
                    } else if self.status_byte == 2 && bit == 2 {
                        sink.write_str("9-16 ")?;
                    } else {
                        write!(sink, "{} ", 8 - bit)?;
                    }
                }
            }
        }

        if alarm_byte & 1 == 1 {
            sink.write_str("| Fire alarm")?;
        }
        Ok(())
    }

    /// Render the current panel frame as binary, both channels.
    pub fn print_panel_binary<W: Write>(&self, sink: &mut W, spaces: bool) -> fmt::Result {
        Self::write_binary(sink, &self.panel_data, self.panel_byte_count, spaces, false)?;
        if spaces {
            sink.write_char(' ')?;
        }
        Self::write_binary(sink, &self.pc16_data, self.panel_byte_count, spaces, false)
    }

    /// Render the last module command as a keypad key name.
    pub fn print_module_message<W: Write>(&self, sink: &mut W) -> fmt::Result {
        sink.write_str("[Keypad] ")?;
        let Some(key) = KeypadKey::from_code(self.module_data[0]) else {
            return Ok(());
        };
        match key {
            KeypadKey::Digit(digit) => {
                if self.hide_keypad_digits {
                    sink.write_str("[Digit]")
                } else {
                    sink.write_char(digit)
                }
            }
            KeypadKey::Star => sink.write_char('*'),
            KeypadKey::Hash => sink.write_char('#'),
            KeypadKey::FireAlarm => sink.write_str("Fire alarm"),
            KeypadKey::AuxAlarm => sink.write_str("Aux alarm"),
            KeypadKey::PanicAlarm => sink.write_str("Panic alarm"),
        }
    }

    /// Render the last module command as binary, masking the key byte
    /// when digits are hidden.
    pub fn print_module_binary<W: Write>(&self, sink: &mut W, spaces: bool) -> fmt::Result {
        let mask_digit = self.hide_keypad_digits
            && KeypadKey::from_code(self.module_data[0]).is_some_and(|key| key.is_digit());
        Self::write_binary(
            sink,
            &self.module_data,
            self.module_byte_count,
            spaces,
            mask_digit,
        )
    }

    /// Render the message source tag.
    pub fn print_panel_command<W: Write>(&self, sink: &mut W) -> fmt::Result {
        sink.write_str("Panel")
    }

    fn write_binary<W: Write>(
        sink: &mut W,
        data: &[u8; DATA_SIZE],
        byte_count: u8,
        spaces: bool,
        mask_first: bool,
    ) -> fmt::Result {
        let count = (byte_count as usize).min(DATA_SIZE);
        for (index, byte) in data[..count].iter().enumerate() {
            if mask_first && index == 0 {
                sink.write_str("........")?;
            } else {
                for bit in (0u8..8).rev() {
                    sink.write_char(if (byte >> bit) & 1 == 1 { '1' } else { '0' })?;
                }
            }
            if spaces && index != count - 1 {
                sink.write_char(' ')?;
            }
        }
        Ok(())
    }
}
