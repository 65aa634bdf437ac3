//! Interrupt-side bus capture engine.
//!
//! Two handlers drive the engine, both forwarded by the integrator from
//! interrupt context:
//!
//! - [`Capture::on_clock_edge`] runs on every clock transition. It arms
//!   the deferred sampler, tracks the clock-high duration that frames
//!   commands, and clocks out pending virtual keypad bits on falling
//!   edges.
//! - [`Capture::on_sample_timer`] runs 250 µs later, once the lines have
//!   settled. Clock high: shift one bit from the data and PC16 lines into
//!   the current command. Clock low: capture keypad/module bits and, when
//!   the preceding clock-high ran 2 ms or longer, publish the finished
//!   command to the frame ring.
//!
//! The whole state lives behind one `critical_section::Mutex` owned by
//! the interface, so both handlers and the foreground poll see it
//! exclusively. Nothing here allocates.

use crate::hal::{Level, Platform, SAMPLE_DELAY_US};
use crate::proto::constants::{DATA_SIZE, FRAME_IDLE_US, KEY_STAR, WRITE_WAIT_MS};
use crate::proto::frame::{Frame, FrameRing, RedundancyFilter};

/// Shared capture state: ISR-owned assembly buffers, the frame ring, the
/// virtual keypad transmitter, and the decoder feedback flags.
pub struct Capture<P> {
    pub(crate) platform: P,
    enabled: bool,
    virtual_keypad: bool,
    pub(crate) process_module_data: bool,

    // Panel command assembly (clock-high bits)
    panel_data: [u8; DATA_SIZE],
    pc16_data: [u8; DATA_SIZE],
    panel_bit_total: u8,
    panel_bit_count: u8,
    panel_byte_count: u8,
    skip_data: bool,

    // Clock timing
    clock_rise_us: u32,
    clock_high_us: u32,

    // Completed frames
    pub(crate) ring: FrameRing,
    pub(crate) buffer_overflow: bool,
    pub(crate) keybus_time_ms: u32,
    panel_filter: RedundancyFilter,
    pc16_filter: RedundancyFilter,

    // Keypad/module command assembly (clock-low bits)
    module_data: [u8; DATA_SIZE],
    module_bit_total: u8,
    module_bit_count: u8,
    module_byte_count: u8,
    module_detected: bool,
    module_snapshot: Frame,
    pub(crate) module_captured: bool,
    pub(crate) star_key_detected: bool,

    // Virtual keypad transmitter
    pub(crate) write_key: u8,
    pub(crate) write_key_pending: bool,
    write_key_wait: bool,
    write_start: bool,
    write_complete_ms: u32,

    // Decoder feedback: forces frame forwarding while a keypad light is
    // blinking with the ready light on, so programming output survives
    // the redundancy filter.
    pub(crate) light_blink: bool,
    pub(crate) ready_light: bool,
}

impl<P: Platform> Capture<P> {
    /// New, disabled engine. [`enable`](Capture::enable) starts capture.
    pub fn new(platform: P, virtual_keypad: bool) -> Self {
        Self {
            platform,
            enabled: false,
            virtual_keypad,
            process_module_data: false,
            panel_data: [0; DATA_SIZE],
            pc16_data: [0; DATA_SIZE],
            panel_bit_total: 0,
            panel_bit_count: 0,
            panel_byte_count: 0,
            skip_data: false,
            clock_rise_us: 0,
            clock_high_us: 0,
            ring: FrameRing::new(),
            buffer_overflow: false,
            keybus_time_ms: 0,
            panel_filter: RedundancyFilter::new(),
            pc16_filter: RedundancyFilter::new(),
            module_data: [0; DATA_SIZE],
            module_bit_total: 0,
            module_bit_count: 0,
            module_byte_count: 0,
            module_detected: false,
            module_snapshot: Frame::new(),
            module_captured: false,
            star_key_detected: false,
            write_key: 0,
            write_key_pending: false,
            write_key_wait: false,
            write_start: false,
            write_complete_ms: 0,
            light_blink: false,
            ready_light: false,
        }
    }

    /// Start accepting interrupt events.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop accepting interrupt events, disarm the sampler, and zero the
    /// assembly buffers and counters. The ring and foreground state are
    /// untouched; a following enable resumes cleanly.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.platform.stop_sample_timer();
        self.reset_assembly();
    }

    /// Whether the engine is accepting events.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn reset_assembly(&mut self) {
        self.panel_data = [0; DATA_SIZE];
        self.pc16_data = [0; DATA_SIZE];
        self.panel_bit_total = 0;
        self.panel_bit_count = 0;
        self.panel_byte_count = 0;
        self.skip_data = false;
        self.module_data = [0; DATA_SIZE];
        self.module_bit_total = 0;
        self.module_bit_count = 0;
        self.module_byte_count = 0;
        self.module_detected = false;
    }

    /// Queue a single key code for transmission.
    pub(crate) fn queue_key(&mut self, code: u8) {
        self.write_key = code;
        self.write_key_pending = true;
    }

    /// Move the captured module command out, if one is waiting.
    pub(crate) fn take_module_snapshot(&mut self) -> Option<Frame> {
        if !self.module_captured {
            return None;
        }
        self.module_captured = false;
        Some(self.module_snapshot)
    }

    /// Clock transition handler.
    ///
    /// Keypad data trails a clock change by up to 160 µs, so nothing is
    /// sampled here; the one-shot sampler is armed to read the lines
    /// [`SAMPLE_DELAY_US`] later. Rising edges release the write pin and
    /// timestamp the high phase; falling edges close it out and run the
    /// transmitter.
    pub fn on_clock_edge(&mut self) {
        if !self.enabled {
            return;
        }
        self.platform.arm_sample_timer(SAMPLE_DELAY_US);

        if self.platform.clock_level().is_high() {
            // Restores the data line after a virtual keypad write bit.
            if self.virtual_keypad {
                self.platform.write_level(Level::Low);
            }
            self.clock_rise_us = self.platform.micros();
        } else {
            // Clock-high time locates the idle between commands.
            self.clock_high_us = self.platform.micros().wrapping_sub(self.clock_rise_us);

            if self.virtual_keypad {
                if self.write_key_pending
                    && self
                        .platform
                        .millis()
                        .wrapping_sub(self.write_complete_ms)
                        > WRITE_WAIT_MS
                {
                    self.write_key_wait = false;
                }

                if self.write_key_pending && !self.write_key_wait {
                    self.clock_out_key_bit();
                }
            }
        }
    }

    /// Present the next key bit. Zero bits pull the data line low (the
    /// write circuit inverts), so the pin is asserted high exactly for
    /// the zero slots of the key code.
    fn clock_out_key_bit(&mut self) {
        if self.clock_high_us > FRAME_IDLE_US {
            // Idle before a new command: present the MSB now.
            if self.write_key & 0x80 == 0 {
                self.platform.write_level(Level::High);
            }
            self.write_start = true;
        } else if self.write_start && self.panel_bit_total <= 7 {
            if (self.write_key >> (7 - self.panel_bit_count)) & 0x01 == 0 {
                self.platform.write_level(Level::High);
            }
            if self.panel_bit_total == 7 {
                self.write_key_pending = false;
                self.write_key_wait = true;
                self.write_complete_ms = self.platform.millis();
                self.write_start = false;
            }
        }
    }

    /// Deferred sampler, firing [`SAMPLE_DELAY_US`] after each edge.
    pub fn on_sample_timer(&mut self) {
        if !self.enabled {
            return;
        }

        if self.platform.clock_level().is_high() {
            self.sample_panel_bit();
        } else {
            if self.clock_high_us > FRAME_IDLE_US {
                self.finish_command();
            }
            self.sample_module_bit();
        }
    }

    /// Panel transmits while the clock is high: shift one bit in on both
    /// channels.
    fn sample_panel_bit(&mut self) {
        if self.panel_byte_count as usize >= DATA_SIZE {
            // Command longer than the capture window; ignore the rest.
            self.skip_data = true;
            return;
        }

        if self.panel_bit_count < 8 {
            let byte = self.panel_byte_count as usize;
            self.panel_data[byte] <<= 1;
            self.pc16_data[byte] <<= 1;
            if self.platform.data_level().is_high() {
                self.panel_data[byte] |= 1;
            }
            if self.platform.pc16_level().is_high() {
                self.pc16_data[byte] |= 1;
            }
        }

        if self.panel_bit_count < 7 {
            self.panel_bit_count += 1;
        } else {
            self.panel_bit_count = 0;
            self.panel_byte_count += 1;
        }
        self.panel_bit_total = self.panel_bit_total.saturating_add(1);
    }

    /// The clock stayed high 2 ms or longer: the previous command is
    /// complete. Publish it and reset the assembly state.
    fn finish_command(&mut self) {
        self.keybus_time_ms = self.platform.millis();

        if self.panel_bit_total < 8 {
            self.skip_data = true;
        } else if self.light_blink && self.ready_light {
            // Blinking lights alternate between two commands; both must
            // reach the decoder or programming state is lost.
            self.skip_data = false;
        } else {
            let checked = self.panel_byte_count as usize;
            let panel_redundant = self.panel_filter.is_redundant(&self.panel_data, checked);
            let pc16_redundant = self.pc16_filter.is_redundant(&self.pc16_data, checked);
            if panel_redundant && pc16_redundant {
                self.skip_data = true;
            }
        }

        if self.ring.is_full() {
            self.buffer_overflow = true;
        } else if !self.skip_data {
            let frame = Frame {
                panel: self.panel_data,
                pc16: self.pc16_data,
                bit_count: self.panel_bit_total,
                byte_count: self.panel_byte_count,
            };
            self.ring.push(&frame);
        }

        if self.process_module_data {
            if self.module_detected {
                self.module_detected = false;
                self.module_captured = true;
                self.module_snapshot = Frame {
                    panel: self.module_data,
                    pc16: [0; DATA_SIZE],
                    bit_count: self.module_bit_total,
                    byte_count: self.module_byte_count,
                };
            }
            self.module_data = [0; DATA_SIZE];
            self.module_bit_total = 0;
            self.module_bit_count = 0;
            self.module_byte_count = 0;
        }

        self.panel_data = [0; DATA_SIZE];
        self.pc16_data = [0; DATA_SIZE];
        self.panel_bit_total = 0;
        self.panel_bit_count = 0;
        self.panel_byte_count = 0;
        self.skip_data = false;
    }

    /// Keypads and modules transmit while the clock is low, by pulling
    /// the data line low. Capture is skipped while the panel ring is
    /// filling so the panel channel keeps priority.
    fn sample_module_bit(&mut self) {
        if !self.process_module_data
            || self.module_byte_count as usize >= DATA_SIZE
            || self.ring.len() > 1
        {
            return;
        }

        if self.module_bit_count < 8 {
            let byte = self.module_byte_count as usize;
            self.module_data[byte] <<= 1;
            if self.platform.data_level().is_high() {
                self.module_data[byte] |= 1;
            } else {
                self.module_detected = true;
            }
        }

        if self.module_bit_count == 7 {
            self.module_bit_count = 0;
            self.module_byte_count += 1;
            if self.module_detected && self.module_data[0] == KEY_STAR {
                self.star_key_detected = true;
            }
        } else {
            self.module_bit_count += 1;
        }
        self.module_bit_total = self.module_bit_total.saturating_add(1);
    }
}
