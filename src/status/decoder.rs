//! Partition state machine.
//!
//! [`Decoder::process`] consumes one panel frame per call and folds it
//! into [`PartitionState`]: the seven keypad lights, the PC16 armed and
//! alarm bits, the blink detectors, and the beep meter together drive
//! ready/armed/alarm/exit-delay tracking, zone bookkeeping, and the
//! PowerSeries-compatible status code.
//!
//! Every observable keeps a `*_changed` flag that the caller clears
//! after consuming; the aggregate `status_changed` is raised with any of
//! them unless status output is paused.

use crate::proto::constants::{
    EXIT_DELAY_RELEASE_MS, KEYPAD_ALARM_DEBOUNCE_MS, STATUS_ALARM, STATUS_ARMED_AWAY,
    STATUS_ARMED_NO_ENTRY_DELAY, STATUS_ARMED_STAY, STATUS_DISARMED, STATUS_EXIT_DELAY,
    STATUS_FUNCTION_UNAVAILABLE, STATUS_INVALID_CODE, STATUS_KEYPAD_LOCKOUT,
    STATUS_PARTITION_READY, STATUS_PROGRAMMING, STATUS_ZONES_OPEN, STAY_TO_AWAY_QUIET_MS,
};
use crate::proto::constants::DATA_SIZE;
use crate::status::blink::{BeepCue, BeepMeter, BlinkDetector};

/// Zone light groups: up to 16 zones in two groups of eight.
pub const ZONE_GROUPS: usize = 2;

/// Exit delay flavor, matching the PowerSeries exit state values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ExitState {
    /// No exit delay in progress.
    #[default]
    None = 0,
    /// Exit delay for stay arming.
    Stay = 1,
    /// Exit delay for away arming.
    Away = 2,
    /// Armed with no entry delay.
    NoEntryDelay = 3,
}

/// Decoded partition status, with a paired change flag per observable.
///
/// Consumers read the fields after [`Keybus::poll`](crate::Keybus::poll)
/// reports activity and clear the `*_changed` flags themselves, or use
/// [`Keybus::snapshot`](crate::Keybus::snapshot) to do both in one step.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartitionState {
    /// Clock activity seen within the last 3 s.
    pub keybus_connected: bool,
    /// `keybus_connected` toggled.
    pub keybus_changed: bool,
    /// Any observable below changed (suppressed while status is paused).
    pub status_changed: bool,

    /// PowerSeries-compatible status code.
    pub status_code: u8,
    /// Keypad lights in PowerSeries order:
    /// Ready, Armed, Memory, Bypass, Trouble, Program, Fire (bit 0..6).
    pub lights: u8,

    /// Partition ready to arm.
    pub ready: bool,
    /// `ready` toggled.
    pub ready_changed: bool,

    /// Partition armed (stay or away).
    pub armed: bool,
    /// Armed in stay mode.
    pub armed_stay: bool,
    /// Armed in away mode.
    pub armed_away: bool,
    /// Any of the armed flags toggled.
    pub armed_changed: bool,
    /// Armed with the entry grace suppressed.
    pub no_entry_delay: bool,

    /// Exit delay in progress.
    pub exit_delay: bool,
    /// `exit_delay` toggled.
    pub exit_delay_changed: bool,
    /// Exit delay flavor.
    pub exit_state: ExitState,
    /// `exit_state` changed.
    pub exit_state_changed: bool,

    /// Alarm sounding.
    pub alarm: bool,
    /// `alarm` toggled.
    pub alarm_changed: bool,

    /// Fire alarm reported on PC16.
    pub fire: bool,
    /// `fire` toggled.
    pub fire_changed: bool,

    /// Trouble condition reported on PC16.
    pub trouble: bool,
    /// `trouble` toggled.
    pub trouble_changed: bool,

    /// Open zones, bit 0 = lowest zone of each group.
    pub open_zones: [u8; ZONE_GROUPS],
    /// Per-zone open-state change bits; the caller clears.
    pub open_zones_changed: [u8; ZONE_GROUPS],
    /// Any open zone changed.
    pub open_zones_status_changed: bool,

    /// Zones currently in alarm.
    pub alarm_zones: [u8; ZONE_GROUPS],
    /// Per-zone alarm-state change bits; the caller clears.
    pub alarm_zones_changed: [u8; ZONE_GROUPS],
    /// Any alarm zone changed.
    pub alarm_zones_status_changed: bool,

    /// Zones that have tripped since the last ready period.
    pub zones_triggered: [u8; ZONE_GROUPS],

    /// Keypad fire alarm key latched; the caller clears.
    pub keypad_fire_alarm: bool,
    /// Keypad auxiliary alarm key latched; the caller clears.
    pub keypad_aux_alarm: bool,
    /// Keypad panic alarm key latched; the caller clears.
    pub keypad_panic_alarm: bool,
}

impl PartitionState {
    /// All-inactive initial state.
    pub const fn new() -> Self {
        Self {
            keybus_connected: false,
            keybus_changed: false,
            status_changed: false,
            status_code: 0,
            lights: 0,
            ready: false,
            ready_changed: false,
            armed: false,
            armed_stay: false,
            armed_away: false,
            armed_changed: false,
            no_entry_delay: false,
            exit_delay: false,
            exit_delay_changed: false,
            exit_state: ExitState::None,
            exit_state_changed: false,
            alarm: false,
            alarm_changed: false,
            fire: false,
            fire_changed: false,
            trouble: false,
            trouble_changed: false,
            open_zones: [0; ZONE_GROUPS],
            open_zones_changed: [0; ZONE_GROUPS],
            open_zones_status_changed: false,
            alarm_zones: [0; ZONE_GROUPS],
            alarm_zones_changed: [0; ZONE_GROUPS],
            alarm_zones_status_changed: false,
            zones_triggered: [0; ZONE_GROUPS],
            keypad_fire_alarm: false,
            keypad_aux_alarm: false,
            keypad_panic_alarm: false,
        }
    }

    /// Clear every change flag and change bitmap, leaving the raw state
    /// and the keypad alarm latches untouched.
    pub fn clear_changed(&mut self) {
        self.keybus_changed = false;
        self.status_changed = false;
        self.ready_changed = false;
        self.armed_changed = false;
        self.exit_delay_changed = false;
        self.exit_state_changed = false;
        self.alarm_changed = false;
        self.fire_changed = false;
        self.trouble_changed = false;
        self.open_zones_changed = [0; ZONE_GROUPS];
        self.open_zones_status_changed = false;
        self.alarm_zones_changed = [0; ZONE_GROUPS];
        self.alarm_zones_status_changed = false;
    }

    /// Mark every observable as changed so a consumer resynchronizes
    /// from the current state.
    pub fn mark_all_changed(&mut self) {
        self.keybus_changed = true;
        self.status_changed = true;
        self.ready_changed = true;
        self.armed_changed = true;
        self.exit_delay_changed = true;
        self.exit_state_changed = true;
        self.alarm_changed = true;
        self.fire_changed = true;
        self.trouble_changed = true;
        self.open_zones_changed = [0xFF; ZONE_GROUPS];
        self.open_zones_status_changed = true;
        self.alarm_zones_changed = [0xFF; ZONE_GROUPS];
        self.alarm_zones_status_changed = true;
    }
}

impl Default for PartitionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Signals the decoder feeds back after each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Feedback {
    /// A keypad light is blinking (redundancy bypass input).
    pub light_blink: bool,
    /// The ready light is on (redundancy bypass input).
    pub ready_light: bool,
    /// The partition returned to ready; the capture engine may forget a
    /// detected `*` key.
    pub clear_star_key: bool,
}

/// Frame-by-frame partition decoder.
#[derive(Debug, Default)]
pub struct Decoder {
    memory_blink: BlinkDetector,
    armed_blink: BlinkDetector,
    bypass_blink: BlinkDetector,
    trouble_blink: BlinkDetector,
    beep: BeepMeter,
    // Quiet-window reference for the stay-to-away retention check. Never
    // written after init, so the window is open from 2 s after boot on.
    beep_time_off: u32,

    previous_lights: u8,
    previous_status: u8,
    previous_ready: bool,
    previous_armed: bool,
    previous_armed_stay: bool,
    previous_armed_away: bool,
    previous_alarm: bool,
    previous_exit_delay: bool,
    previous_exit_state: ExitState,
    previous_trouble: bool,
    previous_fire: bool,
    previous_open_zones: [u8; ZONE_GROUPS],
    previous_alarm_zones: [u8; ZONE_GROUPS],

    armed_stay_triggered: bool,
    exit_delay_armed: bool,
    alarm_triggered: bool,
    previous_alarm_triggered: bool,

    last_keypad_fire_ms: u32,
    last_keypad_aux_ms: u32,
    last_keypad_panic_ms: u32,
}

#[inline(always)]
fn bit(byte: u8, n: u8) -> bool {
    (byte >> n) & 1 == 1
}

impl Decoder {
    /// Fresh decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one panel frame into `state`.
    ///
    /// `status_byte` selects the light/status byte within the frame (1
    /// for PC1500/PC1550, 2 for PC3000); the bytes below it carry zone
    /// lights. `pause` suppresses the aggregate `status_changed` flag
    /// while leaving the per-field flags live.
    pub fn process(
        &mut self,
        state: &mut PartitionState,
        panel: &[u8; DATA_SIZE],
        pc16: &[u8; DATA_SIZE],
        status_byte: usize,
        star_key_detected: bool,
        pause: bool,
        now_ms: u32,
    ) -> Feedback {
        let status_b = panel[status_byte];
        let pc16_b = pc16[status_byte];

        // Keypad lights, remapped from the Classic bit order into the
        // PowerSeries light byte.
        let ready_light = bit(status_b, 7);
        let armed_light = bit(status_b, 6);
        let memory_light = bit(status_b, 5);
        let bypass_light = bit(status_b, 4);
        let trouble_light = bit(status_b, 3);
        let program_light = bit(status_b, 2);
        let fire_light = bit(status_b, 1);
        let beeping = bit(status_b, 0);

        state.lights = (ready_light as u8)
            | (armed_light as u8) << 1
            | (memory_light as u8) << 2
            | (bypass_light as u8) << 3
            | (trouble_light as u8) << 4
            | (program_light as u8) << 5
            | (fire_light as u8) << 6;
        if state.lights != self.previous_lights {
            self.previous_lights = state.lights;
            if !pause {
                state.status_changed = true;
            }
        }

        // PC16 status bits.
        let trouble_bit = bit(pc16_b, 7);
        let armed_bypass_bit = bit(pc16_b, 6);
        let armed_bit_a = bit(pc16_b, 5);
        let armed_bit_b = bit(pc16_b, 4);
        let alarm_bit = bit(pc16_b, 0);

        let memory_blink = self.memory_blink.update(memory_light, now_ms);
        let armed_blink = self.armed_blink.update(armed_light, now_ms);
        let bypass_blink = self.bypass_blink.update(bypass_light, now_ms);
        let trouble_blink = self.trouble_blink.update(trouble_light, now_ms);
        let light_blink = memory_blink || armed_blink || bypass_blink || trouble_blink;

        // Beep-duration cues.
        match self.beep.update(beeping, now_ms) {
            Some(BeepCue::Keypress) => {
                if state.status_code == STATUS_FUNCTION_UNAVAILABLE {
                    state.ready_changed = true;
                }
            }
            Some(BeepCue::Lockout) => {
                if state.lights == 0 {
                    state.status_code = STATUS_KEYPAD_LOCKOUT;
                    state.ready_changed = false;
                }
            }
            Some(BeepCue::Rejected) => {
                state.status_code = if state.lights == 0 {
                    STATUS_INVALID_CODE
                } else {
                    STATUS_FUNCTION_UNAVAILABLE
                };
                state.ready_changed = false;
            }
            None => {}
        }

        // Armed status.
        if armed_bit_a {
            state.armed = true;
            self.exit_delay_armed = true;

            if bypass_light || armed_bypass_bit {
                state.armed_stay = true;
                self.armed_stay_triggered = true;
                state.armed_away = false;
            } else if self.armed_stay_triggered {
                if !beeping
                    && !alarm_bit
                    && now_ms.wrapping_sub(self.beep_time_off) > STAY_TO_AWAY_QUIET_MS
                {
                    state.armed_stay = false;
                    state.armed_away = true;
                }
            } else {
                state.armed_stay = false;
                state.armed_away = true;
            }

            if armed_blink && armed_bit_a == armed_bit_b {
                state.no_entry_delay = true;
                state.exit_state = ExitState::NoEntryDelay;
            }

            self.set_ready(state, false, pause);
        } else {
            self.armed_stay_triggered = false;
            self.set_armed(state, false, pause);
            self.set_alarm(state, false, pause);
        }

        if state.armed != self.previous_armed
            || state.armed_stay != self.previous_armed_stay
            || state.armed_away != self.previous_armed_away
        {
            self.previous_armed = state.armed;
            self.previous_armed_stay = state.armed_stay;
            self.previous_armed_away = state.armed_away;
            state.armed_changed = true;
            if !pause {
                state.status_changed = true;
            }
        }

        // Ready and exit delay.
        let mut clear_star_key = false;
        if ready_light && !armed_bit_a {
            self.set_ready(state, true, pause);
            self.set_armed(state, false, pause);
            self.set_alarm(state, false, pause);
            self.exit_delay_armed = false;
            self.previous_alarm_triggered = false;
            clear_star_key = true;
            if !armed_blink {
                state.no_entry_delay = false;
            }

            if armed_light {
                // Ready and armed lights together mean exit delay.
                self.set_exit_delay(state, true, pause);
                if state.exit_state != ExitState::NoEntryDelay {
                    state.exit_state = if bypass_light {
                        ExitState::Stay
                    } else {
                        ExitState::Away
                    };
                    if state.exit_state != self.previous_exit_state {
                        self.previous_exit_state = state.exit_state;
                        state.exit_delay_changed = true;
                        state.exit_state_changed = true;
                        if !pause {
                            state.status_changed = true;
                        }
                    }
                }
            } else if !self.exit_delay_armed
                && !armed_blink
                && now_ms.wrapping_sub(self.armed_blink.last_on()) > EXIT_DELAY_RELEASE_MS
            {
                self.set_exit_delay(state, false, pause);
                state.exit_state = ExitState::None;
            }
        } else {
            // Zone lights lit keep the partition not-ready.
            if (1..=status_byte).any(|group| panel[status_byte - group] != 0) {
                self.set_ready(state, false, pause);
            }
            if self.exit_delay_armed && !armed_bit_a {
                self.set_ready(state, false, pause);
                self.exit_delay_armed = false;
            }
            if state.exit_delay && armed_bit_a {
                self.set_exit_delay(state, false, pause);
            }
        }

        // Open zones from the panel zone-light bytes. Sampling pauses in
        // the aftermath of an alarm, during programming blinks, and after
        // a `*` command, except while the exit delay overrides.
        if !self.previous_alarm_triggered
            && !memory_blink
            && !bypass_blink
            && !trouble_blink
            && !star_key_detected
        {
            for group in 1..=status_byte {
                for bit_pos in (0u8..8).rev() {
                    let triggered = bit(state.zones_triggered[status_byte - 1], bit_pos);
                    if (!triggered && !alarm_bit) || state.exit_delay {
                        // Zone lights are MSB-first; zone order is not.
                        let mask = 1 << (7 - bit_pos);
                        if bit(panel[status_byte - group], bit_pos) {
                            state.open_zones[group - 1] |= mask;
                        } else {
                            state.open_zones[group - 1] &= !mask;
                        }
                    }
                }

                let zones_changed =
                    state.open_zones[group - 1] ^ self.previous_open_zones[group - 1];
                if zones_changed != 0 {
                    self.previous_open_zones[group - 1] = state.open_zones[group - 1];
                    state.open_zones_changed[group - 1] |= zones_changed;
                    state.open_zones_status_changed = true;
                    if !pause {
                        state.status_changed = true;
                    }
                }
            }
        }

        // Alarm zones from PC16 bits 7..2 of the byte below the status
        // byte (bit 1 reserved, bit 0 is the fire alarm).
        for bit_pos in 2u8..=7 {
            let mask = 1 << (7 - bit_pos);
            if bit(pc16[status_byte - 1], bit_pos) {
                state.alarm_zones[0] |= mask;
                state.zones_triggered[0] |= mask;
            } else {
                state.alarm_zones[0] &= !mask;
            }
        }
        let zones_changed = state.alarm_zones[0] ^ self.previous_alarm_zones[0];
        if zones_changed != 0 {
            self.previous_alarm_zones[0] = state.alarm_zones[0];
            state.alarm_zones_status_changed = true;
            if !pause {
                state.status_changed = true;
            }

            for zone_bit in 0u8..8 {
                if !bit(zones_changed, zone_bit) {
                    continue;
                }
                state.alarm_zones_changed[0] |= 1 << zone_bit;

                // While the alarm is active, alarmed zones are reflected
                // as open so consumers see them trip.
                if alarm_bit {
                    if bit(state.alarm_zones[0], zone_bit) {
                        state.open_zones[0] |= 1 << zone_bit;
                    } else {
                        state.open_zones[0] &= !(1 << zone_bit);
                    }
                    state.open_zones_changed[0] |= 1 << zone_bit;
                    state.open_zones_status_changed = true;
                    self.previous_open_zones[0] = state.open_zones[0];
                }
            }
        }

        // Alarm status. Requires the panel's PGM output configured as a
        // strobe; the status-light gate mirrors that wiring.
        if status_b & 0xFE != 0 {
            if alarm_bit && !memory_blink {
                self.set_ready(state, false, pause);
                self.set_alarm(state, true, pause);
                self.alarm_triggered = true;
            } else if !memory_blink && !state.armed_changed {
                self.set_alarm(state, false, pause);
                if self.alarm_triggered {
                    self.alarm_triggered = false;
                    // Gates zone re-sampling for one cycle after the
                    // alarm drops.
                    self.previous_alarm_triggered = true;
                }
            }
        }

        // Trouble.
        state.trouble = trouble_bit;
        if state.trouble != self.previous_trouble {
            self.previous_trouble = state.trouble;
            state.trouble_changed = true;
            if !pause {
                state.status_changed = true;
            }
        }

        // Fire.
        state.fire = bit(pc16[status_byte - 1], 0);
        if state.fire != self.previous_fire {
            self.previous_fire = state.fire;
            state.fire_changed = true;
            if !pause {
                state.status_changed = true;
            }
        }

        // Keypad fire/aux/panic keys, debounced to one latch per second.
        if bit(pc16_b, 1)
            && now_ms.wrapping_sub(self.last_keypad_fire_ms) > KEYPAD_ALARM_DEBOUNCE_MS
        {
            state.keypad_fire_alarm = true;
            self.last_keypad_fire_ms = now_ms;
            if !pause {
                state.status_changed = true;
            }
        }
        if bit(pc16_b, 2)
            && now_ms.wrapping_sub(self.last_keypad_aux_ms) > KEYPAD_ALARM_DEBOUNCE_MS
        {
            state.keypad_aux_alarm = true;
            self.last_keypad_aux_ms = now_ms;
            if !pause {
                state.status_changed = true;
            }
        }
        if bit(pc16_b, 3)
            && now_ms.wrapping_sub(self.last_keypad_panic_ms) > KEYPAD_ALARM_DEBOUNCE_MS
        {
            state.keypad_panic_alarm = true;
            self.last_keypad_panic_ms = now_ms;
            if !pause {
                state.status_changed = true;
            }
        }

        // Compatibility status code.
        state.status_code = next_status_code(
            state.status_code,
            state,
            memory_blink,
            bypass_blink,
            trouble_blink,
        );
        if state.status_code != self.previous_status {
            self.previous_status = state.status_code;
            if !pause {
                state.status_changed = true;
            }
        }

        Feedback {
            light_blink,
            ready_light,
            clear_star_key,
        }
    }

    fn set_ready(&mut self, state: &mut PartitionState, ready: bool, pause: bool) {
        state.ready = ready;
        if state.ready != self.previous_ready {
            self.previous_ready = state.ready;
            state.ready_changed = true;
            if !pause {
                state.status_changed = true;
            }
        }
    }

    fn set_alarm(&mut self, state: &mut PartitionState, alarm: bool, pause: bool) {
        state.alarm = alarm;
        if state.alarm != self.previous_alarm {
            self.previous_alarm = state.alarm;
            state.alarm_changed = true;
            if !pause {
                state.status_changed = true;
            }
        }
    }

    fn set_exit_delay(&mut self, state: &mut PartitionState, exit_delay: bool, pause: bool) {
        state.exit_delay = exit_delay;
        if state.exit_delay != self.previous_exit_delay {
            self.previous_exit_delay = state.exit_delay;
            state.exit_delay_changed = true;
            if !pause {
                state.status_changed = true;
            }
        }
    }

    fn set_armed(&mut self, state: &mut PartitionState, armed: bool, pause: bool) {
        state.armed = armed;
        state.armed_stay = armed;
        state.armed_away = armed;
        if state.armed != self.previous_armed {
            self.previous_armed = state.armed;
            state.armed_changed = true;
            if !pause {
                state.status_changed = true;
            }
        }
    }
}

/// The PowerSeries status code is a remapping of the decoded state, not
/// flow control: given the previous code, the current state, and the
/// programming blinks, produce the next code.
fn next_status_code(
    code: u8,
    state: &PartitionState,
    memory_blink: bool,
    bypass_blink: bool,
    trouble_blink: bool,
) -> u8 {
    if memory_blink && bypass_blink && trouble_blink {
        return STATUS_PROGRAMMING;
    }
    if state.lights == 0 {
        return code;
    }

    let mut code = code;

    if state.ready_changed
        || code == STATUS_INVALID_CODE
        || code == STATUS_KEYPAD_LOCKOUT
        || code == STATUS_PROGRAMMING
    {
        if state.ready {
            code = STATUS_PARTITION_READY;
        } else if state.open_zones_status_changed
            && (state.open_zones[0] != 0 || state.open_zones[1] != 0)
        {
            code = STATUS_ZONES_OPEN;
        }
    }

    if state.armed_changed {
        if state.armed {
            if state.armed_away {
                code = STATUS_ARMED_AWAY;
            } else if state.armed_stay {
                code = STATUS_ARMED_STAY;
            }
            if state.no_entry_delay {
                code = STATUS_ARMED_NO_ENTRY_DELAY;
            }
        } else {
            code = STATUS_DISARMED;
        }
    }

    if state.alarm_changed {
        if state.alarm {
            code = STATUS_ALARM;
        } else if !state.armed_changed {
            code = STATUS_DISARMED;
        }
    }

    if state.exit_delay_changed {
        if state.exit_delay {
            code = STATUS_EXIT_DELAY;
        } else if !state.armed {
            code = STATUS_DISARMED;
        }
    }

    if code == STATUS_DISARMED {
        if state.ready {
            code = STATUS_PARTITION_READY;
        } else if state.open_zones[0] != 0 || state.open_zones[1] != 0 {
            code = STATUS_ZONES_OPEN;
        }
    }

    code
}

#[cfg(test)]
mod tests {
    use super::*;

    const SB: usize = 1; // PC1500/PC1550 frame layout

    struct Bench {
        decoder: Decoder,
        state: PartitionState,
        now_ms: u32,
    }

    impl Bench {
        fn new() -> Self {
            Self {
                decoder: Decoder::new(),
                state: PartitionState::new(),
                now_ms: 5000,
            }
        }

        fn frame(&mut self, panel1: u8, panel0: u8, pc16_1: u8, pc16_0: u8) {
            let panel = [panel0, panel1, 0, 0, 0, 0, 0, 0];
            let pc16 = [pc16_0, pc16_1, 0, 0, 0, 0, 0, 0];
            self.decoder
                .process(&mut self.state, &panel, &pc16, SB, false, false, self.now_ms);
        }

        fn settle(&mut self) {
            self.state.clear_changed();
        }

        fn advance(&mut self, ms: u32) {
            self.now_ms += ms;
        }
    }

    #[test]
    fn test_ready_idle() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);

        assert!(bench.state.ready);
        assert!(bench.state.ready_changed);
        assert!(!bench.state.armed);
        assert_eq!(bench.state.lights, 0b0000_0001);
        assert_eq!(bench.state.status_code, STATUS_PARTITION_READY);
        assert!(bench.state.status_changed);
    }

    #[test]
    fn test_zone_open() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        // Past the 600 ms window, so the fresh bypass light does not
        // read as blinking and gate the zone sampling.
        bench.advance(700);

        // Zone 3 light comes on, ready light drops, bypass light stays
        // lit so the status branch stays live.
        bench.frame(0x10, 0x20, 0x00, 0x00);

        assert!(bit(bench.state.open_zones[0], 2), "zone 3 is bit 2");
        assert!(!bench.state.ready);
        assert!(bench.state.ready_changed);
        assert!(bench.state.open_zones_status_changed);
        assert!(bit(bench.state.open_zones_changed[0], 2));
        assert_eq!(bench.state.status_code, STATUS_ZONES_OPEN);
    }

    #[test]
    fn test_zone_lights_follow_panel() {
        let mut bench = Bench::new();
        // Zone 3 open with the ready light still on: the zone bit is
        // tracked even though ready holds.
        bench.frame(0x80, 0x20, 0x00, 0x00);
        assert!(bit(bench.state.open_zones[0], 2));

        bench.settle();
        bench.advance(500);
        bench.frame(0x80, 0x00, 0x00, 0x00);
        assert_eq!(bench.state.open_zones[0], 0);
        assert!(bit(bench.state.open_zones_changed[0], 2));
    }

    #[test]
    fn test_armed_stay() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        bench.advance(500);

        // Armed + bypass lights, PC16 armed side A + armed-with-bypass.
        bench.frame(0x50, 0x00, 0x60, 0x00);

        assert!(bench.state.armed);
        assert!(bench.state.armed_stay);
        assert!(!bench.state.armed_away);
        assert!(bench.state.armed_changed);
        assert!(!bench.state.ready);
        assert_eq!(bench.state.status_code, STATUS_ARMED_STAY);
    }

    #[test]
    fn test_armed_away_after_stay() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        bench.advance(500);
        bench.frame(0x50, 0x00, 0x60, 0x00);
        bench.settle();

        // Bypass light drops and the bus stays quiet past the 2 s
        // retention window.
        bench.advance(2500);
        bench.frame(0x40, 0x00, 0x20, 0x00);

        assert!(bench.state.armed);
        assert!(!bench.state.armed_stay);
        assert!(bench.state.armed_away);
        assert!(bench.state.armed_changed);
        assert_eq!(bench.state.status_code, STATUS_ARMED_AWAY);
    }

    #[test]
    fn test_alarm_with_zone_2() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        bench.advance(3000);
        bench.frame(0x40, 0x00, 0x20, 0x00); // armed away
        bench.settle();
        bench.advance(500);

        // PC16 alarm bit plus zone 2 (bit 6 of the zone byte).
        bench.frame(0x40, 0x00, 0x21, 0x40);

        assert!(bench.state.alarm);
        assert!(bench.state.alarm_changed);
        assert!(bit(bench.state.alarm_zones[0], 1), "zone 2 is bit 1");
        assert!(bit(bench.state.open_zones[0], 1), "alarmed zone reflected open");
        assert!(bit(bench.state.zones_triggered[0], 1));
        assert_eq!(bench.state.status_code, STATUS_ALARM);
    }

    #[test]
    fn test_disarm_after_alarm_returns_ready() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        bench.advance(3000);
        bench.frame(0x40, 0x00, 0x20, 0x00);
        bench.settle();
        bench.advance(500);
        bench.frame(0x40, 0x00, 0x21, 0x40);
        bench.settle();
        bench.advance(500);

        // Disarm: armed bits drop, ready light returns, alarm zone clears.
        bench.frame(0x80, 0x00, 0x00, 0x00);

        assert!(!bench.state.alarm);
        assert!(!bench.state.armed);
        assert!(bench.state.ready);
        assert_eq!(bench.state.status_code, STATUS_PARTITION_READY);
    }

    #[test]
    fn test_exit_delay_away() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        bench.advance(500);

        // Ready and armed lights together, armed bits not yet set.
        bench.frame(0xC0, 0x00, 0x00, 0x00);

        assert!(bench.state.exit_delay);
        assert!(bench.state.exit_delay_changed);
        assert_eq!(bench.state.exit_state, ExitState::Away);
        assert!(bench.state.exit_state_changed);
        assert_eq!(bench.state.status_code, STATUS_EXIT_DELAY);
    }

    #[test]
    fn test_exit_delay_stay_via_bypass_light() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        bench.advance(500);
        bench.frame(0xD0, 0x00, 0x00, 0x00);

        assert!(bench.state.exit_delay);
        assert_eq!(bench.state.exit_state, ExitState::Stay);
    }

    #[test]
    fn test_no_entry_delay_from_armed_blink() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();

        // Blinking armed light: off/on inside the 600 ms window, with
        // both PC16 armed bits set.
        bench.advance(400);
        bench.frame(0x00, 0x00, 0x30, 0x00);
        bench.advance(400);
        bench.frame(0x40, 0x00, 0x30, 0x00);

        assert!(bench.state.no_entry_delay);
        assert_eq!(bench.state.exit_state, ExitState::NoEntryDelay);
        assert!(bench.state.armed);
        assert_eq!(bench.state.status_code, STATUS_ARMED_NO_ENTRY_DELAY);
    }

    #[test]
    fn test_trouble_and_fire_bits() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x80, 0x01);

        assert!(bench.state.trouble);
        assert!(bench.state.trouble_changed);
        assert!(bench.state.fire);
        assert!(bench.state.fire_changed);
    }

    #[test]
    fn test_keypad_alarm_latch_debounce() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x02, 0x00);
        assert!(bench.state.keypad_fire_alarm);

        bench.state.keypad_fire_alarm = false;
        // Still inside the 1 s debounce: no relatch.
        bench.advance(400);
        bench.frame(0x80, 0x00, 0x02, 0x00);
        assert!(!bench.state.keypad_fire_alarm);

        bench.advance(1100);
        bench.frame(0x80, 0x00, 0x02, 0x00);
        assert!(bench.state.keypad_fire_alarm);
    }

    #[test]
    fn test_programming_blink_status() {
        let mut bench = Bench::new();
        // Memory, bypass, and trouble lights blinking together.
        let lights_on = 0x38u8; // memory + bypass + trouble
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        for _ in 0..4 {
            bench.advance(300);
            bench.frame(0x80 | lights_on, 0x00, 0x00, 0x00);
            bench.advance(300);
            bench.frame(0x80, 0x00, 0x00, 0x00);
        }
        assert_eq!(bench.state.status_code, STATUS_PROGRAMMING);
    }

    #[test]
    fn test_invalid_code_beep() {
        let mut bench = Bench::new();
        // Beep starts with all lights out, runs ~1 s, then stops.
        bench.frame(0x01, 0x00, 0x00, 0x00);
        bench.advance(1000);
        bench.frame(0x00, 0x00, 0x00, 0x00);
        assert_eq!(bench.state.status_code, STATUS_INVALID_CODE);
    }

    #[test]
    fn test_lockout_beep() {
        let mut bench = Bench::new();
        bench.frame(0x01, 0x00, 0x00, 0x00);
        bench.advance(400);
        bench.frame(0x00, 0x00, 0x00, 0x00);
        assert_eq!(bench.state.status_code, STATUS_KEYPAD_LOCKOUT);
    }

    #[test]
    fn test_pause_suppresses_aggregate_flag_only() {
        let mut bench = Bench::new();
        let panel = [0x00, 0x80, 0, 0, 0, 0, 0, 0];
        let pc16 = [0u8; 8];
        bench
            .decoder
            .process(&mut bench.state, &panel, &pc16, SB, false, true, bench.now_ms);

        assert!(bench.state.ready);
        assert!(bench.state.ready_changed);
        assert!(!bench.state.status_changed);
    }

    #[test]
    fn test_mark_all_changed_keeps_raw_state() {
        let mut bench = Bench::new();
        bench.frame(0x80, 0x00, 0x00, 0x00);
        bench.settle();
        bench.state.mark_all_changed();

        assert!(bench.state.ready);
        assert!(bench.state.ready_changed);
        assert!(bench.state.armed_changed);
        assert_eq!(bench.state.open_zones_changed, [0xFF; ZONE_GROUPS]);
        assert_eq!(bench.state.alarm_zones_changed, [0xFF; ZONE_GROUPS]);
    }

    #[test]
    fn test_feedback_reports_blink_and_ready() {
        let mut bench = Bench::new();
        let panel = [0x00, 0x80, 0, 0, 0, 0, 0, 0];
        let pc16 = [0u8; 8];
        let feedback = bench.decoder.process(
            &mut bench.state,
            &panel,
            &pc16,
            SB,
            false,
            false,
            bench.now_ms,
        );
        assert!(feedback.ready_light);
        assert!(!feedback.light_blink);
        assert!(feedback.clear_star_key);
    }
}
