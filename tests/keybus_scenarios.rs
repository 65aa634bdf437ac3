//! End-to-end scenarios for the Keybus interface.
//!
//! These tests drive the full pipeline - clock edges, the deferred
//! sampler, frame segmentation, and the foreground poll - through
//! `MockPlatform`, simulating the panel at its real cadence (1 ms bit
//! period, 250 µs sample offset, 2 ms inter-command idle).

use keybus_classic::hal::SAMPLE_DELAY_US;
use keybus_classic::{Config, ExitState, Keybus, Level, MockPlatform};

fn keybus() -> Keybus<MockPlatform> {
    let mut keybus =
        Keybus::new(MockPlatform::new(), Config::with_access_code(true, "1234")).unwrap();
    keybus.begin();
    keybus
}

/// Clock one panel bit: falling edge + low sample, rising edge + high
/// sample reading `data`/`pc16`.
fn clock_bit(bus: &Keybus<MockPlatform>, data: bool, pc16: bool) {
    bus.with_platform(|p| p.clock = Level::Low);
    bus.on_clock_edge();
    bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));
    bus.on_sample_timer();
    bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));

    bus.with_platform(|p| p.clock = Level::High);
    bus.on_clock_edge();
    bus.with_platform(|p| {
        p.data = data.into();
        p.pc16 = pc16.into();
        p.advance_us(SAMPLE_DELAY_US);
    });
    bus.on_sample_timer();
    bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));
}

/// Hold the clock high past the 2 ms idle, then take the falling edge
/// and deferred sample that publish the finished command.
fn idle(bus: &Keybus<MockPlatform>) {
    bus.with_platform(|p| {
        p.clock = Level::High;
        p.advance_us(2500);
        p.clock = Level::Low;
    });
    bus.on_clock_edge();
    bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));
    bus.on_sample_timer();
    bus.with_platform(|p| {
        p.clock = Level::High;
        p.advance_us(SAMPLE_DELAY_US);
    });
}

/// Clock a full panel command onto the bus and publish it.
fn send_frame(bus: &Keybus<MockPlatform>, panel: &[u8], pc16: &[u8]) {
    idle(bus);
    for (p, c) in panel.iter().zip(pc16.iter()) {
        for bit in (0..8).rev() {
            clock_bit(bus, (p >> bit) & 1 == 1, (c >> bit) & 1 == 1);
        }
    }
    idle(bus);
}

/// Drive one 8-bit command while recording which falling-edge slots the
/// virtual keypad asserted (slot 0 is the idle edge itself).
fn drive_write_command(bus: &Keybus<MockPlatform>) -> Vec<usize> {
    let mut slots = Vec::new();

    bus.with_platform(|p| {
        p.clock = Level::High;
        p.advance_us(2500);
        p.clock = Level::Low;
    });
    bus.on_clock_edge();
    if bus.with_platform(|p| p.write_pin.is_high()) {
        slots.push(0);
    }
    bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));
    bus.on_sample_timer();
    bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));

    for slot in 1..=7 {
        bus.with_platform(|p| p.clock = Level::High);
        bus.on_clock_edge();
        bus.with_platform(|p| {
            p.data = Level::High;
            p.pc16 = Level::Low;
            p.advance_us(SAMPLE_DELAY_US);
        });
        bus.on_sample_timer();
        bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));

        bus.with_platform(|p| p.clock = Level::Low);
        bus.on_clock_edge();
        if bus.with_platform(|p| p.write_pin.is_high()) {
            slots.push(slot);
        }
        bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));
        bus.on_sample_timer();
        bus.with_platform(|p| p.advance_us(SAMPLE_DELAY_US));
    }

    slots
}

#[test]
fn ready_idle_pc1550() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);

    assert!(bus.poll());
    assert!(bus.status.keybus_connected);
    assert!(bus.status.ready);
    assert!(!bus.status.armed);
    assert_eq!(bus.status.lights, 0b0000_0001);
    assert_eq!(bus.status.status_code, 0x01);
    assert!(bus.write_ready());
}

#[test]
fn identical_frames_deliver_once() {
    let mut bus = keybus();
    for _ in 0..4 {
        send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    }

    assert!(bus.poll());
    // Ring held exactly one frame; nothing further to drain.
    assert!(!bus.poll());
    assert!(!bus.buffer_overflow());
}

#[test]
fn changed_frame_delivers_again() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    send_frame(&bus, &[0x00, 0xC0], &[0x00, 0x00]);

    assert!(bus.poll());
    assert!(bus.poll());
    assert!(!bus.poll());
}

#[test]
fn keybus_liveness_follows_clock_activity() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    assert!(bus.status.keybus_connected);
    bus.status.keybus_changed = false;

    // Clock goes quiet past the 3 s timeout.
    bus.with_platform(|p| p.advance_ms(3100));
    assert!(bus.poll());
    assert!(!bus.status.keybus_connected);
    assert!(bus.status.keybus_changed);
    bus.status.keybus_changed = false;

    // Activity returns.
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    bus.poll();
    assert!(bus.status.keybus_connected);
    assert!(bus.status.keybus_changed);
}

#[test]
fn ring_overflow_sets_sticky_flag() {
    let mut bus = keybus();
    for i in 0..12u8 {
        send_frame(&bus, &[i, 0x80], &[0x00, 0x00]);
    }

    assert!(bus.buffer_overflow());
    bus.clear_buffer_overflow();
    assert!(!bus.buffer_overflow());

    // The ten buffered frames still drain in order.
    let mut drained = 0;
    while bus.poll() {
        drained += 1;
    }
    assert_eq!(drained, 10);
}

#[test]
fn warmup_waits_for_valid_pc16() {
    let mut bus = keybus();
    // PC16 stuck high: not a valid status frame yet.
    send_frame(&bus, &[0x00, 0x80], &[0xFF, 0xFF]);
    assert!(!bus.poll());
    assert!(!bus.write_ready());

    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    assert!(bus.write_ready());
    assert!(bus.status.ready);
}

#[test]
fn pc3000_three_byte_frames() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x00, 0x80], &[0x00, 0x00, 0x00]);
    assert!(bus.poll());
    assert!(bus.status.ready);
    assert_eq!(bus.status.status_code, 0x01);

    // Past the blink window so the fresh bypass light reads steady.
    bus.with_platform(|p| p.advance_ms(700));

    // Zone 11: group 2, panel byte 0, bit 5. Bypass light keeps the
    // status branch live with ready off.
    send_frame(&bus, &[0x20, 0x00, 0x10], &[0x00, 0x00, 0x00]);
    assert!(bus.poll());
    assert!(!bus.status.ready);
    assert!(bus.status.open_zones[1] & 0x04 != 0, "zone 11 is group 2 bit 2");
    assert_eq!(bus.status.status_code, 0x03);
}

#[test]
fn armed_stay_then_away() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    let _ = bus.snapshot();

    bus.with_platform(|p| p.advance_ms(700));
    send_frame(&bus, &[0x00, 0x50], &[0x00, 0x60]);
    assert!(bus.poll());
    assert!(bus.status.armed);
    assert!(bus.status.armed_stay);
    assert!(!bus.status.armed_away);
    assert_eq!(bus.status.status_code, 0x04);
    let _ = bus.snapshot();

    bus.with_platform(|p| p.advance_ms(2500));
    send_frame(&bus, &[0x00, 0x40], &[0x00, 0x20]);
    assert!(bus.poll());
    assert!(bus.status.armed_away);
    assert!(!bus.status.armed_stay);
    assert_eq!(bus.status.status_code, 0x05);
}

#[test]
fn alarm_reflects_zone_open() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    let _ = bus.snapshot();

    bus.with_platform(|p| p.advance_ms(3000));
    send_frame(&bus, &[0x00, 0x40], &[0x00, 0x20]);
    assert!(bus.poll());
    let _ = bus.snapshot();

    bus.with_platform(|p| p.advance_ms(700));
    send_frame(&bus, &[0x00, 0x40], &[0x40, 0x21]);
    assert!(bus.poll());
    assert!(bus.status.alarm);
    assert!(bus.status.alarm_zones[0] & 0x02 != 0, "zone 2 in alarm");
    assert!(bus.status.open_zones[0] & 0x02 != 0, "alarmed zone opens");
    assert_eq!(bus.status.status_code, 0x11);
}

#[test]
fn exit_delay_away_reported() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    let _ = bus.snapshot();

    bus.with_platform(|p| p.advance_ms(700));
    send_frame(&bus, &[0x00, 0xC0], &[0x00, 0x00]);
    assert!(bus.poll());
    assert!(bus.status.exit_delay);
    assert_eq!(bus.status.exit_state, ExitState::Away);
    assert_eq!(bus.status.status_code, 0x08);
}

#[test]
fn virtual_keypress_asserts_zero_slots() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());

    // Key '5' (0xDD = 0b1101_1101): zeros at slots 2 and 6 from the MSB.
    bus.write('5').unwrap();
    bus.with_platform(|p| p.clear_write_events());

    let slots = drive_write_command(&bus);
    assert_eq!(slots, vec![2, 6]);

    // The transmitter finished; the next poll reports writes ready again.
    send_frame(&bus, &[0x01, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    assert!(bus.write_ready());
}

#[test]
fn multi_key_write_drains_in_order() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());

    bus.write_str("12", false).unwrap();

    // '1' (0xBE = 0b1011_1110): zeros at slots 1 and 7.
    bus.with_platform(|p| p.clear_write_events());
    let first = drive_write_command(&bus);
    assert_eq!(first, vec![1, 7]);

    // Let the 50 ms inter-write wait lapse, then poll to hand over '2'.
    bus.with_platform(|p| p.advance_ms(60));
    bus.poll();

    // '2' (0xDE = 0b1101_1110): zeros at slots 2 and 7.
    bus.with_platform(|p| p.clear_write_events());
    let second = drive_write_command(&bus);
    assert_eq!(second, vec![2, 7]);

    send_frame(&bus, &[0x02, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    assert!(bus.write_ready());
}

#[test]
fn reset_status_marks_all_without_new_frames() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());
    let _ = bus.snapshot();

    bus.reset_status();
    assert!(!bus.poll()); // no new frame

    assert!(bus.status.status_changed);
    assert!(bus.status.ready_changed);
    assert!(bus.status.armed_changed);
    assert!(bus.status.alarm_changed);
    assert!(bus.status.fire_changed);
    assert!(bus.status.trouble_changed);
    assert!(bus.status.keybus_changed);
    assert_eq!(bus.status.open_zones_changed, [0xFF, 0xFF]);
    assert_eq!(bus.status.alarm_zones_changed, [0xFF, 0xFF]);
    // Raw state untouched.
    assert!(bus.status.ready);
}

#[test]
fn stop_and_restart_resume_cleanly() {
    let mut bus = keybus();
    send_frame(&bus, &[0x00, 0x80], &[0x00, 0x00]);
    assert!(bus.poll());

    bus.stop();
    // Events while stopped are ignored.
    send_frame(&bus, &[0x00, 0xC0], &[0x00, 0x00]);
    assert!(!bus.poll());

    bus.begin();
    bus.with_platform(|p| p.advance_ms(700));
    send_frame(&bus, &[0x00, 0xC0], &[0x00, 0x00]);
    assert!(bus.poll());
    assert!(bus.status.exit_delay);
}
