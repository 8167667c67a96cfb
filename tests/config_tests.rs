//! Configuration and Constants Tests
//!
//! Tests to verify configuration values are valid and consistent.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test config_tests

use lrwan_node::config::*;
use lrwan_node::trace::Verbosity;

// =============================================================================
// Trace Sizing Tests
// =============================================================================

#[test]
fn frame_header_is_two_bytes() {
    assert_eq!(FRAME_HEADER_LEN, 2);
}

#[test]
fn longest_message_fits_in_queue() {
    // A full scratch buffer plus two headers (worst case split) must fit
    assert!(TRACE_SCRATCH_SIZE + 2 * FRAME_HEADER_LEN <= TRACE_QUEUE_SIZE);
}

#[test]
fn queue_size_fits_length_prefix() {
    assert!(TRACE_QUEUE_SIZE <= usize::from(u16::MAX));
}

#[test]
fn uart_frame_holds_any_message() {
    assert!(TRACE_FRAME_MAX >= TRACE_SCRATCH_SIZE);
}

#[test]
fn default_verbosity_hides_level2() {
    assert!(Verbosity::Level2 > VERBOSE_LEVEL);
    assert!(Verbosity::Level0 <= VERBOSE_LEVEL);
}

// =============================================================================
// Serial and Timing Tests
// =============================================================================

#[test]
fn trace_baud_rate_standard() {
    let standard = [9_600, 19_200, 38_400, 57_600, 115_200, 230_400];
    assert!(standard.contains(&TRACE_BAUD_RATE));
}

#[test]
fn heartbeat_longer_than_led_blink() {
    // The heartbeat task keeps the LED on for 50ms each period
    assert!(HEARTBEAT_PERIOD_MS > 50);
}
