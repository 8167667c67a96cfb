//! System configuration and constants
//!
//! Compile-time sizes and levels for the trace subsystem, plus the serial
//! parameters the firmware binary uses for its trace UART.

use crate::trace::Verbosity;

/// Length of the big-endian size prefix stored in front of each queue frame
pub const FRAME_HEADER_LEN: usize = 2;

/// Trace message queue size in bytes
pub const TRACE_QUEUE_SIZE: usize = 512;

/// Scratch buffer size for rendering one trace message.
///
/// Longer messages are truncated to this length.
pub const TRACE_SCRATCH_SIZE: usize = 256;

/// Largest frame the trace UART task forwards in one write
pub const TRACE_FRAME_MAX: usize = TRACE_SCRATCH_SIZE;

/// Default verbosity threshold for `TraceChannel::send_at`
pub const VERBOSE_LEVEL: Verbosity = Verbosity::Level1;

/// Trace UART baud rate
pub const TRACE_BAUD_RATE: u32 = 115_200;

/// Heartbeat trace period in milliseconds
pub const HEARTBEAT_PERIOD_MS: u64 = 1_000;
