//! LoRaWAN End-Node Trace Utilities
//!
//! This library provides the interrupt-safe trace path of an STM32-based
//! LoRaWAN end node: a circular frame queue, a serial trace channel driven
//! by transmit-complete interrupts, and the low-power mode arbiter that
//! keeps the UART clocked while a transfer is outstanding.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION LAYER                         │
//! │  trace_send! / trace_poll! / trace_verbose!                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     TRACE CHANNEL                            │
//! │  render → FrameQueue → TraceOutput  ◄── TX complete IRQ      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  LOW POWER MANAGER                           │
//! │  stop / off vetoes  →  Sleep | Stop | Off                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 PLATFORM (external)                          │
//! │  UART + DMA  │  critical-section  │  sleep hooks             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **No hidden globals**: queue and flags live in caller-owned values
//! - **Interrupt safety**: shared state only changes inside critical sections
//! - **Fail fast**: a full queue drops the message instead of blocking
//! - **No unsafe in application code**: hardware access stays in the binary

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

#[macro_use]
mod fmt;

/// Circular Frame Queue
///
/// Length-prefixed frames in a fixed ring buffer.
pub mod queue;

/// Serial Trace Channel
///
/// Formatted messages queued for an interrupt-driven transmitter.
pub mod trace;

/// Low Power Management
///
/// Stop/off mode vetoes and low-power mode selection.
pub mod power;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::power::{LowPowerHooks, LowPowerManager, LpmId, LpmMode, LpmSetting, NoHooks};
    pub use crate::queue::{FrameQueue, QueueError};
    pub use crate::trace::{TraceChannel, TraceError, TraceOutput, Verbosity};
    pub use crate::{trace_poll, trace_send, trace_verbose};

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
