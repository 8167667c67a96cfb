//! Serial Trace Channel
//!
//! Decouples trace producers from a single serial transmitter. Messages are
//! rendered into a bounded scratch buffer, queued as frames in a
//! [`FrameQueue`], and handed one at a time to a [`TraceOutput`]. The
//! output reports the end of each transfer through
//! [`TraceChannel::on_transmit_complete`], usually from its interrupt
//! handler, which starts the next frame or releases the UART's stop-mode
//! veto once the queue has drained.
//!
//! ```text
//!  send() ──► scratch ──► FrameQueue ──► TraceOutput::start_transmit
//!                             ▲                      │
//!                             └── on_transmit_complete (IRQ)
//! ```

use core::cell::{Cell, RefCell};
use core::fmt::{self, Write};

use critical_section::{CriticalSection, Mutex};
use heapless::Vec;

use crate::config::{FRAME_HEADER_LEN, TRACE_SCRATCH_SIZE, VERBOSE_LEVEL};
use crate::power::{LowPowerHooks, LowPowerManager, LpmId, LpmSetting, NoHooks};
use crate::queue::FrameQueue;

/// Transmit backend for trace frames.
///
/// `start_transmit` begins an asynchronous transfer and returns without
/// blocking. The platform then calls [`TraceChannel::on_transmit_complete`]
/// exactly once, after the last byte has been consumed. The frame stays
/// valid and untouched until that call. A backend that finishes
/// synchronously may make the call from inside `start_transmit`.
pub trait TraceOutput {
    /// Begin sending `frame`
    fn start_transmit(&mut self, frame: &[u8]);
}

/// Trace verbosity, lowest is most important.
///
/// A channel starts at [`VERBOSE_LEVEL`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Always sent
    Level0,
    /// Sent when the threshold is level 1 or above
    Level1,
    /// Sent only at the most verbose threshold
    Level2,
}

#[cfg(feature = "embedded")]
impl defmt::Format for Verbosity {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Level0 => defmt::write!(f, "VL0"),
            Self::Level1 => defmt::write!(f, "VL1"),
            Self::Level2 => defmt::write!(f, "VL2"),
        }
    }
}

/// Trace send errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceError {
    /// The queue had no room; the message was dropped
    QueueFull,
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "trace queue full, message dropped"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TraceError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::QueueFull => defmt::write!(f, "QUEUE_FULL"),
        }
    }
}

/// Rendered trace message, truncated to [`TRACE_SCRATCH_SIZE`] bytes
pub type Scratch = Vec<u8, TRACE_SCRATCH_SIZE>;

/// `fmt::Write` sink that keeps what fits and drops the rest
struct Truncating<'s>(&'s mut Scratch);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.0.capacity() - self.0.len();
        let take = s.len().min(room);
        // Cannot fail, `take` is bounded by the remaining room
        let _ = self.0.extend_from_slice(&s.as_bytes()[..take]);
        Ok(())
    }
}

/// Render `args` into a scratch buffer, truncating overlong output
#[must_use]
pub fn render(args: fmt::Arguments<'_>) -> Scratch {
    let mut scratch = Scratch::new();
    // Truncating never reports an error
    let _ = Truncating(&mut scratch).write_fmt(args);
    scratch
}

/// Strip the directory part of a source path.
///
/// Backslash separators take precedence over forward slashes.
#[must_use]
pub fn file_name(path: &str) -> &str {
    if let Some(pos) = path.rfind('\\') {
        &path[pos + 1..]
    } else if let Some(pos) = path.rfind('/') {
        &path[pos + 1..]
    } else {
        path
    }
}

struct Inner<'a, T> {
    queue: FrameQueue<'a>,
    output: T,
    in_progress: bool,
    verbosity: Verbosity,
}

/// Trace channel owning the frame queue and the transmit backend
pub struct TraceChannel<'a, T, H = NoHooks> {
    inner: Mutex<RefCell<Inner<'a, T>>>,
    /// Completion reported from inside `start_transmit`
    completion_pending: Mutex<Cell<bool>>,
    lpm: &'a LowPowerManager<H>,
}

impl<'a, T: TraceOutput, H: LowPowerHooks> TraceChannel<'a, T, H> {
    /// Create a channel queueing into `storage` and sending through `output`
    #[must_use]
    pub fn new(storage: &'a mut [u8], output: T, lpm: &'a LowPowerManager<H>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                queue: FrameQueue::new(storage),
                output,
                in_progress: false,
                verbosity: VERBOSE_LEVEL,
            })),
            completion_pending: Mutex::new(Cell::new(false)),
            lpm,
        }
    }

    /// Queue a formatted message and start sending it if the line is idle.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::QueueFull`] when there is no room; the message
    /// is dropped.
    pub fn send(&self, args: fmt::Arguments<'_>) -> Result<(), TraceError> {
        let message = render(args);
        let result = self.push(&message);
        if result.is_err() {
            warn!("trace: queue full, dropped {} bytes", message.len());
        }
        result
    }

    /// Queue a formatted message, spinning until the queue has room.
    ///
    /// A message too long for the empty queue is truncated to what it can
    /// hold. Relies on the completion interrupt to drain the queue; do not
    /// call it from a context that masks that interrupt.
    pub fn send_polling(&self, args: fmt::Arguments<'_>) {
        let message = render(args);
        let capacity = critical_section::with(|cs| self.inner.borrow_ref(cs).queue.capacity());
        let Some(room) = capacity.checked_sub(FRAME_HEADER_LEN) else {
            warn!("trace: queue too small for any frame, dropped {} bytes", message.len());
            return;
        };
        if message.len() > room {
            warn!("trace: truncated {} bytes to {}", message.len(), room);
        }
        let message = &message[..message.len().min(room)];

        while self.push(message).is_err() {
            core::hint::spin_loop();
        }
    }

    /// Queue a message only if `level` is within the channel's verbosity.
    ///
    /// Filtered messages count as sent.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::QueueFull`] when the message passed the filter
    /// but there is no room.
    pub fn send_at(&self, level: Verbosity, args: fmt::Arguments<'_>) -> Result<(), TraceError> {
        if level > self.verbosity() {
            return Ok(());
        }
        self.send(args)
    }

    /// Queue raw bytes as one message
    fn push(&self, message: &[u8]) -> Result<(), TraceError> {
        critical_section::with(|cs| {
            let mut guard = self.inner.borrow_ref_mut(cs);
            let inner = &mut *guard;

            inner
                .queue
                .add(message)
                .map_err(|_| TraceError::QueueFull)?;

            if !inner.in_progress {
                inner.in_progress = true;
                self.lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Disable);
                self.transmit_head(cs, inner);
            }
            Ok(())
        })
    }

    /// Transfer-complete notification from the transmit backend.
    ///
    /// Drops the frame just sent, then starts the next one or releases the
    /// stop-mode veto when nothing is left. A backend may call this from
    /// inside `start_transmit`; the frame is then finished once
    /// `start_transmit` returns.
    pub fn on_transmit_complete(&self) {
        critical_section::with(|cs| {
            let Ok(mut guard) = self.inner.borrow(cs).try_borrow_mut() else {
                self.completion_pending.borrow(cs).set(true);
                return;
            };
            let inner = &mut *guard;

            if !inner.in_progress {
                warn!("trace: completion with no transfer in flight");
                return;
            }

            if self.finish_frame(inner) {
                self.transmit_head(cs, inner);
            }
        });
    }

    /// Hand the head frame to the backend, finishing frames it completes
    /// before returning.
    fn transmit_head(&self, cs: CriticalSection<'_>, inner: &mut Inner<'a, T>) {
        let pending = self.completion_pending.borrow(cs);
        loop {
            let Ok(frame) = inner.queue.peek() else {
                return;
            };
            pending.set(false);
            inner.output.start_transmit(frame);

            if !pending.replace(false) || !self.finish_frame(inner) {
                return;
            }
        }
    }

    /// Drop the frame in flight. Returns whether another frame is waiting.
    fn finish_frame(&self, inner: &mut Inner<'a, T>) -> bool {
        // Cannot fail, the in-flight frame is still queued
        let _ = inner.queue.remove();

        if inner.queue.sense() {
            true
        } else {
            inner.in_progress = false;
            self.lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Enable);
            debug!("trace: drained");
            false
        }
    }

    /// Check if a frame is being transmitted
    #[must_use]
    pub fn is_busy(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).in_progress)
    }

    /// Number of queued frames, including the one in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).queue.len())
    }

    /// Current verbosity threshold
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        critical_section::with(|cs| self.inner.borrow_ref(cs).verbosity)
    }

    /// Change the verbosity threshold
    pub fn set_verbosity(&self, verbosity: Verbosity) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).verbosity = verbosity);
    }

    /// Run `f` with the transmit backend
    pub fn with_output<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs).output))
    }
}

/// Queue a formatted trace message, dropping it if the queue is full.
///
/// ```ignore
/// trace_send!(channel, "rssi={} snr={}", rssi, snr)?;
/// ```
#[macro_export]
macro_rules! trace_send {
    ($channel:expr, $($arg:tt)*) => {
        $channel.send(::core::format_args!($($arg)*))
    };
}

/// Queue a formatted trace message, spinning until there is room
#[macro_export]
macro_rules! trace_poll {
    ($channel:expr, $($arg:tt)*) => {
        $channel.send_polling(::core::format_args!($($arg)*))
    };
}

/// Queue a formatted trace message at a verbosity level
#[macro_export]
macro_rules! trace_verbose {
    ($channel:expr, $level:expr, $($arg:tt)*) => {
        $channel.send_at($level, ::core::format_args!($($arg)*))
    };
}
