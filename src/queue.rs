//! Circular Frame Queue
//!
//! Fixed-capacity ring of variable-length frames over caller-owned storage.
//!
//! Every frame is stored as a 2-byte big-endian length followed by the
//! payload. A payload that would run past the end of the storage is split
//! into two frames, the first filling the tail and the second starting at
//! offset 0, so that [`FrameQueue::peek`] can always hand out one
//! contiguous slice.
//!
//! ```text
//!  0                                                      capacity
//!  ┌────┬──────────┬────┬───────┬─────────────┬────┬──────────────┐
//!  │len │ payload  │len │payload│    free     │len │ payload      │
//!  └────┴──────────┴────┴───────┴─────────────┴────┴──────────────┘
//!                                ^ write       ^ read
//! ```

use core::fmt;

use crate::config::FRAME_HEADER_LEN;

/// Queue operation errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// Not enough free space for the frame
    Full,
    /// No frame stored
    Empty,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "queue full"),
            Self::Empty => write!(f, "queue empty"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for QueueError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Full => defmt::write!(f, "FULL"),
            Self::Empty => defmt::write!(f, "EMPTY"),
        }
    }
}

/// Circular queue of length-prefixed frames
pub struct FrameQueue<'a> {
    buffer: &'a mut [u8],
    read_idx: usize,
    write_idx: usize,
    count: usize,
    /// Set when `write_idx` caught up with `read_idx` on insert
    full: bool,
}

impl<'a> FrameQueue<'a> {
    /// Create an empty queue over `buffer`.
    ///
    /// The buffer must be non-empty and no longer than `u16::MAX` bytes.
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        debug_assert!(!buffer.is_empty(), "queue storage must not be empty");
        debug_assert!(buffer.len() <= usize::from(u16::MAX), "queue storage too large");
        Self {
            buffer,
            read_idx: 0,
            write_idx: 0,
            count: 0,
            full: false,
        }
    }

    /// Storage size in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of stored frames (a split payload counts twice)
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Check if no frame is stored
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if the write index has caught up with the read index
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.full
    }

    /// Check whether a frame is waiting
    #[must_use]
    pub const fn sense(&self) -> bool {
        self.count > 0
    }

    /// Free bytes, headers included
    #[must_use]
    pub fn free_space(&self) -> usize {
        if self.full {
            0
        } else if self.write_idx >= self.read_idx {
            self.capacity() - (self.write_idx - self.read_idx)
        } else {
            self.read_idx - self.write_idx
        }
    }

    /// Append `data` as one frame, or two when it wraps past the end.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] without touching the queue when the
    /// payload and its header(s) do not fit.
    pub fn add(&mut self, data: &[u8]) -> Result<(), QueueError> {
        if data.len() > usize::from(u16::MAX) {
            return Err(QueueError::Full);
        }

        let capacity = self.capacity();
        let free = self.free_space();
        let needed = data.len() + FRAME_HEADER_LEN;

        // Single frame: payload ends before the top, or the header itself
        // wraps so the payload starts at the bottom.
        if needed <= free
            && (self.write_idx + needed <= capacity
                || self.write_idx >= capacity.saturating_sub(FRAME_HEADER_LEN))
        {
            self.push_frame(data);
            self.count += 1;
        } else if needed + FRAME_HEADER_LEN <= free {
            let top_size = capacity - (self.write_idx + FRAME_HEADER_LEN);
            let (top, bottom) = data.split_at(top_size);
            self.push_frame(top);
            self.push_frame(bottom);
            self.count += 2;
            trace!("queue: split {} bytes at top ({} + {})", data.len(), top.len(), bottom.len());
        } else {
            return Err(QueueError::Full);
        }

        if self.write_idx == self.read_idx {
            self.full = true;
        }
        Ok(())
    }

    /// Borrow the payload of the oldest frame.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Empty`] when no frame is stored.
    pub fn peek(&self) -> Result<&[u8], QueueError> {
        if self.count == 0 {
            return Err(QueueError::Empty);
        }
        let (len, start) = self.decode_header(self.read_idx);
        Ok(&self.buffer[start..start + len])
    }

    /// Drop the oldest frame.
    ///
    /// Removing the last frame rewinds both indices to the start of the
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Empty`] when no frame is stored.
    pub fn remove(&mut self) -> Result<(), QueueError> {
        if self.count == 0 {
            return Err(QueueError::Empty);
        }
        let (len, start) = self.decode_header(self.read_idx);
        self.read_idx = self.wrap(start + len);
        self.count -= 1;
        self.full = false;

        if self.count == 0 {
            self.read_idx = 0;
            self.write_idx = 0;
        }
        Ok(())
    }

    /// Write a header and a contiguous payload at the write index
    #[allow(clippy::cast_possible_truncation)] // `add` bounds payloads to u16
    fn push_frame(&mut self, payload: &[u8]) {
        let [hi, lo] = (payload.len() as u16).to_be_bytes();
        self.push_byte(hi);
        self.push_byte(lo);

        let start = self.write_idx;
        self.buffer[start..start + payload.len()].copy_from_slice(payload);
        self.write_idx = self.wrap(start + payload.len());
    }

    fn push_byte(&mut self, byte: u8) {
        self.buffer[self.write_idx] = byte;
        self.write_idx = self.wrap(self.write_idx + 1);
    }

    /// Returns the payload length and payload start of the frame at `idx`
    fn decode_header(&self, idx: usize) -> (usize, usize) {
        let hi = self.buffer[idx];
        let idx = self.wrap(idx + 1);
        let lo = self.buffer[idx];
        let start = self.wrap(idx + 1);
        (usize::from(u16::from_be_bytes([hi, lo])), start)
    }

    fn wrap(&self, idx: usize) -> usize {
        if idx == self.capacity() {
            0
        } else {
            idx
        }
    }
}

impl fmt::Debug for FrameQueue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("capacity", &self.capacity())
            .field("read_idx", &self.read_idx)
            .field("write_idx", &self.write_idx)
            .field("count", &self.count)
            .field("full", &self.full)
            .finish()
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FrameQueue<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Queue(r={}, w={}, n={}, free={})",
            self.read_idx,
            self.write_idx,
            self.count,
            self.free_space()
        );
    }
}
