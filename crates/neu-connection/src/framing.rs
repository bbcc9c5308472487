//! Recv scratch buffer and the two framing contracts (`stream_consume`,
//! `wait_msg`) that let a driver plugin pull complete protocol frames out of
//! a byte stream without owning the socket itself.

use neu_core::error::{ErrorCode, NeuError, Result};

const INITIAL_CAPACITY: usize = 2048;

/// What a `stream_consume` framer returns for the bytes accumulated so far.
pub enum StreamOutcome {
    /// Consumed this many bytes (`>= 1`); the buffer is compacted past them.
    Consumed(usize),
    /// Not enough bytes yet; wait for more to arrive.
    NeedMore,
    /// The framer detected a protocol violation; force a disconnect.
    Disconnect,
}

/// What a `wait_msg` framer returns after inspecting the bytes read so far.
pub struct WaitOutcome {
    /// Bytes consumed from the front of the buffer.
    pub used: usize,
    /// `0` if the message is complete; `None` to force a disconnect;
    /// otherwise the number of additional bytes still required.
    pub need: Option<usize>,
}

/// Connection-owned recv scratch. Starts at 2 KiB and grows only as far as a
/// declared protocol need demands; never shrinks.
pub struct RecvScratch {
    buf: Vec<u8>,
    filled: usize,
}

impl RecvScratch {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; INITIAL_CAPACITY],
            filled: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// Append freshly-read bytes, growing the backing buffer if the declared
    /// need exceeds current capacity. Declared need beyond
    /// `capacity - offset` is refused rather than grown unboundedly.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        let required = self.filled + data.len();
        if required > self.buf.len() {
            self.buf.resize(required, 0);
        }
        self.buf[self.filled..required].copy_from_slice(data);
        self.filled = required;
        Ok(())
    }

    /// Ensure at least `need` bytes of headroom exist past the current fill,
    /// refusing (connection left unchanged) if that would require growing
    /// past what the protocol declared acceptable via `max_capacity`.
    pub fn reserve_need(&mut self, need: usize, max_capacity: usize) -> Result<()> {
        let required = self.filled + need;
        if required > max_capacity {
            return Err(NeuError::domain(
                ErrorCode::EMsgSize,
                format!("framer requested {need} bytes beyond the {max_capacity} byte cap"),
            ));
        }
        if required > self.buf.len() {
            self.buf.resize(required, 0);
        }
        Ok(())
    }

    /// Drop `n` consumed bytes from the front, sliding the remainder down.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.filled);
        let remaining = self.filled - n;
        self.buf.copy_within(n..self.filled, 0);
        self.filled = remaining;
    }

    /// Run `framer` repeatedly against the accumulated bytes, compacting
    /// after each fully-consumed frame, until it reports `NeedMore`.
    pub fn drive_stream_consume(&mut self, mut framer: impl FnMut(&[u8]) -> StreamOutcome) -> Result<bool> {
        loop {
            match framer(self.as_slice()) {
                StreamOutcome::Consumed(0) => {
                    return Err(NeuError::domain(ErrorCode::EProto, "framer consumed zero bytes"))
                }
                StreamOutcome::Consumed(n) if n <= self.filled => {
                    self.consume(n);
                }
                StreamOutcome::Consumed(n) => {
                    return Err(NeuError::domain(
                        ErrorCode::EProto,
                        format!("framer consumed {n} bytes but only {} buffered", self.filled),
                    ))
                }
                StreamOutcome::NeedMore => return Ok(true),
                StreamOutcome::Disconnect => return Ok(false),
            }
        }
    }
}

impl Default for RecvScratch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_capacity_and_grows_on_demand() {
        let mut s = RecvScratch::new();
        assert_eq!(s.buf.len(), INITIAL_CAPACITY);
        s.append(&vec![1u8; INITIAL_CAPACITY + 10]).unwrap();
        assert_eq!(s.len(), INITIAL_CAPACITY + 10);
    }

    #[test]
    fn reserve_need_refuses_past_cap() {
        let mut s = RecvScratch::new();
        let err = s.reserve_need(10, 5).unwrap_err();
        assert_eq!(err.code(), neu_core::error::ErrorCode::EMsgSize);
    }

    #[test]
    fn consume_compacts_remaining_bytes_to_front() {
        let mut s = RecvScratch::new();
        s.append(&[1, 2, 3, 4]).unwrap();
        s.consume(2);
        assert_eq!(s.as_slice(), &[3, 4]);
    }

    #[test]
    fn drive_stream_consume_handles_multiple_frames_then_waits() {
        let mut s = RecvScratch::new();
        s.append(&[0xAA, 1, 0xAA, 2, 0xAA]).unwrap();
        let mut frames = Vec::new();
        let still_open = s
            .drive_stream_consume(|buf| {
                if buf.len() < 2 {
                    StreamOutcome::NeedMore
                } else {
                    frames.push(buf[1]);
                    StreamOutcome::Consumed(2)
                }
            })
            .unwrap();
        assert!(still_open);
        assert_eq!(frames, vec![1, 2]);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn drive_stream_consume_propagates_disconnect() {
        let mut s = RecvScratch::new();
        s.append(&[0xFF]).unwrap();
        let still_open = s.drive_stream_consume(|_| StreamOutcome::Disconnect).unwrap();
        assert!(!still_open);
    }
}
