//! Request/response matching on a shared duplex link
//!
//! The keyboard may push a key event at any moment, so a reply is found
//! by its opcode rather than by position. Key events seen while waiting
//! are kept for [`Link::poll_key_event`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use keylight::protocol::{InvalidFrame, pad};
use keylight::{Frame, KeyEvent, Opcode};

use super::ClientError;
use crate::transport::{Transport, TransportError};

/// How long a key event poll may block
const KEY_POLL_TIMEOUT: Duration = Duration::from_millis(5);

pub struct Link {
    transport: Box<dyn Transport>,
    timeout: Duration,
    pending_keys: VecDeque<KeyEvent>,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            pending_keys: VecDeque::new(),
        }
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.transport.serial_number()
    }

    /// Sends one message and blocks until the reply with the same first
    /// byte arrives or the response timeout runs out
    pub fn request(&mut self, message: &[u8]) -> Result<Frame, ClientError> {
        let frame = pad(message).ok_or(InvalidFrame::Length(message.len()))?;
        let expected = frame[0];
        self.transport.write(&frame)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout.into());
            }
            let Some(reply) = self.transport.read(remaining)? else {
                return Err(TransportError::Timeout.into());
            };
            if self.stash_key_event(&reply) {
                continue;
            }
            if reply[0] == expected {
                return Ok(reply);
            }
            log::debug!(
                "discarding reply 0x{:02X} while waiting for 0x{expected:02X}",
                reply[0]
            );
        }
    }

    /// Oldest key event not yet handed out, without waiting for one
    pub fn poll_key_event(&mut self) -> Result<Option<KeyEvent>, ClientError> {
        if let Some(event) = self.pending_keys.pop_front() {
            return Ok(Some(event));
        }
        if let Some(frame) = self.transport.read(KEY_POLL_TIMEOUT)? {
            if !self.stash_key_event(&frame) {
                log::debug!("discarding unsolicited frame 0x{:02X}", frame[0]);
            }
        }
        Ok(self.pending_keys.pop_front())
    }

    fn stash_key_event(&mut self, frame: &Frame) -> bool {
        if frame[0] != Opcode::KeyEvent.as_raw() {
            return false;
        }
        self.pending_keys.push_back(KeyEvent::new(frame[1], frame[2]));
        true
    }
}
