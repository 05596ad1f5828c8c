//! Command codec
//!
//! Every message on the link is a single [`FRAME_LEN`] byte block. The
//! first byte is an [`Opcode`], the rest is opcode specific payload padded
//! with zeros. The device answers each command with exactly one response
//! frame that echoes the opcode in byte 0 and carries a status in byte 1.
//! The only frame not sent in reply to a command is the key event.
//!
//! Encoding is total. Decoding returns [`InvalidFrame`] and never touches
//! device state; what to answer is up to the caller.

mod command;
mod opcode;

pub use command::{Command, MAX_RANGE_LEN, REBOOT_MAGIC};
pub use opcode::Opcode;

/// Length of every command, response and notification frame
pub const FRAME_LEN: usize = 32;

pub type Frame = [u8; FRAME_LEN];

const STATUS_OK: u8 = 0x01;
const STATUS_FAILED: u8 = 0xFF;

/// Reason a frame was rejected by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidFrame {
    /// Frame was not exactly [`FRAME_LEN`] bytes
    Length(usize),
    /// Opcode outside the command set
    UnknownOpcode(u8),
    /// Index or range addresses past the LED count
    OutOfBounds,
    /// Response status byte is neither success nor failure
    Status(u8),
}

impl core::fmt::Display for InvalidFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Length(len) => write!(f, "frame is {len} bytes, expected {FRAME_LEN}"),
            Self::UnknownOpcode(raw) => write!(f, "unknown opcode 0x{raw:02X}"),
            Self::OutOfBounds => f.write_str("LED index out of bounds"),
            Self::Status(raw) => write!(f, "invalid status byte 0x{raw:02X}"),
        }
    }
}

impl core::error::Error for InvalidFrame {}

/// Copies a byte slice into a frame, rejecting any other length
pub fn frame_from_slice(bytes: &[u8]) -> Result<Frame, InvalidFrame> {
    bytes
        .try_into()
        .map_err(|_| InvalidFrame::Length(bytes.len()))
}

/// Pads a short message to a full frame, `None` if it is too long
pub fn pad(bytes: &[u8]) -> Option<Frame> {
    if bytes.len() > FRAME_LEN {
        return None;
    }
    let mut frame = [0u8; FRAME_LEN];
    frame[..bytes.len()].copy_from_slice(bytes);
    Some(frame)
}

/// Byte 1 of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `0x01`, applied or acknowledged as a no-op
    Ok,
    /// `0xFF`, rejected without touching the state
    Failed,
}

/// Device answer to a single command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Opcode of the command being answered, echoed as received
    pub opcode: u8,
    pub status: Status,
    /// Byte 2, the LED count for enter-managed and ping
    pub detail: u8,
}

impl Response {
    /// Success with no detail
    pub const fn ok(opcode: u8) -> Self {
        Self {
            opcode,
            status: Status::Ok,
            detail: 0,
        }
    }

    /// Generic failure, also used for unknown opcodes
    pub const fn failed(opcode: u8) -> Self {
        Self {
            opcode,
            status: Status::Failed,
            detail: 0,
        }
    }

    /// Success answer to enter-managed or ping
    pub const fn with_led_count(opcode: u8, led_count: u8) -> Self {
        Self {
            opcode,
            status: Status::Ok,
            detail: led_count,
        }
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok)
    }

    /// LED count carried by a successful capability answer
    pub fn led_count(&self) -> Option<u8> {
        let reports = Opcode::from_raw(self.opcode).is_some_and(Opcode::reports_led_count);
        (reports && self.is_ok()).then_some(self.detail)
    }

    /// Zero padded response frame
    pub fn encode(&self) -> Frame {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = self.opcode;
        frame[1] = match self.status {
            Status::Ok => STATUS_OK,
            Status::Failed => STATUS_FAILED,
        };
        frame[2] = self.detail;
        frame
    }

    /// Parses a device answer, any status byte other than `0x01`/`0xFF` is invalid
    pub fn decode(bytes: &[u8]) -> Result<Self, InvalidFrame> {
        let frame = frame_from_slice(bytes)?;
        let status = match frame[1] {
            STATUS_OK => Status::Ok,
            STATUS_FAILED => Status::Failed,
            other => return Err(InvalidFrame::Status(other)),
        };
        Ok(Self {
            opcode: frame[0],
            status,
            detail: frame[2],
        })
    }
}

/// Physical key position reported while the device is managed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub row: u8,
    pub col: u8,
}

impl KeyEvent {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn encode(&self) -> Frame {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = Opcode::KeyEvent.as_raw();
        frame[1] = self.row;
        frame[2] = self.col;
        frame
    }
}

/// Any frame a host can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Response(Response),
    KeyEvent(KeyEvent),
}

impl Inbound {
    /// Splits unsolicited notifications from command answers by opcode
    pub fn decode(bytes: &[u8]) -> Result<Self, InvalidFrame> {
        let frame = frame_from_slice(bytes)?;
        if frame[0] == Opcode::KeyEvent.as_raw() {
            return Ok(Self::KeyEvent(KeyEvent::new(frame[1], frame[2])));
        }
        Response::decode(&frame).map(Self::Response)
    }
}
