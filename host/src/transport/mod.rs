//! Byte level link to the keyboard
//!
//! A transport moves whole 32 byte frames and nothing else. It knows
//! nothing about opcodes, the client layer above does the matching.

use std::time::Duration;

use keylight::Frame;
use thiserror::Error;

pub mod emulated;
#[cfg(feature = "hid")]
pub mod hid;

pub use emulated::{Dialect, EmulatedDevice};
#[cfg(feature = "hid")]
pub use hid::HidConnector;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no matching keyboard found")]
    NotFound,
    #[error("keyboard is held by another process")]
    Busy,
    #[error("timed out waiting for the keyboard")]
    Timeout,
    #[error("link i/o failed: {0}")]
    Io(String),
    #[error("keyboard disconnected")]
    Disconnected,
}

/// Exclusive, framed duplex channel to one device
pub trait Transport: Send {
    fn write(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Blocks for at most `timeout`, `Ok(None)` once it has elapsed
    fn read(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError>;

    /// USB serial number of the open interface, if it reports one
    fn serial_number(&self) -> Option<&str> {
        None
    }
}

/// Opens a fresh transport for every connection attempt
pub trait Connector: Send {
    fn open(&mut self) -> Result<Box<dyn Transport>, TransportError>;

    /// Human readable target, used in logs
    fn describe(&self) -> String;
}
