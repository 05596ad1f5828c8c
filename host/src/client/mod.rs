//! Host side protocol client
//!
//! [`KeyboardClient`] owns at most one connection. A connection is a
//! [`Link`] plus the [`Backend`] chosen for it when it was opened: the
//! VialRGB probe runs first and the raw framed protocol is the fallback.
//! The choice is never revisited until the next [`KeyboardClient::connect`].
//!
//! Any transport failure, including a response timeout, drops the
//! connection. Nothing here retries on its own.

use std::fmt;
use std::time::Duration;

use keylight::protocol::InvalidFrame;
use keylight::{Hsv, KeyEvent};
use thiserror::Error;

mod link;
mod raw_hid;
pub(crate) mod vialrgb;

pub use link::Link;
pub use raw_hid::RawHid;
pub use vialrgb::{VIAL_SERIAL_MAGIC, VialRgb};

use crate::transport::{Connector, TransportError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed frame: {0}")]
    Protocol(#[from] InvalidFrame),
    #[error("keyboard rejected command 0x{0:02X}")]
    Rejected(u8),
    #[error("keyboard does not speak this protocol: {0}")]
    Incompatible(String),
    #[error("no keyboard connected")]
    NotConnected,
}

impl ClientError {
    /// Whether a probe failure means "try the next backend"
    fn is_incompatible(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::Timeout)
                | Self::Protocol(_)
                | Self::Rejected(_)
                | Self::Incompatible(_)
        )
    }

    /// Whether the connection can no longer be trusted
    fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    RawHid,
    VialRgb,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawHid => f.write_str("raw HID"),
            Self::VialRgb => f.write_str("VialRGB"),
        }
    }
}

/// One wire encoding of the LED commands
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Capability exchange, returns the per-key LED count
    fn probe(&mut self, link: &mut Link) -> Result<u8, ClientError>;

    fn enter_managed(&mut self, link: &mut Link) -> Result<(), ClientError>;
    fn exit_managed(&mut self, link: &mut Link) -> Result<(), ClientError>;
    fn set_all(&mut self, link: &mut Link, color: Hsv) -> Result<(), ClientError>;
    fn set_one(&mut self, link: &mut Link, index: u8, color: Hsv) -> Result<(), ClientError>;
    fn set_range(&mut self, link: &mut Link, start: u8, colors: &[Hsv]) -> Result<(), ClientError>;
    fn set_blink(&mut self, link: &mut Link, index: u8, enabled: bool) -> Result<(), ClientError>;
    fn set_blink_period(&mut self, link: &mut Link, period_ms: u16) -> Result<(), ClientError>;
    fn set_underglow(&mut self, link: &mut Link, color: Hsv, animated: bool) -> Result<(), ClientError>;
    fn reboot(&mut self, link: &mut Link) -> Result<(), ClientError>;
}

/// "A keyboard that accepts LED commands", whatever backend is behind it
pub trait LedClient {
    fn probe(&mut self) -> Result<u8, ClientError>;
    fn enter_managed(&mut self) -> Result<(), ClientError>;
    fn exit_managed(&mut self) -> Result<(), ClientError>;
    fn set_all(&mut self, color: Hsv) -> Result<(), ClientError>;
    fn set_one(&mut self, index: u8, color: Hsv) -> Result<(), ClientError>;
    fn set_range(&mut self, start: u8, colors: &[Hsv]) -> Result<(), ClientError>;
    fn set_blink(&mut self, index: u8, enabled: bool) -> Result<(), ClientError>;
    fn set_blink_period(&mut self, period_ms: u16) -> Result<(), ClientError>;
    fn set_underglow(&mut self, color: Hsv, animated: bool) -> Result<(), ClientError>;
    /// Restarts the keyboard into its bootloader, the link is gone afterwards
    fn reboot(&mut self) -> Result<(), ClientError>;
    fn poll_key_event(&mut self) -> Result<Option<KeyEvent>, ClientError>;
}

struct Connection {
    link: Link,
    backend: Box<dyn Backend>,
    led_count: u8,
}

pub struct KeyboardClient {
    connector: Box<dyn Connector>,
    timeout: Duration,
    connection: Option<Connection>,
}

impl KeyboardClient {
    pub fn new(connector: Box<dyn Connector>, timeout: Duration) -> Self {
        Self {
            connector,
            timeout,
            connection: None,
        }
    }

    /// Opens the link and negotiates the backend for this connection
    ///
    /// An existing connection is dropped first.
    pub fn connect(&mut self) -> Result<BackendKind, ClientError> {
        self.disconnect();
        let transport = self.connector.open()?;
        let mut link = Link::new(transport, self.timeout);

        let (backend, led_count) = negotiate(&mut link)?;
        let kind = backend.kind();
        log::info!(
            "connected to {} over {kind} ({led_count} LEDs)",
            self.connector.describe()
        );
        self.connection = Some(Connection {
            link,
            backend,
            led_count,
        });
        Ok(kind)
    }

    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            log::debug!("disconnected from {}", self.connector.describe());
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn backend(&self) -> Option<BackendKind> {
        self.connection.as_ref().map(|conn| conn.backend.kind())
    }

    pub fn led_count(&self) -> Option<u8> {
        self.connection.as_ref().map(|conn| conn.led_count)
    }

    fn with<R>(
        &mut self,
        op: impl FnOnce(&mut dyn Backend, &mut Link) -> Result<R, ClientError>,
    ) -> Result<R, ClientError> {
        let conn = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        let result = op(conn.backend.as_mut(), &mut conn.link);
        if let Err(err) = &result {
            if err.is_fatal() {
                log::warn!("dropping connection: {err}");
                self.connection = None;
            }
        }
        result
    }
}

fn negotiate(link: &mut Link) -> Result<(Box<dyn Backend>, u8), ClientError> {
    if vialrgb::advertises_vial(link.serial_number()) {
        let mut vialrgb = VialRgb::default();
        match vialrgb.probe(link) {
            Ok(count) => return Ok((Box::new(vialrgb), count)),
            Err(err) if err.is_incompatible() => {
                log::debug!("VialRGB probe failed ({err}), falling back to raw HID");
            }
            Err(err) => return Err(err),
        }
    } else {
        log::debug!("interface does not advertise Vial, skipping the VialRGB probe");
    }

    let mut raw = RawHid;
    let count = raw.probe(link)?;
    Ok((Box::new(raw), count))
}

impl LedClient for KeyboardClient {
    fn probe(&mut self) -> Result<u8, ClientError> {
        let count = self.with(|backend, link| backend.probe(link))?;
        if let Some(conn) = self.connection.as_mut() {
            conn.led_count = count;
        }
        Ok(count)
    }

    fn enter_managed(&mut self) -> Result<(), ClientError> {
        self.with(|backend, link| backend.enter_managed(link))
    }

    fn exit_managed(&mut self) -> Result<(), ClientError> {
        self.with(|backend, link| backend.exit_managed(link))
    }

    fn set_all(&mut self, color: Hsv) -> Result<(), ClientError> {
        self.with(|backend, link| backend.set_all(link, color))
    }

    fn set_one(&mut self, index: u8, color: Hsv) -> Result<(), ClientError> {
        self.with(|backend, link| backend.set_one(link, index, color))
    }

    fn set_range(&mut self, start: u8, colors: &[Hsv]) -> Result<(), ClientError> {
        self.with(|backend, link| backend.set_range(link, start, colors))
    }

    fn set_blink(&mut self, index: u8, enabled: bool) -> Result<(), ClientError> {
        self.with(|backend, link| backend.set_blink(link, index, enabled))
    }

    fn set_blink_period(&mut self, period_ms: u16) -> Result<(), ClientError> {
        self.with(|backend, link| backend.set_blink_period(link, period_ms))
    }

    fn set_underglow(&mut self, color: Hsv, animated: bool) -> Result<(), ClientError> {
        self.with(|backend, link| backend.set_underglow(link, color, animated))
    }

    fn reboot(&mut self) -> Result<(), ClientError> {
        self.with(|backend, link| backend.reboot(link))?;
        self.disconnect();
        Ok(())
    }

    fn poll_key_event(&mut self) -> Result<Option<KeyEvent>, ClientError> {
        self.with(|_, link| link.poll_key_event())
    }
}
