//! Raw HID transport via `hidapi`

use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use keylight::{FRAME_LEN, Frame};

use super::{Connector, Transport, TransportError};
use crate::config::UsbIdentity;

/// HID writes carry the report id in front of the frame
const REPORT_ID: u8 = 0x00;

pub struct HidConnector {
    identity: UsbIdentity,
}

impl HidConnector {
    pub fn new(identity: UsbIdentity) -> Self {
        Self { identity }
    }
}

impl Connector for HidConnector {
    fn open(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        let api = HidApi::new().map_err(|err| TransportError::Io(err.to_string()))?;
        let id = &self.identity;

        let mut found = false;
        for info in api.device_list().filter(|info| {
            info.vendor_id() == id.vendor_id
                && info.product_id() == id.product_id
                && info.usage_page() == id.usage_page
                && info.usage() == id.usage
        }) {
            found = true;
            match api.open_path(info.path()) {
                Ok(device) => {
                    log::debug!("opened raw HID interface {:?}", info.path());
                    return Ok(Box::new(HidTransport {
                        device,
                        serial: info.serial_number().map(str::to_owned),
                    }));
                }
                Err(err) => log::debug!("open {:?} failed: {err}", info.path()),
            }
        }

        // Present but not openable means someone else holds it
        Err(if found {
            TransportError::Busy
        } else {
            TransportError::NotFound
        })
    }

    fn describe(&self) -> String {
        format!(
            "raw HID {:04X}:{:04X} page 0x{:04X}",
            self.identity.vendor_id, self.identity.product_id, self.identity.usage_page
        )
    }
}

struct HidTransport {
    device: HidDevice,
    serial: Option<String>,
}

impl Transport for HidTransport {
    fn write(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let mut report = [0u8; FRAME_LEN + 1];
        report[0] = REPORT_ID;
        report[1..].copy_from_slice(frame);
        self.device
            .write(&report)
            .map(|_| ())
            .map_err(|err| TransportError::Io(err.to_string()))
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        let mut frame = [0u8; FRAME_LEN];
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);
        match self.device.read_timeout(&mut frame, timeout_ms) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(frame)),
            Err(err) => Err(TransportError::Io(err.to_string())),
        }
    }

    fn serial_number(&self) -> Option<&str> {
        self.serial.as_deref()
    }
}
