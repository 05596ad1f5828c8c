//! VialRGB lighting over the VIA command set
//!
//! Devices built with VialRGB expose direct per-LED control through the
//! VIA lighting get/set commands. There is no blink, no underglow and no
//! key event in this protocol.

use keylight::Hsv;

use super::{Backend, BackendKind, ClientError, Link};

/// Vial firmware puts this in its USB serial number
pub const VIAL_SERIAL_MAGIC: &str = "vial:f64c2b3c";

/// Whether an interface advertises Vial, the only place the VIA probe is safe
///
/// The probe bytes are valid raw commands (set-one, set-blink-period), so
/// sending them to other firmware would change its LEDs.
pub fn advertises_vial(serial: Option<&str>) -> bool {
    serial.is_some_and(|serial| serial.contains(VIAL_SERIAL_MAGIC))
}

pub(crate) const VIA_GET_PROTOCOL_VERSION: u8 = 0x01;
pub(crate) const VIA_LIGHTING_SET_VALUE: u8 = 0x07;
pub(crate) const VIA_LIGHTING_GET_VALUE: u8 = 0x08;
pub(crate) const VIA_UNHANDLED: u8 = 0xFF;

pub(crate) const VIALRGB_GET_INFO: u8 = 0x40;
pub(crate) const VIALRGB_SET_MODE: u8 = 0x41;
pub(crate) const VIALRGB_DIRECT_FASTSET: u8 = 0x42;
pub(crate) const VIALRGB_GET_NUMBER_LEDS: u8 = 0x43;

pub(crate) const VIALRGB_EFFECT_OFF: u16 = 0;
pub(crate) const VIALRGB_EFFECT_DIRECT: u16 = 1;

/// Oldest VIA protocol with VialRGB support
pub(crate) const MIN_VIA_VERSION: u16 = 9;
pub(crate) const VIALRGB_VERSION: u16 = 1;

/// Colors per fast-set message
const FASTSET_MAX: usize = 9;

/// Speed and color for the set-mode message, ignored by the direct effect
const MODE_PARAM: u8 = 128;

#[derive(Debug, Default)]
pub struct VialRgb {
    led_count: u8,
}

impl VialRgb {
    fn set_mode(link: &mut Link, mode: u16) -> Result<(), ClientError> {
        let [lo, hi] = mode.to_le_bytes();
        link.request(&[
            VIA_LIGHTING_SET_VALUE,
            VIALRGB_SET_MODE,
            lo,
            hi,
            MODE_PARAM,
            MODE_PARAM,
            MODE_PARAM,
            MODE_PARAM,
        ])?;
        Ok(())
    }

    fn fast_set(link: &mut Link, start: u16, colors: &[Hsv]) -> Result<(), ClientError> {
        for (chunk_index, chunk) in colors.chunks(FASTSET_MAX).enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let first = start + (chunk_index * FASTSET_MAX) as u16;
            let [lo, hi] = first.to_le_bytes();
            #[allow(clippy::cast_possible_truncation)]
            let mut message = vec![
                VIA_LIGHTING_SET_VALUE,
                VIALRGB_DIRECT_FASTSET,
                lo,
                hi,
                chunk.len() as u8,
            ];
            for color in chunk {
                message.extend_from_slice(&color.to_bytes());
            }
            link.request(&message)?;
        }
        Ok(())
    }

    fn get_value(link: &mut Link, id: u8) -> Result<u16, ClientError> {
        let reply = link.request(&[VIA_LIGHTING_GET_VALUE, id])?;
        if reply[1] != id {
            return Err(ClientError::Incompatible(format!(
                "lighting value 0x{id:02X} answered as 0x{:02X}",
                reply[1]
            )));
        }
        Ok(u16::from_le_bytes([reply[2], reply[3]]))
    }
}

impl Backend for VialRgb {
    fn kind(&self) -> BackendKind {
        BackendKind::VialRgb
    }

    fn probe(&mut self, link: &mut Link) -> Result<u8, ClientError> {
        let reply = link.request(&[VIA_GET_PROTOCOL_VERSION])?;
        let version = u16::from_be_bytes([reply[1], reply[2]]);
        if version < MIN_VIA_VERSION {
            return Err(ClientError::Incompatible(format!(
                "VIA protocol {version} is older than {MIN_VIA_VERSION}"
            )));
        }

        let info = Self::get_value(link, VIALRGB_GET_INFO)?;
        if info != VIALRGB_VERSION {
            return Err(ClientError::Incompatible(format!(
                "VialRGB version {info}, expected {VIALRGB_VERSION}"
            )));
        }

        let count = Self::get_value(link, VIALRGB_GET_NUMBER_LEDS)?;
        self.led_count = u8::try_from(count).unwrap_or(u8::MAX);
        Ok(self.led_count)
    }

    fn enter_managed(&mut self, link: &mut Link) -> Result<(), ClientError> {
        Self::set_mode(link, VIALRGB_EFFECT_DIRECT)
    }

    fn exit_managed(&mut self, link: &mut Link) -> Result<(), ClientError> {
        Self::set_mode(link, VIALRGB_EFFECT_OFF)
    }

    fn set_all(&mut self, link: &mut Link, color: Hsv) -> Result<(), ClientError> {
        let colors = vec![color; usize::from(self.led_count)];
        Self::fast_set(link, 0, &colors)
    }

    fn set_one(&mut self, link: &mut Link, index: u8, color: Hsv) -> Result<(), ClientError> {
        Self::fast_set(link, u16::from(index), &[color])
    }

    fn set_range(&mut self, link: &mut Link, start: u8, colors: &[Hsv]) -> Result<(), ClientError> {
        Self::fast_set(link, u16::from(start), colors)
    }

    fn set_blink(&mut self, _link: &mut Link, index: u8, _enabled: bool) -> Result<(), ClientError> {
        log::trace!("VialRGB has no blink, ignoring LED {index}");
        Ok(())
    }

    fn set_blink_period(&mut self, _link: &mut Link, _period_ms: u16) -> Result<(), ClientError> {
        Ok(())
    }

    fn set_underglow(&mut self, _link: &mut Link, _color: Hsv, _animated: bool) -> Result<(), ClientError> {
        Ok(())
    }

    fn reboot(&mut self, _link: &mut Link) -> Result<(), ClientError> {
        Err(ClientError::Incompatible(
            "VialRGB has no reboot command".to_owned(),
        ))
    }
}
