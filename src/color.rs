//! Color types shared by the wire protocol and the render engine.
//!
//! Colors travel over the link in the keyboard's native HSV scale
//! (hue on a 0-255 circle) and are converted to RGB only when a frame
//! is rendered.

use smart_leds::RGB8;
use smart_leds::hsv::{Hsv as SmartHsv, hsv2rgb};

pub type Rgb = RGB8;

/// Color as carried in command frames
///
/// All channels are 0-255, `val == 0` is dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hsv {
    pub hue: u8,
    pub sat: u8,
    pub val: u8,
}

impl Hsv {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(hue: u8, sat: u8, val: u8) -> Self {
        Self { hue, sat, val }
    }

    /// Reads a color from three consecutive payload bytes
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.hue, self.sat, self.val]
    }

    pub const fn is_dark(self) -> bool {
        self.val == 0
    }

    /// Converts to the physical output color space
    pub fn to_rgb(self) -> Rgb {
        if self.is_dark() {
            return Rgb::default();
        }
        hsv2rgb(SmartHsv {
            hue: self.hue,
            sat: self.sat,
            val: self.val,
        })
    }
}

/// Parses comma separated triples such as `"9,255,200"`
impl core::str::FromStr for Hsv {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(|part| part.trim().parse::<u8>());
        let hue = parts.next().ok_or(())?.map_err(|_| ())?;
        let sat = parts.next().ok_or(())?.map_err(|_| ())?;
        let val = parts.next().ok_or(())?.map_err(|_| ())?;
        if parts.next().is_some() {
            return Err(());
        }
        Ok(Self::new(hue, sat, val))
    }
}
