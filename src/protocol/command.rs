use heapless::Vec;

use super::{FRAME_LEN, Frame, InvalidFrame, Opcode};
use crate::color::Hsv;

/// Most colors a single set-range frame can carry
pub const MAX_RANGE_LEN: usize = 9;

/// Confirmation bytes the reboot command must carry
pub const REBOOT_MAGIC: [u8; 2] = [0xB0, 0x07];

/// Host to device command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetOne { index: u8, color: Hsv },
    SetRange {
        start: u8,
        colors: Vec<Hsv, MAX_RANGE_LEN>,
    },
    ExitManaged,
    SetAll(Hsv),
    EnterManaged,
    SetUnderglow(Hsv),
    SetBlink { index: u8, enabled: bool },
    SetBlinkPeriod(u16),
    /// Magic is kept as received, the dispatcher decides whether it confirms
    Reboot { magic: [u8; 2] },
    UnderglowBreathe(Hsv),
    Ping,
}

impl Command {
    /// Builds a set-range command, `None` if `colors` does not fit one frame
    pub fn set_range(start: u8, colors: &[Hsv]) -> Option<Self> {
        let colors = Vec::from_slice(colors).ok()?;
        Some(Self::SetRange { start, colors })
    }

    pub const fn reboot() -> Self {
        Self::Reboot {
            magic: REBOOT_MAGIC,
        }
    }

    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::SetOne { .. } => Opcode::SetOne,
            Self::SetRange { .. } => Opcode::SetRange,
            Self::ExitManaged => Opcode::ExitManaged,
            Self::SetAll(_) => Opcode::SetAll,
            Self::EnterManaged => Opcode::EnterManaged,
            Self::SetUnderglow(_) => Opcode::SetUnderglow,
            Self::SetBlink { .. } => Opcode::SetBlink,
            Self::SetBlinkPeriod(_) => Opcode::SetBlinkPeriod,
            Self::Reboot { .. } => Opcode::Reboot,
            Self::UnderglowBreathe(_) => Opcode::UnderglowBreathe,
            Self::Ping => Opcode::Ping,
        }
    }

    /// Encodes into a zero padded frame
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self) -> Frame {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = self.opcode().as_raw();
        match self {
            Self::SetOne { index, color } => {
                frame[1] = *index;
                frame[2..5].copy_from_slice(&color.to_bytes());
            }
            Self::SetRange { start, colors } => {
                frame[1] = *start;
                frame[2] = colors.len() as u8;
                for (i, color) in colors.iter().enumerate() {
                    let offset = 3 + i * 3;
                    frame[offset..offset + 3].copy_from_slice(&color.to_bytes());
                }
            }
            Self::SetAll(color)
            | Self::SetUnderglow(color)
            | Self::UnderglowBreathe(color) => {
                frame[1..4].copy_from_slice(&color.to_bytes());
            }
            Self::SetBlink { index, enabled } => {
                frame[1] = *index;
                frame[2] = u8::from(*enabled);
            }
            Self::SetBlinkPeriod(period_ms) => {
                frame[1..3].copy_from_slice(&period_ms.to_le_bytes());
            }
            Self::Reboot { magic } => {
                frame[1..3].copy_from_slice(magic);
            }
            Self::ExitManaged | Self::EnterManaged | Self::Ping => {}
        }
        frame
    }

    /// Decodes and validates a frame against the device's LED count
    ///
    /// Index and range payloads that would address past `led_count` are
    /// rejected here, so a decoded command can be applied without further
    /// bounds checks.
    pub fn decode(bytes: &[u8], led_count: u8) -> Result<Self, InvalidFrame> {
        let frame = super::frame_from_slice(bytes)?;
        let raw = frame[0];
        let opcode = Opcode::from_raw(raw).ok_or(InvalidFrame::UnknownOpcode(raw))?;
        let color_at = |offset: usize| Hsv::new(frame[offset], frame[offset + 1], frame[offset + 2]);

        let command = match opcode {
            Opcode::SetOne => {
                let index = frame[1];
                if index >= led_count {
                    return Err(InvalidFrame::OutOfBounds);
                }
                Self::SetOne {
                    index,
                    color: color_at(2),
                }
            }
            Opcode::SetRange => {
                let start = frame[1];
                let count = frame[2];
                if usize::from(count) > MAX_RANGE_LEN
                    || u16::from(start) + u16::from(count) > u16::from(led_count)
                {
                    return Err(InvalidFrame::OutOfBounds);
                }
                let mut colors = Vec::new();
                for i in 0..usize::from(count) {
                    // Capacity was checked against MAX_RANGE_LEN above
                    let _ = colors.push(color_at(3 + i * 3));
                }
                Self::SetRange { start, colors }
            }
            Opcode::ExitManaged => Self::ExitManaged,
            Opcode::SetAll => Self::SetAll(color_at(1)),
            Opcode::EnterManaged => Self::EnterManaged,
            Opcode::SetUnderglow => Self::SetUnderglow(color_at(1)),
            Opcode::SetBlink => {
                let index = frame[1];
                if index >= led_count {
                    return Err(InvalidFrame::OutOfBounds);
                }
                Self::SetBlink {
                    index,
                    enabled: frame[2] != 0,
                }
            }
            Opcode::SetBlinkPeriod => Self::SetBlinkPeriod(u16::from_le_bytes([frame[1], frame[2]])),
            Opcode::Reboot => Self::Reboot {
                magic: [frame[1], frame[2]],
            },
            Opcode::UnderglowBreathe => Self::UnderglowBreathe(color_at(1)),
            Opcode::Ping => Self::Ping,
            // Device to host only, a host never sends it
            Opcode::KeyEvent => return Err(InvalidFrame::UnknownOpcode(raw)),
        };
        Ok(command)
    }
}
