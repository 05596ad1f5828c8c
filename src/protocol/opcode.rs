/// First byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// `[0x01, index, h, s, v]`
    SetOne = 0x01,
    /// `[0x02, start, count, (h, s, v) * count]`
    SetRange = 0x02,
    /// `[0x03]` resume the native effect
    ExitManaged = 0x03,
    /// `[0x04, h, s, v]`
    SetAll = 0x04,
    /// `[0x05]`, answered with the LED count
    EnterManaged = 0x05,
    /// `[0x06, h, s, v]` static underglow
    SetUnderglow = 0x06,
    /// `[0x07, index, enable]`
    SetBlink = 0x07,
    /// `[0x08, period_lo, period_hi]`
    SetBlinkPeriod = 0x08,
    /// `[0x09, 0xB0, 0x07]`
    Reboot = 0x09,
    /// `[0x0A, h, s, v]` breathing underglow
    UnderglowBreathe = 0x0A,
    /// `[0xEE, row, col]`, unsolicited, device to host
    KeyEvent = 0xEE,
    /// `[0xF0]`, answered with the LED count
    Ping = 0xF0,
}

impl Opcode {
    pub const ALL: [Opcode; 12] = [
        Opcode::SetOne,
        Opcode::SetRange,
        Opcode::ExitManaged,
        Opcode::SetAll,
        Opcode::EnterManaged,
        Opcode::SetUnderglow,
        Opcode::SetBlink,
        Opcode::SetBlinkPeriod,
        Opcode::Reboot,
        Opcode::UnderglowBreathe,
        Opcode::KeyEvent,
        Opcode::Ping,
    ];

    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::SetOne),
            0x02 => Some(Self::SetRange),
            0x03 => Some(Self::ExitManaged),
            0x04 => Some(Self::SetAll),
            0x05 => Some(Self::EnterManaged),
            0x06 => Some(Self::SetUnderglow),
            0x07 => Some(Self::SetBlink),
            0x08 => Some(Self::SetBlinkPeriod),
            0x09 => Some(Self::Reboot),
            0x0A => Some(Self::UnderglowBreathe),
            0xEE => Some(Self::KeyEvent),
            0xF0 => Some(Self::Ping),
            _ => None,
        }
    }

    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    /// Whether the command writes LED frame state
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::SetOne | Self::SetRange | Self::SetAll | Self::SetBlink | Self::SetBlinkPeriod
        )
    }

    /// Whether the device answers with its LED count in byte 2
    pub const fn reports_led_count(self) -> bool {
        matches!(self, Self::EnterManaged | Self::Ping)
    }
}
