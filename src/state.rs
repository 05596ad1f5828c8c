//! LED frame state owned by the device
//!
//! Written only by the command dispatcher, read only by the renderer.
//! Both take it by reference from the same owner, so a render tick can
//! never observe a command half applied.

use crate::color::Hsv;

/// Blink period used until the host sets one, in milliseconds
pub const DEFAULT_BLINK_PERIOD_MS: u16 = 500;

/// Shortest blink period the device accepts, in milliseconds
pub const MIN_BLINK_PERIOD_MS: u16 = 50;

/// Who governs the per-key LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The device's own effect runs, frame state is ignored
    #[default]
    Native,
    /// The host owns the LEDs through the frame state
    Managed,
}

/// Colors and blink flags for `N` per-key LEDs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedFrameState<const N: usize> {
    colors: [Hsv; N],
    blink_mask: u64,
    blink_period_ms: u16,
}

impl<const N: usize> LedFrameState<N> {
    const CAPACITY_CHECK: () = assert!(N > 0 && N <= 64, "blink mask holds at most 64 LEDs");

    /// All black, nothing blinking, default period
    pub const fn new() -> Self {
        let () = Self::CAPACITY_CHECK;
        Self {
            colors: [Hsv::BLACK; N],
            blink_mask: 0,
            blink_period_ms: DEFAULT_BLINK_PERIOD_MS,
        }
    }

    /// Restores the freshly created state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[allow(clippy::cast_possible_truncation)]
    pub const fn led_count(&self) -> u8 {
        N as u8
    }

    pub fn colors(&self) -> &[Hsv; N] {
        &self.colors
    }

    pub fn color(&self, index: usize) -> Option<Hsv> {
        self.colors.get(index).copied()
    }

    pub fn set_color(&mut self, index: usize, color: Hsv) -> bool {
        let Some(slot) = self.colors.get_mut(index) else {
            return false;
        };
        *slot = color;
        true
    }

    pub fn fill(&mut self, color: Hsv) {
        self.colors = [color; N];
    }

    /// Writes a contiguous run of colors, all or nothing
    pub fn set_range(&mut self, start: usize, colors: &[Hsv]) -> bool {
        let Some(end) = start.checked_add(colors.len()) else {
            return false;
        };
        let Some(target) = self.colors.get_mut(start..end) else {
            return false;
        };
        target.copy_from_slice(colors);
        true
    }

    pub const fn is_blinking(&self, index: usize) -> bool {
        index < N && self.blink_mask & (1 << index) != 0
    }

    pub const fn blink_mask(&self) -> u64 {
        self.blink_mask
    }

    pub fn set_blink(&mut self, index: usize, enabled: bool) -> bool {
        if index >= N {
            return false;
        }
        if enabled {
            self.blink_mask |= 1 << index;
        } else {
            self.blink_mask &= !(1 << index);
        }
        true
    }

    pub fn clear_blink(&mut self) {
        self.blink_mask = 0;
    }

    pub const fn blink_period_ms(&self) -> u16 {
        self.blink_period_ms
    }

    /// Stores the period, raising it to [`MIN_BLINK_PERIOD_MS`] if shorter
    pub fn set_blink_period(&mut self, period_ms: u16) {
        self.blink_period_ms = period_ms.max(MIN_BLINK_PERIOD_MS);
    }
}

impl<const N: usize> Default for LedFrameState<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Operating mode together with the frame state it gates
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceState<const N: usize> {
    pub mode: Mode,
    pub leds: LedFrameState<N>,
}

impl<const N: usize> DeviceState<N> {
    pub const fn new() -> Self {
        Self {
            mode: Mode::Native,
            leds: LedFrameState::new(),
        }
    }

    pub const fn is_managed(&self) -> bool {
        matches!(self.mode, Mode::Managed)
    }
}
