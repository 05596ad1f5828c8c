use embassy_time::Instant;

use crate::color::Rgb;
use crate::state::{DeviceState, Mode};

/// Output of one render tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderedFrame<'a> {
    /// Device is not managed, the native effect owns the LEDs
    Native,
    /// Colors for every per-key LED, in index order
    Managed(&'a [Rgb]),
}

/// Whether a blinking LED is lit at `now`
///
/// The first half of every period is on, the second half is off.
pub fn blink_phase_on(now: Instant, period_ms: u16) -> bool {
    let period = u64::from(period_ms);
    if period == 0 {
        return true;
    }
    now.as_millis() % period < period / 2
}

/// Render engine - samples frame state once per tick
///
/// It never sees commands, only the state they left behind, so
/// blinking and color changes stay smooth however the host batches its
/// writes.
pub struct Renderer<const N: usize> {
    frame_buffer: [Rgb; N],
}

impl<const N: usize> Renderer<N> {
    pub const fn new() -> Self {
        Self {
            frame_buffer: [Rgb { r: 0, g: 0, b: 0 }; N],
        }
    }

    /// Produce the frame for `now`
    pub fn render(&mut self, state: &DeviceState<N>, now: Instant) -> RenderedFrame<'_> {
        if state.mode == Mode::Native {
            return RenderedFrame::Native;
        }

        let leds = &state.leds;
        let blink_on = blink_phase_on(now, leds.blink_period_ms());
        for (index, (out, color)) in self
            .frame_buffer
            .iter_mut()
            .zip(leds.colors())
            .enumerate()
        {
            *out = if leds.is_blinking(index) && !blink_on {
                Rgb::default()
            } else {
                color.to_rgb()
            };
        }

        RenderedFrame::Managed(&self.frame_buffer)
    }
}

impl<const N: usize> Default for Renderer<N> {
    fn default() -> Self {
        Self::new()
    }
}
