//! Command dispatcher
//!
//! Turns inbound frames into frame state mutations and exactly one
//! response each. The mode machine is small:
//!
//! - `Native -> Managed` on enter-managed, state is reset and the answer
//!   carries the LED count.
//! - `Managed -> Native` on exit-managed, blink flags are cleared.
//! - Mutations are applied only while managed and acknowledged as a no-op
//!   otherwise, so the host never has to track the device mode.

#[cfg(feature = "log")]
use esp_println::println;

use crate::Board;
use crate::channel::FrameReceiver;
use crate::color::Hsv;
use crate::protocol::{Command, Frame, KeyEvent, REBOOT_MAGIC, Response};
use crate::state::{DeviceState, Mode};

/// Animation for the underglow group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderglowEffect {
    Static,
    Breathing,
}

/// Change for the secondary light driver, outside the frame state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderglowRequest {
    pub color: Hsv,
    pub effect: UnderglowEffect,
}

/// Result of dispatching a single frame
///
/// The response must reach the host before `reboot` is acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub response: Response,
    pub underglow: Option<UnderglowRequest>,
    pub reboot: bool,
}

impl Dispatch {
    const fn reply(response: Response) -> Self {
        Self {
            response,
            underglow: None,
            reboot: false,
        }
    }

    const fn underglow(opcode: u8, color: Hsv, effect: UnderglowEffect) -> Self {
        Self {
            response: Response::ok(opcode),
            underglow: Some(UnderglowRequest { color, effect }),
            reboot: false,
        }
    }
}

/// Applies one frame to the device state
///
/// Malformed frames get a failure response and leave the state untouched.
pub fn dispatch<const N: usize>(state: &mut DeviceState<N>, bytes: &[u8]) -> Dispatch {
    let opcode = bytes.first().copied().unwrap_or_default();
    let command = match Command::decode(bytes, state.leds.led_count()) {
        Ok(command) => command,
        Err(_err) => {
            #[cfg(feature = "log")]
            println!("[dispatch] rejected frame 0x{:02X}: {}", opcode, _err);
            return Dispatch::reply(Response::failed(opcode));
        }
    };
    apply(state, command, opcode)
}

fn apply<const N: usize>(state: &mut DeviceState<N>, command: Command, opcode: u8) -> Dispatch {
    let led_count = state.leds.led_count();
    let managed = state.is_managed();

    match command {
        Command::EnterManaged => {
            state.mode = Mode::Managed;
            state.leds.reset();
            Dispatch::reply(Response::with_led_count(opcode, led_count))
        }
        Command::ExitManaged => {
            state.mode = Mode::Native;
            state.leds.clear_blink();
            Dispatch::reply(Response::ok(opcode))
        }
        Command::Ping => Dispatch::reply(Response::with_led_count(opcode, led_count)),
        Command::SetOne { index, color } => {
            if managed {
                state.leds.set_color(usize::from(index), color);
            }
            Dispatch::reply(Response::ok(opcode))
        }
        Command::SetRange { start, colors } => {
            if managed && !state.leds.set_range(usize::from(start), &colors) {
                return Dispatch::reply(Response::failed(opcode));
            }
            Dispatch::reply(Response::ok(opcode))
        }
        Command::SetAll(color) => {
            if managed {
                state.leds.fill(color);
            }
            Dispatch::reply(Response::ok(opcode))
        }
        Command::SetBlink { index, enabled } => {
            if managed {
                state.leds.set_blink(usize::from(index), enabled);
            }
            Dispatch::reply(Response::ok(opcode))
        }
        Command::SetBlinkPeriod(period_ms) => {
            if managed {
                state.leds.set_blink_period(period_ms);
            }
            Dispatch::reply(Response::ok(opcode))
        }
        Command::SetUnderglow(color) => {
            Dispatch::underglow(opcode, color, UnderglowEffect::Static)
        }
        Command::UnderglowBreathe(color) => {
            Dispatch::underglow(opcode, color, UnderglowEffect::Breathing)
        }
        Command::Reboot { magic } => {
            if magic != REBOOT_MAGIC {
                return Dispatch::reply(Response::failed(opcode));
            }
            Dispatch {
                response: Response::ok(opcode),
                underglow: None,
                reboot: true,
            }
        }
    }
}

/// Frame announcing a key press, only produced while managed
pub fn key_event_frame<const N: usize>(state: &DeviceState<N>, event: KeyEvent) -> Option<Frame> {
    state.is_managed().then(|| event.encode())
}

/// Drains the inbound frame queue into the device state
pub struct CommandDispatcher<'a, const SIZE: usize> {
    frames: FrameReceiver<'a, SIZE>,
}

impl<'a, const SIZE: usize> CommandDispatcher<'a, SIZE> {
    pub const fn new(frames: FrameReceiver<'a, SIZE>) -> Self {
        Self { frames }
    }

    /// Dispatch every queued frame (non-blocking)
    ///
    /// Each response is sent before the next frame is looked at. A
    /// confirmed reboot stops processing once its response is out.
    ///
    /// Returns the number of frames handled.
    pub fn process_pending<const N: usize, B: Board>(
        &mut self,
        state: &mut DeviceState<N>,
        board: &mut B,
    ) -> usize {
        let mut handled = 0;
        while let Ok(frame) = self.frames.try_receive() {
            handled += 1;
            let result = dispatch(state, &frame);
            board.send(&result.response.encode());

            if let Some(request) = result.underglow {
                board.set_underglow(request.color, request.effect);
            }
            if result.reboot {
                #[cfg(feature = "log")]
                println!("[dispatch] rebooting to bootloader");
                board.reboot_to_bootloader();
                break;
            }
        }
        handled
    }
}
