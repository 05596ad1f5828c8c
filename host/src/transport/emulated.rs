//! In-process keyboard
//!
//! Runs the real device loop (frame inbox, dispatcher, renderer) behind
//! the [`Transport`] seam, so the daemon and the tests can drive every
//! command path without hardware. The device can also speak the VialRGB
//! dialect, translated onto the same firmware core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use keylight::protocol::{Command, Response};
use keylight::{
    Board, DeviceState, Frame, FrameInbox, FrameScheduler, FrameSender, Hsv, Instant,
    OutputDriver, Rgb, UnderglowEffect,
};

use super::{Connector, Transport, TransportError};
use crate::client::vialrgb;

/// Per-key LEDs on the reference keyboard
pub const LED_COUNT: usize = 12;

const INBOX_SIZE: usize = 8;

/// Which firmware build the emulated keyboard runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Minimal framed protocol
    #[default]
    RawHid,
    /// VIA lighting sub-protocol, no blink, no underglow, no key events
    VialRgb,
}

/// Cloneable handle, every clone sees the same device
#[derive(Clone)]
pub struct EmulatedDevice {
    firmware: Arc<Mutex<Firmware>>,
}

#[derive(Default)]
struct Panel {
    frame: Vec<Rgb>,
}

impl OutputDriver for Panel {
    fn write(&mut self, colors: &[Rgb]) {
        self.frame.clear();
        self.frame.extend_from_slice(colors);
    }

    fn release(&mut self) {
        self.frame.clear();
    }
}

#[derive(Default)]
struct EmulatedBoard {
    sent: Vec<Frame>,
    underglow: Option<(Hsv, UnderglowEffect)>,
    reboots: usize,
}

impl Board for EmulatedBoard {
    fn send(&mut self, frame: &Frame) {
        self.sent.push(*frame);
    }

    fn set_underglow(&mut self, color: Hsv, effect: UnderglowEffect) {
        self.underglow = Some((color, effect));
    }

    fn reboot_to_bootloader(&mut self) {
        self.reboots += 1;
    }
}

struct Firmware {
    dialect: Dialect,
    scheduler: FrameScheduler<'static, Panel, LED_COUNT, INBOX_SIZE>,
    inbox: FrameSender<'static, INBOX_SIZE>,
    board: EmulatedBoard,
    to_host: VecDeque<Frame>,
    written: Vec<Frame>,
    stalled: usize,
    /// Raw opcode answered with a failure status instead of being run
    rejected: Option<u8>,
    serial: Option<String>,
    open: bool,
    unplugged: bool,
    /// Bumped on every unplug, links from before are dead
    generation: u32,
}

impl Firmware {
    fn new(dialect: Dialect) -> Self {
        // The scheduler borrows its inbox for 'static, so each device leaks
        // one inbox (a few hundred bytes). The CLI builds a single device per
        // process and never rebuilds it, only tests create more.
        let inbox: &'static FrameInbox<INBOX_SIZE> = Box::leak(Box::new(FrameInbox::new()));
        Self {
            dialect,
            scheduler: FrameScheduler::new(inbox.receiver(), Panel::default()),
            inbox: inbox.sender(),
            board: EmulatedBoard::default(),
            to_host: VecDeque::new(),
            written: Vec::new(),
            stalled: 0,
            rejected: None,
            serial: match dialect {
                Dialect::RawHid => None,
                Dialect::VialRgb => Some(format!("{}:emulated", vialrgb::VIAL_SERIAL_MAGIC)),
            },
            open: false,
            unplugged: false,
            generation: 0,
        }
    }

    fn receive(&mut self, frame: &Frame) {
        self.written.push(*frame);
        if self.stalled > 0 {
            self.stalled -= 1;
            log::debug!("emulated keyboard dropped frame 0x{:02X}", frame[0]);
            return;
        }
        if self.dialect == Dialect::RawHid && self.rejected == Some(frame[0]) {
            self.to_host.push_back(Response::failed(frame[0]).encode());
            return;
        }
        match self.dialect {
            Dialect::RawHid => {
                self.run(frame);
                let replies = std::mem::take(&mut self.board.sent);
                self.to_host.extend(replies);
            }
            Dialect::VialRgb => {
                let reply = self.via(frame);
                self.to_host.push_back(reply);
            }
        }
    }

    /// Queue one frame and run a tick, the way the USB task and the
    /// render timer interleave on hardware
    fn run(&mut self, frame: &Frame) {
        if let Err(err) = self.inbox.try_send(*frame) {
            log::warn!("emulated inbox rejected frame: {err:?}");
        }
        self.scheduler.tick(Instant::now(), &mut self.board);
    }

    /// VIA replies echo the request with the answer filled in
    fn via(&mut self, frame: &Frame) -> Frame {
        let mut reply = *frame;
        let mut internal = None;

        match (frame[0], frame[1]) {
            (vialrgb::VIA_GET_PROTOCOL_VERSION, _) => {
                reply[1..3].copy_from_slice(&vialrgb::MIN_VIA_VERSION.to_be_bytes());
            }
            (vialrgb::VIA_LIGHTING_GET_VALUE, vialrgb::VIALRGB_GET_INFO) => {
                reply[2..4].copy_from_slice(&vialrgb::VIALRGB_VERSION.to_le_bytes());
            }
            (vialrgb::VIA_LIGHTING_GET_VALUE, vialrgb::VIALRGB_GET_NUMBER_LEDS) => {
                #[allow(clippy::cast_possible_truncation)]
                let count = LED_COUNT as u16;
                reply[2..4].copy_from_slice(&count.to_le_bytes());
            }
            (vialrgb::VIA_LIGHTING_SET_VALUE, vialrgb::VIALRGB_SET_MODE) => {
                let mode = u16::from_le_bytes([frame[2], frame[3]]);
                internal = Some(if mode == vialrgb::VIALRGB_EFFECT_DIRECT {
                    Command::EnterManaged
                } else {
                    Command::ExitManaged
                });
            }
            (vialrgb::VIA_LIGHTING_SET_VALUE, vialrgb::VIALRGB_DIRECT_FASTSET) => {
                let start = u16::from_le_bytes([frame[2], frame[3]]);
                let count = usize::from(frame[4]);
                let colors: Vec<Hsv> = frame[5..]
                    .chunks_exact(3)
                    .take(count)
                    .map(|c| Hsv::new(c[0], c[1], c[2]))
                    .collect();
                internal = u8::try_from(start)
                    .ok()
                    .and_then(|start| Command::set_range(start, &colors));
            }
            _ => reply[0] = vialrgb::VIA_UNHANDLED,
        }

        if let Some(command) = internal {
            self.run(&command.encode());
            // The framed answer stays inside the firmware
            self.board.sent.clear();
        }
        reply
    }
}

impl EmulatedDevice {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            firmware: Arc::new(Mutex::new(Firmware::new(dialect))),
        }
    }

    fn firmware(&self) -> MutexGuard<'_, Firmware> {
        self.firmware.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dialect(&self) -> Dialect {
        self.firmware().dialect
    }

    /// Physical key press, reported only while managed
    pub fn press_key(&self, row: u8, col: u8) -> bool {
        let mut firmware = self.firmware();
        if firmware.dialect != Dialect::RawHid {
            return false;
        }
        let firmware = &mut *firmware;
        let sent = firmware.scheduler.key_pressed(row, col, &mut firmware.board);
        let frames = std::mem::take(&mut firmware.board.sent);
        firmware.to_host.extend(frames);
        sent
    }

    /// Fails every raw command with `opcode` until cleared with `None`
    pub fn reject(&self, opcode: Option<u8>) {
        self.firmware().rejected = opcode;
    }

    /// Overrides the USB serial number links report
    pub fn set_serial(&self, serial: Option<&str>) {
        self.firmware().serial = serial.map(str::to_owned);
    }

    /// Swallow the next `frames` host frames without answering
    pub fn stall_next(&self, frames: usize) {
        self.firmware().stalled = frames;
    }

    /// Simulates pulling the cable, open links fail from now on
    pub fn unplug(&self) {
        let mut firmware = self.firmware();
        firmware.unplugged = true;
        firmware.generation += 1;
        firmware.to_host.clear();
    }

    pub fn plug_in(&self) {
        let mut firmware = self.firmware();
        firmware.unplugged = false;
        firmware.open = false;
    }

    pub fn state(&self) -> DeviceState<LED_COUNT> {
        self.firmware().scheduler.state().clone()
    }

    /// Last frame written to the LEDs, empty while native
    pub fn rendered(&self) -> Vec<Rgb> {
        let mut firmware = self.firmware();
        let firmware = &mut *firmware;
        firmware.scheduler.tick(Instant::now(), &mut firmware.board);
        firmware.scheduler.output().frame.clone()
    }

    pub fn underglow(&self) -> Option<(Hsv, UnderglowEffect)> {
        self.firmware().board.underglow
    }

    pub fn reboots(&self) -> usize {
        self.firmware().board.reboots
    }

    /// Every frame the host has written, answered or not
    pub fn written(&self) -> Vec<Frame> {
        self.firmware().written.clone()
    }

    pub fn is_open(&self) -> bool {
        self.firmware().open
    }
}

impl Default for EmulatedDevice {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

impl Connector for EmulatedDevice {
    fn open(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        let mut firmware = self.firmware();
        if firmware.unplugged {
            return Err(TransportError::NotFound);
        }
        if firmware.open {
            return Err(TransportError::Busy);
        }
        firmware.open = true;
        Ok(Box::new(EmulatedLink {
            device: self.clone(),
            generation: firmware.generation,
            serial: firmware.serial.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("emulated keyboard ({:?})", self.dialect())
    }
}

struct EmulatedLink {
    device: EmulatedDevice,
    generation: u32,
    serial: Option<String>,
}

impl EmulatedLink {
    fn check(&self) -> Result<MutexGuard<'_, Firmware>, TransportError> {
        let firmware = self.device.firmware();
        if firmware.unplugged || firmware.generation != self.generation {
            return Err(TransportError::Disconnected);
        }
        Ok(firmware)
    }
}

impl Transport for EmulatedLink {
    fn write(&mut self, frame: &Frame) -> Result<(), TransportError> {
        self.check()?.receive(frame);
        Ok(())
    }

    // Replies are produced synchronously, an empty queue means the wait
    // would run out
    fn read(&mut self, _timeout: Duration) -> Result<Option<Frame>, TransportError> {
        Ok(self.check()?.to_host.pop_front())
    }

    fn serial_number(&self) -> Option<&str> {
        self.serial.as_deref()
    }
}

impl Drop for EmulatedLink {
    fn drop(&mut self) {
        let mut firmware = self.device.firmware();
        if firmware.generation == self.generation {
            firmware.open = false;
        }
    }
}
