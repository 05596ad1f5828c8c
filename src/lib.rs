#![no_std]

pub mod channel;
pub mod color;
pub mod dispatcher;
pub mod frame_scheduler;
pub mod protocol;
pub mod renderer;
pub mod state;

pub use channel::{FrameInbox, FrameReceiver, FrameSender, PushError, TryReceiveError};
pub use dispatcher::{CommandDispatcher, Dispatch, UnderglowEffect, UnderglowRequest, dispatch};
pub use frame_scheduler::{FrameResult, FrameScheduler};
pub use protocol::{Command, FRAME_LEN, Frame, Inbound, InvalidFrame, KeyEvent, Opcode, Response};
pub use renderer::{RenderedFrame, Renderer};
pub use state::{DeviceState, LedFrameState, Mode};

pub use color::{Hsv, Rgb};
pub use embassy_time::{Duration, Instant};

/// Abstract LED driver trait
///
/// Implement this trait to support different hardware platforms.
/// The frame scheduler is generic over this trait.
pub trait OutputDriver {
    /// Write colors to the per-key LEDs
    fn write(&mut self, colors: &[Rgb]);

    /// Hand the LEDs back to the native effect
    fn release(&mut self) {}
}

/// Everything on the device the dispatcher reaches outside the frame state
pub trait Board {
    /// Queue one frame back to the host
    fn send(&mut self, frame: &Frame);

    /// Drive the underglow group, valid in either mode
    fn set_underglow(&mut self, color: Hsv, effect: UnderglowEffect);

    /// Restart into the bootloader, called only after the response is sent
    fn reboot_to_bootloader(&mut self);
}
