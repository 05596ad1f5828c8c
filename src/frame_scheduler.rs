//! Device main loop with frame pacing.
//!
//! No timers and no async inside: the caller sleeps for the returned
//! duration between ticks.
//!
//! Each tick first applies every queued command frame, then renders. The
//! dispatcher and the renderer borrow the device state one after the
//! other, never at the same time, so a frame on the LEDs always reflects
//! whole commands.

use embassy_time::{Duration, Instant};

use crate::channel::FrameReceiver;
use crate::dispatcher::{CommandDispatcher, key_event_frame};
use crate::protocol::KeyEvent;
use crate::renderer::{RenderedFrame, Renderer};
use crate::state::DeviceState;
use crate::{Board, OutputDriver};

/// Default target frame rate (60 FPS).
pub const DEFAULT_FPS: u32 = 60;

/// Default frame duration based on target FPS.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(1000 / DEFAULT_FPS as u64);

/// Result of a frame tick operation.
#[derive(Debug, Clone, Copy)]
pub struct FrameResult {
    /// The deadline for the next frame.
    pub next_deadline: Instant,
    /// How long to wait until the next frame (may be zero if behind schedule).
    pub sleep_duration: Duration,
    /// Command frames applied during this tick.
    pub commands: usize,
}

/// Device side loop: command dispatch, render and output pacing
///
/// # Usage
///
/// ```ignore
/// static INBOX: FrameInbox<8> = FrameInbox::new();
///
/// let mut scheduler = FrameScheduler::<_, 12, 8>::new(INBOX.receiver(), driver);
///
/// loop {
///     let result = scheduler.tick(Instant::now(), &mut board);
///     Timer::after(result.sleep_duration).await;
/// }
/// ```
pub struct FrameScheduler<'a, O: OutputDriver, const N: usize, const INBOX_SIZE: usize> {
    output: O,
    state: DeviceState<N>,
    dispatcher: CommandDispatcher<'a, INBOX_SIZE>,
    renderer: Renderer<N>,
    next_frame: Instant,
    frame_duration: Duration,
    native_released: bool,
}

impl<'a, O: OutputDriver, const N: usize, const INBOX_SIZE: usize>
    FrameScheduler<'a, O, N, INBOX_SIZE>
{
    /// Uses `DEFAULT_FRAME_DURATION` (60 FPS) for frame timing.
    pub fn new(frames: FrameReceiver<'a, INBOX_SIZE>, driver: O) -> Self {
        Self::with_frame_duration(frames, driver, DEFAULT_FRAME_DURATION)
    }

    pub fn with_frame_duration(
        frames: FrameReceiver<'a, INBOX_SIZE>,
        driver: O,
        frame_duration: Duration,
    ) -> Self {
        Self {
            output: driver,
            state: DeviceState::new(),
            dispatcher: CommandDispatcher::new(frames),
            renderer: Renderer::new(),
            next_frame: Instant::from_millis(0),
            frame_duration,
            native_released: true,
        }
    }

    /// Runs one device tick
    ///
    /// Drains the inbox into the state, renders, then schedules the next
    /// tick. After a long stall the schedule restarts from `now`.
    pub fn tick<B: Board>(&mut self, now: Instant, board: &mut B) -> FrameResult {
        // Skip the backlog after long stalls instead of catching up
        let max_drift = self.frame_duration.as_millis() * 2;
        if now.as_millis() > self.next_frame.as_millis() + max_drift {
            self.next_frame = now;
        }

        let commands = self.dispatcher.process_pending(&mut self.state, board);

        match self.renderer.render(&self.state, now) {
            RenderedFrame::Managed(frame) => {
                self.output.write(frame);
                self.native_released = false;
            }
            RenderedFrame::Native => {
                if !self.native_released {
                    self.output.release();
                    self.native_released = true;
                }
            }
        }

        self.next_frame += self.frame_duration;

        let sleep_duration = if self.next_frame.as_millis() > now.as_millis() {
            Duration::from_millis(self.next_frame.as_millis() - now.as_millis())
        } else {
            Duration::from_millis(0)
        };

        FrameResult {
            next_deadline: self.next_frame,
            sleep_duration,
            commands,
        }
    }

    /// Reports a key press to the host, returns whether a frame was sent
    ///
    /// Nothing is sent while the native effect owns the LEDs.
    pub fn key_pressed<B: Board>(&mut self, row: u8, col: u8, board: &mut B) -> bool {
        match key_event_frame(&self.state, KeyEvent::new(row, col)) {
            Some(frame) => {
                board.send(&frame);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> &DeviceState<N> {
        &self.state
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}
