//! Inbound frame queue for `no_std` environments.
//!
//! The link interrupt (or USB task) pushes raw reports, the frame loop
//! drains them between renders. Built on `critical-section` and
//! `heapless::Deque`, so the producer may run in interrupt context.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use crate::protocol::{Frame, pad};

/// Why a report was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// Queue is full, the frame is handed back
    Full(Frame),
    /// Report is longer than a frame
    Oversized(usize),
}

/// Error returned when trying to receive from an empty inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryReceiveError;

/// A bounded queue of whole command frames.
///
/// A frame is either fully queued or not queued at all, the consumer never
/// sees a partial one.
pub struct FrameInbox<const SIZE: usize> {
    inner: Mutex<RefCell<Deque<Frame, SIZE>>>,
}

impl<const SIZE: usize> FrameInbox<SIZE> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Get a sender handle for the link side.
    pub const fn sender(&self) -> FrameSender<'_, SIZE> {
        FrameSender { inbox: self }
    }

    /// Get a receiver handle for the frame loop.
    pub const fn receiver(&self) -> FrameReceiver<'_, SIZE> {
        FrameReceiver { inbox: self }
    }

    pub fn try_send(&self, frame: Frame) -> Result<(), PushError> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.push_back(frame).map_err(PushError::Full)
        })
    }

    pub fn try_receive(&self) -> Result<Frame, TryReceiveError> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.pop_front().ok_or(TryReceiveError)
        })
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const SIZE: usize> Default for FrameInbox<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer handle for a [`FrameInbox`].
#[derive(Clone, Copy)]
pub struct FrameSender<'a, const SIZE: usize> {
    inbox: &'a FrameInbox<SIZE>,
}

impl<const SIZE: usize> FrameSender<'_, SIZE> {
    pub fn try_send(&self, frame: Frame) -> Result<(), PushError> {
        self.inbox.try_send(frame)
    }

    /// Queues a raw report as received from the link
    ///
    /// Short reports are zero padded, transports may strip trailing zeros.
    pub fn push_from_link(&self, report: &[u8]) -> Result<(), PushError> {
        let frame = pad(report).ok_or(PushError::Oversized(report.len()))?;
        self.try_send(frame)
    }
}

/// Consumer handle for a [`FrameInbox`].
#[derive(Clone, Copy)]
pub struct FrameReceiver<'a, const SIZE: usize> {
    inbox: &'a FrameInbox<SIZE>,
}

impl<const SIZE: usize> FrameReceiver<'_, SIZE> {
    pub fn try_receive(&self) -> Result<Frame, TryReceiveError> {
        self.inbox.try_receive()
    }
}
