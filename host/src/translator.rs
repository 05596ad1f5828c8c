//! Event to color translation for the ambient display
//!
//! Needs-input turns the whole board to the attention color, work or a
//! finished session turns it dark, anything else changes nothing. The
//! translator remembers the last color sent so an unchanged target is
//! never sent twice.

use keylight::Hsv;

use crate::client::{ClientError, LedClient};
use crate::events::{SemanticEvent, Signal};

#[derive(Debug, Clone)]
pub struct Translator {
    attention: Hsv,
    idle: Hsv,
    target: Option<Hsv>,
    sent: Option<Hsv>,
}

impl Translator {
    pub fn new(attention: Hsv) -> Self {
        Self {
            attention,
            idle: Hsv::BLACK,
            target: None,
            sent: None,
        }
    }

    /// Color a single event asks for, `None` for inert events
    pub fn target_for(&self, event: &SemanticEvent) -> Option<Hsv> {
        match event.signal() {
            Signal::NeedsInput => Some(self.attention),
            Signal::Working | Signal::Finished => Some(self.idle),
            Signal::Inert => None,
        }
    }

    /// Folds one event into the target color
    pub fn observe(&mut self, event: &SemanticEvent) {
        if let Some(color) = self.target_for(event) {
            self.target = Some(color);
        }
    }

    /// Target color if it differs from what the board shows
    pub fn pending(&self) -> Option<Hsv> {
        self.target.filter(|target| self.sent != Some(*target))
    }

    pub fn mark_sent(&mut self, color: Hsv) {
        self.sent = Some(color);
    }

    /// Forget what the board shows, after a reconnect
    pub fn invalidate(&mut self) {
        self.sent = None;
    }

    /// Per-event translation: the `set_all` colors a sequence produces
    pub fn translate<'a>(&mut self, events: impl IntoIterator<Item = &'a SemanticEvent>) -> Vec<Hsv> {
        let mut commands = Vec::new();
        for event in events {
            self.observe(event);
            if let Some(color) = self.pending() {
                commands.push(color);
                self.mark_sent(color);
            }
        }
        commands
    }

    /// Sends the pending color, if any
    pub fn flush(&mut self, client: &mut impl LedClient) -> Result<bool, ClientError> {
        let Some(color) = self.pending() else {
            return Ok(false);
        };
        client.set_all(color)?;
        self.mark_sent(color);
        Ok(true)
    }
}
