//! Multi-session display
//!
//! Each agent session gets one key LED. The LED is bright and blinking
//! while that session waits for the user, dim while it works or after it
//! has gone quiet. The top row lights up when more than one session is
//! tracked and any of them is waiting. Pressing a session's key asks for
//! its terminal to be focused.

use std::collections::HashMap;
use std::time::Instant;

use keylight::{Hsv, KeyEvent};

use crate::client::{ClientError, LedClient};
use crate::config::SessionTimeouts;
use crate::events::{SemanticEvent, Signal};

/// Slot to LED index, rows 1-2 left to right
pub const SLOT_LEDS: [u8; 8] = [9, 8, 7, 6, 2, 3, 4, 5];

/// Top row, global attention indicator
pub const GLOBAL_LEDS: [u8; 2] = [10, 11];

const KEYS_PER_ROW: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Working,
    YourTurn,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub terminal: Option<String>,
    pub state: SessionState,
    pub slot: usize,
    pub last_event: Instant,
}

/// Colors and blink flags for one board refresh
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardFrame {
    /// Lit LEDs, everything else is dark
    pub lit: Vec<(u8, Hsv)>,
    pub blinking: Vec<u8>,
}

pub struct SessionBoard {
    sessions: HashMap<String, Session>,
    slots: [Option<String>; SLOT_LEDS.len()],
    timeouts: SessionTimeouts,
    attention: Hsv,
    dim: Hsv,
}

impl SessionBoard {
    pub fn new(timeouts: SessionTimeouts, attention: Hsv, dim: Hsv) -> Self {
        Self {
            sessions: HashMap::new(),
            slots: Default::default(),
            timeouts,
            attention,
            dim,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Applies one event, returns whether the board needs a refresh
    pub fn observe(&mut self, event: &SemanticEvent, now: Instant) -> bool {
        if event.session.is_empty() {
            return false;
        }
        if event.signal() == Signal::Finished {
            return self.release(&event.session);
        }

        let created = !self.sessions.contains_key(&event.session);
        let Some(session) = self.get_or_create(event, now) else {
            log::debug!("all slots taken, ignoring session {}", event.session);
            return false;
        };

        let state = match event.signal() {
            Signal::NeedsInput => Some(SessionState::YourTurn),
            Signal::Working => Some(SessionState::Working),
            Signal::Finished | Signal::Inert => None,
        };
        match state {
            Some(state) if state != session.state => {
                session.state = state;
                log::info!("[{}] {:?} ({} {})", session.slot, state, event.event, event.detail());
                true
            }
            _ => created,
        }
    }

    fn get_or_create(&mut self, event: &SemanticEvent, now: Instant) -> Option<&mut Session> {
        if !self.sessions.contains_key(&event.session) {
            let slot = self.slots.iter().position(Option::is_none)?;
            self.slots[slot] = Some(event.session.clone());
            self.sessions.insert(
                event.session.clone(),
                Session {
                    id: event.session.clone(),
                    terminal: None,
                    state: SessionState::Working,
                    slot,
                    last_event: now,
                },
            );
        }

        let session = self.sessions.get_mut(&event.session)?;
        session.last_event = now;
        if session.terminal.is_none() {
            session.terminal.clone_from(&event.terminal);
        }
        Some(session)
    }

    fn release(&mut self, id: &str) -> bool {
        let Some(session) = self.sessions.remove(id) else {
            return false;
        };
        self.slots[session.slot] = None;
        true
    }

    /// Frees the slots of sessions quiet for longer than the release timeout
    pub fn cleanup(&mut self, now: Instant) -> Vec<String> {
        let release_after = self.timeouts.release_after();
        let stale: Vec<String> = self
            .sessions
            .values()
            .filter(|session| now.duration_since(session.last_event) > release_after)
            .map(|session| session.id.clone())
            .collect();
        for id in &stale {
            self.release(id);
            log::info!("released stale session {id}");
        }
        stale
    }

    /// Session under a pressed key, keys in rows 1 and 2 map to slots
    pub fn session_for_key(&self, key: KeyEvent) -> Option<&Session> {
        if !(1..=2).contains(&key.row) || key.col >= KEYS_PER_ROW {
            return None;
        }
        let slot = usize::from((key.row - 1) * KEYS_PER_ROW + key.col);
        let id = self.slots.get(slot)?.as_ref()?;
        self.sessions.get(id)
    }

    fn is_dimmed(&self, session: &Session, now: Instant) -> bool {
        now.duration_since(session.last_event) > self.timeouts.dim_after()
    }

    pub fn frame(&self, now: Instant) -> BoardFrame {
        let mut frame = BoardFrame::default();
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by_key(|session| session.slot);

        for session in &sessions {
            let led = SLOT_LEDS[session.slot];
            if session.state == SessionState::YourTurn && !self.is_dimmed(session, now) {
                frame.lit.push((led, self.attention));
                frame.blinking.push(led);
            } else {
                frame.lit.push((led, self.dim));
            }
        }

        let any_waiting = sessions
            .iter()
            .any(|session| session.state == SessionState::YourTurn);
        if sessions.len() >= 2 && any_waiting {
            for led in GLOBAL_LEDS {
                frame.lit.push((led, self.attention));
                frame.blinking.push(led);
            }
        }
        frame
    }

    /// Redraws the whole board
    ///
    /// Entering managed mode clears colors and blink flags on the device,
    /// the explicit black fill covers backends where it does not.
    pub fn render(&self, client: &mut impl LedClient, now: Instant) -> Result<(), ClientError> {
        let frame = self.frame(now);
        client.enter_managed()?;
        client.set_all(Hsv::BLACK)?;
        for (led, color) in &frame.lit {
            client.set_one(*led, *color)?;
        }
        for led in &frame.blinking {
            client.set_blink(*led, true)?;
        }
        client.set_underglow(self.attention, true)
    }

    /// Number of sessions currently shown dimmed
    pub fn dimmed(&self, now: Instant) -> usize {
        self.sessions
            .values()
            .filter(|session| self.is_dimmed(session, now))
            .count()
    }
}
