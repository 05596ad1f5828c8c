//! The bridge loop
//!
//! Single threaded polling: read new events, fold them into the display
//! model, push whatever changed to the keyboard, sleep. A lost keyboard
//! is reconnected on a later poll; events keep being consumed meanwhile
//! so the board is correct as soon as it is back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use keylight::Hsv;

use crate::client::{ClientError, KeyboardClient, LedClient};
use crate::config::{Config, DisplayMode};
use crate::events::{EventLog, SemanticEvent};
use crate::focus;
use crate::sessions::SessionBoard;
use crate::transport::Connector;
use crate::translator::Translator;

enum Display {
    Ambient(Translator),
    Sessions {
        board: SessionBoard,
        dirty: bool,
        dimmed: usize,
    },
}

pub struct Daemon {
    config: Config,
    client: KeyboardClient,
    log: EventLog,
    display: Display,
    shutdown: Arc<AtomicBool>,
    last_cleanup: Instant,
    reported_missing: bool,
}

impl Daemon {
    pub fn new(config: Config, connector: Box<dyn Connector>, shutdown: Arc<AtomicBool>) -> Self {
        let display = match config.mode {
            DisplayMode::Ambient => Display::Ambient(Translator::new(config.attention_color)),
            DisplayMode::Sessions => Display::Sessions {
                board: SessionBoard::new(config.sessions, config.attention_color, config.dim_color),
                dirty: true,
                dimmed: 0,
            },
        };
        Self {
            client: KeyboardClient::new(connector, config.response_timeout()),
            log: EventLog::open_at_end(&config.event_log),
            display,
            shutdown,
            last_cleanup: Instant::now(),
            reported_missing: false,
            config,
        }
    }

    /// Replaces the event log reader, mostly for tests that seed a log
    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn client(&self) -> &KeyboardClient {
        &self.client
    }

    pub fn run(&mut self) {
        log::info!(
            "watching {} in {:?} mode",
            self.log.path().display(),
            self.config.mode
        );
        while !self.shutdown.load(Ordering::Relaxed) {
            self.step(Instant::now());
            std::thread::sleep(self.config.poll_interval());
        }
        log::info!("shutting down");
        self.restore();
    }

    /// One poll tick
    pub fn step(&mut self, now: Instant) {
        let events = self.log.poll().unwrap_or_else(|err| {
            log::warn!("failed to read {}: {err}", self.log.path().display());
            Vec::new()
        });
        self.observe(&events, now);

        if !self.client.is_connected() && !self.connect() {
            return;
        }
        if let Err(err) = self.refresh(now) {
            log::warn!("keyboard update failed: {err}");
        }
    }

    fn observe(&mut self, events: &[SemanticEvent], now: Instant) {
        for event in events {
            log::debug!("event {} {} {}", event.session, event.event, event.detail());
        }
        match &mut self.display {
            Display::Ambient(translator) => {
                for event in events {
                    translator.observe(event);
                }
            }
            Display::Sessions {
                board,
                dirty,
                dimmed,
            } => {
                for event in events {
                    *dirty |= board.observe(event, now);
                }
                if now.duration_since(self.last_cleanup) >= self.config.sessions.cleanup_every() {
                    *dirty |= !board.cleanup(now).is_empty();
                    self.last_cleanup = now;
                }
                let currently_dimmed = board.dimmed(now);
                if currently_dimmed != *dimmed {
                    *dimmed = currently_dimmed;
                    *dirty = true;
                }
            }
        }
    }

    fn connect(&mut self) -> bool {
        match self.client.connect() {
            Ok(_) => {
                self.reported_missing = false;
                if let Err(err) = self.client.enter_managed() {
                    log::warn!("failed to take over the LEDs: {err}");
                    self.client.disconnect();
                    return false;
                }
                match &mut self.display {
                    Display::Ambient(translator) => translator.invalidate(),
                    Display::Sessions { dirty, .. } => *dirty = true,
                }
                true
            }
            Err(err) => {
                if self.reported_missing {
                    log::debug!("keyboard still unavailable: {err}");
                } else {
                    log::warn!("keyboard unavailable, will keep trying: {err}");
                    self.reported_missing = true;
                }
                false
            }
        }
    }

    fn refresh(&mut self, now: Instant) -> Result<(), ClientError> {
        match &mut self.display {
            Display::Ambient(translator) => {
                if let Some(color) = translator.pending() {
                    log::info!("board -> {},{},{}", color.hue, color.sat, color.val);
                }
                translator.flush(&mut self.client)?;
            }
            Display::Sessions { board, dirty, .. } => {
                while let Some(key) = self.client.poll_key_event()? {
                    match board.session_for_key(key) {
                        Some(session) => {
                            log::info!("[{}] key {},{} -> {}", session.slot, key.row, key.col, session.id);
                            if let Some(terminal) = &session.terminal {
                                if let Err(err) = focus::focus_terminal(terminal) {
                                    log::warn!("failed to focus terminal: {err}");
                                }
                            }
                        }
                        None => log::debug!("key {},{} has no session", key.row, key.col),
                    }
                }
                if *dirty {
                    board.render(&mut self.client, now)?;
                    *dirty = false;
                }
            }
        }
        Ok(())
    }

    /// Leaves the keyboard the way the native firmware expects it
    pub fn restore(&mut self) {
        if !self.client.is_connected() {
            return;
        }
        if let Err(err) = restore_board(&mut self.client) {
            log::warn!("failed to restore the keyboard: {err}");
        }
        self.client.disconnect();
    }
}

/// Black, no blinking, underglow off, back to native
pub fn restore_board(client: &mut KeyboardClient) -> Result<(), ClientError> {
    let led_count = client.led_count().unwrap_or(0);
    client.enter_managed()?;
    client.set_all(Hsv::BLACK)?;
    for index in 0..led_count {
        client.set_blink(index, false)?;
    }
    client.set_underglow(Hsv::BLACK, false)?;
    client.exit_managed()
}
