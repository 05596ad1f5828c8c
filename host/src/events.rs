//! Semantic events and the log they arrive through
//!
//! Hooks append one JSON object per line. [`EventLog`] tails the file by
//! byte offset and only ever moves forward; a file shorter than the
//! offset has been truncated or replaced and the offset starts over.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Arrival time as written by the producer
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Timestamp {
    Unix(f64),
    Text(String),
}

/// One record from the event log
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SemanticEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Timestamp>,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notif: Option<String>,
    /// Terminal session the agent runs in, used to focus it on key press
    #[serde(default, alias = "iterm_session", skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
}

/// What an event says about the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Waiting on the user
    NeedsInput,
    /// Resumed work
    Working,
    /// Session is over, nothing to wait for
    Finished,
    /// Anything else, including unknown tags
    Inert,
}

const INPUT_NOTIFICATIONS: [&str; 2] = ["permission_prompt", "elicitation_dialog"];

impl SemanticEvent {
    pub fn new(session: &str, event: &str) -> Self {
        Self {
            session: session.to_owned(),
            event: event.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_notif(mut self, notif: &str) -> Self {
        self.notif = Some(notif.to_owned());
        self
    }

    pub fn signal(&self) -> Signal {
        match self.event.as_str() {
            "Stop" | "PermissionRequest" => Signal::NeedsInput,
            "Notification"
                if self
                    .notif
                    .as_deref()
                    .is_some_and(|notif| INPUT_NOTIFICATIONS.contains(&notif)) =>
            {
                Signal::NeedsInput
            }
            "PreToolUse" | "PostToolUse" | "UserPromptSubmit" => Signal::Working,
            "SessionEnd" => Signal::Finished,
            _ => Signal::Inert,
        }
    }

    /// Tool or notification name, whichever is set
    pub fn detail(&self) -> &str {
        self.tool.as_deref().or(self.notif.as_deref()).unwrap_or("")
    }
}

/// Forward only reader over the event log
pub struct EventLog {
    path: PathBuf,
    offset: u64,
}

impl EventLog {
    /// Skips everything already in the file
    pub fn open_at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        Self { path, offset }
    }

    pub fn open_at_start(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Complete records appended since the last poll, in file order
    ///
    /// A trailing line without its newline is left for the next poll.
    /// Lines that are not valid records are skipped.
    pub fn poll(&mut self) -> io::Result<Vec<SemanticEvent>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let len = file.metadata()?.len();
        if len < self.offset {
            log::info!("{} was truncated, reading from the start", self.path.display());
            self.offset = 0;
            return Ok(Vec::new());
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let Some(end) = buf.iter().rposition(|byte| *byte == b'\n') else {
            return Ok(Vec::new());
        };
        self.offset += end as u64 + 1;

        let events = buf[..end]
            .split(|byte| *byte == b'\n')
            .filter_map(|line| {
                let line = line.trim_ascii();
                if line.is_empty() {
                    return None;
                }
                match serde_json::from_slice(line) {
                    Ok(event) => Some(event),
                    Err(err) => {
                        log::warn!("skipping malformed event record: {err}");
                        None
                    }
                }
            })
            .collect();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_table() {
        assert_eq!(SemanticEvent::new("s", "Stop").signal(), Signal::NeedsInput);
        assert_eq!(
            SemanticEvent::new("s", "PermissionRequest").signal(),
            Signal::NeedsInput
        );
        assert_eq!(
            SemanticEvent::new("s", "Notification")
                .with_notif("permission_prompt")
                .signal(),
            Signal::NeedsInput
        );
        assert_eq!(
            SemanticEvent::new("s", "Notification")
                .with_notif("idle_prompt")
                .signal(),
            Signal::Inert
        );
        assert_eq!(SemanticEvent::new("s", "PreToolUse").signal(), Signal::Working);
        assert_eq!(SemanticEvent::new("s", "PostToolUse").signal(), Signal::Working);
        assert_eq!(
            SemanticEvent::new("s", "UserPromptSubmit").signal(),
            Signal::Working
        );
        assert_eq!(SemanticEvent::new("s", "SessionEnd").signal(), Signal::Finished);
        assert_eq!(SemanticEvent::new("s", "SomethingNew").signal(), Signal::Inert);
        assert_eq!(SemanticEvent::new("s", "").signal(), Signal::Inert);
    }

    #[test]
    fn test_record_fields() {
        let event: SemanticEvent = serde_json::from_str(
            r#"{"ts": 1712345678.5, "session": "abc", "event": "PreToolUse", "tool": "Bash", "iterm_session": "w0t1p0:GUID"}"#,
        )
        .unwrap();
        assert_eq!(event.ts, Some(Timestamp::Unix(1_712_345_678.5)));
        assert_eq!(event.detail(), "Bash");
        assert_eq!(event.terminal.as_deref(), Some("w0t1p0:GUID"));

        let bare: SemanticEvent = serde_json::from_str(r#"{"event": "Stop"}"#).unwrap();
        assert_eq!(bare.session, "");
        assert_eq!(bare.detail(), "");
    }
}
