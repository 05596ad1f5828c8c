//! Agent hook registration and the hook side recorder
//!
//! Registration edits the agent's settings JSON in place. Every entry we
//! add carries [`MARKER`] in its command so removal can find exactly our
//! entries and nothing else.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::events::{SemanticEvent, Timestamp};

pub const MARKER: &str = "keylight-bridge";

/// Events the display needs to see
pub const HOOKED_EVENTS: [&str; 7] = [
    "Notification",
    "PermissionRequest",
    "Stop",
    "PreToolUse",
    "PostToolUse",
    "UserPromptSubmit",
    "SessionEnd",
];

fn is_ours(matcher: &Value) -> bool {
    matcher
        .get("hooks")
        .and_then(Value::as_array)
        .is_some_and(|hooks| {
            hooks.iter().any(|hook| {
                hook.get("command")
                    .and_then(Value::as_str)
                    .is_some_and(|command| command.contains(MARKER))
            })
        })
}

/// Adds our matcher to every hooked event, returns the events changed
pub fn add_hooks(settings: &mut Value, command: &str) -> Result<Vec<&'static str>> {
    let root = settings
        .as_object_mut()
        .context("settings root is not a JSON object")?;
    let hooks = root
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .context("\"hooks\" is not a JSON object")?;

    let mut added = Vec::new();
    for event in HOOKED_EVENTS {
        let matchers = hooks
            .entry(event)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .with_context(|| format!("hooks for {event} are not an array"))?;
        if matchers.iter().any(is_ours) {
            continue;
        }
        matchers.push(json!({
            "matcher": "",
            "hooks": [{
                "type": "command",
                "command": format!("{command}  # {MARKER}"),
            }],
        }));
        added.push(event);
    }
    Ok(added)
}

/// Drops every matcher we added, returns how many were removed
pub fn remove_hooks(settings: &mut Value) -> usize {
    let Some(hooks) = settings.get_mut("hooks").and_then(Value::as_object_mut) else {
        return 0;
    };

    let mut removed = 0;
    for event in HOOKED_EVENTS {
        let Some(matchers) = hooks.get_mut(event).and_then(Value::as_array_mut) else {
            continue;
        };
        let before = matchers.len();
        matchers.retain(|matcher| !is_ours(matcher));
        removed += before - matchers.len();
        if matchers.is_empty() {
            hooks.remove(event);
        }
    }
    removed
}

fn read_settings(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_settings(path: &Path, settings: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut contents = serde_json::to_string_pretty(settings)?;
    contents.push('\n');
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

pub fn install(settings_path: &Path, command: &str) -> Result<Vec<&'static str>> {
    let mut settings = read_settings(settings_path)?;
    let added = add_hooks(&mut settings, command)?;
    if !added.is_empty() {
        write_settings(settings_path, &settings)?;
    }
    Ok(added)
}

pub fn remove(settings_path: &Path) -> Result<usize> {
    if !settings_path.exists() {
        return Ok(0);
    }
    let mut settings = read_settings(settings_path)?;
    let removed = remove_hooks(&mut settings);
    if removed > 0 {
        write_settings(settings_path, &settings)?;
    }
    Ok(removed)
}

/// The part of the hook payload we keep
#[derive(Deserialize, Debug, Default)]
struct HookPayload {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    hook_event_name: String,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    notification_type: Option<String>,
}

/// Turns a hook payload into an event record
pub fn event_from_payload(payload: &str, terminal: Option<String>) -> Result<SemanticEvent> {
    let payload: HookPayload =
        serde_json::from_str(payload).context("hook payload is not valid JSON")?;
    Ok(SemanticEvent {
        ts: Some(Timestamp::Text(chrono::Utc::now().to_rfc3339())),
        session: payload.session_id,
        event: payload.hook_event_name,
        tool: payload.tool_name,
        notif: payload.notification_type,
        terminal,
    })
}

/// Reads one payload from `input` and appends its record to `log_path`
pub fn record(mut input: impl Read, log_path: &Path, terminal: Option<String>) -> Result<SemanticEvent> {
    let mut payload = String::new();
    input
        .read_to_string(&mut payload)
        .context("failed to read hook payload")?;
    let event = event_from_payload(&payload, terminal)?;

    let mut line = serde_json::to_string(&event)?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    // One write per record keeps concurrent hooks from interleaving lines
    file.write_all(line.as_bytes())
        .with_context(|| format!("failed to append to {}", log_path.display()))?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMAND: &str = "/usr/local/bin/keylight hook";

    #[test]
    fn test_install_is_idempotent() {
        let mut settings = json!({"theme": "dark"});
        let added = add_hooks(&mut settings, COMMAND).unwrap();
        assert_eq!(added, HOOKED_EVENTS.to_vec());
        assert!(added.contains(&"PermissionRequest"));
        assert!(added.contains(&"SessionEnd"));
        assert!(add_hooks(&mut settings, COMMAND).unwrap().is_empty());

        let stop = settings["hooks"]["Stop"].as_array().unwrap();
        assert_eq!(stop.len(), 1);
        assert_eq!(
            stop[0]["hooks"][0]["command"],
            "/usr/local/bin/keylight hook  # keylight-bridge"
        );
        assert_eq!(settings["theme"], "dark");
    }

    #[test]
    fn test_remove_keeps_foreign_hooks() {
        let mut settings = json!({
            "hooks": {
                "Stop": [{"matcher": "", "hooks": [{"type": "command", "command": "say done"}]}],
            }
        });
        add_hooks(&mut settings, COMMAND).unwrap();
        assert_eq!(remove_hooks(&mut settings), HOOKED_EVENTS.len());

        let hooks = settings["hooks"].as_object().unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks["Stop"][0]["hooks"][0]["command"], "say done");
    }

    #[test]
    fn test_rejects_non_object_settings() {
        let mut settings = json!([1, 2]);
        assert!(add_hooks(&mut settings, COMMAND).is_err());
        assert_eq!(remove_hooks(&mut settings), 0);
    }

    #[test]
    fn test_every_signal_source_is_hooked() {
        use crate::events::Signal;

        let signals: Vec<Signal> = HOOKED_EVENTS
            .iter()
            .map(|event| SemanticEvent::new("s", event).signal())
            .collect();
        assert!(signals.contains(&Signal::NeedsInput));
        assert!(signals.contains(&Signal::Working));
        assert!(signals.contains(&Signal::Finished));
        assert!(HOOKED_EVENTS.contains(&"PermissionRequest"));
    }

    #[test]
    fn test_payload_mapping() {
        let event = event_from_payload(
            r#"{"session_id": "abc", "hook_event_name": "Notification", "notification_type": "permission_prompt", "cwd": "/tmp"}"#,
            Some("w0t0p0:GUID".to_owned()),
        )
        .unwrap();
        assert_eq!(event.session, "abc");
        assert_eq!(event.event, "Notification");
        assert_eq!(event.notif.as_deref(), Some("permission_prompt"));
        assert_eq!(event.terminal.as_deref(), Some("w0t0p0:GUID"));
        assert!(event.ts.is_some());

        assert!(event_from_payload("not json", None).is_err());
    }
}
