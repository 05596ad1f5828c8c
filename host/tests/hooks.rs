mod tests {
    use std::fs;

    use keylight_host::events::EventLog;
    use keylight_host::hooks::{self, HOOKED_EVENTS};
    use serde_json::Value;

    #[test]
    fn test_install_and_remove_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".claude").join("settings.json");

        let added = hooks::install(&settings, "keylight hook").unwrap();
        assert_eq!(added.len(), HOOKED_EVENTS.len());
        assert!(hooks::install(&settings, "keylight hook").unwrap().is_empty());

        let written: Value = serde_json::from_str(&fs::read_to_string(&settings).unwrap()).unwrap();
        for event in HOOKED_EVENTS {
            assert_eq!(written["hooks"][event].as_array().unwrap().len(), 1);
        }
        assert!(written["hooks"]["SessionEnd"][0]["hooks"][0]["command"]
            .as_str()
            .unwrap()
            .ends_with("# keylight-bridge"));
        assert!(written["hooks"]["PermissionRequest"].is_array());

        assert_eq!(hooks::remove(&settings).unwrap(), HOOKED_EVENTS.len());
        let written: Value = serde_json::from_str(&fs::read_to_string(&settings).unwrap()).unwrap();
        assert!(written["hooks"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_remove_without_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(hooks::remove(&dir.path().join("settings.json")).unwrap(), 0);
    }

    #[test]
    fn test_recorded_events_reach_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut log = EventLog::open_at_end(&path);

        let payload = r#"{"session_id": "s1", "hook_event_name": "PreToolUse", "tool_name": "Bash"}"#;
        hooks::record(payload.as_bytes(), &path, Some("w0t0p0:GUID".to_owned())).unwrap();
        assert!(hooks::record("oops".as_bytes(), &path, None).is_err());

        let events = log.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session, "s1");
        assert_eq!(events[0].tool.as_deref(), Some("Bash"));
        assert_eq!(events[0].terminal.as_deref(), Some("w0t0p0:GUID"));
        assert_eq!(events[0].detail(), "Bash");
    }
}
