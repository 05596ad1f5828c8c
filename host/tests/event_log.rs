mod tests {
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;

    use keylight_host::events::{EventLog, Timestamp};

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn tags(log: &mut EventLog) -> Vec<String> {
        log.poll().unwrap().into_iter().map(|event| event.event).collect()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = EventLog::open_at_end(dir.path().join("absent.jsonl"));
        assert!(log.poll().unwrap().is_empty());
        assert_eq!(log.offset(), 0);
    }

    #[test]
    fn test_starts_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        append(&path, "{\"session\": \"a\", \"event\": \"Stop\"}\n");

        let mut log = EventLog::open_at_end(&path);
        assert!(tags(&mut log).is_empty());

        append(&path, "{\"session\": \"a\", \"event\": \"PreToolUse\"}\n");
        assert_eq!(tags(&mut log), vec!["PreToolUse"]);

        let mut replay = EventLog::open_at_start(&path);
        assert_eq!(tags(&mut replay), vec!["Stop", "PreToolUse"]);
    }

    #[test]
    fn test_partial_line_waits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut log = EventLog::open_at_end(&path);

        append(&path, "{\"session\": \"a\", \"event\": \"Stop\"}\n{\"session\": \"a\", ");
        assert_eq!(tags(&mut log), vec!["Stop"]);
        assert!(tags(&mut log).is_empty());

        append(&path, "\"event\": \"UserPromptSubmit\"}\n");
        assert_eq!(tags(&mut log), vec!["UserPromptSubmit"]);
    }

    #[test]
    fn test_truncation_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        append(&path, "{\"session\": \"a\", \"event\": \"PreToolUse\"}\n");
        let mut log = EventLog::open_at_end(&path);

        fs::write(&path, "{\"event\": \"Stop\"}\n").unwrap();
        // The poll that notices the truncation only resets
        assert!(tags(&mut log).is_empty());
        assert_eq!(log.offset(), 0);
        assert_eq!(tags(&mut log), vec!["Stop"]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut log = EventLog::open_at_end(&path);

        append(
            &path,
            "not json\n\n{\"session\": \"a\", \"event\": \"Stop\", \"ts\": 1712.5, \"iterm_session\": \"w0t0p0:X\"}\n[1, 2]\n",
        );
        let events = log.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ts, Some(Timestamp::Unix(1712.5)));
        assert_eq!(events[0].terminal.as_deref(), Some("w0t0p0:X"));
    }
}
