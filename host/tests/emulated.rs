mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant};

    use keylight::protocol::{Command, pad};
    use keylight::{Hsv, KeyEvent, Mode, Opcode, UnderglowEffect};
    use keylight_host::client::{BackendKind, ClientError, KeyboardClient, LedClient, VIAL_SERIAL_MAGIC};
    use keylight_host::config::{Config, DisplayMode};
    use keylight_host::manual::{self, LedAction};
    use keylight_host::transport::{Connector, Dialect, EmulatedDevice, TransportError};
    use keylight_host::Daemon;

    const TIMEOUT: Duration = Duration::from_millis(50);
    const ORANGE: Hsv = Hsv::new(9, 255, 200);

    fn client(device: &EmulatedDevice) -> KeyboardClient {
        KeyboardClient::new(Box::new(device.clone()), TIMEOUT)
    }

    fn append(path: &std::path::Path, lines: &[&str]) {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    fn daemon(device: &EmulatedDevice, mode: DisplayMode) -> (Daemon, tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("events.jsonl");
        let config = Config {
            event_log: log.clone(),
            response_timeout_ms: 50,
            mode,
            ..Config::default()
        };
        let shutdown = Arc::new(AtomicBool::new(false));
        (Daemon::new(config, Box::new(device.clone()), shutdown), dir, log)
    }

    #[test]
    fn test_stalled_vialrgb_handshake_falls_back_once() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        device.set_serial(Some(VIAL_SERIAL_MAGIC));
        device.stall_next(1);
        let mut client = client(&device);

        assert_eq!(client.connect().unwrap(), BackendKind::RawHid);
        let written = device.written();
        assert_eq!(written[0], pad(&[0x01]).unwrap());
        assert_eq!(written[1], Command::Ping.encode());
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn test_reconnect_leaves_managed_state_alone() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let mut client = client(&device);
        client.connect().unwrap();
        client.enter_managed().unwrap();
        client.set_all(ORANGE).unwrap();
        client.set_blink_period(1000).unwrap();
        client.disconnect();
        let before = device.state();

        assert_eq!(client.connect().unwrap(), BackendKind::RawHid);
        assert_eq!(client.probe().unwrap(), 12);
        assert_eq!(device.state(), before);
        assert_eq!(device.state().leds.color(0), Some(ORANGE));
        assert_eq!(device.state().leds.blink_period_ms(), 1000);
    }

    #[test]
    fn test_manual_commands() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let mut client = client(&device);
        client.connect().unwrap();

        // Not managed yet, acked without effect
        manual::apply(&mut client, &LedAction::One { index: 4, color: ORANGE }).unwrap();
        assert_eq!(device.state().leds.color(4), Some(Hsv::BLACK));

        manual::apply(&mut client, &LedAction::Init).unwrap();
        manual::apply(&mut client, &LedAction::One { index: 4, color: ORANGE }).unwrap();
        manual::apply(&mut client, &LedAction::Blink { index: 4, off: false }).unwrap();
        manual::apply(&mut client, &LedAction::BlinkPeriod { ms: 20 }).unwrap();
        manual::apply(
            &mut client,
            &LedAction::Underglow {
                color: ORANGE,
                breathe: false,
            },
        )
        .unwrap();

        let state = device.state();
        assert_eq!(state.mode, Mode::Managed);
        assert_eq!(state.leds.color(4), Some(ORANGE));
        assert!(state.leds.is_blinking(4));
        assert_eq!(state.leds.blink_period_ms(), 50);
        assert_eq!(device.underglow(), Some((ORANGE, UnderglowEffect::Static)));

        manual::apply(&mut client, &LedAction::Restore).unwrap();
        assert_eq!(device.state().mode, Mode::Native);
        assert_eq!(device.state().leds.blink_mask(), 0);
    }

    #[test]
    fn test_reboot_sends_magic_and_disconnects() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let mut client = client(&device);
        client.connect().unwrap();

        manual::apply(&mut client, &LedAction::Reboot).unwrap();
        assert_eq!(device.reboots(), 1);
        assert_eq!(device.written().last(), Some(&Command::reboot().encode()));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_vialrgb_has_no_reboot() {
        let device = EmulatedDevice::new(Dialect::VialRgb);
        let mut client = client(&device);
        client.connect().unwrap();

        assert!(matches!(client.reboot(), Err(ClientError::Incompatible(_))));
        assert_eq!(device.reboots(), 0);
        assert!(client.is_connected());
    }

    #[test]
    fn test_second_open_is_busy() {
        let mut device = EmulatedDevice::default();
        let mut first = client(&device);
        first.connect().unwrap();

        assert!(matches!(device.open(), Err(TransportError::Busy)));
        let mut second = client(&device);
        assert!(matches!(
            second.connect(),
            Err(ClientError::Transport(TransportError::Busy))
        ));

        first.disconnect();
        second.connect().unwrap();
    }

    #[test]
    fn test_key_event_interleaved_with_reply() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let mut client = client(&device);
        client.connect().unwrap();

        // Not managed yet, the press is not reported
        assert!(!device.press_key(1, 2));
        client.enter_managed().unwrap();

        assert!(device.press_key(1, 2));
        client.set_all(ORANGE).unwrap();
        assert_eq!(client.poll_key_event().unwrap(), Some(KeyEvent::new(1, 2)));
        assert_eq!(client.poll_key_event().unwrap(), None);
        assert_eq!(device.state().leds.colors(), &[ORANGE; 12]);
    }

    #[test]
    fn test_vialrgb_drives_the_same_leds() {
        let device = EmulatedDevice::new(Dialect::VialRgb);
        let mut client = client(&device);
        assert_eq!(client.connect().unwrap(), BackendKind::VialRgb);

        client.enter_managed().unwrap();
        client.set_one(3, ORANGE).unwrap();
        // No blink or underglow in this dialect, acked as no-ops
        client.set_blink(3, true).unwrap();
        client.set_underglow(ORANGE, true).unwrap();

        let state = device.state();
        assert_eq!(state.mode, Mode::Managed);
        assert_eq!(state.leds.color(3), Some(ORANGE));
        assert_eq!(state.leds.color(2), Some(Hsv::BLACK));
        assert_eq!(state.leds.blink_mask(), 0);
        assert_eq!(device.underglow(), None);

        client.exit_managed().unwrap();
        assert_eq!(device.state().mode, Mode::Native);
        assert!(device.rendered().is_empty());
    }

    #[test]
    fn test_set_range_is_chunked() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let mut client = client(&device);
        client.connect().unwrap();
        client.enter_managed().unwrap();

        let colors: Vec<Hsv> = (0..12).map(|i| Hsv::new(i * 10, 255, 100)).collect();
        client.set_range(0, &colors).unwrap();
        assert_eq!(device.state().leds.colors().to_vec(), colors);

        let ranges = device
            .written()
            .iter()
            .filter(|frame| frame[0] == Opcode::SetRange.as_raw())
            .count();
        assert_eq!(ranges, 2);
    }

    #[test]
    fn test_daemon_ambient_follows_events_across_reconnect() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let (mut daemon, _dir, log) = daemon(&device, DisplayMode::Ambient);
        let now = Instant::now();

        daemon.step(now);
        assert!(daemon.client().is_connected());
        assert_eq!(device.state().mode, Mode::Managed);

        append(&log, &[r#"{"session": "a", "event": "Stop"}"#]);
        daemon.step(now);
        assert_eq!(device.state().leds.colors(), &[ORANGE; 12]);

        device.unplug();
        append(&log, &[r#"{"session": "a", "event": "PreToolUse"}"#]);
        daemon.step(now);
        assert!(!daemon.client().is_connected());

        // Still unplugged, events keep being consumed
        append(&log, &[r#"{"session": "a", "event": "Notification", "notif": "permission_prompt"}"#]);
        daemon.step(now);
        assert!(!daemon.client().is_connected());

        device.plug_in();
        daemon.step(now);
        assert!(daemon.client().is_connected());
        assert_eq!(device.state().leds.colors(), &[ORANGE; 12]);
    }

    #[test]
    fn test_daemon_drops_link_when_takeover_fails() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let (mut daemon, _dir, _log) = daemon(&device, DisplayMode::Ambient);
        let now = Instant::now();

        device.reject(Some(Opcode::EnterManaged.as_raw()));
        daemon.step(now);
        assert!(!daemon.client().is_connected());
        assert!(!device.is_open());
        assert_eq!(device.state().mode, Mode::Native);

        device.reject(None);
        daemon.step(now);
        assert!(daemon.client().is_connected());
        assert_eq!(device.state().mode, Mode::Managed);
    }

    #[test]
    fn test_daemon_sessions_render() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let (mut daemon, _dir, log) = daemon(&device, DisplayMode::Sessions);
        let now = Instant::now();

        daemon.step(now);
        assert_eq!(
            device.underglow(),
            Some((ORANGE, UnderglowEffect::Breathing))
        );

        append(
            &log,
            &[
                r#"{"session": "a", "event": "Stop"}"#,
                r#"{"session": "b", "event": "PreToolUse"}"#,
            ],
        );
        daemon.step(now);

        let state = device.state();
        assert_eq!(state.leds.color(9), Some(ORANGE));
        assert_eq!(state.leds.color(8), Some(Hsv::new(9, 255, 80)));
        assert_eq!(state.leds.color(0), Some(Hsv::BLACK));
        assert!(state.leds.is_blinking(9));
        assert!(state.leds.is_blinking(10));
        assert!(state.leds.is_blinking(11));
        assert!(!state.leds.is_blinking(8));

        // A press on an empty slot is consumed without effect
        assert!(device.press_key(2, 3));
        daemon.step(now);
        assert!(daemon.client().is_connected());
    }

    #[test]
    fn test_shutdown_restores_native() {
        let device = EmulatedDevice::new(Dialect::RawHid);
        let (mut daemon, _dir, log) = daemon(&device, DisplayMode::Sessions);
        let now = Instant::now();
        append(&log, &[r#"{"session": "a", "event": "Stop"}"#]);
        daemon.step(now);
        daemon.step(now);
        assert!(device.state().leds.is_blinking(9));

        daemon.restore();
        let state = device.state();
        assert_eq!(state.mode, Mode::Native);
        assert_eq!(state.leds.blink_mask(), 0);
        assert_eq!(
            device.underglow(),
            Some((Hsv::BLACK, UnderglowEffect::Static))
        );
        assert!(!daemon.client().is_connected());
        assert!(!device.is_open());
    }
}
