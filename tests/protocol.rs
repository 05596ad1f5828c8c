mod tests {
    use keylight::protocol::{
        Command, FRAME_LEN, Inbound, InvalidFrame, KeyEvent, MAX_RANGE_LEN, Opcode, REBOOT_MAGIC,
        Response, Status, pad,
    };
    use keylight::{Hsv, Rgb};

    const LEDS: u8 = 12;
    const ORANGE: Hsv = Hsv::new(9, 255, 200);

    fn frame(bytes: &[u8]) -> [u8; FRAME_LEN] {
        pad(bytes).unwrap()
    }

    #[test]
    fn test_opcode_table() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::from_raw(opcode.as_raw()), Some(opcode));
        }
        assert_eq!(Opcode::SetOne.as_raw(), 0x01);
        assert_eq!(Opcode::UnderglowBreathe.as_raw(), 0x0A);
        assert_eq!(Opcode::KeyEvent.as_raw(), 0xEE);
        assert_eq!(Opcode::Ping.as_raw(), 0xF0);
        assert_eq!(Opcode::from_raw(0x00), None);
        assert_eq!(Opcode::from_raw(0x0B), None);
    }

    #[test]
    fn test_encode_layouts() {
        let set_one = Command::SetOne {
            index: 3,
            color: ORANGE,
        }
        .encode();
        assert_eq!(&set_one[..5], &[0x01, 3, 9, 255, 200]);
        assert!(set_one[5..].iter().all(|b| *b == 0));

        let period = Command::SetBlinkPeriod(0x0320).encode();
        assert_eq!(&period[..3], &[0x08, 0x20, 0x03]);

        let reboot = Command::reboot().encode();
        assert_eq!(&reboot[..3], &[0x09, 0xB0, 0x07]);

        let range = Command::set_range(2, &[ORANGE, Hsv::BLACK]).unwrap().encode();
        assert_eq!(&range[..9], &[0x02, 2, 2, 9, 255, 200, 0, 0, 0]);
    }

    #[test]
    fn test_set_range_capacity() {
        let full = [ORANGE; MAX_RANGE_LEN];
        let command = Command::set_range(0, &full).unwrap();
        let encoded = command.encode();
        assert_eq!(encoded[2], 9);
        assert_eq!(&encoded[27..30], &[9, 255, 200]);

        assert!(Command::set_range(0, &[ORANGE; MAX_RANGE_LEN + 1]).is_none());
    }

    #[test]
    fn test_decode_matches_encode() {
        let commands = [
            Command::SetAll(ORANGE),
            Command::SetBlink {
                index: 11,
                enabled: true,
            },
            Command::UnderglowBreathe(ORANGE),
            Command::EnterManaged,
            Command::Ping,
        ];
        for command in commands {
            assert_eq!(Command::decode(&command.encode(), LEDS), Ok(command));
        }
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(
            Command::decode(&[0x05], LEDS),
            Err(InvalidFrame::Length(1))
        );
        assert_eq!(
            Command::decode(&[0u8; 33], LEDS),
            Err(InvalidFrame::Length(33))
        );
    }

    #[test]
    fn test_decode_rejects_unknown_opcode() {
        assert_eq!(
            Command::decode(&frame(&[0x42]), LEDS),
            Err(InvalidFrame::UnknownOpcode(0x42))
        );
        // Key events only travel device to host
        assert_eq!(
            Command::decode(&frame(&[0xEE, 1, 1]), LEDS),
            Err(InvalidFrame::UnknownOpcode(0xEE))
        );
    }

    #[test]
    fn test_decode_bounds() {
        assert_eq!(
            Command::decode(&frame(&[0x01, 12, 1, 1, 1]), LEDS),
            Err(InvalidFrame::OutOfBounds)
        );
        assert_eq!(
            Command::decode(&frame(&[0x07, 200, 1]), LEDS),
            Err(InvalidFrame::OutOfBounds)
        );
        // start + count == led count is the last valid range
        assert!(Command::decode(&frame(&[0x02, 10, 2]), LEDS).is_ok());
        assert_eq!(
            Command::decode(&frame(&[0x02, 10, 3]), LEDS),
            Err(InvalidFrame::OutOfBounds)
        );
        assert_eq!(
            Command::decode(&frame(&[0x02, 0, 10]), 64),
            Err(InvalidFrame::OutOfBounds)
        );
        assert_eq!(
            Command::decode(&frame(&[0x02, 250, 9]), LEDS),
            Err(InvalidFrame::OutOfBounds)
        );
    }

    #[test]
    fn test_reboot_magic_kept_as_received() {
        let command = Command::decode(&frame(&[0x09, 0xB0, 0x08]), LEDS).unwrap();
        assert_eq!(command, Command::Reboot { magic: [0xB0, 0x08] });
        assert_ne!([0xB0, 0x08], REBOOT_MAGIC);
    }

    #[test]
    fn test_response_frames() {
        let ok = Response::with_led_count(0x05, 12).encode();
        assert_eq!(&ok[..3], &[0x05, 0x01, 12]);
        let failed = Response::failed(0x02).encode();
        assert_eq!(&failed[..3], &[0x02, 0xFF, 0]);

        let decoded = Response::decode(&ok).unwrap();
        assert_eq!(decoded.status, Status::Ok);
        assert_eq!(decoded.led_count(), Some(12));
        assert_eq!(Response::ok(0x04).led_count(), None);
        assert_eq!(Response::failed(0xF0).led_count(), None);

        assert_eq!(
            Response::decode(&frame(&[0x04, 0x02])),
            Err(InvalidFrame::Status(0x02))
        );
    }

    #[test]
    fn test_inbound_split_by_opcode() {
        let key = KeyEvent::new(1, 2).encode();
        assert_eq!(
            Inbound::decode(&key),
            Ok(Inbound::KeyEvent(KeyEvent::new(1, 2)))
        );
        let response = Response::ok(0x04).encode();
        assert_eq!(
            Inbound::decode(&response),
            Ok(Inbound::Response(Response::ok(0x04)))
        );
    }

    #[test]
    fn test_color_conversion() {
        assert_eq!(Hsv::BLACK.to_rgb(), Rgb::default());
        assert_eq!(Hsv::new(100, 255, 0).to_rgb(), Rgb::default());
        assert_ne!(ORANGE.to_rgb(), Rgb::default());
        assert_eq!("9, 255,200".parse::<Hsv>(), Ok(ORANGE));
        assert!("9,255".parse::<Hsv>().is_err());
        assert!("9,255,300".parse::<Hsv>().is_err());
    }
}
