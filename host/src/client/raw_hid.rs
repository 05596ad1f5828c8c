use keylight::protocol::{Command, MAX_RANGE_LEN, Response};
use keylight::Hsv;

use super::{Backend, BackendKind, ClientError, Link};

/// The minimal framed protocol, one command per frame
#[derive(Debug, Default)]
pub struct RawHid;

impl RawHid {
    fn command(link: &mut Link, command: &Command) -> Result<Response, ClientError> {
        let reply = link.request(&command.encode())?;
        let response = Response::decode(&reply)?;
        if !response.is_ok() {
            return Err(ClientError::Rejected(response.opcode));
        }
        Ok(response)
    }
}

impl Backend for RawHid {
    fn kind(&self) -> BackendKind {
        BackendKind::RawHid
    }

    fn probe(&mut self, link: &mut Link) -> Result<u8, ClientError> {
        let response = Self::command(link, &Command::Ping)?;
        Ok(response.detail)
    }

    fn enter_managed(&mut self, link: &mut Link) -> Result<(), ClientError> {
        Self::command(link, &Command::EnterManaged).map(|_| ())
    }

    fn exit_managed(&mut self, link: &mut Link) -> Result<(), ClientError> {
        Self::command(link, &Command::ExitManaged).map(|_| ())
    }

    fn set_all(&mut self, link: &mut Link, color: Hsv) -> Result<(), ClientError> {
        Self::command(link, &Command::SetAll(color)).map(|_| ())
    }

    fn set_one(&mut self, link: &mut Link, index: u8, color: Hsv) -> Result<(), ClientError> {
        Self::command(link, &Command::SetOne { index, color }).map(|_| ())
    }

    fn set_range(&mut self, link: &mut Link, start: u8, colors: &[Hsv]) -> Result<(), ClientError> {
        let mut offset = start;
        for chunk in colors.chunks(MAX_RANGE_LEN) {
            // chunks() never yields more than MAX_RANGE_LEN
            if let Some(command) = Command::set_range(offset, chunk) {
                Self::command(link, &command)?;
            }
            #[allow(clippy::cast_possible_truncation)]
            let len = chunk.len() as u8;
            offset = offset.saturating_add(len);
        }
        Ok(())
    }

    fn set_blink(&mut self, link: &mut Link, index: u8, enabled: bool) -> Result<(), ClientError> {
        Self::command(link, &Command::SetBlink { index, enabled }).map(|_| ())
    }

    fn set_blink_period(&mut self, link: &mut Link, period_ms: u16) -> Result<(), ClientError> {
        Self::command(link, &Command::SetBlinkPeriod(period_ms)).map(|_| ())
    }

    fn set_underglow(&mut self, link: &mut Link, color: Hsv, animated: bool) -> Result<(), ClientError> {
        let command = if animated {
            Command::UnderglowBreathe(color)
        } else {
            Command::SetUnderglow(color)
        };
        Self::command(link, &command).map(|_| ())
    }

    fn reboot(&mut self, link: &mut Link) -> Result<(), ClientError> {
        Self::command(link, &Command::reboot()).map(|_| ())
    }
}
