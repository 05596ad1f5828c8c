//! One-shot LED commands from the command line
//!
//! Each action is a single client call on a fresh connection. Colors and
//! blink flags only stick while the keyboard is managed, so `init` comes
//! first; the keyboard stays managed between invocations until `restore`.

use clap::Subcommand;
use keylight::Hsv;

use crate::client::{ClientError, KeyboardClient, LedClient};
use crate::daemon::restore_board;

fn parse_hsv(value: &str) -> Result<Hsv, String> {
    value
        .parse()
        .map_err(|()| format!("expected h,s,v with values 0-255, got {value:?}"))
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LedAction {
    /// Take over the LEDs and turn them all off
    Init,
    /// Every per-key LED to one color, e.g. `9,255,200`
    All {
        #[arg(value_parser = parse_hsv)]
        color: Hsv,
    },
    /// One LED
    One {
        index: u8,
        #[arg(value_parser = parse_hsv)]
        color: Hsv,
    },
    /// Start or stop blinking one LED
    Blink {
        index: u8,
        #[arg(long)]
        off: bool,
    },
    /// Blink cycle length, raised to 50 ms by the keyboard if shorter
    BlinkPeriod { ms: u16 },
    /// Underglow color, breathing with `--breathe`
    Underglow {
        #[arg(value_parser = parse_hsv)]
        color: Hsv,
        #[arg(long)]
        breathe: bool,
    },
    /// Black, no blink, underglow off, native effect back
    Restore,
    /// Restart into the bootloader
    Reboot,
}

pub fn apply(client: &mut KeyboardClient, action: &LedAction) -> Result<(), ClientError> {
    match *action {
        LedAction::Init => {
            client.enter_managed()?;
            client.set_all(Hsv::BLACK)
        }
        LedAction::All { color } => client.set_all(color),
        LedAction::One { index, color } => client.set_one(index, color),
        LedAction::Blink { index, off } => client.set_blink(index, !off),
        LedAction::BlinkPeriod { ms } => client.set_blink_period(ms),
        LedAction::Underglow { color, breathe } => client.set_underglow(color, breathe),
        LedAction::Restore => restore_board(client),
        LedAction::Reboot => client.reboot(),
    }
}
