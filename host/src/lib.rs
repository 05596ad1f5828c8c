//! Host side of keylight
//!
//! Agent hooks append event records to a log file, the daemon tails that
//! log and drives the keyboard LEDs over the framed protocol.

pub mod client;
pub mod config;
pub mod daemon;
pub mod events;
pub mod focus;
pub mod hooks;
pub mod manual;
pub mod sessions;
pub mod translator;
pub mod transport;

pub use client::{BackendKind, ClientError, KeyboardClient, LedClient};
pub use config::Config;
pub use daemon::Daemon;
