use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_hook::consts::{SIGINT, SIGTERM};

use keylight_host::config::{Config, DisplayMode};
use keylight_host::events::EventLog;
use keylight_host::transport::{Connector, EmulatedDevice};
use keylight_host::manual::{self, LedAction};
use keylight_host::{Daemon, KeyboardClient, hooks};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "keylight")]
#[command(version = VERSION)]
#[command(about = "Shows agent activity on the keyboard LEDs")]
struct Cli {
    /// Config file, defaults to ~/.config/keylight/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write logs here instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge daemon
    Run {
        /// Drive an in-process emulated keyboard instead of USB
        #[arg(long)]
        emulate: bool,
        #[arg(long, value_enum)]
        mode: Option<DisplayMode>,
    },
    /// Register or unregister the agent hooks
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },
    /// Record one hook payload from stdin, called by the agent
    Hook,
    /// Print events as they are appended to the log
    Watch {
        /// Replay the existing log first
        #[arg(long)]
        from_start: bool,
    },
    /// Send one LED command
    Led {
        #[arg(long)]
        emulate: bool,
        #[command(subcommand)]
        action: LedAction,
    },
    /// Connect once and report what the keyboard speaks
    Probe {
        #[arg(long)]
        emulate: bool,
    },
}

#[derive(Subcommand)]
enum HooksAction {
    Install {
        /// Agent settings file, defaults to ~/.claude/settings.json
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    Remove {
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.format_timestamp_millis().init();
    Ok(())
}

fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;
    Ok(shutdown)
}

fn connector(config: &Config, emulate: bool) -> Result<Box<dyn Connector>> {
    if emulate {
        return Ok(Box::new(EmulatedDevice::default()));
    }
    #[cfg(feature = "hid")]
    {
        Ok(Box::new(keylight_host::transport::HidConnector::new(config.device)))
    }
    #[cfg(not(feature = "hid"))]
    {
        let _ = config;
        anyhow::bail!("built without USB support (feature `hid`), pass --emulate")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { emulate, mode } => {
            if let Some(mode) = mode {
                config.mode = mode;
            }
            let shutdown = shutdown_flag()?;
            let connector = connector(&config, emulate)?;
            log::info!("keylight {VERSION}, keyboard at {}", connector.describe());
            Daemon::new(config, connector, shutdown).run();
        }
        Commands::Hooks { action } => match action {
            HooksAction::Install { settings } => {
                let settings = settings.unwrap_or(config.settings_path);
                let exe = std::env::current_exe().context("failed to locate own executable")?;
                let command = format!("{} hook", exe.display());
                let added = hooks::install(&settings, &command)?;
                if added.is_empty() {
                    println!("hooks already installed in {}", settings.display());
                } else {
                    println!("installed hooks for {} in {}", added.join(", "), settings.display());
                }
            }
            HooksAction::Remove { settings } => {
                let settings = settings.unwrap_or(config.settings_path);
                let removed = hooks::remove(&settings)?;
                println!("removed {removed} hook entries from {}", settings.display());
            }
        },
        Commands::Hook => {
            // A failing hook must never get in the agent's way
            let terminal = std::env::var("ITERM_SESSION_ID").ok();
            if let Err(err) = hooks::record(std::io::stdin().lock(), &config.event_log, terminal) {
                log::error!("failed to record hook event: {err:#}");
            }
        }
        Commands::Watch { from_start } => {
            let shutdown = shutdown_flag()?;
            let mut log = if from_start {
                EventLog::open_at_start(&config.event_log)
            } else {
                EventLog::open_at_end(&config.event_log)
            };
            while !shutdown.load(Ordering::Relaxed) {
                for event in log.poll()? {
                    println!("{:20} {}", event.event, event.detail());
                }
                std::thread::sleep(config.poll_interval());
            }
        }
        Commands::Led { emulate, action } => {
            let connector = connector(&config, emulate)?;
            let target = connector.describe();
            let mut client = KeyboardClient::new(connector, config.response_timeout());
            client
                .connect()
                .with_context(|| format!("failed to connect to {target}"))?;
            manual::apply(&mut client, &action)
                .with_context(|| format!("{action:?} failed on {target}"))?;
            client.disconnect();
        }
        Commands::Probe { emulate } => {
            let connector = connector(&config, emulate)?;
            let target = connector.describe();
            let mut client = KeyboardClient::new(connector, config.response_timeout());
            let backend = client
                .connect()
                .with_context(|| format!("failed to connect to {target}"))?;
            println!(
                "{target}: {backend}, {} LEDs",
                client.led_count().unwrap_or(0)
            );
            client.disconnect();
        }
    }

    Ok(())
}
