use anyhow::{Context, Result};
use clap::Parser;
use crowdpad::chat::{Bot, CommandError, LogSink, MessageSink, User};
use crowdpad::core::BotConfig;
use crowdpad::engine::controller::{FileSlotStore, LoggingDevice, MemorySlotStore, SlotStore, VirtualDevice};
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

/// Reads chat lines from stdin and plays them on virtual controllers
#[derive(Debug, Parser)]
#[command(name = "crowdpad", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Console profile override (snes, n64, gc, wii)
    #[arg(long)]
    console: Option<String>,

    /// Number of virtual controllers override
    #[arg(long)]
    controllers: Option<usize>,

    /// Name of the local chat user
    #[arg(long, default_value = "console")]
    user: String,

    /// Permission level of the local chat user
    #[arg(long, default_value_t = 0)]
    level: u32,

    /// Controller port of the local chat user
    #[arg(long, default_value_t = 0)]
    port: usize,
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BotConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => BotConfig::default(),
    };
    if let Some(console) = cli.console {
        config.input.console = console;
    }
    if let Some(count) = cli.controllers {
        config.controllers.count = count;
    }

    let sink: Arc<dyn MessageSink> = Arc::new(LogSink);
    let store: Arc<dyn SlotStore> = match &config.slots.state_dir {
        Some(dir) => Arc::new(FileSlotStore::new(dir)),
        None => Arc::new(MemorySlotStore::new()),
    };
    let devices = (0..config.controllers.count)
        .map(|port| Box::new(LoggingDevice::new(port)) as Box<dyn VirtualDevice>)
        .collect();

    let bot = Bot::from_config(&config, devices, sink.clone(), store)?;
    info!(
        "Starting crowdpad: {} with {} controllers",
        config.input.console, config.controllers.count
    );

    let user = User::new(cli.user, cli.level).with_controller(cli.port);
    let mut running = Vec::new();

    for line in std::io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        match bot.submit_command(&line, &user) {
            Ok(submission) => {
                if let Some(reply) = &submission.reply {
                    sink.send_message(reply);
                }
                running.push(submission);
            }
            Err(CommandError::Parse(err)) => {
                sink.send_message(&format!("{} at {}: {}", err.code(), err.position(), err));
            }
            Err(err @ (CommandError::Paused | CommandError::UnknownController(_) | CommandError::Macro(_))) => {
                warn!("{}: {}", user.name, err);
                sink.send_message(&err.to_string());
            }
            Err(err) => error!("{}", err),
        }

        running.retain(|submission| {
            submission
                .handle
                .as_ref()
                .map_or(false, |handle| !handle.is_finished())
        });
    }

    info!("Input closed, waiting for {} running commands", running.len());
    for submission in running {
        if let Err(err) = submission.join() {
            error!("{}", err);
        }
    }

    Ok(())
}
