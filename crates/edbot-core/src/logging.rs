use std::{fs::OpenOptions, sync::Mutex};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{config::Config, errors::Error, Result};

/// Initialize logging/tracing for the bot.
///
/// Console output always; a second plain-text layer appends to
/// `general.log_file` when configured. `RUST_LOG` overrides the configured level.
pub fn init(service_name: &str, cfg: &Config) -> Result<()> {
    let level = cfg.log_level.as_str().to_lowercase();
    let default_directive =
        format!("warn,{service_name}={level},edbot_core={level},edbot_discord={level}");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_directive));

    let console = fmt::layer().with_target(false).with_ansi(true);

    let file = match &cfg.log_file {
        Some(path) => {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Error::Config(format!("cannot open log file {}: {e}", path.display()))
                })?;
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(handle))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::External(format!("logging already initialized: {e}")))?;

    Ok(())
}
