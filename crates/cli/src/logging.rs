use smartshop_core::config::{AppConfig, LogFormat};
use tracing::Level;

/// Installs the global subscriber. Logs go to stderr so stdout stays pure JSON.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_logging(config: &AppConfig) -> bool {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
