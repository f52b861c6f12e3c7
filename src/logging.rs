use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber on stderr. `RUST_LOG` wins over the config level.
pub fn init(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.json {
        builder.with_ansi(false).json().init();
    } else {
        builder.init();
    }
}
