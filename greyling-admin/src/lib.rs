mod accounting;
mod config;
mod shutdown;

pub use accounting::{AcctEvent, AccountingSink, LogLevel, Stats, StatsSnapshot, TracingSink};
pub use config::{Config, Transport};
pub use shutdown::wait_for_shutdown_signal;

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
