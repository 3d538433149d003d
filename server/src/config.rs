use clap::Parser;
use presence_system::HubConfig;
use std::time::Duration;

/// Grid presence collaboration server
#[derive(Parser, Debug, Clone)]
#[command(name = "presence-server", version)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "PRESENCE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PRESENCE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between periodic pushes to each connection
    #[arg(
        long,
        env = "PRESENCE_TICK_INTERVAL_SECS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub tick_interval_secs: u64,
}

impl Config {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig::default().with_tick_interval(Duration::from_secs(self.tick_interval_secs))
    }
}
