//! `localid serve` — host the session registry service.

use anyhow::Result;

use localid::config::AppConfig;
use localid::registry::server::{ServerConfig, start_server};

pub async fn serve(config: &AppConfig, port: Option<u16>) -> Result<()> {
    let mut host = config.registry.host;
    if let Some(port) = port {
        host.set_port(port);
    }
    start_server(ServerConfig {
        host,
        ttl: chrono::Duration::hours(config.registry.ttl_hours),
        sweep_period: std::time::Duration::from_secs(config.registry.sweep_minutes * 60),
        dev_mode: config.registry.dev_mode,
    })
    .await
}
