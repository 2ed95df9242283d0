//! `tutorly serve`: Start the HTTP API server.

use tutorly_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        tracing::warn!("No API key configured; generation will fall back until one is set");
    }

    println!("Tutorly Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Cache:     {} (ttl {}s)", config.cache.backend, config.cache.ttl_secs);
    println!("   Retriever: {}", config.retriever.backend);

    tutorly_gateway::start(config).await?;

    Ok(())
}
