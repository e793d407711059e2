use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, ATRIUM_* secrets, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = atrium_gateway::config::config();
    info!("Starting Atrium gateway in {:?} mode", config.environment);

    // Allow tests or deployments to override port via env
    let port = std::env::var("ATRIUM_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);

    atrium_gateway::gateway::serve(port).await
}
