use chaos_star_client::api::server;
use chaos_star_client::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger (set RUST_LOG=debug for verbose output, RUST_LOG=info for normal)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // BIND_ADDRESS defaults to 0.0.0.0:5002
    let config = ClientConfig::from_env();

    log::info!("Starting Chaos Star client API on {}", config.bind_address);
    server::start_server(config).await?;
    Ok(())
}
