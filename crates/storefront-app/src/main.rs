use storefront_hex::application::TokenService;
use storefront_hex::config::Config;
use storefront_hex::inbound::http::{HttpServer, HttpServerConfig};
use storefront_repo::{build_repo, Repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for DATABASE_URL / SERVER_PORT / JWT_KEY when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
        .init();

    let config = Config::from_env()?;
    let repo: Repo = build_repo(config.database_url.as_deref()).await?;
    let tokens = TokenService::new(&config.auth);
    tracing::info!(ttl_days = config.auth.token_ttl_days, "anonymous tokens configured");

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };

    let http = HttpServer::new(repo, tokens, server_cfg).await?;
    http.run().await
}
