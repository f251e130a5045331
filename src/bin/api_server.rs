// HTTP API server binary for game-backlog
// Serves filter vocabulary, search/browse pages, and backlog submissions

use anyhow::Result;
use game_backlog::api::ApiServer;
use game_backlog::rawg::RawgClient;
use game_backlog::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    game_backlog::tracing::init_tracing("info")?;

    tracing::info!("Initializing game-backlog API server");

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();

    // RAWG access is mandatory; Notion credentials are only needed by the
    // submit endpoint and are logged (redacted) for visibility.
    env_util::preflight_check(
        "api_server",
        &["RAWG_API_KEY"],
        &[
            "API_HOST",
            "API_PORT",
            "ALLOWED_ORIGINS",
            "NOTION_API_KEY",
            "NOTION_DATABASE_ID",
        ],
    )?;

    let server = ApiServer::from_env()?;
    let catalog = RawgClient::from_env()?;

    server.run(catalog).await
}
