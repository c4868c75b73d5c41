//! Applies pending SQLx migrations. Migrations are embedded at compile time,
//! so this runs as a deploy step without the `migrations/` directory present.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use gunaso_common::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Running database migrations");

    let pool =
        gunaso_store::postgres::connect(&config.database_url, config.database_max_connections)
            .await?;
    gunaso_store::postgres::migrate(&pool).await?;

    Ok(())
}
