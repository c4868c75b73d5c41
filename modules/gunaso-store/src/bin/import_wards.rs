//! Seeds palikas and wards from an administrative boundary GeoJSON
//! FeatureCollection. Re-running with the same file replaces outlines in place.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gunaso_common::geo::parse_ward_features;
use gunaso_common::Config;
use gunaso_store::{PgStore, WardStore};

#[derive(Parser)]
#[command(name = "import-wards", about = "Load ward boundaries into the database")]
struct Cli {
    /// GeoJSON FeatureCollection with WARD, PALIKA, TYPE and PROVINCE properties
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let raw = std::fs::read_to_string(&cli.path)
        .with_context(|| format!("Failed to read {}", cli.path.display()))?;
    let collection: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", cli.path.display()))?;

    let features = parse_ward_features(&collection);
    if features.is_empty() {
        warn!(path = %cli.path.display(), "No usable ward features found");
        return Ok(());
    }

    let config = Config::from_env();
    let pool =
        gunaso_store::postgres::connect(&config.database_url, config.database_max_connections)
            .await?;
    let store = PgStore::new(pool);

    let mut palikas: HashMap<String, i64> = HashMap::new();
    let mut imported = 0usize;
    for feature in &features {
        let palika_id = match &feature.palika_name {
            Some(name) => match palikas.get(name) {
                Some(id) => Some(*id),
                None => {
                    let id = store
                        .upsert_palika(
                            name,
                            feature.palika_kind.as_deref().unwrap_or_default(),
                            feature.province.as_deref(),
                        )
                        .await?;
                    palikas.insert(name.clone(), id);
                    Some(id)
                }
            },
            None => None,
        };
        store
            .upsert_ward(&feature.ward_name, palika_id, &feature.geometry)
            .await
            .with_context(|| format!("Failed to store ward {}", feature.ward_name))?;
        imported += 1;
    }

    info!(wards = imported, palikas = palikas.len(), "Ward import complete");
    Ok(())
}
