//! Command-line entry point: apply definitions, run materializations and
//! fetch online features for a feature repository on disk.

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use featherstore::online::EntityRow;
use featherstore::store::{FeatureStore, RegistryObject};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "featherstore", about = "Feature store operations")]
struct Cli {
    /// Path to the feature repository.
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply entity / feature view / feature service definitions from a
    /// JSON file.
    Apply {
        /// Path to a JSON array of definitions.
        definitions: PathBuf,
    },

    /// Materialize a closed historical window into the online store.
    Materialize {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Comma-separated view names; all online views when omitted.
        #[arg(long, value_delimiter = ',')]
        views: Option<Vec<String>>,
    },

    /// Materialize the latest values as of the end date.
    MaterializeIncremental {
        #[arg(long)]
        end: String,
        #[arg(long, value_delimiter = ',')]
        views: Option<Vec<String>>,
    },

    /// Fetch current feature values for entity rows given as JSON objects.
    Online {
        /// Comma-separated `view:feature` references.
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,
        /// Entity rows, each a JSON object of join-key values.
        #[arg(long)]
        entities: Vec<String>,
    },

    /// List registered definitions.
    List,

    /// Clear the registry and the online store.
    Teardown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let store = FeatureStore::new(&cli.repo)?;

    match cli.command {
        Command::Apply { definitions } => {
            let contents = std::fs::read_to_string(&definitions)
                .with_context(|| format!("reading {}", definitions.display()))?;
            let objects: Vec<RegistryObject> = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", definitions.display()))?;
            let count = objects.len();
            store.apply(objects)?;
            println!("Applied {} definition(s)", count);
        }

        Command::Materialize { start, end, views } => {
            let start = parse_datetime(&start)?;
            let end = parse_datetime(&end)?;
            store.materialize(start, end, views.as_deref()).await?;
            println!("Materialized window {} .. {}", start, end);
        }

        Command::MaterializeIncremental { end, views } => {
            let end = parse_datetime(&end)?;
            store.materialize_incremental(end, views.as_deref()).await?;
            println!("Materialized up to {}", end);
        }

        Command::Online { features, entities } => {
            let mut entity_rows: Vec<EntityRow> = Vec::with_capacity(entities.len());
            for raw in &entities {
                entity_rows.push(serde_json::from_str(raw).with_context(|| format!("parsing entity row {}", raw))?);
            }
            let df = store.get_online_features(&features, &entity_rows, None)?;
            println!("{}", df);
        }

        Command::List => {
            for entity in store.list_entities()? {
                println!("entity          {}", entity.name);
            }
            for view in store.list_feature_views()? {
                let mode = if view.online { "online" } else { "offline-only" };
                println!("feature view    {} ({}, {} features)", view.name, mode, view.features.len());
            }
            for service in store.list_feature_services()? {
                println!("feature service {}", service.name);
            }
        }

        Command::Teardown => {
            store.teardown()?;
            println!("Feature store cleared");
        }
    }

    Ok(())
}

/// Accept either a date (`2025-03-01`, midnight UTC) or a full timestamp
/// (`2025-03-01T10:00:00` or RFC 3339).
fn parse_datetime(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!("Unrecognized date/time '{}'", raw)
}
