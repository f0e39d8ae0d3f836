//! Evaluate command - recovers trace links between two element files

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::knowledge::{link_elements, Element, TraceLink};
use crate::infrastructure::cache::CacheManager;
use crate::infrastructure::logging;
use crate::infrastructure::services::TraceLinkRecoveryService;

/// Arguments for the evaluate command
#[derive(Args, Clone)]
pub struct EvaluateArgs {
    /// JSON file with the source elements
    #[arg(long)]
    pub source: PathBuf,

    /// JSON file with the target elements
    #[arg(long)]
    pub target: PathBuf,

    /// Where to write the trace links, stdout when omitted
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Directory holding `default` and `local` configuration files
    #[arg(long, default_value = "config")]
    pub config_dir: String,
}

/// Run a recovery with the loaded configuration
pub async fn run(args: EvaluateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load_from(&args.config_dir)
        .with_context(|| format!("Failed to load configuration from {}", args.config_dir))?;
    logging::init_logging(&logging::LoggingConfig::from(&config.logging));

    let sources = read_elements(&args.source)?;
    let targets = read_elements(&args.target)?;

    let cache_manager = Arc::new(CacheManager::new(config.cache.clone()).await?);
    let service = TraceLinkRecoveryService::from_config(&config.pipeline, cache_manager)?;
    let links = service.run(sources, targets).await?;

    write_links(&links.into_iter().collect::<Vec<_>>(), args.output.as_deref())
}

fn read_elements(path: &Path) -> anyhow::Result<Vec<Arc<Element>>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let elements: Vec<Element> = serde_json::from_str(&data)
        .with_context(|| format!("Invalid element list in {}", path.display()))?;

    info!(path = %path.display(), elements = elements.len(), "Loaded elements");
    Ok(link_elements(elements)?)
}

fn write_links(links: &[TraceLink], output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(links)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), links = links.len(), "Wrote trace links");
        }
        None => println!("{}", json),
    }

    Ok(())
}
