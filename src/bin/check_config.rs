//! Validate a where-its-at configuration and print the effective result.
//!
//! Usage: `wia-check-config [PATH]`
//!
//! The path defaults to `$WHEREITS_CONFIG`, then the per-user config file.
//! `WHEREITS_*` overrides are applied before validation, so the printed TOML
//! is exactly what a running service would use.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use where_its_at::{AppConfig, SearchService, logging};
use wia_search::SourceRegistry;

fn main() -> anyhow::Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("WHEREITS_CONFIG").map(PathBuf::from))
        .unwrap_or_else(AppConfig::default_config_path);

    let config = AppConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    logging::init(&config.logging)?;

    let registry = SourceRegistry::builder().build()?;
    let service = SearchService::from_config(&config, registry)?;
    info!(
        path = %path.display(),
        cache = service.aggregator().cache().is_some(),
        max_concurrent = config.search.max_concurrent_requests,
        "configuration ok"
    );

    let rendered = toml::to_string_pretty(&config).context("rendering effective config")?;
    print!("{rendered}");
    Ok(())
}
