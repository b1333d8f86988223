use anyhow::{Context, Result};
use egrul_ingest::{config::Config, links::LinksWriter, store::EntityStore};
use tracing::info;

pub async fn write_links(config: Config) -> Result<()> {
    let store = EntityStore::open(&config.store.data_dir).with_context(|| {
        format!("Failed to open store in '{}'", config.store.data_dir.display())
    })?;
    info!("Writing links for {} entities", store.len());

    let writer = LinksWriter::new(&config.links)?;
    let summary = writer.write_all(&store)?;

    println!("Total links: {}", summary.links);
    println!("Total files: {}", summary.files);
    if summary.skipped > 0 {
        println!("Skipped (no INN): {}", summary.skipped);
    }
    println!("Output: {}", config.links.output_dir.display());
    Ok(())
}
