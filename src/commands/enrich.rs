use anyhow::Result;
use egrul_ingest::{config::Config, import::EnrichCoordinator};
use tracing::info;

pub async fn run_enrich(config: Config, quiet: bool) -> Result<()> {
    let input_dir = config.input.dir.clone();
    info!(
        "Enriching {} from {} into {}",
        config.registry.kind,
        input_dir.display(),
        config.store.data_dir.display()
    );

    let report = EnrichCoordinator::new(config)
        .with_quiet(quiet)
        .run(&input_dir)
        .await?;

    if !quiet {
        println!("\nRun {}", report.run_id);
        println!("Archives completed: {}", report.archives.len());
        println!("Archives failed:    {}", report.failed_archives.len());
        println!("Failed members:     {}", report.failed_members());
        println!("Records stored:     {}", report.records());
        for failed in &report.failed_archives {
            println!("  FAILED {}: {}", failed.archive.display(), failed.reason);
        }
        if report.cancelled {
            println!("\nRun was cancelled before all members were processed.");
        }
    }

    if !report.failed_archives.is_empty() {
        anyhow::bail!("{} archives failed", report.failed_archives.len());
    }
    Ok(())
}
