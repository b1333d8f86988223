use anyhow::Result;
use egrul_ingest::{
    config::Config,
    import::{RunReport, RUN_REPORT_FILE},
    store::EntityStore,
    types::EntityKind,
};
use tracing::info;

pub async fn show_stats(config: Config) -> Result<()> {
    info!("Loading store statistics...");
    let data_dir = &config.store.data_dir;

    let store = match EntityStore::open(data_dir) {
        Ok(store) => store,
        Err(e) => {
            println!("No entity store found in {}: {}", data_dir.display(), e);
            println!("\nTo create one, run:");
            println!("  egrul-ingest enrich <input-folder>");
            return Ok(());
        }
    };

    println!("\nEntity Store Statistics");
    println!("=======================");
    println!("Data directory:  {}", data_dir.display());
    println!("Total entities:  {}", store.len());
    println!("Legal entities:  {}", store.count_by_kind(EntityKind::Legal));
    println!("Proprietors:     {}", store.count_by_kind(EntityKind::Individual));

    let report_path = data_dir.join(RUN_REPORT_FILE);
    if !report_path.exists() {
        return Ok(());
    }
    let report = RunReport::load(&report_path)?;

    println!("\nLast Run");
    println!("========");
    println!("Run id:          {}", report.run_id);
    println!("Registry:        {}", report.registry);
    println!("Input folder:    {}", report.input_dir.display());
    println!("Started:         {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(finished) = report.finished_at {
        println!("Finished:        {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("Archives:        {}", report.archives.len());
    println!("Failed archives: {}", report.failed_archives.len());
    println!("Failed members:  {}", report.failed_members());
    println!("Records:         {}", report.records());
    println!("Rate:            {:.1} records/s", report.stats.records_per_second);
    if report.cancelled {
        println!("Cancelled:       yes");
    }

    for failed in &report.failed_archives {
        println!("  {}: {}", failed.archive.display(), failed.reason);
    }
    for archive in report.archives.iter().filter(|a| !a.failed_members.is_empty()) {
        for member in &archive.failed_members {
            println!(
                "  {} / {}: {}",
                archive.archive.display(),
                member.member,
                member.error
            );
        }
    }

    Ok(())
}
