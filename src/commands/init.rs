use anyhow::Result;
use egrul_ingest::config::{Config, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

pub async fn init_config(path: PathBuf) -> Result<()> {
    let config = Config::default();
    let config_path = path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    let toml_content = format!(
        r#"# egrul-ingest configuration
# REGISTRY_TYPE and DROP_DATABASE override registry.kind and store.drop_existing.

[registry]
# egrul (legal entities) or egrip (sole proprietors)
kind = "{}"
encoding = "{}"
# "flag" marks unknown status codes as ACTIVE_UNKNOWN_CODE, "active" maps them to ACTIVE
unknown_status = "flag"

[input]
dir = "input"
member_extension = "{}"

[pool]
# 0 = one worker per CPU
workers = {}
crash_retries = {}

[store]
data_dir = ".egrul-ingest"
batch_size = {}
drop_existing = false

[links]
hostname = "{}"
output_dir = "links"
file_size = {}

[logging]
format = "text"
level = "{}"
"#,
        config.registry.kind,
        config.registry.encoding,
        config.input.member_extension,
        config.pool.workers,
        config.pool.crash_retries,
        config.store.batch_size,
        config.links.hostname,
        config.links.file_size,
        config.logging.level,
    );

    std::fs::create_dir_all(&path)?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    let input_dir = path.join("input");
    std::fs::create_dir_all(&input_dir)?;
    println!("Created input folder: {}", input_dir.display());

    Ok(())
}
