use crate::cli::InitArgs;
use std::path::Path;

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    write_template(&args.config)?;
    println!("wrote {}", args.config.display());
    Ok(())
}

fn write_template(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", path.display());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("failed to create directory {}: {e}", parent.display())
        })?;
    }

    std::fs::write(path, TEMPLATE.trim_start())
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    Ok(())
}

const TEMPLATE: &str = r#"
version = "1"

[database]
url = "${DATABASE_URL}"

[metadata]
# TOML or JSON entity/relation mapping
file = "relations.toml"

[monitor]
enabled = false
# slow_query_ms = 200
# query_timeout_ms = 5000
# max_sql_length = 200

[fetch]
max_depth = 10
# statement_timeout_ms = 5000

[seed]
# per-batch INSERT timeout
# statement_timeout_ms = 5000
"#;
