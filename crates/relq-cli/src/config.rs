use relq::{MonitorConfig, RelationRegistry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_path: PathBuf,
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;

        let file = ConfigFile::parse(&raw).map_err(|e| {
            anyhow::anyhow!(
                "failed to load config file {}: {e:#}",
                config_path.display()
            )
        })?;

        Ok(Self {
            config_path,
            config_dir,
            file,
        })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    /// Load relation metadata; `.json` files are read as JSON, anything else as TOML.
    pub fn registry(&self) -> anyhow::Result<RelationRegistry> {
        let path = self.resolve_path(&self.file.metadata.file);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read metadata {}: {e}", path.display()))?;

        let registry = if path.extension().is_some_and(|ext| ext == "json") {
            let json: serde_json::Value = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            RelationRegistry::from_json(&json)?
        } else {
            RelationRegistry::from_toml_str(&raw)?
        };
        Ok(registry)
    }

    /// `--database` wins over `database.url`; `${VAR}` references are
    /// expanded only here so offline commands work without them.
    pub fn database_url(&self, database: Option<String>) -> anyhow::Result<String> {
        if let Some(v) = database {
            return Ok(v);
        }
        match &self.file.database {
            Some(db) => expand_env_vars(&db.url),
            None => anyhow::bail!(
                "database URL is required: pass --database or set database.url in {}",
                self.config_path.display()
            ),
        }
    }

    /// Per-batch timeout for graph inserts.
    pub fn seed_statement_timeout(&self) -> Option<Duration> {
        self.file.seed.statement_timeout_ms.map(Duration::from_millis)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let m = &self.file.monitor;
        let mut config = MonitorConfig::new();
        if m.enabled {
            config = config.enable_monitoring();
        }
        if let Some(ms) = m.slow_query_ms {
            config = config.with_slow_query_threshold(Duration::from_millis(ms));
        }
        if let Some(ms) = m.query_timeout_ms {
            config = config.with_query_timeout(Duration::from_millis(ms));
        }
        if let Some(len) = m.max_sql_length {
            config = config.max_sql_length(len);
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub database: Option<DatabaseConfig>,
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub fetch: FetchSection,

    #[serde(default)]
    pub seed: SeedSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    pub file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorSection {
    #[serde(default)]
    pub enabled: bool,
    pub slow_query_ms: Option<u64>,
    pub query_timeout_ms: Option<u64>,
    pub max_sql_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchSection {
    pub max_depth: Option<usize>,
    pub statement_timeout_ms: Option<u64>,
}

/// Graph insert settings for `relq seed`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedSection {
    /// Timeout for each batch `INSERT`.
    pub statement_timeout_ms: Option<u64>,
}

impl ConfigFile {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut file: ConfigFile = toml::from_str(raw)?;
        file.metadata.file = expand_env_vars(&file.metadata.file)?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim() != "1" {
            anyhow::bail!("unsupported config version: {}", self.version);
        }
        if let Some(db) = &self.database
            && db.url.trim().is_empty()
        {
            anyhow::bail!("database.url must not be empty");
        }
        if self.metadata.file.trim().is_empty() {
            anyhow::bail!("metadata.file must not be empty");
        }
        if self.fetch.max_depth == Some(0) {
            anyhow::bail!("fetch.max_depth must be at least 1");
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}}}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = "1"

[database]
url = "${RELQ_CLI_TEST_URL}"

[metadata]
file = "relations.toml"

[monitor]
enabled = true
slow_query_ms = 250

[fetch]
max_depth = 4
statement_timeout_ms = 1000

[seed]
statement_timeout_ms = 5000
"#;

    #[test]
    fn parses_sample_config() {
        let file = ConfigFile::parse(SAMPLE).unwrap();
        assert_eq!(file.metadata.file, "relations.toml");
        assert!(file.monitor.enabled);
        assert_eq!(file.monitor.slow_query_ms, Some(250));
        assert_eq!(file.fetch.max_depth, Some(4));
        assert_eq!(file.fetch.statement_timeout_ms, Some(1000));
        assert_eq!(file.seed.statement_timeout_ms, Some(5000));
        // expanded lazily
        assert_eq!(file.database.unwrap().url, "${RELQ_CLI_TEST_URL}");
    }

    #[test]
    fn seed_timeout_is_separate_from_fetch() {
        let raw = SAMPLE.replace("[seed]\nstatement_timeout_ms = 5000\n", "");
        let project = ProjectConfig {
            config_path: PathBuf::from("relq.toml"),
            config_dir: PathBuf::from("."),
            file: ConfigFile::parse(&raw).unwrap(),
        };
        assert_eq!(project.file.fetch.statement_timeout_ms, Some(1000));
        assert_eq!(project.seed_statement_timeout(), None);
    }

    #[test]
    fn database_override_skips_expansion() {
        let project = ProjectConfig {
            config_path: PathBuf::from("relq.toml"),
            config_dir: PathBuf::from("."),
            file: ConfigFile::parse(SAMPLE).unwrap(),
        };
        let url = project
            .database_url(Some("postgres://localhost/other".to_string()))
            .unwrap();
        assert_eq!(url, "postgres://localhost/other");
    }

    #[test]
    fn monitor_section_maps_to_monitor_config() {
        let project = ProjectConfig {
            config_path: PathBuf::from("relq.toml"),
            config_dir: PathBuf::from("."),
            file: ConfigFile::parse(SAMPLE).unwrap(),
        };
        let config = project.monitor_config();
        assert!(config.monitoring_enabled);
        assert_eq!(config.slow_query_threshold, Some(Duration::from_millis(250)));
        assert_eq!(config.query_timeout, None);
    }

    #[test]
    fn rejects_bad_version_and_depth() {
        let raw = SAMPLE.replace("version = \"1\"", "version = \"2\"");
        assert!(ConfigFile::parse(&raw).is_err());

        let raw = SAMPLE.replace("max_depth = 4", "max_depth = 0");
        assert!(ConfigFile::parse(&raw).is_err());
    }

    #[test]
    fn expand_env_vars_errors() {
        assert!(expand_env_vars("${").is_err());
        assert!(expand_env_vars("${}").is_err());
        assert!(expand_env_vars("${RELQ_CLI_SURELY_UNSET_VAR}").is_err());
        assert_eq!(expand_env_vars("plain").unwrap(), "plain");
    }
}
