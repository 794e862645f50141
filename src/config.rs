//! TOML configuration for jobpulse.
//!
//! Defaults are compiled in; a file only needs the keys it overrides. The
//! analysis part is turned into an immutable [`AnalysisConfig`] handed to the
//! engine at construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::errors::ErrorPolicy;
use crate::analysis::metrics::HealthThresholds;
use crate::analysis::timeline::BucketTable;
use crate::analysis::AnalysisConfig;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "JOBPULSE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "jobpulse.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub health: HealthThresholds,
    #[serde(default)]
    pub errors: ErrorPolicy,
    #[serde(default)]
    pub timeline: BucketTable,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub artifact_types: ArtifactTypesConfig,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order:
    /// 1. `explicit` (a `--config` flag), which must load.
    /// 2. The path in `JOBPULSE_CONFIG`.
    /// 3. `./jobpulse.toml`.
    /// 4. Compiled-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "JOBPULSE_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            return Self::load(local);
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        self.health.validate()?;
        self.timeline.validate()?;
        if self.query.fetch_limit == 0 {
            anyhow::bail!("query.fetch_limit must be at least 1");
        }
        if self.export.message_max_chars == 0 {
            anyhow::bail!("export.message_max_chars must be at least 1");
        }
        Ok(())
    }

    /// The engine's view of this configuration, with artifact names resolved.
    pub fn analysis(&self) -> Result<AnalysisConfig> {
        Ok(AnalysisConfig {
            fetch_limit: self.query.fetch_limit,
            recent_limit: self.query.recent_limit,
            thresholds: self.health,
            errors: self.errors.clone(),
            buckets: self.timeline.clone(),
            artifact_names: self.artifact_types.load_names()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding ingested job documents.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/jobpulse.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Upper bound on records fetched per request.
    pub fetch_limit: usize,
    /// Most recent jobs listed in a report.
    pub recent_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 10_000,
            recent_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Most failed jobs written to one export.
    pub failed_limit: usize,
    /// Root cause messages are cut to this many characters.
    pub message_max_chars: usize,
    /// Leave cascading failures out of the failed-jobs export.
    pub omit_cascading: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            failed_limit: 5000,
            message_max_chars: 200,
            omit_cascading: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactTypesConfig {
    /// JSON object file mapping artifact type ids to names.
    pub names_file: Option<PathBuf>,
    /// Inline names; these win over `names_file`.
    pub names: HashMap<String, String>,
}

impl ArtifactTypesConfig {
    pub fn load_names(&self) -> Result<ArtifactTypeNames> {
        let mut names = HashMap::new();
        if let Some(path) = &self.names_file {
            let content = std::fs::read_to_string(path).with_context(|| {
                format!("failed to read artifact type names: {}", path.display())
            })?;
            let from_file: HashMap<String, String> = serde_json::from_str(&content)
                .with_context(|| format!("artifact type names are not a JSON object: {}", path.display()))?;
            debug!(path = %path.display(), count = from_file.len(), "loaded artifact type names");
            names.extend(from_file);
        }
        names.extend(self.names.clone());
        Ok(ArtifactTypeNames(names))
    }
}

// ---------------------------------------------------------------------------
// Artifact type names
// ---------------------------------------------------------------------------

/// Friendly names for artifact type ids. Unknown ids resolve to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactTypeNames(HashMap<String, String>);

impl ArtifactTypeNames {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        )
    }

    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.0.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        let analysis = cfg.analysis().unwrap();
        assert_eq!(analysis.fetch_limit, 10_000);
        assert_eq!(analysis.errors.cascading_error_names, ["ChildWorkflowFailure"]);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [health]
            critical_failure_rate = 0.5

            [errors]
            cascading_error_names = ["ChildWorkflowFailure", "ChildActivityFailure"]

            [artifact_types.names]
            "64a0" = "Slide Deck"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.health.degraded_failure_rate, 0.05);
        assert_eq!(cfg.health.critical_failure_rate, 0.5);
        assert_eq!(cfg.errors.cascading_error_names.len(), 2);
        assert_eq!(cfg.query.fetch_limit, 10_000);
        assert_eq!(cfg.analysis().unwrap().artifact_names.resolve("64a0"), "Slide Deck");
    }

    #[test]
    fn test_invalid_thresholds_fail_to_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[health]\ndegraded_failure_rate = 0.4\ncritical_failure_rate = 0.2").unwrap();
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("degraded"));
    }

    #[test]
    fn test_timeline_bucket_cap() {
        let cfg: AppConfig = toml::from_str("[timeline]\nmax_buckets = 48\n").unwrap();
        assert_eq!(cfg.timeline.max_buckets, 48);
        assert_eq!(cfg.timeline.steps.len(), 5);

        let zero: AppConfig = toml::from_str("[timeline]\nmax_buckets = 0\n").unwrap();
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_names_file_merges_with_inline_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"a": "From File", "b": "Also File"}}"#).unwrap();

        let cfg = ArtifactTypesConfig {
            names_file: Some(file.path().to_path_buf()),
            names: HashMap::from([("b".to_string(), "Inline".to_string())]),
        };
        let names = cfg.load_names().unwrap();
        assert_eq!(names.resolve("a"), "From File");
        assert_eq!(names.resolve("b"), "Inline");
        assert_eq!(names.resolve("zzz"), "zzz");
    }
}
