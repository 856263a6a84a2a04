use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AccessError;

pub const CONFIG_ENV: &str = "NEXUS_ACCESS_CONFIG";
pub const DATABASE_ENV: &str = "NEXUS_ACCESS_DATABASE";
pub const QUERY_METRICS_ENV: &str = "NEXUS_ACCESS_QUERY_METRICS";
pub const DEFAULT_CONFIG_FILE: &str = "nexus-access.toml";
pub const DEFAULT_DATABASE: &str = "nexus";

/// Settings a template is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub database_name: String,
    /// Ask the backend to return execution metrics with every query page.
    pub populate_query_metrics: bool,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_retention: Option<usize>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE.to_string(),
            populate_query_metrics: false,
            log_dir: None,
            log_level: None,
            log_retention: None,
        }
    }
}

/// File form: every key optional so earlier files only fill what they name.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_name: Option<String>,
    populate_query_metrics: Option<bool>,
    log_dir: Option<PathBuf>,
    log_level: Option<String>,
    log_retention: Option<usize>,
}

impl TemplateConfig {
    /// Loads configuration.
    ///
    /// Files are consulted in order (explicit path, `NEXUS_ACCESS_CONFIG`, `./nexus-access.toml`)
    /// and the first file naming a key wins; `NEXUS_ACCESS_DATABASE` and
    /// `NEXUS_ACCESS_QUERY_METRICS` override file values.
    ///
    /// # Errors
    /// `Config` when the explicit path is missing or any consulted file fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AccessError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    fn load_with(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self, AccessError> {
        if let Some(p) = explicit
            && !p.exists()
        {
            return Err(AccessError::Config(format!("config file {} does not exist", p.display())));
        }
        let mut paths: Vec<PathBuf> = Vec::new();
        if let Some(p) = explicit {
            paths.push(p.to_path_buf());
        }
        if let Some(p) = env(CONFIG_ENV) {
            paths.push(PathBuf::from(p));
        }
        if let Ok(cur) = std::env::current_dir() {
            paths.push(cur.join(DEFAULT_CONFIG_FILE));
        }

        let mut merged = FileConfig::default();
        for p in paths.iter().filter(|p| p.exists()) {
            let text = std::fs::read_to_string(p)?;
            let file: FileConfig = toml::from_str(&text)
                .map_err(|e| AccessError::Config(format!("{}: {e}", p.display())))?;
            merged.database_name = merged.database_name.or(file.database_name);
            merged.populate_query_metrics = merged.populate_query_metrics.or(file.populate_query_metrics);
            merged.log_dir = merged.log_dir.or(file.log_dir);
            merged.log_level = merged.log_level.or(file.log_level);
            merged.log_retention = merged.log_retention.or(file.log_retention);
        }

        let mut cfg = Self::default();
        if let Some(db) = env(DATABASE_ENV).or(merged.database_name) {
            cfg.database_name = db;
        }
        if let Some(flag) = env(QUERY_METRICS_ENV).map(|s| parse_flag(&s)).or(merged.populate_query_metrics) {
            cfg.populate_query_metrics = flag;
        }
        cfg.log_dir = merged.log_dir;
        cfg.log_level = merged.log_level;
        cfg.log_retention = merged.log_retention;
        crate::errors::require_text(&cfg.database_name, "database name")?;
        Ok(cfg)
    }

    /// Routes logging according to the `log_*` settings.
    ///
    /// # Errors
    /// `Config` when log4rs cannot be configured.
    pub fn init_logging(&self) -> Result<(), AccessError> {
        crate::logger::configure_logging(self.log_dir.as_deref(), self.log_level.as_deref(), self.log_retention)
            .map_err(|e| AccessError::Config(format!("logging: {e}")))
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
