use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ErrorCode;
use crate::model::Period;
use crate::remote::rest::RestConfig;

/// Directory holding project config and cache, relative to the project root.
pub const PROJECT_DIR: &str = ".waypoint";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub realtime: bool,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            table: default_table(),
            schema: default_schema(),
            timeout_secs: default_timeout_secs(),
            realtime: default_true(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl RemoteConfig {
    /// Connection settings for the hosted store.
    ///
    /// # Errors
    ///
    /// Fails with `E1002` when the url or anon key is missing.
    pub fn rest_config(&self) -> Result<RestConfig> {
        let (Some(url), Some(anon_key)) = (self.url.as_deref(), self.anon_key.as_deref()) else {
            bail!(
                "{}: {}",
                ErrorCode::RemoteNotConfigured.code(),
                ErrorCode::RemoteNotConfigured.message()
            );
        };
        Ok(RestConfig {
            base_url: url.to_string(),
            anon_key: anon_key.to_string(),
            table: self.table.clone(),
            schema: self.schema.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            realtime: self.realtime,
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
        })
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.anon_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Snapshot file; relative paths resolve against the project root.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: None,
        }
    }
}

impl CacheConfig {
    /// Snapshot path for `project_root`, or `None` when caching is off.
    #[must_use]
    pub fn snapshot_path(&self, project_root: &Path) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(PROJECT_DIR).join("cache").join("snapshot.json"));
        Some(if path.is_absolute() {
            path
        } else {
            project_root.join(path)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub quarter: Option<u8>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl ViewConfig {
    /// Configured default period, falling back to the one containing `now`.
    #[must_use]
    pub fn default_period(&self, now: DateTime<Utc>) -> Period {
        let current = Period::containing(now);
        Period::new(
            self.quarter.filter(|q| (1..=4).contains(q)).unwrap_or(current.quarter),
            self.year.unwrap_or(current.year),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

impl EffectiveConfig {
    /// Copy safe to print: the anon key is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(key) = copy.project.remote.anon_key.as_mut() {
            let visible: String = key.chars().take(4).collect();
            *key = format!("{visible}…");
        }
        copy
    }
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content).with_context(|| {
        format!(
            "{}: failed to parse {}",
            ErrorCode::ConfigParseError.code(),
            path.display()
        )
    })
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("waypoint/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Apply `WAYPOINT_URL` / `WAYPOINT_ANON_KEY` style overrides from `lookup`.
pub fn apply_env_overrides(project: &mut ProjectConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    if let Some(url) = non_empty("WAYPOINT_URL") {
        project.remote.url = Some(url);
    }
    if let Some(key) = non_empty("WAYPOINT_ANON_KEY") {
        project.remote.anon_key = Some(key);
    }
    if let Some(table) = non_empty("WAYPOINT_TABLE") {
        project.remote.table = table;
    }
}

/// Project config with environment overrides, user config and the output
/// mode chosen by `cli_format` (`--json` / `--format`), `FORMAT`, user config
/// and finally TTY detection.
pub fn resolve_config(project_root: &Path, cli_format: Option<&str>) -> Result<EffectiveConfig> {
    let mut project = load_project_config(project_root)?;
    apply_env_overrides(&mut project, |name| env::var(name).ok());
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_format, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "table" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn resolve_output(
    cli_format: Option<&str>,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    let chosen = cli_format
        .and_then(normalize_output_mode)
        .or_else(|| env_format.as_deref().and_then(normalize_output_mode))
        .or_else(|| user_output.as_deref().and_then(normalize_output_mode));
    if let Some(mode) = chosen {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

fn default_table() -> String {
    "initiatives".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

const fn default_timeout_secs() -> u64 {
    15
}

const fn default_reconnect_delay_secs() -> u64 {
    5
}
