//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--catalog`, `--no-persist`, etc.)
//! 2. `$NAVTREE_CONFIG` environment variable (path to config file)
//! 3. Project-local `.navtree.toml` in the current working directory
//! 4. Global `~/.config/navtree/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::nav::persistence::JsonFileBackend;
use crate::nav::search::{JoinPolicy, SearchSettings};
use crate::sources::DocumentClass;

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable mouse support.
    pub mouse: Option<bool>,
    /// Label of the local filesystem source.
    pub local_label: Option<String>,
}

/// Local filesystem settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LocalConfig {
    /// Local roots (overridden by CLI positional arg).
    pub roots: Option<Vec<String>>,
    /// How deep the local search walks below each root.
    pub search_depth: Option<usize>,
    /// Maximum number of local search hits.
    pub search_limit: Option<usize>,
}

/// Remote platform settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlatformConfig {
    /// JSON catalog of platform sources; absent means no platform sources.
    pub catalog: Option<String>,
}

/// Search settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: Option<u64>,
    /// Per-provider timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// "fail_fast" or "partial".
    pub join_policy: Option<JoinPolicy>,
    /// Document classes ranked above plain files.
    pub preferred_kinds: Option<Vec<String>>,
}

/// Expansion state settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Remember expanded nodes across sessions.
    pub persist: Option<bool>,
    pub state_file: Option<String>,
    /// Timeout for a single listing call in milliseconds.
    pub fetch_timeout_ms: Option<u64>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub local: LocalConfig,
    pub platform: PlatformConfig,
    pub search: SearchConfig,
    pub expansion: ExpansionConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_LOCAL_LABEL: &str = "Local Files";
pub const DEFAULT_SEARCH_DEPTH: usize = 6;
pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("NAVTREE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".navtree.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("navtree").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                mouse: other.general.mouse.or(self.general.mouse),
                local_label: other
                    .general
                    .local_label
                    .clone()
                    .or(self.general.local_label),
            },
            local: LocalConfig {
                roots: other.local.roots.clone().or(self.local.roots),
                search_depth: other.local.search_depth.or(self.local.search_depth),
                search_limit: other.local.search_limit.or(self.local.search_limit),
            },
            platform: PlatformConfig {
                catalog: other.platform.catalog.clone().or(self.platform.catalog),
            },
            search: SearchConfig {
                debounce_ms: other.search.debounce_ms.or(self.search.debounce_ms),
                timeout_ms: other.search.timeout_ms.or(self.search.timeout_ms),
                join_policy: other.search.join_policy.or(self.search.join_policy),
                preferred_kinds: other
                    .search
                    .preferred_kinds
                    .clone()
                    .or(self.search.preferred_kinds),
            },
            expansion: ExpansionConfig {
                persist: other.expansion.persist.or(self.expansion.persist),
                state_file: other
                    .expansion
                    .state_file
                    .clone()
                    .or(self.expansion.state_file),
                fetch_timeout_ms: other
                    .expansion
                    .fetch_timeout_ms
                    .or(self.expansion.fetch_timeout_ms),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Whether mouse support is enabled.
    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(false)
    }

    pub fn local_label(&self) -> &str {
        self.general
            .local_label
            .as_deref()
            .unwrap_or(DEFAULT_LOCAL_LABEL)
    }

    /// Configured local roots; empty when none were given anywhere.
    pub fn local_roots(&self) -> Vec<PathBuf> {
        self.local
            .roots
            .as_ref()
            .map(|roots| roots.iter().map(PathBuf::from).collect())
            .unwrap_or_default()
    }

    pub fn search_depth(&self) -> usize {
        self.local.search_depth.unwrap_or(DEFAULT_SEARCH_DEPTH)
    }

    pub fn search_limit(&self) -> usize {
        self.local.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.platform.catalog.as_ref().map(PathBuf::from)
    }

    pub fn join_policy(&self) -> JoinPolicy {
        self.search.join_policy.unwrap_or_default()
    }

    /// Debounce, timeout and join policy for the search aggregator.
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            debounce: Duration::from_millis(self.search.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
            timeout: Duration::from_millis(
                self.search.timeout_ms.unwrap_or(DEFAULT_SEARCH_TIMEOUT_MS),
            ),
            policy: self.join_policy(),
        }
    }

    /// Preferred document classes; unknown names are skipped.
    pub fn preferred_kinds(&self) -> Vec<DocumentClass> {
        match &self.search.preferred_kinds {
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let class = DocumentClass::parse(name);
                    if class.is_none() {
                        warn!(kind = %name, "ignoring unknown preferred kind");
                    }
                    class
                })
                .collect(),
            None => vec![DocumentClass::Workflow, DocumentClass::CommandLineTool],
        }
    }

    /// Whether expanded nodes are remembered across sessions.
    pub fn persist_expansion(&self) -> bool {
        self.expansion.persist.unwrap_or(true)
    }

    /// Where the expanded-id set is stored, if anywhere.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.expansion
            .state_file
            .as_ref()
            .map(PathBuf::from)
            .or_else(JsonFileBackend::default_path)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(
            self.expansion
                .fetch_timeout_ms
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_MS),
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
