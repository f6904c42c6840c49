use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User settings for the tools gitweave drives. Read-only: nothing is ever
/// written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Explicit git binary; looked up on PATH when unset.
    pub git_bin: Option<String>,
    /// Explicit gh binary; looked up on PATH when unset.
    pub gh_bin: Option<String>,
    /// Remote used by the sync pipeline.
    pub remote: String,
    /// Pull with `--rebase` instead of merging.
    pub pull_rebase: bool,
    /// Extra phrases that mark a failed pull as a conflict.
    pub extra_conflict_markers: Vec<String>,
    /// Editor for reworded and squashed commit messages during a rebase.
    /// Messages are kept as git proposes them when unset.
    pub rebase_editor: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            git_bin: None,
            gh_bin: None,
            remote: "origin".to_string(),
            pull_rebase: false,
            extra_conflict_markers: Vec::new(),
            rebase_editor: None,
        }
    }
}

impl AppConfig {
    pub fn git_program(&self) -> String {
        self.git_bin.clone().unwrap_or_else(|| "git".to_string())
    }

    pub fn gh_program(&self) -> String {
        self.gh_bin.clone().unwrap_or_else(|| "gh".to_string())
    }
}

pub fn load_config() -> AppConfig {
    load_config_from(config_path())
}

pub fn load_config_from(path: PathBuf) -> AppConfig {
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return AppConfig::default();
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("Ignoring invalid config at {}: {}", path.display(), err);
            AppConfig::default()
        }
    }
}

fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("GITWEAVE_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitweave")
        .join("config.toml")
}
