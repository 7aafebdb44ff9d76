//! Finds `tether` config files and merges them.
//!
//! The user file (`$TETHER_CONFIG_DIR/config.toml`, else the platform config
//! dir) is read first and `tether.toml` in the project directory overrides it.
//! An explicit `--config` file bypasses discovery through [`load_config_file`].

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, TetherConfig};

const PROJECT_CONFIG_FILE: &str = "tether.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "tether";
const CONFIG_DIR_ENV: &str = "TETHER_CONFIG_DIR";

/// Which discovery layer a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    User,
    Project,
}

/// What happened to a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStatus {
    Loaded,
    Missing,
    /// Present but unreadable or malformed; the message explains why.
    Rejected(String),
}

/// One checked config file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    pub status: LayerStatus,
}

impl ConfigSource {
    pub fn is_loaded(&self) -> bool {
        self.status == LayerStatus::Loaded
    }
}

/// Merged configuration plus how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TetherConfig,
    /// Checked files, user layer first.
    pub sources: Vec<ConfigSource>,
    /// Rejected layers and settings that will be ignored.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the files that contributed to `config`.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.is_loaded())
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Discover and merge the user and project config files.
///
/// `project_dir` defaults to the working directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with `config_dir` replacing the user config directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    let project_path = project_dir.map_or_else(
        || PathBuf::from(PROJECT_CONFIG_FILE),
        |dir| dir.join(PROJECT_CONFIG_FILE),
    );

    let layers = user_path
        .map(|path| (ConfigLayer::User, path))
        .into_iter()
        .chain([(ConfigLayer::Project, project_path)]);

    let mut config = TetherConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    for (layer, path) in layers {
        let status = if !path.is_file() {
            LayerStatus::Missing
        } else {
            match load_config_file(&path) {
                Ok(found) => {
                    config.merge(found);
                    LayerStatus::Loaded
                }
                Err(e) => {
                    warnings.push(format!("Ignoring {}: {e}", path.display()));
                    LayerStatus::Rejected(e.to_string())
                }
            }
        };
        sources.push(ConfigSource {
            layer,
            path,
            status,
        });
    }

    warnings.extend(config.unused_settings());

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Read a single config file without discovery.
pub fn load_config_file(path: &Path) -> Result<TetherConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    TetherConfig::from_toml(&contents)
}

/// `config.toml` inside [`user_config_dir`].
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// `TETHER_CONFIG_DIR` when set and non-empty, else `<platform config dir>/tether`.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}
