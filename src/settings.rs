//! Viewer settings with persistence
//!
//! Settings are saved to `~/.config/miniview/settings.toml` unless another
//! file is given with `--config`.

use std::fs;
use std::path::{Path, PathBuf};

use miniview_assets::{DegeneratePolicy, ImportOptions};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// All viewer settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub import: ImportSettings,
}

impl ViewerSettings {
    /// `settings.toml` under the user's config directory
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("miniview").join("settings.toml"))
    }

    /// Load settings from the default location, or return defaults
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("Could not determine config directory");
                Self::default()
            }
        }
    }

    /// Load settings from `path`, or return defaults if it is missing or
    /// unreadable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No settings file at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse {:?}: {}, using defaults", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save settings to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = Self::settings_path() else {
            anyhow::bail!("Could not determine config directory");
        };
        self.save_to(&path)
    }

    /// Save settings to `path`, creating its parent directory if needed
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Model import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Directory relative model paths are resolved against
    pub asset_dir: PathBuf,
    /// Model loaded when none is given on the command line
    pub model: PathBuf,
    /// Treat a file without meshes as an import failure
    pub require_mesh: bool,
    /// Polygons with fewer than three corners: "skip" or "fail"
    pub degenerate_polygons: DegeneratePolicy,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("resources"),
            model: PathBuf::from("model.fbx"),
            require_mesh: true,
            degenerate_polygons: DegeneratePolicy::Skip,
        }
    }
}

impl ImportSettings {
    /// Resolve a model path against the asset directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.asset_dir.join(path)
        }
    }

    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            require_mesh: self.require_mesh,
            degenerate: self.degenerate_polygons,
        }
    }
}
