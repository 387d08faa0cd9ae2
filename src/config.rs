use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User-configurable parameters for block rendering.
/// Stored in the platform config directory (`$XDG_CONFIG_HOME/notability-embed/` or `%APPDATA%\notability-embed\`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scale used when a block omits `scale` or gives one outside 0.1–10.0.
    pub default_scale: f64,
    /// Base of the canonical note URL (`{base}{id}`).
    pub note_base_url: String,
    /// Base of the PDF download URL (`{base}{id}/{name}.pdf`).
    pub pdf_base_url: String,
    /// Base of the endpoint serving raw PDF bytes and document metadata.
    pub fetch_base_url: String,
    /// Laid-out width of the container canvases are placed in, in pixels.
    /// 0 means no layout is known and scales are absolute.
    pub layout_width: f64,
    /// Ask the metadata endpoint for the document name when a block doesn't give one.
    pub lookup_names: bool,
    pub fetch_timeout_secs: u64,
    /// Largest document body accepted from the network.
    pub max_document_bytes: u64,
    pub user_agent: String,
    /// Largest canvas or page raster a block may ask for, in pixels.
    pub max_canvas_pixels: u64,
    /// Most page numbers a block may list after range expansion.
    pub max_plan_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_scale: 5.0,
            note_base_url: "https://notability.com/n/".into(),
            pdf_base_url: "https://notability.com/n/download/pdf/".into(),
            fetch_base_url: "https://us-central1-notability-scraper.cloudfunctions.net/pdf/"
                .into(),
            layout_width: 0.0,
            lookup_names: false,
            fetch_timeout_secs: 30,
            max_document_bytes: 100 * 1024 * 1024,
            user_agent: concat!("notability-embed/", env!("CARGO_PKG_VERSION")).into(),
            max_canvas_pixels: 64 * 1024 * 1024,
            max_plan_pages: 10_000,
        }
    }
}

impl Config {
    /// Load config from the platform config directory, or return defaults.
    pub fn load() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!(
                    "No config file at {}, using defaults. Creating default config.",
                    path.display()
                );
                let config = Self::default();
                config.save_to(&path);
                config
            }
        }
    }

    /// Load config from an explicit path. Unlike [`Config::load`], a missing
    /// or unparsable file is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save current config as pretty JSON.
    pub fn save_to(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("Failed to write config to {}: {}", path.display(), e);
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize config: {}", e);
            }
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Layout width if one is configured.
    pub fn layout_width(&self) -> Option<f64> {
        (self.layout_width > 0.0).then_some(self.layout_width)
    }
}

fn config_path() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notability-embed");
    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok();
    }
    dir.join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"default_scale": 1.0}"#).unwrap();
        assert_eq!(config.default_scale, 1.0);
        assert_eq!(config.note_base_url, "https://notability.com/n/");
        assert!(!config.lookup_names);
        assert_eq!(config.max_canvas_pixels, 64 * 1024 * 1024);
        assert_eq!(config.max_plan_pages, 10_000);
    }

    #[test]
    fn test_save_then_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            layout_width: 720.0,
            lookup_names: true,
            ..Config::default()
        };
        config.save_to(&path);
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_layout_width_zero_is_unset() {
        assert_eq!(Config::default().layout_width(), None);
        let config = Config {
            layout_width: 600.0,
            ..Config::default()
        };
        assert_eq!(config.layout_width(), Some(600.0));
    }
}
