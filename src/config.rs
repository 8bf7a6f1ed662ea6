use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub legend: LegendConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_education_url")]
    pub education_url: String,
    #[serde(default = "default_counties_url")]
    pub counties_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    /// Margin kept free on every side when fitting the map.
    #[serde(default = "default_padding")]
    pub padding: f64,
    #[serde(default = "default_bins")]
    pub bins: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LegendConfig {
    #[serde(default = "default_legend_width")]
    pub width: f64,
    #[serde(default = "default_legend_height")]
    pub height: f64,
    #[serde(default = "default_legend_pad_hor")]
    pub pad_hor: f64,
    #[serde(default = "default_legend_pad_ver")]
    pub pad_ver: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_education_url() -> String {
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/for_user_education.json"
        .to_string()
}

fn default_counties_url() -> String {
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/counties.json"
        .to_string()
}

fn default_width() -> f64 {
    1000.0
}

fn default_height() -> f64 {
    600.0
}

fn default_padding() -> f64 {
    5.0
}

fn default_bins() -> usize {
    9
}

fn default_legend_width() -> f64 {
    400.0
}

fn default_legend_height() -> f64 {
    50.0
}

fn default_legend_pad_hor() -> f64 {
    20.0
}

fn default_legend_pad_ver() -> f64 {
    10.0
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_port() -> u16 {
    8080
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            education_url: default_education_url(),
            counties_url: default_counties_url(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            padding: default_padding(),
            bins: default_bins(),
        }
    }
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            width: default_legend_width(),
            height: default_legend_height(),
            pad_hor: default_legend_pad_hor(),
            pad_ver: default_legend_pad_ver(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load from TOML. A missing file is not an error: every field has a
    /// default, so the tool runs against the fixed dataset out of the box.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_dataset_shape() {
        let config = AppConfig::default();
        assert_eq!(config.map.width, 1000.0);
        assert_eq!(config.map.height, 600.0);
        assert_eq!(config.map.bins, 9);
        assert!(config.input.counties_url.ends_with("counties.json"));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: AppConfig = toml::from_str("[server]\nport = 3000\n").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.map.bins, 9);
        assert_eq!(config.legend.width, 400.0);
    }
}
