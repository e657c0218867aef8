use serde::Deserialize;
use std::path::Path;
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Local path or http(s) URL of the wide-format population CSV.
    pub population_csv: String,
    /// Local or remote `.shp` (with `.dbf` sibling) or `.geojson`.
    pub boundaries: String,
    #[serde(flatten)]
    pub columns: ColumnConfig,
    #[serde(default = "default_boundary_name_field")]
    pub boundary_name_field: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    #[serde(default = "default_state_column")]
    pub state_column: String,
    #[serde(default = "default_code_column")]
    pub code_column: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            state_column: default_state_column(),
            code_column: default_code_column(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub center: [f64; 2], // [lat, lon]
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_weight: f64,
    pub fill_opacity: f64,
    pub tooltip_label: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [37.8, -96.9],
            zoom: 4,
            tile_url: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png".to_string(),
            attribution: "&copy; OpenStreetMap contributors &copy; CARTO".to_string(),
            fill_color: "#3186cc".to_string(),
            stroke_color: "black".to_string(),
            stroke_weight: 0.5,
            fill_opacity: 0.3,
            tooltip_label: "STATE:".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

fn default_state_column() -> String {
    "states".to_string()
}

fn default_code_column() -> String {
    "states_code".to_string()
}

fn default_boundary_name_field() -> String {
    "NAME".to_string()
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [input]
            population_csv = "data/pop.csv"
            boundaries = "data/states.geojson"
            "#,
        )
        .unwrap();

        assert_eq!(config.input.columns, ColumnConfig::default());
        assert_eq!(config.input.boundary_name_field, "NAME");
        assert_eq!(config.map, MapConfig::default());
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn overrides_columns_and_partial_sections() {
        let config = AppConfig::from_toml(
            r##"
            [input]
            population_csv = "pop.csv"
            boundaries = "states.shp"
            state_column = "name"
            code_column = "abbr"

            [map]
            zoom = 3
            fill_color = "#ff0000"

            [server]
            port = 9000
            "##,
        )
        .unwrap();

        assert_eq!(config.input.columns.state_column, "name");
        assert_eq!(config.input.columns.code_column, "abbr");
        assert_eq!(config.map.zoom, 3);
        assert_eq!(config.map.fill_color, "#ff0000");
        assert_eq!(config.map.center, [37.8, -96.9]);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn missing_input_section_is_rejected() {
        assert!(AppConfig::from_toml("[server]\nport = 1\n").is_err());
    }

    #[test]
    fn shipped_config_uses_remote_geojson_boundaries() {
        let config = AppConfig::from_toml(include_str!("../config.toml")).unwrap();
        assert!(config.input.population_csv.starts_with("https://"));
        assert!(config.input.boundaries.starts_with("https://"));
        assert!(config.input.boundaries.ends_with(".json"));
        assert_eq!(config.input.boundary_name_field, "name");
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[input]\npopulation_csv = \"a.csv\"\nboundaries = \"b.json\"\n").unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.input.population_csv, "a.csv");
    }
}
