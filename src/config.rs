use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::ClassDef;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Primary document: catalog + province feature collection.
    pub datos: PathBuf,
    /// Secondary document: per-class nationwide maxima.
    pub maximos: PathBuf,
    /// Reject (instead of warn about) inconsistent upstream data.
    #[serde(default)]
    pub strict: bool,
    /// Marker color for provinces with an empty class mapping.
    #[serde(default = "default_fallback_color")]
    pub fallback_color: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Single-band 8-bit class raster exported by the classifier.
    pub raster: PathBuf,
    /// Province boundaries, .shp or .geojson.
    pub boundaries: PathBuf,
    /// Raster extent in lon/lat: [west, south, east, north].
    pub extent: [f64; 4],
    pub pixel_area_km2: f64,
    #[serde(default)]
    pub nodata: u8,
    /// Boundary attribute names tried in order for the province name.
    #[serde(default = "default_name_fields")]
    pub name_fields: Vec<String>,
    /// Raster value -> class definition.
    #[serde(default = "default_classes")]
    pub classes: Vec<ClassEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassEntry {
    pub id: u8,
    pub nombre: String,
    pub color: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_fallback_color() -> String {
    "#999999".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_name_fields() -> Vec<String> {
    ["Provincia", "NAME_1", "NOMBRE", "provincia", "nombre", "name", "NAME", "fna"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The nine Dynamic World classes, keyed by their rendered raster values.
fn default_classes() -> Vec<ClassEntry> {
    [
        (47u8, "Agua", "#419bdf"),
        (57, "Bosques", "#397d49"),
        (122, "Pastizales", "#7a87c6"),
        (136, "Matorrales", "#88b053"),
        (165, "Suelo Desnudo", "#a59b8f"),
        (179, "Nieve y Hielo", "#b39fe1"),
        (196, "Áreas Urbanas", "#c4281b"),
        (223, "Vegetación Inundable", "#dfc35a"),
        (228, "Tierras de Cultivo", "#e49635"),
    ]
    .iter()
    .map(|(id, nombre, color)| ClassEntry {
        id: *id,
        nombre: nombre.to_string(),
        color: color.to_string(),
    })
    .collect()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            raster: PathBuf::from("argentina_clases.png"),
            boundaries: PathBuf::from("provincias.geojson"),
            extent: [-74.0, -55.2, -53.6, -21.7],
            pixel_area_km2: 1.0,
            nodata: 0,
            name_fields: default_name_fields(),
            classes: default_classes(),
        }
    }
}

impl ClassEntry {
    pub fn def(&self) -> ClassDef {
        ClassDef {
            nombre: self.nombre.clone(),
            color: self.color.clone(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
