use serde::{Deserialize, Serialize};

/// Catalog entry: display name and hex color for one land-cover class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassDef {
    pub nombre: String,
    pub color: String,
}

/// Per-province share of one class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassBreakdown {
    pub area_km2: f64,
    pub porcentaje: f64,
    pub color: String,
}

/// One province feature from the primary document.
/// `clasificaciones` keeps document order: the dominant-class tie-break
/// resolves to the first entry holding the maximum.
#[derive(Debug, Clone)]
pub struct Province {
    pub nombre: String,
    /// Marker position, lon/lat.
    pub coordinates: [f64; 2],
    pub area_total_km2: f64,
    pub total_pixels: u64,
    pub clasificaciones: Vec<(String, ClassBreakdown)>,
}

/// Nationwide maximum for one class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaximaEntry {
    pub provincia: String,
    pub porcentaje: f64,
    pub color: String,
}

/// Everything the dashboard holds in memory. Built once by the loader,
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Class id (stringified raster value) -> definition, document order.
    pub catalog: Vec<(String, ClassDef)>,
    pub provinces: Vec<Province>,
    /// Class name -> nationwide maximum, document order.
    pub maxima: Vec<(String, MaximaEntry)>,
}

impl Province {
    pub fn breakdown(&self, class_name: &str) -> Option<&ClassBreakdown> {
        self.clasificaciones
            .iter()
            .find(|(n, _)| n == class_name)
            .map(|(_, b)| b)
    }
}
