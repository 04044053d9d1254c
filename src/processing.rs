use crate::types::{ClassBreakdown, Dataset, Province};
use serde::Serialize;

/// One map marker, colored by the province's dominant class.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub provincia: String,
    pub coordinates: [f64; 2],
    pub color: String,
    pub clase_dominante: Option<String>,
    pub area_total_km2: f64,
}

/// One bar of the detail chart.
#[derive(Debug, Clone, Serialize)]
pub struct ChartBar {
    pub nombre: String,
    pub area_km2: f64,
    pub porcentaje: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaximaRow {
    pub clase: String,
    pub provincia: String,
    pub porcentaje: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendRow {
    pub nombre: String,
    pub color: String,
}

/// Linear scan for the class with the highest percentage. Strict `>` keeps
/// the first entry on ties; `None` for an empty mapping.
pub fn dominant_class(province: &Province) -> Option<(&str, &ClassBreakdown)> {
    let mut best: Option<(&str, &ClassBreakdown)> = None;
    for (name, breakdown) in &province.clasificaciones {
        match best {
            Some((_, b)) if breakdown.porcentaje > b.porcentaje => {
                best = Some((name, breakdown));
            }
            None => best = Some((name, breakdown)),
            _ => {}
        }
    }
    best
}

pub fn marker_layer(dataset: &Dataset, fallback_color: &str) -> Vec<Marker> {
    dataset
        .provinces
        .iter()
        .map(|province| match dominant_class(province) {
            Some((name, breakdown)) => Marker {
                provincia: province.nombre.clone(),
                coordinates: province.coordinates,
                color: breakdown.color.clone(),
                clase_dominante: Some(name.to_string()),
                area_total_km2: province.area_total_km2,
            },
            None => Marker {
                provincia: province.nombre.clone(),
                coordinates: province.coordinates,
                color: fallback_color.to_string(),
                clase_dominante: None,
                area_total_km2: province.area_total_km2,
            },
        })
        .collect()
}

/// Chart projection for one province, sorted descending by area.
pub fn chart_series(province: &Province) -> Vec<ChartBar> {
    let mut bars: Vec<ChartBar> = province
        .clasificaciones
        .iter()
        .map(|(name, b)| ChartBar {
            nombre: name.clone(),
            area_km2: b.area_km2,
            porcentaje: b.porcentaje,
            color: b.color.clone(),
        })
        .collect();
    bars.sort_by(|a, b| b.area_km2.total_cmp(&a.area_km2));
    bars
}

/// Maxima panel rows, sorted descending by percentage.
pub fn maxima_rows(dataset: &Dataset) -> Vec<MaximaRow> {
    let mut rows: Vec<MaximaRow> = dataset
        .maxima
        .iter()
        .map(|(class_name, entry)| MaximaRow {
            clase: class_name.clone(),
            provincia: entry.provincia.clone(),
            porcentaje: entry.porcentaje,
            color: entry.color.clone(),
        })
        .collect();
    rows.sort_by(|a, b| b.porcentaje.total_cmp(&a.porcentaje));
    rows
}

/// Legend rows, sorted alphabetically by display name.
pub fn legend_rows(dataset: &Dataset) -> Vec<LegendRow> {
    let mut rows: Vec<LegendRow> = dataset
        .catalog
        .iter()
        .map(|(_, def)| LegendRow {
            nombre: def.nombre.clone(),
            color: def.color.clone(),
        })
        .collect();
    rows.sort_by(|a, b| a.nombre.cmp(&b.nombre));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassDef, MaximaEntry};

    fn breakdown(area: f64, pct: f64, color: &str) -> ClassBreakdown {
        ClassBreakdown {
            area_km2: area,
            porcentaje: pct,
            color: color.to_string(),
        }
    }

    fn province(nombre: &str, classes: Vec<(&str, ClassBreakdown)>) -> Province {
        Province {
            nombre: nombre.to_string(),
            coordinates: [-64.0, -34.0],
            area_total_km2: 1000.0,
            total_pixels: 1000,
            clasificaciones: classes
                .into_iter()
                .map(|(n, b)| (n.to_string(), b))
                .collect(),
        }
    }

    #[test]
    fn dominant_class_picks_maximum_percentage() {
        let p = province(
            "Buenos Aires",
            vec![
                ("Bosque", breakdown(400.0, 40.0, "#397d49")),
                ("Agua", breakdown(600.0, 60.0, "#419bdf")),
            ],
        );

        let (name, b) = dominant_class(&p).unwrap();
        assert_eq!(name, "Agua");
        assert_eq!(b.color, "#419bdf");
    }

    #[test]
    fn dominant_class_ties_resolve_to_first_entry() {
        let p = province(
            "Empate",
            vec![
                ("Pastizales", breakdown(500.0, 50.0, "#7a87c6")),
                ("Matorrales", breakdown(500.0, 50.0, "#88b053")),
            ],
        );

        let (name, _) = dominant_class(&p).unwrap();
        assert_eq!(name, "Pastizales");
    }

    #[test]
    fn dominant_class_empty_mapping_is_none() {
        let p = province("Vacía", vec![]);
        assert!(dominant_class(&p).is_none());
    }

    #[test]
    fn markers_use_dominant_color_and_fallback() {
        let dataset = Dataset {
            catalog: Vec::new(),
            provinces: vec![
                province(
                    "Buenos Aires",
                    vec![
                        ("Bosque", breakdown(400.0, 40.0, "#397d49")),
                        ("Agua", breakdown(600.0, 60.0, "#419bdf")),
                    ],
                ),
                province("Vacía", vec![]),
            ],
            maxima: Vec::new(),
        };

        let markers = marker_layer(&dataset, "#999999");
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].color, "#419bdf");
        assert_eq!(markers[0].clase_dominante.as_deref(), Some("Agua"));
        assert_eq!(markers[1].color, "#999999");
        assert!(markers[1].clase_dominante.is_none());
    }

    #[test]
    fn chart_series_sorted_descending_by_area() {
        let p = province(
            "Córdoba",
            vec![
                ("Agua", breakdown(50.0, 5.0, "#419bdf")),
                ("Tierras de Cultivo", breakdown(700.0, 70.0, "#e49635")),
                ("Pastizales", breakdown(250.0, 25.0, "#7a87c6")),
            ],
        );

        let bars = chart_series(&p);
        let areas: Vec<f64> = bars.iter().map(|b| b.area_km2).collect();
        assert_eq!(areas, vec![700.0, 250.0, 50.0]);
        assert!(areas.windows(2).all(|w| w[0] > w[1]));
        // percentage carried through for the tooltip
        assert_eq!(bars[0].porcentaje, 70.0);
    }

    #[test]
    fn maxima_rows_sorted_descending_by_percentage() {
        let entry = |prov: &str, pct: f64| MaximaEntry {
            provincia: prov.to_string(),
            porcentaje: pct,
            color: "#000000".to_string(),
        };
        let dataset = Dataset {
            catalog: Vec::new(),
            provinces: Vec::new(),
            maxima: vec![
                ("Agua".to_string(), entry("Tierra del Fuego", 18.2)),
                ("Bosques".to_string(), entry("Misiones", 71.3)),
                ("Pastizales".to_string(), entry("La Pampa", 44.0)),
            ],
        };

        let rows = maxima_rows(&dataset);
        let pcts: Vec<f64> = rows.iter().map(|r| r.porcentaje).collect();
        assert_eq!(pcts, vec![71.3, 44.0, 18.2]);
        assert_eq!(rows[0].clase, "Bosques");
    }

    #[test]
    fn legend_rows_sorted_alphabetically() {
        let def = |nombre: &str| ClassDef {
            nombre: nombre.to_string(),
            color: "#ffffff".to_string(),
        };
        let dataset = Dataset {
            catalog: vec![
                ("57".to_string(), def("Bosques")),
                ("47".to_string(), def("Agua")),
                ("228".to_string(), def("Tierras de Cultivo")),
            ],
            provinces: Vec::new(),
            maxima: Vec::new(),
        };

        let rows = legend_rows(&dataset);
        let names: Vec<&str> = rows.iter().map(|r| r.nombre.as_str()).collect();
        assert_eq!(names, vec!["Agua", "Bosques", "Tierras de Cultivo"]);
    }
}
