use crate::config::AppConfig;
use crate::types::{ClassBreakdown, ClassDef, Dataset, MaximaEntry, Province};
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Loads and validates the two dashboard documents.
///
/// Loads are sequential: the maxima document is only read after the primary
/// document has parsed and validated. Any failure aborts with context; there
/// is no retry and no partial dataset.
pub fn load_dataset(config: &AppConfig) -> Result<Dataset> {
    println!("Loading data...");

    let primary = read_document(&config.input.datos)?;
    let (catalog, provinces) = validate_primary(&primary)?;
    println!(
        "Loaded primary document: {} classes, {} provinces",
        catalog.len(),
        provinces.len()
    );

    let secondary = read_document(&config.input.maximos)?;
    let maxima = validate_maxima(&secondary)?;
    println!("Loaded maxima document: {} entries", maxima.len());

    let dataset = Dataset {
        catalog,
        provinces,
        maxima,
    };
    check_consistency(&dataset, config.input.strict)?;

    Ok(dataset)
}

fn read_document(path: &Path) -> Result<Value> {
    let file =
        File::open(path).with_context(|| format!("Failed to open document: {:?}", path))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse JSON document: {:?}", path))
}

fn validate_primary(doc: &Value) -> Result<(Vec<(String, ClassDef)>, Vec<Province>)> {
    let root = as_object(doc, "$")?;

    let mut catalog = Vec::new();
    for (id, entry) in as_object(field(root, "clasificaciones", "$")?, "clasificaciones")? {
        let path = format!("clasificaciones.{}", id);
        let entry = as_object(entry, &path)?;
        catalog.push((
            id.clone(),
            ClassDef {
                nombre: str_field(entry, "nombre", &path)?,
                color: str_field(entry, "color", &path)?,
            },
        ));
    }

    let provincias = as_object(field(root, "provincias", "$")?, "provincias")?;
    let features = field(provincias, "features", "provincias")?
        .as_array()
        .ok_or_else(|| anyhow!("provincias.features is not an array"))?;

    let mut provinces = Vec::new();
    for (i, feature) in features.iter().enumerate() {
        let path = format!("provincias.features[{}]", i);
        provinces.push(validate_feature(feature, &path)?);
    }

    Ok((catalog, provinces))
}

fn validate_feature(feature: &Value, path: &str) -> Result<Province> {
    let feature = as_object(feature, path)?;

    let props_path = format!("{}.properties", path);
    let props = as_object(field(feature, "properties", path)?, &props_path)?;

    let geom_path = format!("{}.geometry", path);
    let geom = as_object(field(feature, "geometry", path)?, &geom_path)?;
    let coords = field(geom, "coordinates", &geom_path)?
        .as_array()
        .ok_or_else(|| anyhow!("{}.coordinates is not an array", geom_path))?;
    if coords.len() != 2 {
        return Err(anyhow!("{}.coordinates must hold [lon, lat]", geom_path));
    }
    let lon = coords[0]
        .as_f64()
        .ok_or_else(|| anyhow!("{}.coordinates[0] is not a number", geom_path))?;
    let lat = coords[1]
        .as_f64()
        .ok_or_else(|| anyhow!("{}.coordinates[1] is not a number", geom_path))?;

    let classes_path = format!("{}.clasificaciones", props_path);
    let mut clasificaciones = Vec::new();
    for (name, entry) in as_object(field(props, "clasificaciones", &props_path)?, &classes_path)? {
        let entry_path = format!("{}.{}", classes_path, name);
        let entry = as_object(entry, &entry_path)?;
        clasificaciones.push((
            name.clone(),
            ClassBreakdown {
                area_km2: f64_field(entry, "area_km2", &entry_path)?,
                porcentaje: f64_field(entry, "porcentaje", &entry_path)?,
                color: str_field(entry, "color", &entry_path)?,
            },
        ));
    }

    Ok(Province {
        nombre: str_field(props, "provincia", &props_path)?,
        coordinates: [lon, lat],
        area_total_km2: f64_field(props, "area_total_km2", &props_path)?,
        total_pixels: f64_field(props, "total_pixels", &props_path)? as u64,
        clasificaciones,
    })
}

fn validate_maxima(doc: &Value) -> Result<Vec<(String, MaximaEntry)>> {
    let root = as_object(doc, "$")?;

    let mut maxima = Vec::new();
    for (class_name, entry) in root {
        let entry = as_object(entry, class_name)?;
        maxima.push((
            class_name.clone(),
            MaximaEntry {
                provincia: str_field(entry, "provincia", class_name)?,
                porcentaje: f64_field(entry, "porcentaje", class_name)?,
                color: str_field(entry, "color", class_name)?,
            },
        ));
    }

    Ok(maxima)
}

/// Upstream data carries no guarantee that percentages sum to 100 or that
/// maxima reference known provinces. Lenient mode logs and passes the data
/// through; strict mode rejects the load.
fn check_consistency(dataset: &Dataset, strict: bool) -> Result<()> {
    let mut findings = Vec::new();

    for province in &dataset.provinces {
        if province.clasificaciones.is_empty() {
            continue;
        }
        let sum: f64 = province.clasificaciones.iter().map(|(_, b)| b.porcentaje).sum();
        if (sum - 100.0).abs() > 0.5 {
            findings.push(format!(
                "percentages for '{}' sum to {:.2}, expected ~100",
                province.nombre, sum
            ));
        }
    }

    for (class_name, entry) in &dataset.maxima {
        let known = dataset.provinces.iter().any(|p| p.nombre == entry.provincia);
        if !known {
            findings.push(format!(
                "maxima entry '{}' references unknown province '{}'",
                class_name, entry.provincia
            ));
        }
    }

    if findings.is_empty() {
        return Ok(());
    }
    if strict {
        return Err(anyhow!("Inconsistent upstream data: {}", findings.join("; ")));
    }
    for finding in findings {
        tracing::warn!("{}", finding);
    }
    Ok(())
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| anyhow!("{} is not an object", path))
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str, path: &str) -> Result<&'a Value> {
    obj.get(name)
        .ok_or_else(|| anyhow!("{}.{} is missing", path, name))
}

fn str_field(obj: &Map<String, Value>, name: &str, path: &str) -> Result<String> {
    field(obj, name, path)?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("{}.{} is not a string", path, name))
}

fn f64_field(obj: &Map<String, Value>, name: &str, path: &str) -> Result<f64> {
    field(obj, name, path)?
        .as_f64()
        .ok_or_else(|| anyhow!("{}.{} is not a number", path, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primary_doc() -> Value {
        json!({
            "clasificaciones": {
                "47": { "nombre": "Agua", "color": "#419bdf" },
                "57": { "nombre": "Bosques", "color": "#397d49" }
            },
            "provincias": {
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "properties": {
                            "provincia": "Buenos Aires",
                            "area_total_km2": 307571.0,
                            "total_pixels": 1200,
                            "clasificaciones": {
                                "Bosques": { "area_km2": 123028.4, "porcentaje": 40.0, "color": "#397d49" },
                                "Agua": { "area_km2": 184542.6, "porcentaje": 60.0, "color": "#419bdf" }
                            }
                        },
                        "geometry": { "type": "Point", "coordinates": [-58.38, -34.60] }
                    }
                ]
            }
        })
    }

    #[test]
    fn validates_primary_document() {
        let (catalog, provinces) = validate_primary(&primary_doc()).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].0, "47");
        assert_eq!(catalog[0].1.nombre, "Agua");

        assert_eq!(provinces.len(), 1);
        let province = &provinces[0];
        assert_eq!(province.nombre, "Buenos Aires");
        assert_eq!(province.total_pixels, 1200);
        assert_eq!(province.coordinates, [-58.38, -34.60]);
        // document order survives validation
        assert_eq!(province.clasificaciones[0].0, "Bosques");
        assert_eq!(province.clasificaciones[1].0, "Agua");
    }

    #[test]
    fn missing_field_is_reported_with_path() {
        let mut doc = primary_doc();
        doc["provincias"]["features"][0]["properties"]
            .as_object_mut()
            .unwrap()
            .remove("area_total_km2");

        let err = validate_primary(&doc).unwrap_err();
        assert!(err
            .to_string()
            .contains("provincias.features[0].properties.area_total_km2"));
    }

    #[test]
    fn mistyped_field_is_rejected() {
        let mut doc = primary_doc();
        doc["provincias"]["features"][0]["properties"]["provincia"] = json!(42);

        assert!(validate_primary(&doc).is_err());
    }

    #[test]
    fn validates_maxima_document() {
        let doc = json!({
            "Agua": { "provincia": "Buenos Aires", "porcentaje": 60.0, "color": "#419bdf" },
            "Bosques": { "provincia": "Misiones", "porcentaje": 71.3, "color": "#397d49" }
        });

        let maxima = validate_maxima(&doc).unwrap();
        assert_eq!(maxima.len(), 2);
        assert_eq!(maxima[0].1.provincia, "Buenos Aires");
    }

    #[test]
    fn strict_mode_rejects_bad_percentage_sum() {
        let (catalog, mut provinces) = validate_primary(&primary_doc()).unwrap();
        provinces[0].clasificaciones[0].1.porcentaje = 10.0;
        let dataset = Dataset {
            catalog,
            provinces,
            maxima: Vec::new(),
        };

        assert!(check_consistency(&dataset, true).is_err());
        assert!(check_consistency(&dataset, false).is_ok());
    }

    #[test]
    fn strict_mode_rejects_unknown_maxima_province() {
        let (catalog, provinces) = validate_primary(&primary_doc()).unwrap();
        let dataset = Dataset {
            catalog,
            provinces,
            maxima: vec![(
                "Agua".to_string(),
                MaximaEntry {
                    provincia: "Atlántida".to_string(),
                    porcentaje: 60.0,
                    color: "#419bdf".to_string(),
                },
            )],
        };

        assert!(check_consistency(&dataset, true).is_err());
        assert!(check_consistency(&dataset, false).is_ok());
    }

    #[test]
    fn unreadable_primary_document_aborts_load() {
        use crate::config::AppConfig;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let maximos = dir.path().join("maximos.json");
        std::fs::write(&maximos, "{}").unwrap();

        let toml_src = format!(
            r#"
            [input]
            datos = {:?}
            maximos = {:?}

            [output]
            directory = {:?}

            [server]
            port = 8080
            "#,
            dir.path().join("missing.json"),
            maximos,
            dir.path()
        );
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml_src.as_bytes()).unwrap();
        let config = AppConfig::load_from_file(file.path()).unwrap();

        assert!(load_dataset(&config).is_err());
    }

    #[test]
    fn malformed_json_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(read_document(&path).is_err());
    }
}
