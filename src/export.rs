use crate::config::AppConfig;
use crate::types::{Dataset, MaximaEntry, Province};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

/// Writes the dashboard documents and the CSV export.
///
/// output/
///   datos_visualizacion.json        catalog + province features
///   provincias_estadisticas.geojson the feature collection alone
///   maximos_por_clasificacion.json  class -> nationwide maximum
///   estadisticas_provincias.csv     flat per-province table
pub fn write_outputs(
    config: &AppConfig,
    provinces: &[Province],
    maxima: &[(String, MaximaEntry)],
) -> Result<()> {
    let dir = &config.output.directory;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let features = feature_collection(provinces);

    save_json(
        &visualization_doc(config, &features),
        dir,
        "datos_visualizacion.json",
    )?;
    save_json(&features, dir, "provincias_estadisticas.geojson")?;
    save_json(&maxima_doc(maxima), dir, "maximos_por_clasificacion.json")?;

    write_csv(config, provinces)?;

    Ok(())
}

fn visualization_doc(config: &AppConfig, features: &Value) -> Value {
    let mut catalog = Map::new();
    for class in &config.analysis.classes {
        catalog.insert(
            class.id.to_string(),
            json!({ "nombre": class.nombre, "color": class.color }),
        );
    }

    json!({
        "clasificaciones": catalog,
        "provincias": features,
    })
}

/// The primary document rebuilt from a loaded dataset, served back to the
/// dashboard page in the exact upstream shape.
pub fn dataset_doc(dataset: &Dataset) -> Value {
    let mut catalog = Map::new();
    for (id, def) in &dataset.catalog {
        catalog.insert(
            id.clone(),
            json!({ "nombre": def.nombre, "color": def.color }),
        );
    }

    json!({
        "clasificaciones": catalog,
        "provincias": feature_collection(&dataset.provinces),
    })
}

pub fn feature_collection(provinces: &[Province]) -> Value {
    let features: Vec<Value> = provinces.iter().map(province_feature).collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn province_feature(province: &Province) -> Value {
    let mut clasificaciones = Map::new();
    for (name, breakdown) in &province.clasificaciones {
        clasificaciones.insert(
            name.clone(),
            json!({
                "area_km2": breakdown.area_km2,
                "porcentaje": breakdown.porcentaje,
                "color": breakdown.color,
            }),
        );
    }

    json!({
        "type": "Feature",
        "properties": {
            "provincia": province.nombre,
            "area_total_km2": province.area_total_km2,
            "total_pixels": province.total_pixels,
            "clasificaciones": clasificaciones,
        },
        "geometry": {
            "type": "Point",
            "coordinates": [province.coordinates[0], province.coordinates[1]],
        },
    })
}

pub fn maxima_doc(maxima: &[(String, MaximaEntry)]) -> Value {
    let mut doc = Map::new();
    for (class_name, entry) in maxima {
        doc.insert(
            class_name.clone(),
            json!({
                "provincia": entry.provincia,
                "porcentaje": entry.porcentaje,
                "color": entry.color,
            }),
        );
    }
    Value::Object(doc)
}

fn save_json(doc: &Value, dir: &Path, filename: &str) -> Result<()> {
    let path = dir.join(filename);
    let content = serde_json::to_string_pretty(doc)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Saved {:?}", path);
    Ok(())
}

fn write_csv(config: &AppConfig, provinces: &[Province]) -> Result<()> {
    let path = config.output.directory.join("estadisticas_provincias.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create CSV: {:?}", path))?;

    let mut header = vec![
        "provincia".to_string(),
        "area_total_km2".to_string(),
        "total_pixels".to_string(),
    ];
    for class in &config.analysis.classes {
        header.push(format!("{}_area_km2", class.nombre));
        header.push(format!("{}_porcentaje", class.nombre));
    }
    writer.write_record(&header)?;

    for province in provinces {
        let mut row = vec![
            province.nombre.clone(),
            province.area_total_km2.to_string(),
            province.total_pixels.to_string(),
        ];
        for class in &config.analysis.classes {
            match province.breakdown(&class.nombre) {
                Some(b) => {
                    row.push(b.area_km2.to_string());
                    row.push(b.porcentaje.to_string());
                }
                None => {
                    row.push("0".to_string());
                    row.push("0".to_string());
                }
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    println!("Saved {:?}", path);
    Ok(())
}
