use crate::config::AnalysisConfig;
use crate::types::{ClassBreakdown, MaximaEntry, Province};
use anyhow::{anyhow, Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::centroid::Centroid;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point};
use image::GrayImage;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;
use std::convert::TryInto;
use std::fs::File;
use std::io::BufReader;

/// One provincial boundary read from the geometry input.
pub struct Boundary {
    pub nombre: String,
    pub geometry: MultiPolygon<f64>,
}

// Wrapper for RTree indexing
struct BoundaryIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Full producer pipeline: boundaries + class raster -> per-province
/// statistics and nationwide maxima.
pub fn run_analysis(config: &AnalysisConfig) -> Result<(Vec<Province>, Vec<(String, MaximaEntry)>)> {
    let boundaries = load_boundaries(config)?;
    if boundaries.is_empty() {
        return Err(anyhow!("No provincial boundaries could be read"));
    }
    println!("Loaded {} provincial boundaries", boundaries.len());

    println!("Reading raster {:?}...", config.raster);
    let raster = image::open(&config.raster)
        .with_context(|| format!("Failed to open raster: {:?}", config.raster))?
        .to_luma8();
    println!("Raster is {}x{}", raster.width(), raster.height());

    let tallies = tally_raster(&raster, config.extent, config.nodata, &boundaries);

    let provinces = compute_stats(config, &boundaries, &tallies);
    let with_data = provinces.iter().filter(|p| p.total_pixels > 0).count();
    println!(
        "Computed statistics for {} provinces ({} with data)",
        provinces.len(),
        with_data
    );

    let maxima = compute_maxima(config, &provinces);

    Ok((provinces, maxima))
}

pub fn load_boundaries(config: &AnalysisConfig) -> Result<Vec<Boundary>> {
    let extension = config
        .boundaries
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Boundary file has no extension"))?;

    match extension.as_str() {
        "shp" => load_boundaries_shapefile(config),
        "json" | "geojson" => load_boundaries_geojson(config),
        _ => Err(anyhow!("Unsupported boundary format: {}", extension)),
    }
}

fn load_boundaries_shapefile(config: &AnalysisConfig) -> Result<Vec<Boundary>> {
    let mut reader = shapefile::Reader::from_path(&config.boundaries)
        .with_context(|| format!("Failed to open Shapefile: {:?}", config.boundaries))?;

    let mut boundaries = Vec::new();

    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        let nombre = config
            .name_fields
            .iter()
            .find_map(|field| match record.get(field) {
                Some(shapefile::dbase::FieldValue::Character(Some(s))) if !s.trim().is_empty() => {
                    Some(s.trim().to_string())
                }
                _ => None,
            })
            .unwrap_or_else(|| format!("Provincia_{}", i));

        let geometry = match shape {
            shapefile::Shape::Polygon(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonM(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonZ(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?;
                geo_polygon
            }
            _ => {
                tracing::warn!("Skipping non-polygon shape for '{}'", nombre);
                continue;
            }
        };

        boundaries.push(Boundary { nombre, geometry });
    }

    Ok(boundaries)
}

fn load_boundaries_geojson(config: &AnalysisConfig) -> Result<Vec<Boundary>> {
    use geojson::GeoJson;

    let file = File::open(&config.boundaries)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", config.boundaries))?;
    let reader = BufReader::new(file);

    let geojson = GeoJson::from_reader(reader).context("Failed to parse boundary GeoJSON")?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("Boundary GeoJSON must be a FeatureCollection")),
    };

    let mut boundaries = Vec::new();

    for (i, feature) in collection.features.into_iter().enumerate() {
        let nombre = feature
            .properties
            .as_ref()
            .and_then(|props| {
                config.name_fields.iter().find_map(|field| match props.get(field) {
                    Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                        Some(s.trim().to_string())
                    }
                    _ => None,
                })
            })
            .unwrap_or_else(|| format!("Provincia_{}", i));

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry for '{}': {:?}", nombre, e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        tracing::warn!("Skipping non-polygon geometry for '{}'", nombre);
                        continue;
                    }
                }
            }
            None => continue,
        };

        boundaries.push(Boundary { nombre, geometry });
    }

    Ok(boundaries)
}

/// Assigns every non-nodata pixel to the province containing its center and
/// tallies class counts per province. Rows are processed in parallel.
pub fn tally_raster(
    raster: &GrayImage,
    extent: [f64; 4],
    nodata: u8,
    boundaries: &[Boundary],
) -> Vec<HashMap<u8, u64>> {
    let [west, south, east, north] = extent;
    let width = raster.width() as f64;
    let height = raster.height() as f64;

    let tree_items: Vec<BoundaryIndex> = boundaries
        .iter()
        .enumerate()
        .filter_map(|(i, boundary)| {
            let rect = boundary.geometry.bounding_rect()?;
            Some(BoundaryIndex {
                index: i,
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();
    let tree = RTree::bulk_load(tree_items);

    let merged = (0..raster.height())
        .into_par_iter()
        .map(|row| {
            // pixel centers
            let lat = north - (row as f64 + 0.5) / height * (north - south);
            let mut local: Vec<HashMap<u8, u64>> = vec![HashMap::new(); boundaries.len()];

            for col in 0..raster.width() {
                let value = raster.get_pixel(col, row).0[0];
                if value == nodata {
                    continue;
                }

                let lon = west + (col as f64 + 0.5) / width * (east - west);
                let point = Point::new(lon, lat);
                let envelope = AABB::from_point([lon, lat]);

                for candidate in tree.locate_in_envelope_intersecting(&envelope) {
                    if boundaries[candidate.index].geometry.contains(&point) {
                        *local[candidate.index].entry(value).or_insert(0) += 1;
                        break;
                    }
                }
            }

            local
        })
        .reduce(
            || vec![HashMap::new(); boundaries.len()],
            |mut acc, local| {
                for (tally, row_tally) in acc.iter_mut().zip(local) {
                    for (value, count) in row_tally {
                        *tally.entry(value).or_insert(0) += count;
                    }
                }
                acc
            },
        );

    merged
}

/// Turns raw class tallies into the dashboard's per-province statistics.
/// Provinces with no tallied pixels keep an empty class mapping.
pub fn compute_stats(
    config: &AnalysisConfig,
    boundaries: &[Boundary],
    tallies: &[HashMap<u8, u64>],
) -> Vec<Province> {
    boundaries
        .iter()
        .zip(tallies)
        .map(|(boundary, tally)| {
            let total_pixels: u64 = tally.values().sum();

            let coordinates = boundary
                .geometry
                .centroid()
                .map(|c| [c.x(), c.y()])
                .unwrap_or([0.0, 0.0]);

            if total_pixels == 0 {
                return Province {
                    nombre: boundary.nombre.clone(),
                    coordinates,
                    area_total_km2: 0.0,
                    total_pixels: 0,
                    clasificaciones: Vec::new(),
                };
            }

            let clasificaciones = config
                .classes
                .iter()
                .map(|class| {
                    let count = *tally.get(&class.id).unwrap_or(&0);
                    let area_km2 = round2(count as f64 * config.pixel_area_km2);
                    let porcentaje = round2(count as f64 / total_pixels as f64 * 100.0);
                    (
                        class.nombre.clone(),
                        ClassBreakdown {
                            area_km2,
                            porcentaje,
                            color: class.color.clone(),
                        },
                    )
                })
                .collect();

            Province {
                nombre: boundary.nombre.clone(),
                coordinates,
                area_total_km2: round2(total_pixels as f64 * config.pixel_area_km2),
                total_pixels,
                clasificaciones,
            }
        })
        .collect()
}

/// For each catalog class, the province holding the strictly highest
/// percentage. Classes present nowhere are omitted.
pub fn compute_maxima(
    config: &AnalysisConfig,
    provinces: &[Province],
) -> Vec<(String, MaximaEntry)> {
    let mut maxima = Vec::new();

    for class in &config.classes {
        let mut best: Option<(&str, f64)> = None;
        for province in provinces {
            let porcentaje = province
                .breakdown(&class.nombre)
                .map(|b| b.porcentaje)
                .unwrap_or(0.0);
            if porcentaje > best.map(|(_, p)| p).unwrap_or(0.0) {
                best = Some((&province.nombre, porcentaje));
            }
        }

        if let Some((provincia, porcentaje)) = best {
            maxima.push((
                class.nombre.clone(),
                MaximaEntry {
                    provincia: provincia.to_string(),
                    porcentaje: round2(porcentaje),
                    color: class.color.clone(),
                },
            ));
        }
    }

    maxima
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
