//! Named boundary polygons and point-in-polygon lookup

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use geo::{BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon, Rect};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::VoyageWorkerError;

const PROGRESS_EVERY: usize = 1000;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: serde_json::Value,
}

type Ring = Vec<[f64; 2]>;

/// A named area a trip may pass through
#[derive(Debug, Clone)]
pub struct Region {
    name: String,
    bounds: Rect<f64>,
    shape: MultiPolygon<f64>,
}

impl Region {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn contains(&self, point: &Point<f64>) -> bool {
        let c = point.0;
        let (min, max) = (self.bounds.min(), self.bounds.max());
        if c.x < min.x || c.x > max.x || c.y < min.y || c.y > max.y {
            return false;
        }
        self.shape.contains(point)
    }
}

/// Read-only index of region boundaries.
///
/// Built once at startup and shared between lookups; it is never mutated
/// afterwards. An empty index answers every lookup with `None`.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    regions: Vec<Region>,
}

impl RegionIndex {
    /// Index with no regions, used when boundary data is unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a GeoJSON feature collection from disk
    pub fn load(path: &Path, name_property: &str) -> Result<Self, VoyageWorkerError> {
        info!("Loading region boundaries from {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), name_property)
    }

    pub fn from_reader<R: Read>(reader: R, name_property: &str) -> Result<Self, VoyageWorkerError> {
        let collection: FeatureCollection = serde_json::from_reader(reader)?;
        Self::from_collection(collection, name_property)
    }

    pub fn from_geojson_str(data: &str, name_property: &str) -> Result<Self, VoyageWorkerError> {
        let collection: FeatureCollection = serde_json::from_str(data)?;
        Self::from_collection(collection, name_property)
    }

    fn from_collection(
        collection: FeatureCollection,
        name_property: &str,
    ) -> Result<Self, VoyageWorkerError> {
        let total = collection.features.len();
        let mut regions = Vec::with_capacity(total);

        for (i, feature) in collection.features.into_iter().enumerate() {
            if i > 0 && i % PROGRESS_EVERY == 0 {
                info!("Loaded {} of {} region features", i, total);
            }

            let Some(name) = feature_name(&feature, name_property) else {
                warn!("Skipping region feature {} without a '{}' property", i, name_property);
                continue;
            };
            let Some(geometry) = feature.geometry else {
                warn!("Skipping region '{}' without geometry", name);
                continue;
            };
            let Some(shape) = parse_geometry(geometry, &name)? else {
                continue;
            };
            let Some(bounds) = shape.bounding_rect() else {
                warn!("Skipping region '{}' with empty geometry", name);
                continue;
            };

            regions.push(Region {
                name,
                bounds,
                shape,
            });
        }

        info!("Region index ready: {} regions", regions.len());
        Ok(Self { regions })
    }

    /// Name of the first region containing the given position
    pub fn region_for(&self, lat: f64, lon: f64) -> Option<&str> {
        let point = Point::new(lon, lat);
        self.regions
            .iter()
            .find(|region| region.contains(&point))
            .map(Region::name)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn feature_name(feature: &Feature, name_property: &str) -> Option<String> {
    let value = feature.properties.as_ref()?.get(name_property)?;
    let name = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

/// Convert a GeoJSON geometry into a multipolygon.
///
/// Returns `Ok(None)` for geometry types that cannot contain a point.
fn parse_geometry(
    geometry: Geometry,
    name: &str,
) -> Result<Option<MultiPolygon<f64>>, VoyageWorkerError> {
    let polygons = match geometry.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Ring> = serde_json::from_value(geometry.coordinates).map_err(|e| {
                VoyageWorkerError::InvalidRegionData(format!("region '{}': {}", name, e))
            })?;
            vec![to_polygon(rings)]
        }
        "MultiPolygon" => {
            let polys: Vec<Vec<Ring>> =
                serde_json::from_value(geometry.coordinates).map_err(|e| {
                    VoyageWorkerError::InvalidRegionData(format!("region '{}': {}", name, e))
                })?;
            polys.into_iter().map(to_polygon).collect()
        }
        other => {
            warn!("Skipping region '{}' with unsupported geometry {}", name, other);
            return Ok(None);
        }
    };

    Ok(Some(MultiPolygon::new(
        polygons.into_iter().flatten().collect(),
    )))
}

/// First ring is the exterior, the rest are holes
fn to_polygon(rings: Vec<Ring>) -> Option<Polygon<f64>> {
    let mut rings = rings.into_iter().map(to_line_string);
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn to_line_string(ring: Ring) -> LineString<f64> {
    ring.into_iter()
        .map(|[x, y]| Coord { x, y })
        .collect::<Vec<_>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Gulf of Finland" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[22.0, 59.0], [30.0, 59.0], [30.0, 60.5], [22.0, 60.5], [22.0, 59.0]],
                        [[25.0, 59.5], [26.0, 59.5], [26.0, 60.0], [25.0, 60.0], [25.0, 59.5]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Aland Sea" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[18.5, 59.8], [20.0, 59.8], [20.0, 60.5], [18.5, 60.5], [18.5, 59.8]]],
                        [[[20.5, 59.0], [21.0, 59.0], [21.0, 59.5], [20.5, 59.5], [20.5, 59.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Lighthouse" },
                "geometry": { "type": "Point", "coordinates": [24.0, 59.5] }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }
            }
        ]
    }"#;

    #[test]
    fn test_point_inside_polygon() {
        let index = RegionIndex::from_geojson_str(SAMPLE, "name").unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.region_for(60.0, 24.0), Some("Gulf of Finland"));
    }

    #[test]
    fn test_point_inside_hole() {
        let index = RegionIndex::from_geojson_str(SAMPLE, "name").unwrap();
        assert_eq!(index.region_for(59.75, 25.5), None);
    }

    #[test]
    fn test_multipolygon_parts() {
        let index = RegionIndex::from_geojson_str(SAMPLE, "name").unwrap();
        assert_eq!(index.region_for(60.0, 19.0), Some("Aland Sea"));
        assert_eq!(index.region_for(59.2, 20.7), Some("Aland Sea"));
    }

    #[test]
    fn test_point_outside_all() {
        let index = RegionIndex::from_geojson_str(SAMPLE, "name").unwrap();
        assert_eq!(index.region_for(-40.0, -30.0), None);
    }

    #[test]
    fn test_empty_index() {
        let index = RegionIndex::empty();
        assert!(index.is_empty());
        assert_eq!(index.region_for(60.0, 24.0), None);
    }

    #[test]
    fn test_custom_name_property() {
        let data = r#"{"features": [{
            "properties": { "NAME_EN": "Box" },
            "geometry": { "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]] }
        }]}"#;
        let index = RegionIndex::from_geojson_str(data, "NAME_EN").unwrap();
        assert_eq!(index.region_for(1.0, 1.0), Some("Box"));
    }

    #[test]
    fn test_malformed_coordinates() {
        let data = r#"{"features": [{
            "properties": { "name": "Broken" },
            "geometry": { "type": "Polygon", "coordinates": "nope" }
        }]}"#;
        assert!(matches!(
            RegionIndex::from_geojson_str(data, "name"),
            Err(VoyageWorkerError::InvalidRegionData(_))
        ));
        assert!(RegionIndex::from_geojson_str("{ not json", "name").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let index = RegionIndex::load(file.path(), "name").unwrap();
        assert_eq!(index.len(), 2);
    }
}
