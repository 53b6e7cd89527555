//! GeoJSON wire structures for boundary collections and grid cells.
//!
//! Only the areal subset is modelled. Positions are `[lon, lat, ...]` arrays;
//! anything past the second ordinate (altitude) is ignored on read.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoordError, Result};

pub type Position = Vec<f64>;

/// GeoJSON geometry object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    /// Points, lines and collections carry no area.
    #[serde(other)]
    Unsupported,
}

/// GeoJSON feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub feature_type: String,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// GeoJSON feature collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            feature_type: feature_type(),
            properties: Some(properties),
            geometry: Some(geometry),
        }
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: feature_collection_type(),
            features,
        }
    }
}

impl Geometry {
    /// Convert to a `MultiPolygon`. Non-areal or missing geometry becomes an
    /// empty multipolygon so the feature keeps its position in the collection.
    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>> {
        match self {
            Geometry::Polygon { coordinates } => {
                Ok(MultiPolygon::new(vec![polygon_from_rings(coordinates)?]))
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .map(|rings| polygon_from_rings(rings))
                .collect::<Result<Vec<_>>>()
                .map(MultiPolygon::new),
            Geometry::Unsupported => Ok(MultiPolygon::new(vec![])),
        }
    }
}

impl From<&Polygon<f64>> for Geometry {
    fn from(polygon: &Polygon<f64>) -> Self {
        Geometry::Polygon {
            coordinates: polygon_to_rings(polygon),
        }
    }
}

impl From<&MultiPolygon<f64>> for Geometry {
    fn from(multi: &MultiPolygon<f64>) -> Self {
        Geometry::MultiPolygon {
            coordinates: multi.iter().map(polygon_to_rings).collect(),
        }
    }
}

fn polygon_to_rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect())
        .collect()
}

fn polygon_from_rings(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| ring_from_positions(ring));
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => {
            return Err(CoordError::InvalidBoundaryData(
                "polygon without an exterior ring".to_string(),
            ))
        }
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from_positions(positions: &[Position]) -> Result<LineString<f64>> {
    let mut ring = positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(CoordError::InvalidBoundaryData(format!(
                "bad position {:?}",
                p
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    // Close the ring if needed
    if ring.first() != ring.last() {
        if let Some(first) = ring.first().copied() {
            ring.push(first);
        }
    }

    if ring.len() < 4 {
        return Err(CoordError::InvalidBoundaryData(format!(
            "ring with {} positions",
            ring.len()
        )));
    }

    Ok(LineString::new(ring))
}
