//! Boundary features and the ordered per-country boundary collection.

use geo::{BoundingRect, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

use super::geojson::{Feature, FeatureCollection, Geometry};
use crate::error::Result;
use crate::pip::BoundaryIndex;

/// Deepest admin level carried in the boundary properties (`NAME_1`..`NAME_4`).
const MAX_ADMIN_DEPTH: usize = 4;

/// Descriptive attributes of a boundary feature
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryAttributes {
    /// Country name (`COUNTRY` property)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Admin level names, level 1 first; a missing level is `None`
    pub names: [Option<String>; MAX_ADMIN_DEPTH],

    /// Raw properties as loaded
    #[serde(skip)]
    pub properties: Map<String, Value>,
}

impl BoundaryAttributes {
    pub fn from_properties(properties: Map<String, Value>) -> Self {
        let country = properties
            .get("COUNTRY")
            .and_then(Value::as_str)
            .map(String::from);

        let names = std::array::from_fn(|i| {
            properties
                .get(&format!("NAME_{}", i + 1))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        });

        Self {
            country,
            names,
            properties,
        }
    }

    /// Name of admin `level` (1-based), `None` when absent
    pub fn name(&self, level: usize) -> Option<&str> {
        level
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .and_then(Option::as_deref)
    }

    /// Country and the present level names rendered for display
    pub fn display_names(&self) -> Vec<String> {
        self.country
            .iter()
            .chain(self.names.iter().flatten())
            .map(|name| humanize(name))
            .collect()
    }
}

/// Turn `"abidjanNord-2"` into `"Abidjan Nord 2"`.
///
/// A `-` ends a word; a new word also starts at every ASCII capital and
/// every ASCII digit, except at the start of a word. Words holding a digit
/// are kept verbatim, the rest get a capital first letter.
pub fn humanize(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in name.chars() {
        if ch == '-' {
            words.push(std::mem::take(&mut current));
            continue;
        }
        if (ch.is_ascii_uppercase() || ch.is_ascii_digit()) && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    words.push(current);

    words
        .into_iter()
        .map(|word| {
            if word.chars().any(|c| c.is_ascii_digit()) {
                return word;
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => word,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A single level-3 boundary polygon with metadata
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub geometry: MultiPolygon<f64>,
    pub attributes: BoundaryAttributes,
}

impl BoundaryFeature {
    pub fn new(geometry: MultiPolygon<f64>, attributes: BoundaryAttributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    /// Bounding rectangle, `None` for an empty geometry
    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    pub fn from_geojson(feature: &Feature) -> Result<Self> {
        let geometry = match &feature.geometry {
            Some(g) => g.to_multi_polygon()?,
            None => MultiPolygon::new(vec![]),
        };
        let properties = feature.properties.clone().unwrap_or_default();
        Ok(Self::new(geometry, BoundaryAttributes::from_properties(properties)))
    }

    pub fn to_geojson(&self) -> Feature {
        Feature::new(
            Geometry::from(&self.geometry),
            self.attributes.properties.clone(),
        )
    }
}

/// Ordered boundary features of one country.
///
/// A feature's position is its permanent level-3 index: the order must be
/// identical between the encode and decode of an identifier.
pub struct BoundaryCollection {
    country_code: String,
    features: Vec<BoundaryFeature>,
    index: BoundaryIndex,
    fingerprint: u64,
}

impl BoundaryCollection {
    pub fn new(country_code: impl Into<String>, features: Vec<BoundaryFeature>) -> Self {
        let country_code = country_code.into();
        let index = BoundaryIndex::build(&features);
        let fingerprint = fingerprint(&features);

        debug!(
            "Boundary collection {}: {} features, fingerprint {:016x}",
            country_code,
            features.len(),
            fingerprint
        );

        Self {
            country_code,
            features,
            index,
            fingerprint,
        }
    }

    pub fn from_feature_collection(
        country_code: impl Into<String>,
        collection: &FeatureCollection,
    ) -> Result<Self> {
        let features = collection
            .features
            .iter()
            .map(BoundaryFeature::from_geojson)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(country_code, features))
    }

    pub fn from_geojson(country_code: impl Into<String>, data: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(data)?;
        Self::from_feature_collection(country_code, &collection)
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection::new(self.features.iter().map(BoundaryFeature::to_geojson).collect())
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BoundaryFeature> {
        self.features.get(index)
    }

    pub fn features(&self) -> &[BoundaryFeature] {
        &self.features
    }

    /// First feature (lowest position) containing the point.
    ///
    /// Same answer as `pip::locate(self.features(), point)`, answered
    /// through the R-tree.
    pub fn locate(&self, point: &Point<f64>) -> Option<(usize, &BoundaryFeature)> {
        self.index
            .lookup(&self.features, point)
            .map(|i| (i, &self.features[i]))
    }

    /// xxh64 of feature count and every coordinate, in order
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

fn fingerprint(features: &[BoundaryFeature]) -> u64 {
    let mut hasher = Xxh64::new(0);
    hasher.update(&(features.len() as u64).to_le_bytes());
    for feature in features {
        hasher.update(&(feature.geometry.0.len() as u64).to_le_bytes());
        for polygon in &feature.geometry {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                hasher.update(&(ring.0.len() as u64).to_le_bytes());
                for c in ring.coords() {
                    hasher.update(&c.x.to_le_bytes());
                    hasher.update(&c.y.to_le_bytes());
                }
            }
        }
    }
    hasher.digest()
}
