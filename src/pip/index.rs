//! Spatial index for fast boundary lookups.

use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use super::Locatable;
use crate::models::BoundaryFeature;

/// R-tree entry: a feature's position in its collection and its envelope
#[derive(Debug, Clone)]
struct IndexedBoundary {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    fn new(position: usize, feature: &BoundaryFeature) -> Option<Self> {
        let rect = feature.bbox()?;
        Some(Self {
            position,
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
        })
    }
}

/// R-tree over the envelopes of an ordered feature slice.
///
/// Only positions are stored, so the index never outlives or reorders the
/// features it was built from.
#[derive(Debug)]
pub struct BoundaryIndex {
    tree: RTree<IndexedBoundary>,
}

impl BoundaryIndex {
    /// Build the index. Features with empty geometry are left out.
    pub fn build(features: &[BoundaryFeature]) -> Self {
        let indexed: Vec<IndexedBoundary> = features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| IndexedBoundary::new(i, f))
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!("Spatial index built with {} entries", tree.size());

        Self { tree }
    }

    /// Lowest position among the features covering the point.
    ///
    /// `features` must be the slice the index was built from.
    pub fn lookup(&self, features: &[BoundaryFeature], point: &Point<f64>) -> Option<usize> {
        let query_envelope = AABB::from_point([point.x(), point.y()]);

        // Envelope candidates come back in tree order; exact containment
        // then the minimum position restores first-match semantics.
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|ib| features[ib.position].covers(point))
            .map(|ib| ib.position)
            .min()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
