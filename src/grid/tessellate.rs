use geo::{BoundingRect, MultiPolygon, Point, Polygon};
use serde_json::Map;
use tracing::debug;

use super::lattice::{CellSide, HexLattice};
use crate::models::geojson::{Feature, Geometry};
use crate::models::BoundaryFeature;
use crate::pip::geometry::{bounding_box, contains_polygon};

/// One hexagon of a boundary's grid.
///
/// Derived data: regenerated from (boundary, cell side) on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    polygon: Polygon<f64>,
}

impl GridCell {
    pub fn new(polygon: Polygon<f64>) -> Self {
        Self { polygon }
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Centre of the cell's bounding box
    pub fn center(&self) -> Point<f64> {
        self.polygon
            .bounding_rect()
            .map(|rect| rect.center().into())
            .unwrap_or_else(|| Point::new(f64::NAN, f64::NAN))
    }

    pub fn to_geojson(&self) -> Feature {
        Feature::new(Geometry::from(&self.polygon), Map::new())
    }
}

/// Hexagons of `feature`'s grid, in lattice order.
///
/// Only cells entirely inside the feature are kept; cells crossing the
/// border are dropped, not clipped. The result is a pure function of the
/// geometry and `cell_side` and may be empty.
pub fn tessellate(feature: &BoundaryFeature, cell_side: CellSide) -> Vec<GridCell> {
    tessellate_geometry(&feature.geometry, cell_side)
}

pub fn tessellate_geometry(geometry: &MultiPolygon<f64>, cell_side: CellSide) -> Vec<GridCell> {
    let Some(bbox) = bounding_box(geometry) else {
        return Vec::new();
    };

    let lattice = HexLattice::new(bbox, cell_side);
    let cells: Vec<GridCell> = lattice
        .iter()
        .filter(|hex| contains_polygon(geometry, hex))
        .map(GridCell::new)
        .collect();

    debug!(
        "Tessellated {} of {} lattice cells",
        cells.len(),
        lattice.capacity()
    );

    cells
}
