use geo::Point;

use super::geometry::covers_point;
use crate::grid::GridCell;
use crate::models::BoundaryFeature;

/// Something with an area a point can fall into
pub trait Locatable {
    fn covers(&self, point: &Point<f64>) -> bool;
}

impl Locatable for BoundaryFeature {
    fn covers(&self, point: &Point<f64>) -> bool {
        covers_point(&self.geometry, point)
    }
}

impl Locatable for GridCell {
    fn covers(&self, point: &Point<f64>) -> bool {
        covers_point(self.polygon(), point)
    }
}

/// Return the first item (and its position) covering the point.
///
/// Points on a border shared by two items resolve to the earlier one.
/// An empty slice, or a point outside every item, gives `None`.
pub fn locate<'a, T: Locatable>(items: &'a [T], point: &Point<f64>) -> Option<(usize, &'a T)> {
    items
        .iter()
        .enumerate()
        .find(|(_, item)| item.covers(point))
}
