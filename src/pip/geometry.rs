//! Exact containment predicates used by the locator and the tessellator.
//!
//! Point tests are boundary-inclusive: a point on an edge or vertex is
//! inside. Polygon containment is strict in the DE-9IM sense (no part of
//! the candidate outside the region), touching the region's border from
//! inside is allowed.

use geo::{BoundingRect, Intersects, MultiPolygon, Point, Polygon, Rect, Relate};

/// Axis-aligned bounding box of a geometry, `None` when it is empty.
pub fn bounding_box(geometry: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// Boundary-inclusive point-in-polygon test.
pub fn covers_point<G>(geometry: &G, point: &Point<f64>) -> bool
where
    G: Intersects<Point<f64>>,
{
    geometry.intersects(point)
}

/// True when `candidate` lies entirely inside `region`.
pub fn contains_polygon(region: &MultiPolygon<f64>, candidate: &Polygon<f64>) -> bool {
    // Every vertex must be covered; rejects most boundary cells without
    // building the full intersection matrix.
    let vertices_inside = candidate
        .exterior()
        .points()
        .all(|p| covers_point(region, &p));
    if !vertices_inside {
        return false;
    }

    region.relate(candidate).is_contains()
}
