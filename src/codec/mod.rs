//! CoordID encoding and decoding.
//!
//! Encoding locates the boundary containing a point, tessellates that
//! boundary and locates the hexagon containing the point. Decoding reverses
//! this by position alone: it never needs the original coordinate.

mod identifier;

pub use identifier::{is_country_code, CoordId};

use geo::Point;
use hashbrown::HashMap;
use tracing::debug;

use crate::error::{CoordError, IndexKind, Miss, Result};
use crate::grid::{tessellate, CellSide, GridCell, CELL_SIDE};
use crate::models::{BoundaryCollection, BoundaryFeature};
use crate::pip::locate;

/// Result of encoding a point
#[derive(Debug, Clone)]
pub struct Encoded<'a> {
    pub id: CoordId,
    pub boundary: &'a BoundaryFeature,
    pub cell: GridCell,
}

/// Result of decoding an identifier
#[derive(Debug, Clone)]
pub struct Decoded<'a> {
    pub id: CoordId,
    pub boundary: &'a BoundaryFeature,
    pub cell: GridCell,
}

impl Decoded<'_> {
    /// Approximate location the identifier stands for
    pub fn center(&self) -> Point<f64> {
        self.cell.center()
    }
}

/// Encoder/decoder bound to one cell side.
///
/// `Codec::default()` uses [`CELL_SIDE`]; identifiers are only portable
/// between codecs with the same cell side.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    cell_side: CellSide,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(CELL_SIDE)
    }
}

impl Codec {
    pub fn new(cell_side: CellSide) -> Self {
        Self { cell_side }
    }

    pub fn cell_side(&self) -> CellSide {
        self.cell_side
    }

    pub fn encode<'a>(
        &self,
        boundaries: &'a BoundaryCollection,
        country_code: &str,
        point: Point<f64>,
    ) -> Result<Encoded<'a>> {
        // reject codes that could never be decoded before doing any work
        CoordId::new(country_code, 0, 0)?;

        let (level3, boundary) = boundaries
            .locate(&point)
            .ok_or(CoordError::NotFound(Miss::Boundary))?;
        let grid = tessellate(boundary, self.cell_side);

        self.finish(country_code, level3, boundary, &grid, point)
    }

    /// Encode many points against one collection.
    ///
    /// Each boundary is tessellated at most once. Results are in input
    /// order and equal what `encode` returns for each point.
    pub fn encode_many<'a>(
        &self,
        boundaries: &'a BoundaryCollection,
        country_code: &str,
        points: &[Point<f64>],
    ) -> Vec<Result<Encoded<'a>>> {
        if let Err(e) = CoordId::new(country_code, 0, 0) {
            return points
                .iter()
                .map(|_| Err(CoordError::InvalidFormat(e.to_string())))
                .collect();
        }

        let mut grids: HashMap<usize, Vec<GridCell>> = HashMap::new();

        points
            .iter()
            .map(|point| {
                let (level3, boundary) = boundaries
                    .locate(point)
                    .ok_or(CoordError::NotFound(Miss::Boundary))?;
                let grid = grids
                    .entry(level3)
                    .or_insert_with(|| tessellate(boundary, self.cell_side));
                self.finish(country_code, level3, boundary, grid, *point)
            })
            .collect()
    }

    fn finish<'a>(
        &self,
        country_code: &str,
        level3: usize,
        boundary: &'a BoundaryFeature,
        grid: &[GridCell],
        point: Point<f64>,
    ) -> Result<Encoded<'a>> {
        let (grid_index, cell) =
            locate(grid, &point).ok_or(CoordError::NotFound(Miss::GridCell))?;
        let id = CoordId::new(country_code, level3, grid_index)?;

        debug!(
            "Encoded ({}, {}) as {} ({} cells in boundary)",
            point.x(),
            point.y(),
            id,
            grid.len()
        );

        Ok(Encoded {
            id,
            boundary,
            cell: cell.clone(),
        })
    }

    pub fn decode<'a>(&self, boundaries: &'a BoundaryCollection, id: &str) -> Result<Decoded<'a>> {
        let id: CoordId = id.parse()?;
        self.decode_id(boundaries, id)
    }

    /// Decode an already parsed identifier. The identifier's country code
    /// is not checked against the collection; picking the collection is the
    /// caller's job.
    pub fn decode_id<'a>(
        &self,
        boundaries: &'a BoundaryCollection,
        id: CoordId,
    ) -> Result<Decoded<'a>> {
        let boundary = boundaries
            .get(id.level3())
            .ok_or(CoordError::IndexOutOfRange {
                kind: IndexKind::Level3,
                index: id.level3(),
                len: boundaries.len(),
            })?;

        let mut grid = tessellate(boundary, self.cell_side);
        let len = grid.len();
        if id.grid() >= len {
            return Err(CoordError::IndexOutOfRange {
                kind: IndexKind::Grid,
                index: id.grid(),
                len,
            });
        }
        let cell = grid.swap_remove(id.grid());

        debug!("Decoded {} ({} cells in boundary)", id, len);

        Ok(Decoded { id, boundary, cell })
    }
}

/// Encode with the system cell side
pub fn encode<'a>(
    boundaries: &'a BoundaryCollection,
    country_code: &str,
    point: Point<f64>,
) -> Result<Encoded<'a>> {
    Codec::default().encode(boundaries, country_code, point)
}

/// Decode with the system cell side
pub fn decode<'a>(boundaries: &'a BoundaryCollection, id: &str) -> Result<Decoded<'a>> {
    Codec::default().decode(boundaries, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundaryAttributes, BoundaryFeature};
    use geo::{polygon, MultiPolygon};

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundaryFeature {
        BoundaryFeature::new(
            MultiPolygon::new(vec![polygon![
                (x: min_x, y: min_y),
                (x: max_x, y: min_y),
                (x: max_x, y: max_y),
                (x: min_x, y: max_y),
                (x: min_x, y: min_y),
            ]]),
            BoundaryAttributes::default(),
        )
    }

    fn planar() -> Codec {
        Codec::new(CellSide::degrees(1.0))
    }

    /// Two 10x10 squares side by side, and a tiny one far away
    fn collection() -> BoundaryCollection {
        BoundaryCollection::new(
            "XX",
            vec![
                rect(0.0, 0.0, 10.0, 10.0),
                rect(10.0, 0.0, 20.0, 10.0),
                rect(50.0, 50.0, 50.1, 50.1),
            ],
        )
    }

    #[test]
    fn test_round_trip() {
        let boundaries = collection();
        let codec = planar();

        for point in [Point::new(1.25, 1.6), Point::new(5.0, 5.0), Point::new(14.0, 3.3)] {
            let encoded = codec.encode(&boundaries, "XX", point).unwrap();
            let decoded = codec.decode(&boundaries, &encoded.id.to_string()).unwrap();
            assert_eq!(decoded.id, encoded.id);
            assert!(std::ptr::eq(decoded.boundary, encoded.boundary));
            assert_eq!(decoded.cell, encoded.cell);
        }
    }

    #[test]
    fn test_identifier_shape() {
        let boundaries = collection();
        let encoded = planar()
            .encode(&boundaries, "XX", Point::new(14.0, 3.3))
            .unwrap();
        assert_eq!(encoded.id.country(), "XX");
        assert_eq!(encoded.id.level3(), 1);
        assert!(encoded.id.to_string().starts_with("XX-1-"));
    }

    #[test]
    fn test_outside_every_boundary() {
        let boundaries = collection();
        let err = planar()
            .encode(&boundaries, "XX", Point::new(-5.0, -5.0))
            .unwrap_err();
        assert!(matches!(err, CoordError::NotFound(Miss::Boundary)));
    }

    #[test]
    fn test_gap_near_edge_is_not_found() {
        let boundaries = collection();
        // inside the first square but in the strip left of the first column
        let err = planar()
            .encode(&boundaries, "XX", Point::new(0.1, 5.0))
            .unwrap_err();
        assert!(matches!(err, CoordError::NotFound(Miss::GridCell)));

        // tiny boundary has no cells at all
        let err = planar()
            .encode(&boundaries, "XX", Point::new(50.05, 50.05))
            .unwrap_err();
        assert!(matches!(err, CoordError::NotFound(Miss::GridCell)));
    }

    #[test]
    fn test_invalid_country_code() {
        let boundaries = collection();
        let err = planar()
            .encode(&boundaries, "X-X", Point::new(5.0, 5.0))
            .unwrap_err();
        assert!(matches!(err, CoordError::InvalidFormat(_)));
    }

    #[test]
    fn test_decode_errors() {
        let boundaries = collection();
        let codec = planar();

        assert!(matches!(
            codec.decode(&boundaries, "XX-1"),
            Err(CoordError::InvalidFormat(_))
        ));
        assert!(matches!(
            codec.decode(&boundaries, "XX-999999-0"),
            Err(CoordError::IndexOutOfRange {
                kind: IndexKind::Level3,
                index: 999999,
                len: 3
            })
        ));
        assert!(matches!(
            codec.decode(&boundaries, "XX-0-27"),
            Err(CoordError::IndexOutOfRange {
                kind: IndexKind::Grid,
                index: 27,
                len: 27
            })
        ));
        // empty grid: every grid index is out of range
        assert!(matches!(
            codec.decode(&boundaries, "XX-2-0"),
            Err(CoordError::IndexOutOfRange {
                kind: IndexKind::Grid,
                len: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_reordering_changes_identifiers() {
        // Identifiers are positional: the same point gets a different
        // level-3 index once the collection order changes.
        let codec = planar();
        let point = Point::new(14.0, 3.3);

        let original = collection();
        let before = codec.encode(&original, "XX", point).unwrap().id;

        let mut features = original.features().to_vec();
        features.swap(0, 1);
        let reordered = BoundaryCollection::new("XX", features);
        let after = codec.encode(&reordered, "XX", point).unwrap().id;

        assert_eq!(before.level3(), 1);
        assert_eq!(after.level3(), 0);
        assert_eq!(before.grid(), after.grid());
        assert_ne!(before, after);

        // and an old identifier now decodes to the other square
        let stale = codec.decode(&reordered, &before.to_string()).unwrap();
        assert!(stale.center().x() < 10.0);
    }

    #[test]
    fn test_encode_many_matches_encode() {
        let boundaries = collection();
        let codec = planar();
        let points = vec![
            Point::new(5.0, 5.0),
            Point::new(-1.0, 0.0),
            Point::new(14.0, 3.3),
            Point::new(0.1, 5.0),
            Point::new(6.0, 2.0),
        ];

        let batch = codec.encode_many(&boundaries, "XX", &points);
        assert_eq!(batch.len(), points.len());
        for (point, result) in points.iter().zip(&batch) {
            match (codec.encode(&boundaries, "XX", *point), result) {
                (Ok(single), Ok(many)) => {
                    assert_eq!(single.id, many.id);
                    assert_eq!(single.cell, many.cell);
                }
                (Err(a), Err(b)) => assert_eq!(a.kind(), b.kind()),
                (a, b) => panic!("mismatch at {:?}: {:?} vs {:?}", point, a, b),
            }
        }
    }

    #[test]
    fn test_default_codec_uses_system_cell_side() {
        assert_eq!(Codec::default().cell_side(), CELL_SIDE);
        let boundaries = BoundaryCollection::new("CI", vec![rect(-4.01, 5.31, -4.0, 5.32)]);
        let encoded = encode(&boundaries, "CI", Point::new(-4.005, 5.315)).unwrap();
        let decoded = decode(&boundaries, &encoded.id.to_string()).unwrap();
        assert_eq!(decoded.cell, encoded.cell);
    }
}
