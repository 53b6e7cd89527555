//! Deterministic flat-topped hexagon lattice over a bounding box.
//!
//! The lattice depends only on the bounding box and the cell side: no
//! global state, no hashing, no randomness. Cells are emitted column by
//! column (x outer, y inner). Odd columns sit half a row lower and skip
//! their first row. The lattice is centred inside the box and never
//! extends past it by more than half a cell.

use std::f64::consts::PI;

use geo::{Coord, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Unit of a cell side length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Coordinate units, planar
    Degrees,
    /// Ground distance; the lattice is stretched per axis so a cell is
    /// `2 * length` km wide and tall at the box's mid-lines
    Kilometers,
}

/// Hexagon side length with its unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSide {
    pub length: f64,
    pub units: Units,
}

impl CellSide {
    pub const fn degrees(length: f64) -> Self {
        Self {
            length,
            units: Units::Degrees,
        }
    }

    pub const fn kilometers(length: f64) -> Self {
        Self {
            length,
            units: Units::Kilometers,
        }
    }
}

/// Cell side shared by every encoder and decoder.
///
/// Not stored in identifiers: changing it re-indexes every grid and
/// invalidates all issued identifiers.
pub const CELL_SIDE: CellSide = CellSide::kilometers(0.025);

/// Great-circle distance between two `(lon, lat)` degree pairs
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lon1, lat1) = (from.0.to_radians(), from.1.to_radians());
    let (lon2, lat2) = (to.0.to_radians(), to.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Lattice parameters derived from a bounding box and a cell side
#[derive(Debug, Clone)]
pub struct HexLattice {
    west: f64,
    south: f64,
    /// Horizontal and vertical radii of a cell
    rx: f64,
    ry: f64,
    x_interval: f64,
    y_interval: f64,
    x_adjust: f64,
    y_adjust: f64,
    hex_height: f64,
    has_offset_y: bool,
    /// Inclusive column/row maxima; `None` when no cell fits
    counts: Option<(u64, u64)>,
    cosines: [f64; 6],
    sines: [f64; 6],
}

impl HexLattice {
    pub fn new(bbox: Rect<f64>, side: CellSide) -> Self {
        let (west, south) = (bbox.min().x, bbox.min().y);
        let (east, north) = (bbox.max().x, bbox.max().y);
        let box_width = east - west;
        let box_height = north - south;

        let (cell_width, cell_height) = match side.units {
            Units::Degrees => (2.0 * side.length, 2.0 * side.length),
            Units::Kilometers => {
                let center_x = (west + east) / 2.0;
                let center_y = (south + north) / 2.0;
                let width_km = haversine_km((west, center_y), (east, center_y));
                let height_km = haversine_km((center_x, south), (center_x, north));
                (
                    2.0 * side.length / width_km * box_width,
                    2.0 * side.length / height_km * box_height,
                )
            }
        };

        let radius = cell_width / 2.0;
        let hex_width = cell_width;
        let hex_height = 3.0_f64.sqrt() / 2.0 * cell_height;
        let x_interval = 0.75 * hex_width;
        let y_interval = hex_height;

        let x_count = ((box_width - hex_width) / (hex_width - radius / 2.0)).floor();
        let y_count = ((box_height - hex_height) / hex_height).floor();

        let x_adjust =
            (x_count * x_interval - radius / 2.0 - box_width) / 2.0 - radius / 2.0 + x_interval / 2.0;
        let mut y_adjust = (box_height - y_count * hex_height) / 2.0;
        let has_offset_y = y_count * hex_height - box_height > hex_height / 2.0;
        if has_offset_y {
            y_adjust -= hex_height / 4.0;
        }

        let valid = side.length > 0.0
            && box_width > 0.0
            && box_height > 0.0
            && [cell_width, cell_height, x_count, y_count, x_adjust, y_adjust]
                .iter()
                .all(|v| v.is_finite());
        let counts = (valid && x_count >= 0.0 && y_count >= 0.0)
            .then(|| (x_count as u64, y_count as u64));

        let mut cosines = [0.0; 6];
        let mut sines = [0.0; 6];
        for i in 0..6 {
            let angle = 2.0 * PI / 6.0 * i as f64;
            cosines[i] = angle.cos();
            sines[i] = angle.sin();
        }

        Self {
            west,
            south,
            rx: cell_width / 2.0,
            ry: cell_height / 2.0,
            x_interval,
            y_interval,
            x_adjust,
            y_adjust,
            hex_height,
            has_offset_y,
            counts,
            cosines,
            sines,
        }
    }

    /// Upper bound on the number of cells `iter` yields, saturating at
    /// `usize::MAX`
    pub fn capacity(&self) -> usize {
        self.counts
            .map(|(x, y)| {
                let cells = x.saturating_add(1).saturating_mul(y.saturating_add(1));
                usize::try_from(cells).unwrap_or(usize::MAX)
            })
            .unwrap_or(0)
    }

    /// Cells in lattice order
    pub fn iter(&self) -> impl Iterator<Item = Polygon<f64>> + '_ {
        let (x_max, y_max) = match self.counts {
            Some((x, y)) => (Some(x), y),
            None => (None, 0),
        };

        x_max
            .into_iter()
            .flat_map(|x_max| 0..=x_max)
            .flat_map(move |x| {
                (0..=y_max).filter_map(move |y| {
                    let is_odd = x % 2 == 1;
                    if y == 0 && (is_odd || self.has_offset_y) {
                        return None;
                    }
                    Some(self.cell(x, y, is_odd))
                })
            })
    }

    fn cell(&self, x: u64, y: u64, is_odd: bool) -> Polygon<f64> {
        let center_x = x as f64 * self.x_interval + self.west - self.x_adjust;
        let mut center_y = y as f64 * self.y_interval + self.south + self.y_adjust;
        if is_odd {
            center_y -= self.hex_height / 2.0;
        }

        let mut ring: Vec<Coord<f64>> = (0..6)
            .map(|i| Coord {
                x: center_x + self.rx * self.cosines[i],
                y: center_y + self.ry * self.sines[i],
            })
            .collect();
        ring.push(ring[0]);

        Polygon::new(LineString::new(ring), vec![])
    }
}
