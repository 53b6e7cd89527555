//! Hexagonal grid tessellation of boundary features.

mod lattice;
mod tessellate;

pub use lattice::{haversine_km, CellSide, HexLattice, Units, CELL_SIDE, EARTH_RADIUS_KM};
pub use tessellate::{tessellate, tessellate_geometry, GridCell};
