//! CoordID - short, stable identifiers for every point of a country
//!
//! A point is located in one of the country's level-3 boundaries, the
//! boundary is tessellated into hexagons, and the identifier is
//! `COUNTRY-BOUNDARYINDEX-CELLINDEX`. Decoding regenerates the same grid.
//!
//! This library provides the core plus the boundary providers shared by the
//! server and cli binaries.

pub mod codec;
pub mod config;
pub mod error;
pub mod grid;
pub mod models;
pub mod pip;
pub mod provider;

pub use codec::{decode, encode, Codec, CoordId, Decoded, Encoded};
pub use error::{CoordError, IndexKind, Miss};
pub use grid::{tessellate, CellSide, GridCell, Units, CELL_SIDE};
pub use models::{BoundaryAttributes, BoundaryCollection, BoundaryFeature};
pub use pip::locate;
