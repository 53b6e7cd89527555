//! Point-in-Polygon (PIP) lookup.
//!
//! Ordered first-match location over boundary features and grid cells,
//! plus an R-tree index that answers the same question for boundaries
//! without scanning every feature.

pub mod geometry;
mod index;
mod locate;

pub use index::BoundaryIndex;
pub use locate::{locate, Locatable};
