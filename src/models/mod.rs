//! Core data models for the CoordID system.

pub mod boundary;
pub mod geojson;

pub use boundary::{humanize, BoundaryAttributes, BoundaryCollection, BoundaryFeature};
