//! Error taxonomy shared by the encoder, decoder and boundary providers.
//!
//! None of these are fatal: every variant is an ordinary return value that
//! the caller is expected to turn into a message or a retry.

use std::fmt;
use thiserror::Error;

/// Which lookup came back empty during encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// No boundary feature contains the point (region not covered).
    Boundary,
    /// The point is inside a boundary but between retained hexagons.
    GridCell,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::Boundary => write!(f, "no boundary contains the point"),
            Miss::GridCell => write!(f, "point falls in an uncovered gap near a boundary edge"),
        }
    }
}

/// Which positional index of an identifier was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Level3,
    Grid,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Level3 => write!(f, "level-3"),
            IndexKind::Grid => write!(f, "grid"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordError {
    #[error("not found: {0}")]
    NotFound(Miss),

    #[error("invalid identifier: {0}")]
    InvalidFormat(String),

    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: IndexKind,
        index: usize,
        len: usize,
    },

    #[error("country not supported: {0}")]
    UnknownCountry(String),

    #[error("invalid boundary data: {0}")]
    InvalidBoundaryData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoordError {
    /// Short machine-readable name, used in HTTP and CSV output.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordError::NotFound(Miss::Boundary) => "not_found",
            CoordError::NotFound(Miss::GridCell) => "uncovered_gap",
            CoordError::InvalidFormat(_) => "invalid_format",
            CoordError::IndexOutOfRange { .. } => "index_out_of_range",
            CoordError::UnknownCountry(_) => "unknown_country",
            CoordError::InvalidBoundaryData(_) => "invalid_boundary_data",
            CoordError::Io(_) => "io",
            CoordError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;
