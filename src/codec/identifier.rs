//! The `COUNTRY-LEVEL3INDEX-GRIDINDEX` identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoordError, Result};

const SEPARATOR: char = '-';

/// A parsed CoordID.
///
/// Holds only positions; they mean something only against the boundary
/// collection and cell side they were issued with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordId {
    country: String,
    level3: usize,
    grid: usize,
}

impl CoordId {
    pub fn new(country: impl Into<String>, level3: usize, grid: usize) -> Result<Self> {
        let country = country.into();
        if !is_country_code(&country) {
            return Err(CoordError::InvalidFormat(format!(
                "country code {:?} must be non-empty ASCII alphanumeric",
                country
            )));
        }
        Ok(Self {
            country,
            level3,
            grid,
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn level3(&self) -> usize {
        self.level3
    }

    pub fn grid(&self) -> usize {
        self.grid
    }
}

/// Non-empty and ASCII alphanumeric
pub fn is_country_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn parse_index(token: &str, what: &str) -> Result<usize> {
    let canonical = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !canonical {
        return Err(CoordError::InvalidFormat(format!(
            "{} index {:?} is not a canonical non-negative integer",
            what, token
        )));
    }
    token
        .parse()
        .map_err(|_| CoordError::InvalidFormat(format!("{} index {:?} is too large", what, token)))
}

impl FromStr for CoordId {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split(SEPARATOR).collect();
        let [country, level3, grid] = tokens.as_slice() else {
            return Err(CoordError::InvalidFormat(format!(
                "expected 3 dash-separated segments, got {}",
                tokens.len()
            )));
        };

        let level3 = parse_index(level3, "level-3")?;
        let grid = parse_index(grid, "grid")?;
        CoordId::new(*country, level3, grid)
    }
}

impl fmt::Display for CoordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.country, SEPARATOR, self.level3, SEPARATOR, self.grid
        )
    }
}

impl Serialize for CoordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CoordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
