//! Boundary data providers.
//!
//! The core never fetches data itself: callers inject a provider and own
//! its lifetime (and its cache, if any).

mod cache;
mod fs;

pub use cache::{CachedCountry, CachedProvider};
pub use fs::DirectoryProvider;

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::models::BoundaryCollection;

/// Source of per-country boundary collections.
///
/// Implementations must return features in the same order on every call
/// for the same data version; identifiers are positions into that order.
pub trait BoundaryProvider: Send + Sync {
    /// Load a country's collection, `None` when the country is not covered
    fn load(&self, country_code: &str) -> Result<Option<BoundaryCollection>>;

    /// Codes of every covered country, sorted
    fn countries(&self) -> Result<Vec<String>>;
}

/// A covered country
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryInfo {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// List covered countries, optionally filtered by a case-insensitive
/// substring of the code or display name.
pub fn list_countries<P: BoundaryProvider + ?Sized>(
    provider: &P,
    names: &HashMap<String, String>,
    query: Option<&str>,
) -> Result<Vec<CountryInfo>> {
    let query = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let countries = provider
        .countries()?
        .into_iter()
        .map(|code| CountryInfo {
            name: names.get(&code).cloned(),
            code,
        })
        .filter(|info| match &query {
            Some(q) => {
                info.code.to_lowercase().contains(q)
                    || info
                        .name
                        .as_ref()
                        .map(|n| n.to_lowercase().contains(q))
                        .unwrap_or(false)
            }
            None => true,
        })
        .collect();

    Ok(countries)
}
