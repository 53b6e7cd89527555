//! Caller-owned cache of loaded boundary collections.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::Serialize;
use tracing::info;

use super::BoundaryProvider;
use crate::error::{CoordError, Result};
use crate::models::BoundaryCollection;

#[derive(Clone)]
struct CacheEntry {
    collection: Arc<BoundaryCollection>,
    loaded_at: DateTime<Utc>,
}

/// Summary of a cached country
#[derive(Debug, Clone, Serialize)]
pub struct CachedCountry {
    pub code: String,
    pub features: usize,
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
}

/// Caches collections from an inner provider.
///
/// Collections are immutable once loaded and handed out as `Arc`s, so any
/// number of threads can encode and decode against them concurrently.
/// Reloading replaces the `Arc`; callers holding the old one keep a
/// consistent snapshot.
pub struct CachedProvider<P> {
    inner: P,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl<P: BoundaryProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Get a country's collection, loading it on first use.
    pub fn get(&self, country_code: &str) -> Result<Arc<BoundaryCollection>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(country_code) {
                return Ok(Arc::clone(&entry.collection));
            }
        }

        // Loading happens outside the lock; two racing loads of the same
        // country produce equal collections and the first insert wins.
        let collection = self
            .inner
            .load(country_code)?
            .ok_or_else(|| CoordError::UnknownCountry(country_code.to_string()))?;

        info!(
            "Cached {} ({} boundaries, fingerprint {:016x})",
            country_code,
            collection.len(),
            collection.fingerprint()
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache
            .entry(country_code.to_string())
            .or_insert_with(|| CacheEntry {
                collection: Arc::new(collection),
                loaded_at: Utc::now(),
            });
        Ok(Arc::clone(&entry.collection))
    }

    /// Drop a country so the next `get` reloads it
    pub fn invalidate(&self, country_code: &str) -> bool {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.remove(country_code).is_some()
    }

    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
    }

    /// Currently cached countries, sorted by code
    pub fn cached(&self) -> Vec<CachedCountry> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let mut countries: Vec<CachedCountry> = cache
            .iter()
            .map(|(code, entry)| CachedCountry {
                code: code.clone(),
                features: entry.collection.len(),
                fingerprint: format!("{:016x}", entry.collection.fingerprint()),
                loaded_at: entry.loaded_at,
            })
            .collect();
        countries.sort_by(|a, b| a.code.cmp(&b.code));
        countries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundaryAttributes, BoundaryFeature};
    use geo::{polygon, MultiPolygon};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        loads: AtomicUsize,
    }

    impl BoundaryProvider for Counting {
        fn load(&self, country_code: &str) -> Result<Option<BoundaryCollection>> {
            if country_code != "AAA" {
                return Ok(None);
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            let feature = BoundaryFeature::new(
                MultiPolygon::new(vec![polygon![
                    (x: 0.0, y: 0.0),
                    (x: 1.0, y: 0.0),
                    (x: 1.0, y: 1.0),
                    (x: 0.0, y: 0.0),
                ]]),
                BoundaryAttributes::default(),
            );
            Ok(Some(BoundaryCollection::new(country_code, vec![feature])))
        }

        fn countries(&self) -> Result<Vec<String>> {
            Ok(vec!["AAA".to_string()])
        }
    }

    fn provider() -> CachedProvider<Counting> {
        CachedProvider::new(Counting {
            loads: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_loads_once() {
        let cached = provider();
        let a = cached.get("AAA").unwrap();
        let b = cached.get("AAA").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cached().len(), 1);
        assert_eq!(cached.cached()[0].features, 1);
    }

    #[test]
    fn test_unknown_country() {
        let cached = provider();
        assert!(matches!(
            cached.get("ZZZ"),
            Err(CoordError::UnknownCountry(code)) if code == "ZZZ"
        ));
        assert!(cached.cached().is_empty());
    }

    #[test]
    fn test_invalidate_reloads() {
        let cached = provider();
        let old = cached.get("AAA").unwrap();
        assert!(cached.invalidate("AAA"));
        assert!(!cached.invalidate("AAA"));
        let new = cached.get("AAA").unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 2);

        cached.clear();
        assert!(cached.cached().is_empty());
    }
}
