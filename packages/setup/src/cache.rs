//! Process-lifetime memo of the last successful resolution.
//!
//! Nothing here touches disk: a cold start always re-runs the setup flow,
//! since the device may have moved.

use std::sync::{Arc, PoisonError, RwLock};

use delivery_zones_models::ZoneValidationResult;

/// Holds the last `Resolved` outcome for the life of the process.
#[derive(Debug, Default)]
pub struct SessionCache {
    entry: RwLock<Option<Arc<ZoneValidationResult>>>,
}

impl SessionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result, if any. Repeated calls return the same allocation.
    #[must_use]
    pub fn get(&self) -> Option<Arc<ZoneValidationResult>> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the cached result. Written by the setup state machine when
    /// it reaches `Resolved`.
    pub fn set(&self, result: ZoneValidationResult) -> Arc<ZoneValidationResult> {
        let result = Arc::new(result);
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&result));
        result
    }

    /// Drops the cached result.
    pub fn invalidate(&self) {
        let previous = self
            .entry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            log::debug!("Session zone cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use delivery_zones_models::{Coordinate, ZoneId};

    use super::*;

    fn result(zone: i64) -> ZoneValidationResult {
        ZoneValidationResult::new(
            Some(ZoneId(zone)),
            Coordinate::new(26.1445, 91.7362).unwrap(),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    #[test]
    fn starts_empty() {
        assert!(SessionCache::new().get().is_none());
    }

    #[test]
    fn get_returns_the_stored_object() {
        let cache = SessionCache::new();
        let stored = cache.set(result(1));

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &stored));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn set_overwrites() {
        let cache = SessionCache::new();
        cache.set(result(1));
        cache.set(result(2));
        assert_eq!(cache.get().unwrap().matched_zone_id(), Some(ZoneId(2)));
    }

    #[test]
    fn invalidate_clears() {
        let cache = SessionCache::new();
        cache.set(result(1));
        cache.invalidate();
        assert!(cache.get().is_none());
        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
