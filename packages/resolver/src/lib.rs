#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zone resolution.
//!
//! [`ZoneResolver`] turns a raw [`Coordinate`] into a
//! [`ZoneValidationResult`] by asking a [`GeometryStore`] exactly once. It
//! neither retries nor caches: retry policy belongs to the setup flow and
//! memoization to the session cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use delivery_zones_models::{Coordinate, ZoneValidationResult};
use delivery_zones_spatial::{GeometryStore, StoreError};

/// Source of resolution timestamps.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Resolves coordinates against a geometry store.
#[derive(Clone)]
pub struct ZoneResolver {
    store: Arc<dyn GeometryStore>,
    clock: Arc<dyn Clock>,
}

impl ZoneResolver {
    /// Creates a resolver stamping results with the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn GeometryStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a resolver with an explicit clock.
    #[must_use]
    pub fn with_clock(store: Arc<dyn GeometryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Resolves `coordinate` to the covering active zone, if any.
    ///
    /// "No zone" is a successful result with no `matched_zone_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the geometry store could not be queried.
    pub async fn resolve(
        &self,
        coordinate: Coordinate,
    ) -> Result<ZoneValidationResult, StoreError> {
        let matched = self.store.find_zone_containing(coordinate).await?;
        let result = ZoneValidationResult::new(matched, coordinate, self.clock.now());

        match matched {
            Some(zone) => log::debug!("Resolved {coordinate} to zone {zone}"),
            None => log::debug!("No active zone covers {coordinate}"),
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use delivery_zones_models::{Zone, ZoneBoundary, ZoneId};
    use delivery_zones_spatial::InMemoryZoneStore;

    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn guwahati(id: i64, is_active: bool) -> Zone {
        Zone::new(
            ZoneId(id),
            "Guwahati",
            vec![
                ZoneBoundary::simple(vec![
                    c(26.10, 91.68),
                    c(26.10, 91.80),
                    c(26.20, 91.80),
                    c(26.20, 91.68),
                    c(26.10, 91.68),
                ])
                .unwrap(),
            ],
            is_active,
        )
        .unwrap()
    }

    fn resolver(zones: Vec<Zone>) -> ZoneResolver {
        ZoneResolver::with_clock(
            Arc::new(InMemoryZoneStore::from_zones(zones)),
            Arc::new(FixedClock(DateTime::<Utc>::UNIX_EPOCH)),
        )
    }

    /// Counts calls and fails every one.
    #[derive(Default)]
    struct UnreachableStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeometryStore for UnreachableStore {
        async fn find_zone_containing(
            &self,
            _coordinate: Coordinate,
        ) -> Result<Option<ZoneId>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn guwahati_point_matches_seeded_zone() {
        let result = resolver(vec![guwahati(11, true)])
            .resolve(c(26.1445, 91.7362))
            .await
            .unwrap();

        assert_eq!(result.matched_zone_id(), Some(ZoneId(11)));
        assert_eq!(result.coordinate(), c(26.1445, 91.7362));
    }

    #[tokio::test]
    async fn ocean_point_has_no_match() {
        let result = resolver(vec![guwahati(11, true)])
            .resolve(c(0.0, 0.0))
            .await
            .unwrap();

        assert_eq!(result.matched_zone_id(), None);
        assert!(!result.is_covered());
    }

    #[tokio::test]
    async fn inactive_zone_is_excluded() {
        let result = resolver(vec![guwahati(11, false)])
            .resolve(c(26.1445, 91.7362))
            .await
            .unwrap();

        assert_eq!(result.matched_zone_id(), None);
    }

    #[tokio::test]
    async fn repeated_resolution_is_identical() {
        let resolver = resolver(vec![guwahati(11, true), guwahati(4, true)]);
        let first = resolver.resolve(c(26.1445, 91.7362)).await.unwrap();

        for _ in 0..5 {
            let again = resolver.resolve(c(26.1445, 91.7362)).await.unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(first.matched_zone_id(), Some(ZoneId(4)));
    }

    #[tokio::test]
    async fn store_failure_is_surfaced_after_one_call() {
        let store = Arc::new(UnreachableStore::default());
        let resolver = ZoneResolver::new(Arc::clone(&store) as Arc<dyn GeometryStore>);

        let err = resolver.resolve(c(26.1445, 91.7362)).await.unwrap_err();

        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
