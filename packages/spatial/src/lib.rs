#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry store for delivery zone polygons.
//!
//! [`GeometryStore`] is the point-containment seam the resolver queries.
//! [`InMemoryZoneStore`] implements it over an R-tree of zone polygons
//! loaded from [`Zone`] values or a `GeoJSON` feature collection; the
//! `PostGIS`-backed implementation lives in `delivery_zones_database`.
//!
//! Containment is evaluated on the flat longitude/latitude plane. That is an
//! approximation of geographic containment which is accurate at city scale,
//! where delivery zones live. Points exactly on a zone edge count as inside,
//! matching `PostGIS` `ST_Covers`.

pub mod features;

use async_trait::async_trait;
use delivery_zones_models::{BoundaryError, Coordinate, CoordinateError, Zone, ZoneBoundary, ZoneId};
use geo::{BoundingRect, Intersects, LineString, MultiPolygon, Polygon};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Errors from geometry store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be queried. Distinct from "no zone".
    #[error("Zone store unavailable: {message}")]
    Unavailable {
        /// Description of the backend failure.
        message: String,
    },

    /// Zone data could not be parsed while loading.
    #[error("Zone data parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// A zone ring was malformed.
    #[error("Invalid zone boundary: {0}")]
    Boundary(#[from] BoundaryError),

    /// A zone vertex was out of range.
    #[error("Invalid zone vertex: {0}")]
    Coordinate(#[from] CoordinateError),
}

/// Point-containment query over delivery zone polygons.
///
/// Implementations are read-only and may be queried concurrently.
#[async_trait]
pub trait GeometryStore: Send + Sync {
    /// Returns the active zone covering `coordinate`, or `None`.
    ///
    /// When several active zones overlap at the point, the lowest
    /// [`ZoneId`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be queried.
    async fn find_zone_containing(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<ZoneId>, StoreError>;
}

/// A zone polygon stored in the R-tree with its metadata.
struct ZoneEntry {
    id: ZoneId,
    name: String,
    is_active: bool,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Summary of a loaded zone, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSummary {
    /// Zone identifier.
    pub id: ZoneId,
    /// Human label.
    pub name: String,
    /// Whether the zone participates in resolution.
    pub is_active: bool,
}

/// In-memory [`GeometryStore`] backed by an R-tree of zone polygons.
///
/// Built once and shared; lookups take `&self` and never mutate.
pub struct InMemoryZoneStore {
    zones: RTree<ZoneEntry>,
}

impl InMemoryZoneStore {
    /// Builds the R-tree from a set of zones.
    #[must_use]
    pub fn from_zones(zones: Vec<Zone>) -> Self {
        let entries: Vec<ZoneEntry> = zones
            .into_iter()
            .map(|zone| {
                let polygon = to_multipolygon(zone.boundary());
                let envelope = compute_envelope(&polygon);
                ZoneEntry {
                    id: zone.id,
                    name: zone.name,
                    is_active: zone.is_active,
                    envelope,
                    polygon,
                }
            })
            .collect();

        let zones = RTree::bulk_load(entries);
        log::info!("Loaded {} delivery zones into spatial index", zones.size());

        Self { zones }
    }

    /// Parses a `GeoJSON` feature collection and builds the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document is not a valid zone
    /// feature collection.
    pub fn from_geojson(geojson_str: &str) -> Result<Self, StoreError> {
        Ok(Self::from_zones(features::parse_zones(geojson_str)?))
    }

    /// Number of zones loaded, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.size()
    }

    /// Whether no zones are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.size() == 0
    }

    /// Lists loaded zones ordered by id.
    #[must_use]
    pub fn zones(&self) -> Vec<ZoneSummary> {
        let mut zones: Vec<ZoneSummary> = self
            .zones
            .iter()
            .map(|entry| ZoneSummary {
                id: entry.id,
                name: entry.name.clone(),
                is_active: entry.is_active,
            })
            .collect();
        zones.sort_by_key(|zone| zone.id);
        zones
    }

    /// Synchronous lookup of the active zone covering a point.
    ///
    /// Zones can overlap; the lowest id wins.
    #[must_use]
    pub fn lookup(&self, coordinate: Coordinate) -> Option<ZoneId> {
        let (lng, lat) = (coordinate.longitude(), coordinate.latitude());
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.zones
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.is_active && entry.polygon.intersects(&point))
            .map(|entry| entry.id)
            .min()
    }
}

#[async_trait]
impl GeometryStore for InMemoryZoneStore {
    async fn find_zone_containing(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<ZoneId>, StoreError> {
        let zone = self.lookup(coordinate);
        log::trace!("In-memory lookup {coordinate} -> {zone:?}");
        Ok(zone)
    }
}

/// Converts zone boundaries to a [`MultiPolygon`] in `(lng, lat)` space.
fn to_multipolygon(boundary: &[ZoneBoundary]) -> MultiPolygon<f64> {
    MultiPolygon(
        boundary
            .iter()
            .map(|part| {
                Polygon::new(
                    to_line_string(part.exterior()),
                    part.holes().iter().map(|hole| to_line_string(hole)).collect(),
                )
            })
            .collect(),
    )
}

fn to_line_string(ring: &[Coordinate]) -> LineString<f64> {
    ring.iter()
        .map(|c| (c.longitude(), c.latitude()))
        .collect::<Vec<_>>()
        .into()
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
