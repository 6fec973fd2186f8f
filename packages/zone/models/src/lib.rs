#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate, delivery zone and setup status types.
//!
//! These types are shared by the geometry stores, the zone resolver and the
//! location-setup state machine. Values are validated at construction, so a
//! [`Coordinate`] or [`ZoneBoundary`] that exists is always well-formed.

pub mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use status::{DenialReason, Destination, SetupStatus};

/// Errors from constructing a [`Coordinate`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    /// Latitude outside `[-90, 90]` or not a finite number.
    #[error("invalid latitude {0}: expected -90..=90")]
    Latitude(f64),

    /// Longitude outside `[-180, 180]` or not a finite number.
    #[error("invalid longitude {0}: expected -180..=180")]
    Longitude(f64),
}

/// A WGS-84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CoordinateParts")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoordinateParts {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<CoordinateParts> for Coordinate {
    type Error = CoordinateError;

    fn try_from(parts: CoordinateParts) -> Result<Self, Self::Error> {
        Self::new(parts.latitude, parts.longitude)
    }
}

impl Coordinate {
    /// Creates a coordinate, rejecting out-of-range or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] if latitude is outside `[-90, 90]` or
    /// longitude is outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Stable identifier of a delivery zone (the `delivery_zones.id` column).
///
/// Ordering is meaningful: overlapping zones resolve to the lowest id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ZoneId(pub i64);

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from constructing a [`ZoneBoundary`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// A ring has fewer than the four points a closed triangle needs.
    #[error("ring {ring} has {count} points, at least 4 are required")]
    TooFewPoints {
        /// Ring index (0 is the exterior, holes follow).
        ring: usize,
        /// Number of points supplied.
        count: usize,
    },

    /// A ring's first and last points differ.
    #[error("ring {ring} is not closed (first point != last point)")]
    NotClosed {
        /// Ring index (0 is the exterior, holes follow).
        ring: usize,
    },

    /// A zone was given no polygon parts.
    #[error("zone has no boundary parts")]
    Empty,
}

/// Closed polygon outline of a zone: one exterior ring and optional holes.
///
/// Every ring is closed (first point equals last) and has at least four
/// points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "BoundaryParts")]
pub struct ZoneBoundary {
    exterior: Vec<Coordinate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    holes: Vec<Vec<Coordinate>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundaryParts {
    exterior: Vec<Coordinate>,
    #[serde(default)]
    holes: Vec<Vec<Coordinate>>,
}

impl TryFrom<BoundaryParts> for ZoneBoundary {
    type Error = BoundaryError;

    fn try_from(parts: BoundaryParts) -> Result<Self, Self::Error> {
        Self::new(parts.exterior, parts.holes)
    }
}

impl ZoneBoundary {
    /// Creates a boundary from an exterior ring and zero or more holes.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if any ring is open or too short.
    pub fn new(
        exterior: Vec<Coordinate>,
        holes: Vec<Vec<Coordinate>>,
    ) -> Result<Self, BoundaryError> {
        validate_ring(0, &exterior)?;
        for (i, hole) in holes.iter().enumerate() {
            validate_ring(i + 1, hole)?;
        }
        Ok(Self { exterior, holes })
    }

    /// Creates a boundary without holes.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the ring is open or too short.
    pub fn simple(exterior: Vec<Coordinate>) -> Result<Self, BoundaryError> {
        Self::new(exterior, Vec::new())
    }

    /// The outer ring.
    #[must_use]
    pub fn exterior(&self) -> &[Coordinate] {
        &self.exterior
    }

    /// Hole rings cut out of the exterior.
    #[must_use]
    pub fn holes(&self) -> &[Vec<Coordinate>] {
        &self.holes
    }
}

fn validate_ring(ring: usize, points: &[Coordinate]) -> Result<(), BoundaryError> {
    if points.len() < 4 {
        return Err(BoundaryError::TooFewPoints {
            ring,
            count: points.len(),
        });
    }
    if points.first() != points.last() {
        return Err(BoundaryError::NotClosed { ring });
    }
    Ok(())
}

/// A delivery-coverage area.
///
/// Zones are maintained by the admin panel; the resolver only reads them.
/// A zone always has at least one polygon part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ZoneParts")]
pub struct Zone {
    /// Stable unique identifier.
    pub id: ZoneId,
    /// Human label, not used for resolution.
    pub name: String,
    boundary: Vec<ZoneBoundary>,
    /// Inactive zones never match, even when geometrically containing.
    pub is_active: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneParts {
    id: ZoneId,
    name: String,
    boundary: Vec<ZoneBoundary>,
    is_active: bool,
}

impl TryFrom<ZoneParts> for Zone {
    type Error = BoundaryError;

    fn try_from(parts: ZoneParts) -> Result<Self, Self::Error> {
        Self::new(parts.id, parts.name, parts.boundary, parts.is_active)
    }
}

impl Zone {
    /// Creates a zone from its polygon parts.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Empty`] if `boundary` has no parts.
    pub fn new(
        id: ZoneId,
        name: impl Into<String>,
        boundary: Vec<ZoneBoundary>,
        is_active: bool,
    ) -> Result<Self, BoundaryError> {
        if boundary.is_empty() {
            return Err(BoundaryError::Empty);
        }
        Ok(Self {
            id,
            name: name.into(),
            boundary,
            is_active,
        })
    }

    /// Polygon parts making up the zone (usually one).
    #[must_use]
    pub fn boundary(&self) -> &[ZoneBoundary] {
        &self.boundary
    }
}

/// Outcome of one resolution attempt.
///
/// Immutable: a new attempt produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneValidationResult {
    matched_zone_id: Option<ZoneId>,
    coordinate: Coordinate,
    resolved_at: DateTime<Utc>,
}

impl ZoneValidationResult {
    /// Creates a result for `coordinate` resolved at `resolved_at`.
    #[must_use]
    pub const fn new(
        matched_zone_id: Option<ZoneId>,
        coordinate: Coordinate,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            matched_zone_id,
            coordinate,
            resolved_at,
        }
    }

    /// The covering zone, if any.
    #[must_use]
    pub const fn matched_zone_id(&self) -> Option<ZoneId> {
        self.matched_zone_id
    }

    /// The coordinate that was resolved.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// When the resolution completed.
    #[must_use]
    pub const fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    /// Whether the coordinate fell inside an active zone.
    #[must_use]
    pub const fn is_covered(&self) -> bool {
        self.matched_zone_id.is_some()
    }
}
