//! `GeoJSON` zone loading.
//!
//! Zones are exported from the admin panel as a `FeatureCollection` whose
//! features carry `Polygon` or `MultiPolygon` geometry and the properties
//! `id` (integer), `name` and `is_active` (defaults to `true`). The feature
//! level `id` member is used when the `id` property is missing.

use delivery_zones_models::{Coordinate, Zone, ZoneBoundary, ZoneId};
use geo::{LineString, MultiPolygon, Polygon};
use geojson::{Feature, GeoJson, feature::Id};

use crate::StoreError;

/// Parses a `GeoJSON` feature collection into zones.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] if the document is not a feature
/// collection, a feature lacks an integer id or polygon geometry, or a
/// vertex is out of range.
pub fn parse_zones(geojson_str: &str) -> Result<Vec<Zone>, StoreError> {
    let geojson: GeoJson = geojson_str.parse().map_err(|e| StoreError::Parse {
        message: format!("invalid GeoJSON: {e}"),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(StoreError::Parse {
            message: "expected a FeatureCollection".to_string(),
        });
    };

    collection.features.iter().map(parse_feature).collect()
}

fn parse_feature(feature: &Feature) -> Result<Zone, StoreError> {
    let id = feature_id(feature).ok_or_else(|| StoreError::Parse {
        message: "feature has no integer id".to_string(),
    })?;

    let name = feature
        .property("name")
        .and_then(|v| v.as_str())
        .map_or_else(|| format!("Zone {id}"), ToString::to_string);

    let is_active = feature
        .property("is_active")
        .or_else(|| feature.property("isActive"))
        .and_then(geojson::JsonValue::as_bool)
        .unwrap_or(true);

    let geometry = feature.geometry.clone().ok_or_else(|| StoreError::Parse {
        message: format!("zone {id} has no geometry"),
    })?;
    let geometry: geo::Geometry<f64> = geometry.try_into().map_err(|e| StoreError::Parse {
        message: format!("zone {id} geometry: {e}"),
    })?;

    let multi_polygon = match geometry {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        other => {
            return Err(StoreError::Parse {
                message: format!("zone {id} geometry is not a polygon: {other:?}"),
            });
        }
    };

    let boundary = multi_polygon
        .iter()
        .map(to_boundary)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Zone::new(id, name, boundary, is_active)?)
}

fn feature_id(feature: &Feature) -> Option<ZoneId> {
    if let Some(id) = feature.property("id").and_then(geojson::JsonValue::as_i64) {
        return Some(ZoneId(id));
    }
    match &feature.id {
        Some(Id::Number(n)) => n.as_i64().map(ZoneId),
        Some(Id::String(s)) => s.parse().ok().map(ZoneId),
        None => None,
    }
}

fn to_boundary(polygon: &Polygon<f64>) -> Result<ZoneBoundary, StoreError> {
    let exterior = to_ring(polygon.exterior())?;
    let holes = polygon
        .interiors()
        .iter()
        .map(to_ring)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ZoneBoundary::new(exterior, holes)?)
}

fn to_ring(line: &LineString<f64>) -> Result<Vec<Coordinate>, StoreError> {
    Ok(line
        .coords()
        .map(|coord| Coordinate::new(coord.y, coord.x))
        .collect::<Result<Vec<_>, _>>()?)
}
