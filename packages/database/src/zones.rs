//! Zone containment queries against `PostGIS`.

use std::sync::Arc;

use async_trait::async_trait;
use delivery_zones_models::{Coordinate, ZoneId};
use delivery_zones_spatial::{GeometryStore, StoreError};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};

/// Calls the `find_zone_containing` function created by the migrations.
/// Parameters are `(lat, lng)`; the function returns `NULL` for no match.
const FIND_ZONE_SQL: &str = "SELECT find_zone_containing($1, $2) AS zone_id";

/// [`GeometryStore`] backed by the hosted `delivery_zones` table.
///
/// The table is read-only from here; concurrent lookups need no locking.
pub struct PostgisZoneStore {
    db: Arc<dyn Database>,
}

impl PostgisZoneStore {
    /// Wraps an existing database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GeometryStore for PostgisZoneStore {
    async fn find_zone_containing(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<ZoneId>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                FIND_ZONE_SQL,
                &[
                    DatabaseValue::Real64(coordinate.latitude()),
                    DatabaseValue::Real64(coordinate.longitude()),
                ],
            )
            .await
            .map_err(|e| {
                log::warn!("Zone lookup for {coordinate} failed: {e}");
                StoreError::Unavailable {
                    message: e.to_string(),
                }
            })?;

        zone_id_from_rows(&rows).inspect_err(|e| {
            log::warn!("Zone lookup for {coordinate} returned an unreadable row: {e}");
        })
    }
}

/// Extracts the matched zone id from the lookup result set.
///
/// A `NULL` id is no match. A row whose `zone_id` cannot be read as an
/// integer is an error, never a miss.
fn zone_id_from_rows(rows: &[Row]) -> Result<Option<ZoneId>, StoreError> {
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    let id: Option<i64> = row.to_value("zone_id").map_err(|e| StoreError::Unavailable {
        message: format!("invalid zone_id in lookup result: {e:?}"),
    })?;

    Ok(id.map(ZoneId))
}

#[cfg(test)]
mod tests {
    use switchy_database_connection::init_sqlite_rusqlite;

    use super::*;

    fn row(value: DatabaseValue) -> Row {
        Row {
            columns: vec![("zone_id".to_string(), value)],
        }
    }

    #[test]
    fn null_zone_id_is_no_match() {
        assert_eq!(zone_id_from_rows(&[row(DatabaseValue::Null)]).unwrap(), None);
    }

    #[test]
    fn empty_result_is_no_match() {
        assert_eq!(zone_id_from_rows(&[]).unwrap(), None);
    }

    #[test]
    fn integer_zone_id_is_returned() {
        assert_eq!(
            zone_id_from_rows(&[row(DatabaseValue::Int64(17))]).unwrap(),
            Some(ZoneId(17))
        );
    }

    #[test]
    fn unreadable_zone_id_is_unavailable_not_a_miss() {
        let result = zone_id_from_rows(&[row(DatabaseValue::String("7".to_string()))]);

        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn failing_query_is_store_unavailable() {
        // No migrations: `find_zone_containing` does not exist in this database.
        let db = init_sqlite_rusqlite(None).unwrap();
        let store = PostgisZoneStore::new(Arc::from(db));

        let result = store
            .find_zone_containing(Coordinate::new(26.1445, 91.7362).unwrap())
            .await;

        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    }
}
