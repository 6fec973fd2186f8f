//! Connection setup for the hosted zone database.

use crate::DbError;

/// Environment variable holding the zone database URL.
pub const DATABASE_URL_ENV: &str = "DELIVERY_ZONES_DATABASE_URL";

/// Shared fallback read when [`DATABASE_URL_ENV`] is unset.
pub const FALLBACK_URL_ENV: &str = "DATABASE_URL";

/// Upper bound on a single zone lookup on the server side.
pub const STATEMENT_TIMEOUT: &str = "10s";

/// Picks the connection URL from `lookup` and drops any query string
/// (`?sslmode=...`), which the connection layer does not accept.
///
/// # Errors
///
/// Returns [`DbError::Config`] if neither variable is set or the value is
/// not a `postgres://` URL.
pub fn connection_url(lookup: impl Fn(&str) -> Option<String>) -> Result<String, DbError> {
    let url = lookup(DATABASE_URL_ENV)
        .or_else(|| lookup(FALLBACK_URL_ENV))
        .ok_or_else(|| DbError::Config {
            message: format!("set {DATABASE_URL_ENV} or {FALLBACK_URL_ENV}"),
        })?;

    let base = url.split_once('?').map_or(url.as_str(), |(base, _)| base);
    if !(base.starts_with("postgres://") || base.starts_with("postgresql://")) {
        return Err(DbError::Config {
            message: format!("{base} is not a postgres:// URL"),
        });
    }

    Ok(base.to_string())
}

/// Connects to the zone database named by the environment and bounds every
/// statement by [`STATEMENT_TIMEOUT`].
///
/// # Errors
///
/// Returns [`DbError`] if no URL is configured or the connection fails.
#[cfg(feature = "postgres")]
pub async fn connect_from_env() -> Result<Box<dyn switchy_database::Database>, DbError> {
    use switchy_database_connection::Credentials;

    let url = connection_url(|name| std::env::var(name).ok())?;
    let credentials = Credentials::from_url(&url).map_err(|e| DbError::Connection {
        message: e.to_string(),
    })?;
    let db = switchy_database_connection::init_postgres_raw_native_tls(credentials)
        .await
        .map_err(|e| DbError::Connection {
            message: e.to_string(),
        })?;

    db.exec_raw(&format!("SET statement_timeout = '{STATEMENT_TIMEOUT}'"))
        .await?;
    log::debug!("Connected to zone database");

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn prefers_dedicated_variable_and_strips_query() {
        let url = connection_url(env(&[
            (FALLBACK_URL_ENV, "postgres://shared/db"),
            (DATABASE_URL_ENV, "postgres://zones/db?sslmode=require"),
        ]))
        .unwrap();

        assert_eq!(url, "postgres://zones/db");
    }

    #[test]
    fn falls_back_to_database_url() {
        let url = connection_url(env(&[(FALLBACK_URL_ENV, "postgresql://shared/db")])).unwrap();

        assert_eq!(url, "postgresql://shared/db");
    }

    #[test]
    fn missing_or_foreign_url_is_config_error() {
        assert!(matches!(
            connection_url(env(&[])),
            Err(DbError::Config { .. })
        ));
        assert!(matches!(
            connection_url(env(&[(DATABASE_URL_ENV, "sqlite://zones.db")])),
            Err(DbError::Config { .. })
        ));
    }
}
