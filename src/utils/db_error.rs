use std::time::Duration;

use crate::error::AppError;

/// Name of the unique constraint PostgreSQL generates for `urls.short_url`.
pub const SHORT_URL_CONSTRAINT: &str = "urls_short_url_key";

/// Returns true when `e` is a unique violation on the short key column.
///
/// A violation reported without a constraint name is treated as a key
/// collision as well, since `short_url` is the only user-controlled unique column.
pub fn is_unique_violation_on_key(e: &sqlx::Error) -> bool {
    let Some(db_err) = e.as_database_error() else {
        return false;
    };

    if !db_err.is_unique_violation() {
        return false;
    }

    matches!(db_err.constraint(), Some(SHORT_URL_CONSTRAINT) | None)
}

/// Translates a `sqlx` failure into the storage error taxonomy.
///
/// `key` is the short key being written, used to report conflicts. `timeout`
/// is the bound reported when no pooled connection became free in time.
pub fn map_sqlx_error(e: sqlx::Error, key: Option<&str>, timeout: Duration) -> AppError {
    if let Some(key) = key
        && is_unique_violation_on_key(&e)
    {
        return AppError::Conflict {
            key: key.to_string(),
        };
    }

    match e {
        sqlx::Error::PoolTimedOut => AppError::Timeout(timeout),
        sqlx::Error::PoolClosed => AppError::Closed,
        other => AppError::Backend(other.to_string()),
    }
}
