//! Conversions from external infrastructure errors into domain errors.

use calmirror_domain::CalMirrorError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CalMirrorError);

impl From<InfraError> for CalMirrorError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CalMirrorError> for InfraError {
    fn from(value: CalMirrorError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCalMirrorError {
    fn into_calmirror(self) -> CalMirrorError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CalMirrorError */
/* -------------------------------------------------------------------------- */

impl IntoCalMirrorError for SqlError {
    fn into_calmirror(self) -> CalMirrorError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CalMirrorError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CalMirrorError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        CalMirrorError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => CalMirrorError::Database(
                        "file is not a calmirror database".into(),
                    ),
                    _ => CalMirrorError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CalMirrorError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CalMirrorError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CalMirrorError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => CalMirrorError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CalMirrorError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_calmirror())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CalMirrorError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(CalMirrorError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → CalMirrorError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(CalMirrorError::Internal(format!("I/O error: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(CalMirrorError::InvalidInput(format!("invalid JSON: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CalMirrorError */
/* -------------------------------------------------------------------------- */

impl IntoCalMirrorError for HttpError {
    fn into_calmirror(self) -> CalMirrorError {
        if self.is_timeout() {
            return CalMirrorError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CalMirrorError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => CalMirrorError::Auth(message),
                404 | 410 => CalMirrorError::NotFound(message),
                400..=499 => CalMirrorError::InvalidInput(message),
                _ => CalMirrorError::Network(message),
            };
        }

        CalMirrorError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_calmirror())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
