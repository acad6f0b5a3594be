use activity_core::StoreError;

/// Flatten a `tokio-postgres` error into the domain `StoreError` (spec §4.H).
pub fn pg_err(err: tokio_postgres::Error) -> StoreError {
    StoreError::Query(err.to_string())
}
