//! Thin helpers over [`Executor`] that speak [`ServiceError`].

use larder_core::ServiceError;
use larder_sql::{Executor, Row, SQLError, Value};

pub(crate) fn storage(e: SQLError) -> ServiceError {
    if e.is_unique_violation() {
        ServiceError::Conflict(e.to_string())
    } else {
        ServiceError::Storage(e.to_string())
    }
}

pub(crate) fn query<E: Executor + ?Sized>(
    db: &E,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Row>, ServiceError> {
    db.query(sql, params).map_err(storage)
}

pub(crate) fn exec<E: Executor + ?Sized>(
    db: &E,
    sql: &str,
    params: &[Value],
) -> Result<u64, ServiceError> {
    db.exec(sql, params).map_err(storage)
}

pub(crate) fn text(row: &Row, col: &str) -> Result<String, ServiceError> {
    row.get_str(col)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Storage(format!("missing text column {col}")))
}

pub(crate) fn opt_text(row: &Row, col: &str) -> Option<String> {
    row.get_str(col).map(str::to_string)
}

pub(crate) fn int(row: &Row, col: &str) -> Result<i64, ServiceError> {
    row.get_i64(col)
        .ok_or_else(|| ServiceError::Storage(format!("missing integer column {col}")))
}

pub(crate) fn real(row: &Row, col: &str) -> Result<f64, ServiceError> {
    row.get_f64(col)
        .ok_or_else(|| ServiceError::Storage(format!("missing numeric column {col}")))
}
