use larder_core::ServiceError;
use larder_sql::{Executor, Value};

use crate::db;
use crate::ledger::{self, EPSILON, Underflow};
use crate::model::{Shortage, StockBalance};

/// Ingredients whose outstanding reservations exceed what is on the shelf.
///
/// `to_buy` is the amount that brings `planned` back to zero.
pub(crate) fn shortages<E: Executor + ?Sized>(db: &E) -> Result<Vec<Shortage>, ServiceError> {
    db::query(
        db,
        "SELECT i.id AS id, i.name AS name, i.unit AS unit, s.actual AS actual, \
                s.planned AS planned \
         FROM stock_balances s JOIN ingredients i ON i.id = s.ingredient_id \
         WHERE s.planned < ?1 \
         ORDER BY i.name",
        &[Value::Real(-EPSILON)],
    )?
    .iter()
    .map(|row| {
        Ok(Shortage {
            ingredient_id: db::text(row, "id")?,
            name: db::text(row, "name")?,
            unit: db::text(row, "unit")?,
            actual: db::real(row, "actual")?,
            to_buy: -db::real(row, "planned")?,
        })
    })
    .collect()
}

/// Credit a purchase to the shelf.
pub(crate) fn restock<E: Executor + ?Sized>(
    db: &E,
    ingredient_id: &str,
    quantity: f64,
) -> Result<StockBalance, ServiceError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ServiceError::InvalidAmount(format!(
            "restock quantity must be positive, got {quantity}"
        )));
    }
    Ok(ledger::adjust_actual(db, ingredient_id, quantity, Underflow::Reject)?.balance)
}
