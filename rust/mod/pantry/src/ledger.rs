//! Stock ledger: the two counters kept per ingredient.
//!
//! This module is the only code that writes `stock_balances`. Every function
//! takes an [`Executor`] so the caller decides the transaction it runs in.

use larder_core::{ServiceError, now_rfc3339};
use larder_sql::{Executor, Value};

use crate::db;
use crate::model::{StockBalance, StockOperation};

/// Rounding noise below this is treated as zero when checking for underflow.
pub(crate) const EPSILON: f64 = 1e-9;

/// What `adjust_actual` does when a debit would take `actual` below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Underflow {
    /// Fail with `InsufficientStock`; nothing is written.
    Reject,
    /// Take what is there, leave `actual` at zero and report the rest.
    Clamp,
}

/// Outcome of [`adjust_actual`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActualAdjustment {
    pub balance: StockBalance,
    /// Delta actually applied to both counters.
    pub applied: f64,
    /// Part of a clamped debit that could not be taken (0 unless clamped).
    pub shortfall: f64,
}

struct Snapshot {
    name: String,
    unit: String,
    balance: StockBalance,
    exists: bool,
}

fn snapshot<E: Executor + ?Sized>(db: &E, ingredient_id: &str) -> Result<Snapshot, ServiceError> {
    let rows = db::query(
        db,
        "SELECT i.name AS name, i.unit AS unit, s.actual AS actual, s.planned AS planned \
         FROM ingredients i LEFT JOIN stock_balances s ON s.ingredient_id = i.id \
         WHERE i.id = ?1",
        &[Value::from(ingredient_id)],
    )?;
    let row = rows
        .first()
        .ok_or_else(|| ServiceError::NotFound(format!("ingredient {ingredient_id}")))?;

    let exists = !row.is_null("actual");
    let balance = if exists {
        StockBalance {
            actual: db::real(row, "actual")?,
            planned: db::real(row, "planned")?,
        }
    } else {
        StockBalance::ZERO
    };

    Ok(Snapshot {
        name: db::text(row, "name")?,
        unit: db::text(row, "unit")?,
        balance,
        exists,
    })
}

fn write<E: Executor + ?Sized>(
    db: &E,
    ingredient_id: &str,
    snap: &Snapshot,
    balance: StockBalance,
) -> Result<(), ServiceError> {
    let now = now_rfc3339();
    if snap.exists {
        db::exec(
            db,
            "UPDATE stock_balances SET actual = ?1, planned = ?2, updated_at = ?3 \
             WHERE ingredient_id = ?4",
            &[
                Value::Real(balance.actual),
                Value::Real(balance.planned),
                Value::Text(now),
                Value::from(ingredient_id),
            ],
        )?;
    } else {
        db::exec(
            db,
            "INSERT INTO stock_balances (ingredient_id, actual, planned, updated_at) \
             VALUES (?1, ?2, ?3, ?4)",
            &[
                Value::from(ingredient_id),
                Value::Real(balance.actual),
                Value::Real(balance.planned),
                Value::Text(now),
            ],
        )?;
    }
    Ok(())
}

/// Read the `(actual, planned)` pair of an ingredient.
///
/// An ingredient that was never stocked reads as zero on both counters.
pub fn balance<E: Executor + ?Sized>(
    db: &E,
    ingredient_id: &str,
) -> Result<StockBalance, ServiceError> {
    Ok(snapshot(db, ingredient_id)?.balance)
}

/// Add `delta` to `planned` only. Never rejected; may go negative.
pub(crate) fn adjust_planned<E: Executor + ?Sized>(
    db: &E,
    ingredient_id: &str,
    delta: f64,
) -> Result<StockBalance, ServiceError> {
    let snap = snapshot(db, ingredient_id)?;
    let balance = StockBalance {
        actual: snap.balance.actual,
        planned: snap.balance.planned + delta,
    };
    write(db, ingredient_id, &snap, balance)?;
    Ok(balance)
}

/// Add `delta` to `actual` and the same applied delta to `planned`.
///
/// Moving both counters together keeps the outstanding-reservation gap intact:
/// a restock lifts the floor without touching the deficit.
pub(crate) fn adjust_actual<E: Executor + ?Sized>(
    db: &E,
    ingredient_id: &str,
    delta: f64,
    underflow: Underflow,
) -> Result<ActualAdjustment, ServiceError> {
    let snap = snapshot(db, ingredient_id)?;
    let current = snap.balance;
    let target = current.actual + delta;

    let (applied, shortfall) = if target < -EPSILON {
        match underflow {
            Underflow::Reject => {
                return Err(ServiceError::InsufficientStock(format!(
                    "not enough {}: {} {unit} on hand, {} {unit} requested",
                    snap.name,
                    current.actual,
                    -delta,
                    unit = snap.unit,
                )));
            }
            Underflow::Clamp => (-current.actual, -target),
        }
    } else if target < 0.0 {
        (-current.actual, 0.0)
    } else {
        (delta, 0.0)
    };

    let balance = StockBalance {
        actual: current.actual + applied,
        planned: current.planned + applied,
    };
    write(db, ingredient_id, &snap, balance)?;

    Ok(ActualAdjustment {
        balance,
        applied,
        shortfall,
    })
}

/// Direct pantry correction that bypasses reservations.
///
/// `Set` moves `planned` by the same difference it moves `actual`; `Subtract`
/// never takes `actual` below zero.
pub(crate) fn correct<E: Executor + ?Sized>(
    db: &E,
    ingredient_id: &str,
    operation: StockOperation,
    quantity: f64,
) -> Result<StockBalance, ServiceError> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(ServiceError::InvalidAmount(format!(
            "stock quantity must be a non-negative number, got {quantity}"
        )));
    }

    let delta = match operation {
        StockOperation::Set => quantity - balance(db, ingredient_id)?.actual,
        StockOperation::Add => quantity,
        StockOperation::Subtract => -quantity,
    };

    Ok(adjust_actual(db, ingredient_id, delta, Underflow::Reject)?.balance)
}
