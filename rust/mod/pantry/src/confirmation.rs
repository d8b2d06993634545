//! Turning a planned meal into a cooked one and back.
//!
//! Confirming converts the slot's reservations into physical debits. What was
//! actually debited is recorded per ingredient in `slot_consumption`, so
//! unconfirm restores the ledger exactly, even after a clamped debit.

use std::collections::BTreeMap;

use larder_core::{ServiceError, now_rfc3339};
use larder_sql::{Executor, Value};
use tracing::{debug, warn};

use crate::ledger::{self, Underflow};
use crate::model::{Confirmation, MealSlot, ReservationMode};
use crate::{db, reservation};

/// What a slot's reservations claim of one ingredient.
#[derive(Debug, Default, Clone, Copy)]
struct Demand {
    /// Everything eaten, portion and batch alike.
    consumed: f64,
    /// The portion-reserved part, which `planned` already accounts for.
    reserved: f64,
}

fn demand<E: Executor + ?Sized>(
    db: &E,
    slot_id: &str,
) -> Result<BTreeMap<String, Demand>, ServiceError> {
    let mut totals: BTreeMap<String, Demand> = BTreeMap::new();
    for r in reservation::reservations(db, slot_id)? {
        let portion = matches!(r.mode, ReservationMode::Portion { .. });
        for (ingredient_id, quantity) in reservation::claims(db, &r.id)? {
            let entry = totals.entry(ingredient_id).or_default();
            entry.consumed += quantity;
            if portion {
                entry.reserved += quantity;
            }
        }
    }
    Ok(totals)
}

fn write_state<E: Executor + ?Sized>(
    db: &E,
    slot_id: &str,
    state: &Confirmation,
) -> Result<(), ServiceError> {
    db::exec(
        db,
        "UPDATE meal_slots SET confirmed = ?1, confirmed_at = ?2 WHERE id = ?3",
        &[
            Value::Integer(i64::from(state.is_confirmed())),
            Value::from(state.confirmed_at()),
            Value::from(slot_id),
        ],
    )?;
    Ok(())
}

pub(crate) fn confirm<E: Executor + ?Sized>(
    db: &E,
    slot_id: &str,
) -> Result<MealSlot, ServiceError> {
    let slot = reservation::slot(db, slot_id)?;
    let next = slot.confirmation.confirm(&slot.id, now_rfc3339())?;

    if !slot.is_special() {
        for (ingredient_id, d) in demand(db, &slot.id)? {
            let adj = ledger::adjust_actual(db, &ingredient_id, -d.consumed, Underflow::Clamp)?;
            if adj.shortfall > 0.0 {
                warn!(
                    slot = %slot.id,
                    ingredient = %ingredient_id,
                    requested = d.consumed,
                    debited = -adj.applied,
                    "pantry ran short while confirming; stock clamped to zero"
                );
            }
            if d.reserved > 0.0 {
                ledger::adjust_planned(db, &ingredient_id, d.reserved)?;
            }
            db::exec(
                db,
                "INSERT INTO slot_consumption (slot_id, ingredient_id, consumed, debited, released) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &[
                    Value::from(slot.id.as_str()),
                    Value::from(ingredient_id.as_str()),
                    Value::Real(d.consumed),
                    Value::Real(-adj.applied),
                    Value::Real(d.reserved),
                ],
            )?;
        }
    }

    write_state(db, &slot.id, &next)?;
    Ok(MealSlot {
        confirmation: next,
        ..slot
    })
}

pub(crate) fn unconfirm<E: Executor + ?Sized>(
    db: &E,
    slot_id: &str,
) -> Result<MealSlot, ServiceError> {
    let slot = reservation::slot(db, slot_id)?;
    let next = slot.confirmation.unconfirm(&slot.id)?;

    let rows = db::query(
        db,
        "SELECT ingredient_id, debited, released FROM slot_consumption WHERE slot_id = ?1",
        &[Value::from(slot.id.as_str())],
    )?;
    for row in &rows {
        let ingredient_id = db::text(row, "ingredient_id")?;
        let debited = db::real(row, "debited")?;
        let released = db::real(row, "released")?;

        ledger::adjust_actual(db, &ingredient_id, debited, Underflow::Reject)?;
        if released > 0.0 {
            ledger::adjust_planned(db, &ingredient_id, -released)?;
        }
    }
    db::exec(
        db,
        "DELETE FROM slot_consumption WHERE slot_id = ?1",
        &[Value::from(slot.id.as_str())],
    )?;
    debug!(slot = %slot.id, ingredients = rows.len(), "consumption reversed");

    write_state(db, &slot.id, &next)?;
    Ok(MealSlot {
        confirmation: next,
        ..slot
    })
}
