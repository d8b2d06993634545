//! Batch bookkeeping: selection, share accounting and the purge sweep.

use larder_core::{ServiceError, new_id, now_rfc3339};
use larder_sql::{Executor, Row, Value};
use tracing::{debug, warn};

use crate::db;
use crate::model::{Batch, Percentage};

const COLUMNS: &str = "id, dish_id, percentage_remaining, prepared_at";

fn row_to_batch(row: &Row) -> Result<Batch, ServiceError> {
    let remaining = db::int(row, "percentage_remaining")?;
    Ok(Batch {
        id: db::text(row, "id")?,
        dish_id: db::text(row, "dish_id")?,
        percentage_remaining: u32::try_from(remaining).map_err(|_| {
            ServiceError::Internal(format!("batch share out of range: {remaining}"))
        })?,
        prepared_at: db::text(row, "prepared_at")?,
    })
}

pub(crate) fn get<E: Executor + ?Sized>(db: &E, id: &str) -> Result<Batch, ServiceError> {
    let rows = db::query(
        db,
        &format!("SELECT {COLUMNS} FROM batches WHERE id = ?1"),
        &[Value::from(id)],
    )?;
    let row = rows
        .first()
        .ok_or_else(|| ServiceError::NotFound(format!("batch {id}")))?;
    row_to_batch(row)
}

/// Batches of a dish that still have something left, oldest first.
pub(crate) fn available<E: Executor + ?Sized>(
    db: &E,
    dish_id: &str,
) -> Result<Vec<Batch>, ServiceError> {
    db::query(
        db,
        &format!(
            "SELECT {COLUMNS} FROM batches \
             WHERE dish_id = ?1 AND percentage_remaining > 0 \
             ORDER BY prepared_at ASC, rowid ASC"
        ),
        &[Value::from(dish_id)],
    )?
    .iter()
    .map(row_to_batch)
    .collect()
}

fn create<E: Executor + ?Sized>(db: &E, dish_id: &str) -> Result<Batch, ServiceError> {
    let batch = Batch {
        id: new_id(),
        dish_id: dish_id.to_string(),
        percentage_remaining: 100,
        prepared_at: now_rfc3339(),
    };
    db::exec(
        db,
        "INSERT INTO batches (id, dish_id, percentage_remaining, prepared_at) \
         VALUES (?1, ?2, 100, ?3)",
        &[
            Value::from(batch.id.as_str()),
            Value::from(dish_id),
            Value::from(batch.prepared_at.as_str()),
        ],
    )?;
    debug!(batch = %batch.id, dish = dish_id, "started a new batch");
    Ok(batch)
}

/// Pick the batch a share is taken from.
///
/// A named batch must belong to `dish_id`. Otherwise the oldest batch with
/// enough left is reused, and a fresh one is started when none has.
fn select<E: Executor + ?Sized>(
    db: &E,
    dish_id: &str,
    percentage: Percentage,
    batch_id: Option<&str>,
) -> Result<Batch, ServiceError> {
    if let Some(id) = batch_id {
        let batch = get(db, id)?;
        if batch.dish_id != dish_id {
            return Err(ServiceError::Validation(format!(
                "batch {id} was not prepared from dish {dish_id}"
            )));
        }
        return Ok(batch);
    }

    let rows = db::query(
        db,
        &format!(
            "SELECT {COLUMNS} FROM batches \
             WHERE dish_id = ?1 AND percentage_remaining > 0 AND percentage_remaining >= ?2 \
             ORDER BY prepared_at ASC, rowid ASC LIMIT 1"
        ),
        &[Value::from(dish_id), Value::Integer(i64::from(percentage.get()))],
    )?;
    match rows.first() {
        Some(row) => row_to_batch(row),
        None => create(db, dish_id),
    }
}

/// Take `percentage` from a batch of `dish_id` and return the batch as it
/// stands afterwards.
pub(crate) fn take<E: Executor + ?Sized>(
    db: &E,
    dish_id: &str,
    percentage: Percentage,
    batch_id: Option<&str>,
) -> Result<Batch, ServiceError> {
    let batch = select(db, dish_id, percentage, batch_id)?;
    let share = i64::from(percentage.get());

    let affected = db::exec(
        db,
        "UPDATE batches SET percentage_remaining = percentage_remaining - ?1 \
         WHERE id = ?2 AND percentage_remaining >= ?1",
        &[Value::Integer(share), Value::from(batch.id.as_str())],
    )?;
    if affected == 0 {
        return Err(ServiceError::BatchExhausted(format!(
            "batch {} has {}% left, {}% requested",
            batch.id,
            batch.percentage_remaining,
            percentage.get()
        )));
    }
    get(db, &batch.id)
}

/// Give a share back to a batch, never beyond 100%.
///
/// A batch the purge sweep already removed is left alone.
pub(crate) fn restore<E: Executor + ?Sized>(
    db: &E,
    batch_id: &str,
    percentage: Percentage,
) -> Result<(), ServiceError> {
    let affected = db::exec(
        db,
        "UPDATE batches SET percentage_remaining = MIN(100, percentage_remaining + ?1) \
         WHERE id = ?2",
        &[Value::Integer(i64::from(percentage.get())), Value::from(batch_id)],
    )?;
    if affected == 0 {
        warn!(batch = batch_id, "batch no longer exists; share not returned");
    }
    Ok(())
}

/// Delete fully eaten batches prepared before `cutoff` (RFC 3339).
///
/// A batch still named by a reservation on an unconfirmed slot is kept: a
/// release there would need to hand its share back.
pub(crate) fn purge<E: Executor + ?Sized>(db: &E, cutoff: &str) -> Result<u64, ServiceError> {
    db::exec(
        db,
        "DELETE FROM batches \
         WHERE percentage_remaining = 0 AND prepared_at < ?1 \
         AND NOT EXISTS ( \
             SELECT 1 FROM reservations r JOIN meal_slots s ON s.id = r.slot_id \
             WHERE r.batch_id = batches.id AND s.confirmed = 0 \
         )",
        &[Value::from(cutoff)],
    )
}
