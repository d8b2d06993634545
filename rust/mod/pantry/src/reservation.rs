//! Meal slots and the reservations planned on them.
//!
//! Reserving is where the plan meets the ledger: a portion reservation lowers
//! `planned` for every recipe line, a batch reservation takes a share of a
//! batch instead. Each reservation keeps a snapshot of the quantities it
//! claimed, and releasing hands back exactly that snapshot.

use chrono::NaiveDate;
use larder_core::{ServiceError, new_id, now_rfc3339};
use larder_sql::{Executor, Row, Value};
use tracing::debug;

use crate::model::{
    Confirmation, MealSlot, MealType, Percentage, Reservation, ReservationMode, ReserveRequest,
    SlotKey, Special,
};
use crate::{batch, catalog, db, ledger};

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

const SLOT_COLUMNS: &str = "id, day, meal_type, special, confirmed, confirmed_at, created_at";

fn row_to_slot(row: &Row) -> Result<MealSlot, ServiceError> {
    let day = db::text(row, "day")?;
    let meal_type = db::text(row, "meal_type")?;
    let special = match db::opt_text(row, "special") {
        Some(s) => Some(
            Special::from_str(&s)
                .ok_or_else(|| ServiceError::Internal(format!("unknown special tag {s}")))?,
        ),
        None => None,
    };
    let confirmation = if db::int(row, "confirmed")? != 0 {
        Confirmation::Confirmed {
            at: db::opt_text(row, "confirmed_at").unwrap_or_default(),
        }
    } else {
        Confirmation::Unconfirmed
    };

    Ok(MealSlot {
        id: db::text(row, "id")?,
        day: NaiveDate::parse_from_str(&day, "%Y-%m-%d")
            .map_err(|e| ServiceError::Internal(format!("bad slot day {day}: {e}")))?,
        meal_type: MealType::from_str(&meal_type)
            .ok_or_else(|| ServiceError::Internal(format!("unknown meal type {meal_type}")))?,
        special,
        confirmation,
        created_at: db::text(row, "created_at")?,
    })
}

pub(crate) fn slot<E: Executor + ?Sized>(db: &E, id: &str) -> Result<MealSlot, ServiceError> {
    let rows = db::query(
        db,
        &format!("SELECT {SLOT_COLUMNS} FROM meal_slots WHERE id = ?1"),
        &[Value::from(id)],
    )?;
    let row = rows
        .first()
        .ok_or_else(|| ServiceError::NotFound(format!("meal slot {id}")))?;
    row_to_slot(row)
}

pub(crate) fn slot_by_key<E: Executor + ?Sized>(
    db: &E,
    key: SlotKey,
) -> Result<Option<MealSlot>, ServiceError> {
    let rows = db::query(
        db,
        &format!("SELECT {SLOT_COLUMNS} FROM meal_slots WHERE day = ?1 AND meal_type = ?2"),
        &[
            Value::Text(key.day.to_string()),
            Value::from(key.meal_type.as_str()),
        ],
    )?;
    rows.first().map(row_to_slot).transpose()
}

/// Slots whose day falls in `[from, to]`, in calendar order.
pub(crate) fn slots_between<E: Executor + ?Sized>(
    db: &E,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<MealSlot>, ServiceError> {
    db::query(
        db,
        &format!(
            "SELECT {SLOT_COLUMNS} FROM meal_slots WHERE day >= ?1 AND day <= ?2 \
             ORDER BY day, CASE meal_type \
                 WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 ELSE 2 END"
        ),
        &[Value::Text(from.to_string()), Value::Text(to.to_string())],
    )?
    .iter()
    .map(row_to_slot)
    .collect()
}

/// Fetch the slot for `key`, creating an empty one when it does not exist.
fn resolve_slot<E: Executor + ?Sized>(db: &E, key: SlotKey) -> Result<MealSlot, ServiceError> {
    if let Some(existing) = slot_by_key(db, key)? {
        return Ok(existing);
    }
    let slot = MealSlot {
        id: new_id(),
        day: key.day,
        meal_type: key.meal_type,
        special: None,
        confirmation: Confirmation::Unconfirmed,
        created_at: now_rfc3339(),
    };
    db::exec(
        db,
        "INSERT INTO meal_slots (id, day, meal_type, confirmed, created_at) \
         VALUES (?1, ?2, ?3, 0, ?4)",
        &[
            Value::from(slot.id.as_str()),
            Value::Text(key.day.to_string()),
            Value::from(key.meal_type.as_str()),
            Value::from(slot.created_at.as_str()),
        ],
    )?;
    debug!(slot = %slot.id, key = %key, "created meal slot");
    Ok(slot)
}

fn set_special<E: Executor + ?Sized>(
    db: &E,
    slot_id: &str,
    special: Option<Special>,
) -> Result<(), ServiceError> {
    db::exec(
        db,
        "UPDATE meal_slots SET special = ?1 WHERE id = ?2",
        &[Value::from(special.map(|s| s.as_str())), Value::from(slot_id)],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

const RESERVATION_COLUMNS: &str =
    "id, slot_id, dish_id, portions, batch_id, percentage, position, created_at";

fn row_to_reservation(row: &Row) -> Result<Reservation, ServiceError> {
    let mode = match row.get_i64("portions") {
        Some(portions) => ReservationMode::Portion {
            portions: u32::try_from(portions).map_err(|_| {
                ServiceError::Internal(format!("portion count out of range: {portions}"))
            })?,
        },
        None => {
            let percentage = db::int(row, "percentage")?;
            ReservationMode::Batch {
                batch_id: db::text(row, "batch_id")?,
                percentage: u32::try_from(percentage)
                    .map_err(|_| ServiceError::Internal(format!("bad percentage {percentage}")))
                    .and_then(Percentage::new)?,
            }
        }
    };

    Ok(Reservation {
        id: db::text(row, "id")?,
        slot_id: db::text(row, "slot_id")?,
        dish_id: db::text(row, "dish_id")?,
        mode,
        position: db::int(row, "position")?,
        created_at: db::text(row, "created_at")?,
    })
}

pub(crate) fn reservation<E: Executor + ?Sized>(
    db: &E,
    id: &str,
) -> Result<Reservation, ServiceError> {
    let rows = db::query(
        db,
        &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1"),
        &[Value::from(id)],
    )?;
    let row = rows
        .first()
        .ok_or_else(|| ServiceError::NotFound(format!("reservation {id}")))?;
    row_to_reservation(row)
}

/// Reservations of a slot in display order.
pub(crate) fn reservations<E: Executor + ?Sized>(
    db: &E,
    slot_id: &str,
) -> Result<Vec<Reservation>, ServiceError> {
    db::query(
        db,
        &format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE slot_id = ?1 \
             ORDER BY position"
        ),
        &[Value::from(slot_id)],
    )?
    .iter()
    .map(row_to_reservation)
    .collect()
}

/// Per-ingredient quantities a reservation claimed when it was made.
pub(crate) fn claims<E: Executor + ?Sized>(
    db: &E,
    reservation_id: &str,
) -> Result<Vec<(String, f64)>, ServiceError> {
    db::query(
        db,
        "SELECT ingredient_id, quantity FROM reservation_claims \
         WHERE reservation_id = ?1 ORDER BY ingredient_id",
        &[Value::from(reservation_id)],
    )?
    .iter()
    .map(|row| Ok((db::text(row, "ingredient_id")?, db::real(row, "quantity")?)))
    .collect()
}

fn validate_portions(portions: u32) -> Result<(), ServiceError> {
    if portions == 0 {
        return Err(ServiceError::InvalidAmount(
            "a reservation needs at least one portion".into(),
        ));
    }
    Ok(())
}

/// Turn a request into a mode, applying its effect on the ledger or batches.
fn apply<E: Executor + ?Sized>(
    db: &E,
    dish_id: &str,
    request: &ReserveRequest,
) -> Result<ReservationMode, ServiceError> {
    match request {
        ReserveRequest::Portions(portions) => Ok(ReservationMode::Portion {
            portions: *portions,
        }),
        ReserveRequest::Batch {
            percentage,
            batch_id,
        } => {
            let percentage = Percentage::new(*percentage)?;
            let batch = batch::take(db, dish_id, percentage, batch_id.as_deref())?;
            Ok(ReservationMode::Batch {
                batch_id: batch.id,
                percentage,
            })
        }
    }
}

/// Snapshot the claim of `mode` against the current recipe and, for portion
/// reservations, take it out of `planned`.
fn claim<E: Executor + ?Sized>(
    db: &E,
    reservation_id: &str,
    dish_id: &str,
    mode: &ReservationMode,
) -> Result<(), ServiceError> {
    for line in catalog::recipe(db, dish_id)? {
        let quantity = mode.claim(line.quantity);
        if !mode.is_batch() {
            ledger::adjust_planned(db, &line.ingredient_id, -quantity)?;
        }
        db::exec(
            db,
            "INSERT INTO reservation_claims (reservation_id, ingredient_id, quantity) \
             VALUES (?1, ?2, ?3)",
            &[
                Value::from(reservation_id),
                Value::from(line.ingredient_id.as_str()),
                Value::Real(quantity),
            ],
        )?;
    }
    Ok(())
}

/// Hand back everything `reservation` holds and forget its claim snapshot.
fn unclaim<E: Executor + ?Sized>(db: &E, reservation: &Reservation) -> Result<(), ServiceError> {
    match &reservation.mode {
        ReservationMode::Portion { .. } => {
            for (ingredient_id, quantity) in claims(db, &reservation.id)? {
                ledger::adjust_planned(db, &ingredient_id, quantity)?;
            }
        }
        ReservationMode::Batch {
            batch_id,
            percentage,
        } => batch::restore(db, batch_id, *percentage)?,
    }
    db::exec(
        db,
        "DELETE FROM reservation_claims WHERE reservation_id = ?1",
        &[Value::from(reservation.id.as_str())],
    )?;
    Ok(())
}

fn editable_slot<E: Executor + ?Sized>(db: &E, slot_id: &str) -> Result<MealSlot, ServiceError> {
    let slot = slot(db, slot_id)?;
    slot.confirmation.ensure_editable(&slot.id)?;
    Ok(slot)
}

pub(crate) fn reserve<E: Executor + ?Sized>(
    db: &E,
    key: SlotKey,
    dish_id: &str,
    request: &ReserveRequest,
) -> Result<Reservation, ServiceError> {
    match request {
        ReserveRequest::Portions(portions) => validate_portions(*portions)?,
        ReserveRequest::Batch { percentage, .. } => {
            Percentage::new(*percentage)?;
        }
    }

    let slot = resolve_slot(db, key)?;
    slot.confirmation.ensure_editable(&slot.id)?;
    if slot.is_special() {
        set_special(db, &slot.id, None)?;
    }
    catalog::ensure_dish(db, dish_id)?;

    let mode = apply(db, dish_id, request)?;
    let position = db::query(
        db,
        "SELECT COALESCE(MAX(position) + 1, 0) AS next FROM reservations WHERE slot_id = ?1",
        &[Value::from(slot.id.as_str())],
    )?
    .first()
    .map(|row| db::int(row, "next"))
    .transpose()?
    .unwrap_or(0);

    let (portions, batch_id, percentage) = match &mode {
        ReservationMode::Portion { portions } => (Some(i64::from(*portions)), None, None),
        ReservationMode::Batch {
            batch_id,
            percentage,
        } => (None, Some(batch_id.clone()), Some(i64::from(percentage.get()))),
    };
    let reservation = Reservation {
        id: new_id(),
        slot_id: slot.id.clone(),
        dish_id: dish_id.to_string(),
        mode,
        position,
        created_at: now_rfc3339(),
    };
    db::exec(
        db,
        "INSERT INTO reservations \
         (id, slot_id, dish_id, portions, batch_id, percentage, position, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        &[
            Value::from(reservation.id.as_str()),
            Value::from(reservation.slot_id.as_str()),
            Value::from(dish_id),
            Value::from(portions),
            Value::from(batch_id),
            Value::from(percentage),
            Value::Integer(position),
            Value::from(reservation.created_at.as_str()),
        ],
    )?;
    claim(db, &reservation.id, dish_id, &reservation.mode)?;

    Ok(reservation)
}

pub(crate) fn release<E: Executor + ?Sized>(
    db: &E,
    reservation_id: &str,
) -> Result<Reservation, ServiceError> {
    let reservation = reservation(db, reservation_id)?;
    editable_slot(db, &reservation.slot_id)?;
    unclaim(db, &reservation)?;
    db::exec(
        db,
        "DELETE FROM reservations WHERE id = ?1",
        &[Value::from(reservation_id)],
    )?;
    Ok(reservation)
}

/// Swap the dish of a reservation, keeping its id and place in the slot.
///
/// The new reservation is always portion based.
pub(crate) fn edit_dish<E: Executor + ?Sized>(
    db: &E,
    reservation_id: &str,
    dish_id: &str,
    portions: u32,
) -> Result<Reservation, ServiceError> {
    validate_portions(portions)?;
    let old = reservation(db, reservation_id)?;
    editable_slot(db, &old.slot_id)?;
    catalog::ensure_dish(db, dish_id)?;

    unclaim(db, &old)?;
    let mode = ReservationMode::Portion { portions };
    db::exec(
        db,
        "UPDATE reservations SET dish_id = ?1, portions = ?2, batch_id = NULL, \
         percentage = NULL WHERE id = ?3",
        &[
            Value::from(dish_id),
            Value::Integer(i64::from(portions)),
            Value::from(reservation_id),
        ],
    )?;
    claim(db, reservation_id, dish_id, &mode)?;

    Ok(Reservation {
        dish_id: dish_id.to_string(),
        mode,
        ..old
    })
}

fn release_all<E: Executor + ?Sized>(db: &E, slot_id: &str) -> Result<usize, ServiceError> {
    let all = reservations(db, slot_id)?;
    for r in &all {
        unclaim(db, r)?;
    }
    db::exec(
        db,
        "DELETE FROM reservations WHERE slot_id = ?1",
        &[Value::from(slot_id)],
    )?;
    Ok(all.len())
}

/// Mark a slot as eaten out or ordered in, dropping whatever was planned.
pub(crate) fn assign_special<E: Executor + ?Sized>(
    db: &E,
    key: SlotKey,
    special: Special,
) -> Result<MealSlot, ServiceError> {
    let slot = resolve_slot(db, key)?;
    slot.confirmation.ensure_editable(&slot.id)?;
    let released = release_all(db, &slot.id)?;
    set_special(db, &slot.id, Some(special))?;
    debug!(slot = %slot.id, %special, released, "slot marked special");
    Ok(MealSlot {
        special: Some(special),
        ..slot
    })
}

/// Release every reservation of the slot at `key` and delete the slot.
pub(crate) fn remove_slot<E: Executor + ?Sized>(
    db: &E,
    key: SlotKey,
) -> Result<MealSlot, ServiceError> {
    let slot = slot_by_key(db, key)?
        .ok_or_else(|| ServiceError::NotFound(format!("meal slot {key}")))?;
    slot.confirmation.ensure_editable(&slot.id)?;
    release_all(db, &slot.id)?;
    db::exec(
        db,
        "DELETE FROM meal_slots WHERE id = ?1",
        &[Value::from(slot.id.as_str())],
    )?;
    Ok(slot)
}

/// Plan the contents of one slot again on another.
///
/// Portion counts carry over unchanged; batch shares are taken afresh from
/// whichever batch has room, never from the source's batch specifically.
pub(crate) fn replicate_slot<E: Executor + ?Sized>(
    db: &E,
    source_slot_id: &str,
    target: SlotKey,
) -> Result<Vec<Reservation>, ServiceError> {
    let source = slot(db, source_slot_id)?;
    if source.key() == target {
        return Err(ServiceError::Validation(format!(
            "cannot copy slot {target} onto itself"
        )));
    }

    if let Some(special) = source.special {
        assign_special(db, target, special)?;
        return Ok(Vec::new());
    }

    reservations(db, &source.id)?
        .into_iter()
        .map(|r| {
            let request = match r.mode {
                ReservationMode::Portion { portions } => ReserveRequest::Portions(portions),
                ReservationMode::Batch { percentage, .. } => ReserveRequest::Batch {
                    percentage: percentage.get(),
                    batch_id: None,
                },
            };
            reserve(db, target, &r.dish_id, &request)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecipeLine, StockBalance, StockOperation};
    use crate::schema::init_schema;
    use larder_sql::SqliteStore;

    struct Fixture {
        db: SqliteStore,
        rice: String,
        chicken_rice: String,
        paella: String,
    }

    fn fixture() -> Fixture {
        let db = SqliteStore::open_in_memory().unwrap();
        init_schema(&db).unwrap();
        let rice = catalog::create_ingredient(&db, "Rice", "g").unwrap();
        let chicken_rice =
            catalog::create_dish(&db, "Chicken Rice", "", &[RecipeLine::new(&rice.id, 200.0)])
                .unwrap();
        let paella =
            catalog::create_dish(&db, "Paella", "", &[RecipeLine::new(&rice.id, 400.0)]).unwrap();
        ledger::correct(&db, &rice.id, StockOperation::Set, 1000.0).unwrap();
        Fixture {
            db,
            rice: rice.id,
            chicken_rice: chicken_rice.id,
            paella: paella.id,
        }
    }

    fn lunch() -> SlotKey {
        SlotKey::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), MealType::Lunch)
    }

    fn dinner() -> SlotKey {
        SlotKey::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), MealType::Dinner)
    }

    #[test]
    fn portion_reservation_lowers_planned() {
        let f = fixture();
        let r = reserve(&f.db, lunch(), &f.chicken_rice, &ReserveRequest::Portions(3)).unwrap();
        assert_eq!(r.position, 0);
        assert_eq!(
            ledger::balance(&f.db, &f.rice).unwrap(),
            StockBalance { actual: 1000.0, planned: 400.0 }
        );
        assert_eq!(claims(&f.db, &r.id).unwrap(), vec![(f.rice.clone(), 600.0)]);

        release(&f.db, &r.id).unwrap();
        assert_eq!(ledger::balance(&f.db, &f.rice).unwrap().planned, 1000.0);
        assert!(reservations(&f.db, &r.slot_id).unwrap().is_empty());
    }

    #[test]
    fn batch_reservation_leaves_planned_alone() {
        let f = fixture();
        let r = reserve(
            &f.db,
            lunch(),
            &f.paella,
            &ReserveRequest::Batch { percentage: 50, batch_id: None },
        )
        .unwrap();
        assert_eq!(ledger::balance(&f.db, &f.rice).unwrap().planned, 1000.0);
        assert_eq!(claims(&f.db, &r.id).unwrap(), vec![(f.rice.clone(), 200.0)]);

        let ReservationMode::Batch { batch_id, .. } = &r.mode else {
            panic!("expected a batch reservation");
        };
        assert_eq!(batch::get(&f.db, batch_id).unwrap().percentage_remaining, 50);
    }

    #[test]
    fn invalid_amounts_write_nothing() {
        let f = fixture();
        assert!(matches!(
            reserve(&f.db, lunch(), &f.paella, &ReserveRequest::Portions(0)),
            Err(ServiceError::InvalidAmount(_))
        ));
        assert!(matches!(
            reserve(
                &f.db,
                lunch(),
                &f.paella,
                &ReserveRequest::Batch { percentage: 33, batch_id: None }
            ),
            Err(ServiceError::InvalidAmount(_))
        ));
        assert!(slot_by_key(&f.db, lunch()).unwrap().is_none());
    }

    #[test]
    fn positions_follow_insertion_order() {
        let f = fixture();
        let a = reserve(&f.db, lunch(), &f.paella, &ReserveRequest::Portions(1)).unwrap();
        let b = reserve(&f.db, lunch(), &f.chicken_rice, &ReserveRequest::Portions(1)).unwrap();
        let listed = reservations(&f.db, &a.slot_id).unwrap();
        assert_eq!(
            listed.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec![a.id.as_str(), b.id.as_str()]
        );
        assert_eq!(b.position, 1);
    }

    #[test]
    fn edit_dish_swaps_claim_in_place() {
        let f = fixture();
        let r = reserve(
            &f.db,
            lunch(),
            &f.paella,
            &ReserveRequest::Batch { percentage: 25, batch_id: None },
        )
        .unwrap();
        let ReservationMode::Batch { batch_id, .. } = r.mode.clone() else {
            panic!("expected a batch reservation");
        };

        let edited = edit_dish(&f.db, &r.id, &f.chicken_rice, 2).unwrap();
        assert_eq!(edited.id, r.id);
        assert_eq!(edited.position, r.position);
        assert_eq!(edited.mode, ReservationMode::Portion { portions: 2 });
        assert_eq!(reservation(&f.db, &r.id).unwrap(), edited);

        assert_eq!(batch::get(&f.db, &batch_id).unwrap().percentage_remaining, 100);
        assert_eq!(ledger::balance(&f.db, &f.rice).unwrap().planned, 600.0);
    }

    #[test]
    fn special_replaces_the_plan_and_reserving_clears_it() {
        let f = fixture();
        reserve(&f.db, lunch(), &f.chicken_rice, &ReserveRequest::Portions(2)).unwrap();

        let slot = assign_special(&f.db, lunch(), Special::EatOut).unwrap();
        assert_eq!(slot.special, Some(Special::EatOut));
        assert!(reservations(&f.db, &slot.id).unwrap().is_empty());
        assert_eq!(ledger::balance(&f.db, &f.rice).unwrap().planned, 1000.0);

        reserve(&f.db, lunch(), &f.chicken_rice, &ReserveRequest::Portions(1)).unwrap();
        assert_eq!(slot_by_key(&f.db, lunch()).unwrap().unwrap().special, None);
    }

    #[test]
    fn remove_slot_releases_everything() {
        let f = fixture();
        reserve(&f.db, lunch(), &f.chicken_rice, &ReserveRequest::Portions(2)).unwrap();
        remove_slot(&f.db, lunch()).unwrap();
        assert!(slot_by_key(&f.db, lunch()).unwrap().is_none());
        assert_eq!(ledger::balance(&f.db, &f.rice).unwrap().planned, 1000.0);
        assert!(matches!(
            remove_slot(&f.db, lunch()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn replicate_copies_portions_and_shares() {
        let f = fixture();
        let a = reserve(&f.db, lunch(), &f.chicken_rice, &ReserveRequest::Portions(1)).unwrap();
        reserve(
            &f.db,
            lunch(),
            &f.paella,
            &ReserveRequest::Batch { percentage: 25, batch_id: None },
        )
        .unwrap();

        let copied = replicate_slot(&f.db, &a.slot_id, dinner()).unwrap();
        assert_eq!(copied.len(), 2);
        assert_eq!(copied[0].mode, ReservationMode::Portion { portions: 1 });
        assert!(copied[1].mode.is_batch());
        assert_eq!(ledger::balance(&f.db, &f.rice).unwrap().planned, 600.0);

        assert!(matches!(
            replicate_slot(&f.db, &a.slot_id, lunch()),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn slots_are_listed_in_meal_order() {
        let f = fixture();
        reserve(&f.db, dinner(), &f.paella, &ReserveRequest::Portions(1)).unwrap();
        reserve(&f.db, lunch(), &f.paella, &ReserveRequest::Portions(1)).unwrap();
        let day = lunch().day;
        let slots = slots_between(&f.db, day, day).unwrap();
        assert_eq!(
            slots.iter().map(|s| s.meal_type).collect::<Vec<_>>(),
            vec![MealType::Lunch, MealType::Dinner]
        );
    }
}
