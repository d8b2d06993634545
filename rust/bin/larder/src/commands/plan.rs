use anyhow::Result;
use chrono::NaiveDate;
use larder_pantry::{
    MealSlot, PantryEngine, Reservation, ReservationMode, ReserveRequest, SlotKey, Special,
};
use serde::Serialize;

use super::{emit, service_error};

fn describe(engine: &PantryEngine, r: &Reservation) -> String {
    let dish = engine
        .dish(&r.dish_id)
        .map(|d| d.name)
        .unwrap_or_else(|_| r.dish_id.clone());
    match &r.mode {
        ReservationMode::Portion { portions } => format!("{dish} x{portions}"),
        ReservationMode::Batch {
            batch_id,
            percentage,
        } => format!("{dish} {}% of batch {batch_id}", percentage.get()),
    }
}

fn print_reservation(engine: &PantryEngine, r: &Reservation) {
    println!("{}  {}", r.id, describe(engine, r));
}

fn print_slot(slot: &MealSlot) {
    let state = match slot.confirmation.confirmed_at() {
        Some(at) => format!("confirmed {at}"),
        None => "planned".to_string(),
    };
    match slot.special {
        Some(special) => println!("{} {}  [{special}] {state}", slot.id, slot.key()),
        None => println!("{} {}  {state}", slot.id, slot.key()),
    }
}

pub fn reserve(
    engine: &PantryEngine,
    key: SlotKey,
    dish_id: &str,
    request: ReserveRequest,
    json: bool,
) -> Result<()> {
    let r = engine
        .reserve(key, dish_id, request)
        .map_err(service_error)?;
    emit(json, &r, |r| print_reservation(engine, r))
}

pub fn release(engine: &PantryEngine, reservation_id: &str) -> Result<()> {
    engine.release(reservation_id).map_err(service_error)?;
    println!("Reservation {reservation_id} released.");
    Ok(())
}

pub fn edit(
    engine: &PantryEngine,
    reservation_id: &str,
    dish_id: &str,
    portions: u32,
    json: bool,
) -> Result<()> {
    let r = engine
        .edit_dish(reservation_id, dish_id, portions)
        .map_err(service_error)?;
    emit(json, &r, |r| print_reservation(engine, r))
}

pub fn special(engine: &PantryEngine, key: SlotKey, special: Special, json: bool) -> Result<()> {
    let slot = engine
        .assign_special(key, special)
        .map_err(service_error)?;
    emit(json, &slot, print_slot)
}

pub fn clear(engine: &PantryEngine, key: SlotKey) -> Result<()> {
    engine.remove_slot(key).map_err(service_error)?;
    println!("Slot {key} cleared.");
    Ok(())
}

pub fn copy(engine: &PantryEngine, source_slot_id: &str, target: SlotKey, json: bool) -> Result<()> {
    let copied = engine
        .replicate_slot(source_slot_id, target)
        .map_err(service_error)?;
    emit(json, copied.as_slice(), |list| {
        println!("Copied {} reservations to {target}.", list.len());
        for r in list {
            print_reservation(engine, r);
        }
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotView {
    #[serde(flatten)]
    slot: MealSlot,
    reservations: Vec<Reservation>,
}

pub fn show(engine: &PantryEngine, from: NaiveDate, to: NaiveDate, json: bool) -> Result<()> {
    let views = engine
        .slots(from, to)
        .map_err(service_error)?
        .into_iter()
        .map(|slot| {
            let reservations = engine.reservations(&slot.id).map_err(service_error)?;
            Ok(SlotView { slot, reservations })
        })
        .collect::<Result<Vec<_>>>()?;

    emit(json, views.as_slice(), |views| {
        if views.is_empty() {
            println!("Nothing planned between {from} and {to}.");
        }
        for v in views {
            print_slot(&v.slot);
            for r in &v.reservations {
                println!("    {}", describe(engine, r));
            }
        }
    })
}

pub fn confirm(engine: &PantryEngine, slot_id: &str, json: bool) -> Result<()> {
    let slot = engine.confirm(slot_id).map_err(service_error)?;
    emit(json, &slot, print_slot)
}

pub fn unconfirm(engine: &PantryEngine, slot_id: &str, json: bool) -> Result<()> {
    let slot = engine.unconfirm(slot_id).map_err(service_error)?;
    emit(json, &slot, print_slot)
}
