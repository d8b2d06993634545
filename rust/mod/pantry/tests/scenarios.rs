//! End-to-end flows through the public engine API.

use std::sync::Arc;
use std::thread;

use chrono::{Days, NaiveDate};
use larder_core::ServiceError;
use larder_pantry::{
    MealType, PantryConfig, PantryEngine, RecipeLine, ReservationMode, ReserveRequest, SlotKey,
    Special, StockBalance, StockOperation,
};
use larder_sql::{SQLStore, SqliteStore};

fn engine() -> PantryEngine {
    let db: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    PantryEngine::new(db, PantryConfig::default()).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + Days::new(offset)
}

fn lunch(offset: u64) -> SlotKey {
    SlotKey::new(day(offset), MealType::Lunch)
}

#[test]
fn scenario_a_portions_then_confirm() {
    let e = engine();
    let rice = e.create_ingredient("Rice", "g").unwrap();
    let dish = e
        .create_dish("Chicken Rice", "", &[RecipeLine::new(&rice.id, 200.0)])
        .unwrap();
    e.adjust_stock(&rice.id, StockOperation::Set, 1000.0).unwrap();
    assert_eq!(
        e.balance(&rice.id).unwrap(),
        StockBalance { actual: 1000.0, planned: 1000.0 }
    );

    let r = e.reserve(lunch(0), &dish.id, ReserveRequest::Portions(3)).unwrap();
    assert_eq!(
        e.balance(&rice.id).unwrap(),
        StockBalance { actual: 1000.0, planned: 400.0 }
    );

    let slot = e.confirm(&r.slot_id).unwrap();
    assert!(slot.confirmation.is_confirmed());
    assert_eq!(
        e.balance(&rice.id).unwrap(),
        StockBalance { actual: 400.0, planned: 400.0 }
    );
}

#[test]
fn scenario_b_batch_shares() {
    let e = engine();
    let rice = e.create_ingredient("Rice", "g").unwrap();
    let paella = e
        .create_dish("Paella", "", &[RecipeLine::new(&rice.id, 500.0)])
        .unwrap();

    let first = e
        .reserve(
            lunch(0),
            &paella.id,
            ReserveRequest::Batch { percentage: 50, batch_id: None },
        )
        .unwrap();
    let ReservationMode::Batch { batch_id, .. } = first.mode.clone() else {
        panic!("expected a batch reservation");
    };
    assert_eq!(e.batch(&batch_id).unwrap().percentage_remaining, 50);

    let second = e
        .reserve(
            lunch(1),
            &paella.id,
            ReserveRequest::Batch { percentage: 30, batch_id: None },
        )
        .unwrap();
    assert_eq!(
        second.mode,
        ReservationMode::Batch {
            batch_id: batch_id.clone(),
            percentage: larder_pantry::Percentage::new(30).unwrap(),
        }
    );
    assert_eq!(e.batch(&batch_id).unwrap().percentage_remaining, 20);

    e.release(&first.id).unwrap();
    assert_eq!(e.batch(&batch_id).unwrap().percentage_remaining, 70);

    // Batch shares never touch the planned counter.
    assert_eq!(e.balance(&rice.id).unwrap(), StockBalance::ZERO);
}

#[test]
fn scenario_c_restock_keeps_deficit() {
    let e = engine();
    let rice = e.create_ingredient("Rice", "g").unwrap();
    let dish = e
        .create_dish("Risotto", "", &[RecipeLine::new(&rice.id, 150.0)])
        .unwrap();
    e.adjust_stock(&rice.id, StockOperation::Set, 100.0).unwrap();
    e.reserve(lunch(0), &dish.id, ReserveRequest::Portions(1)).unwrap();
    assert_eq!(
        e.balance(&rice.id).unwrap(),
        StockBalance { actual: 100.0, planned: -50.0 }
    );

    let shortages = e.shortages().unwrap();
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].to_buy, 50.0);

    let b = e.adjust_stock(&rice.id, StockOperation::Add, 500.0).unwrap();
    assert_eq!(b, StockBalance { actual: 600.0, planned: 450.0 });
    assert!(e.shortages().unwrap().is_empty());
}

#[test]
fn scenario_d_confirm_with_short_pantry() {
    let e = engine();
    let rice = e.create_ingredient("Rice", "g").unwrap();
    let dish = e
        .create_dish("Rice bowl", "", &[RecipeLine::new(&rice.id, 50.0)])
        .unwrap();
    e.adjust_stock(&rice.id, StockOperation::Set, 10.0).unwrap();
    let r = e.reserve(lunch(0), &dish.id, ReserveRequest::Portions(1)).unwrap();

    let slot = e.confirm(&r.slot_id).unwrap();
    assert!(slot.confirmation.is_confirmed());
    assert_eq!(e.balance(&rice.id).unwrap().actual, 0.0);

    let back = e.unconfirm(&r.slot_id).unwrap();
    assert!(!back.confirmation.is_confirmed());
    assert_eq!(
        e.balance(&rice.id).unwrap(),
        StockBalance { actual: 10.0, planned: -40.0 }
    );
}

#[test]
fn confirmed_slot_is_frozen() {
    let e = engine();
    let rice = e.create_ingredient("Rice", "g").unwrap();
    let dish = e
        .create_dish("Rice bowl", "", &[RecipeLine::new(&rice.id, 50.0)])
        .unwrap();
    let r = e.reserve(lunch(0), &dish.id, ReserveRequest::Portions(1)).unwrap();
    e.confirm(&r.slot_id).unwrap();

    let frozen = |res: Result<_, ServiceError>| {
        matches!(res, Err(ServiceError::MealAlreadyConfirmed(_)))
    };
    assert!(frozen(e.release(&r.id).map(|_| ())));
    assert!(frozen(e.edit_dish(&r.id, &dish.id, 2).map(|_| ())));
    assert!(frozen(e.assign_special(lunch(0), Special::Order).map(|_| ())));
    assert!(frozen(e.remove_slot(lunch(0))));
    assert!(frozen(
        e.reserve(lunch(0), &dish.id, ReserveRequest::Portions(1)).map(|_| ())
    ));
}

#[test]
fn subtract_never_leaves_negative_stock() {
    let e = engine();
    let salt = e.create_ingredient("Salt", "g").unwrap();
    e.adjust_stock(&salt.id, StockOperation::Set, 5.0).unwrap();
    let err = e
        .adjust_stock(&salt.id, StockOperation::Subtract, 6.0)
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_STOCK");
    assert_eq!(e.balance(&salt.id).unwrap().actual, 5.0);
}

#[test]
fn concurrent_reservations_do_not_lose_updates() {
    let db: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let e = Arc::new(PantryEngine::new(db, PantryConfig::default()).unwrap());
    let rice = e.create_ingredient("Rice", "g").unwrap();
    let dish = e
        .create_dish("Rice bowl", "", &[RecipeLine::new(&rice.id, 10.0)])
        .unwrap();
    let stew = e.create_dish("Stew", "", &[]).unwrap();
    e.adjust_stock(&rice.id, StockOperation::Set, 1000.0).unwrap();

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let e = Arc::clone(&e);
            let dish = dish.id.clone();
            let stew = stew.id.clone();
            thread::spawn(move || {
                for i in 0..10u64 {
                    e.reserve(lunch(t * 10 + i), &dish, ReserveRequest::Portions(1))
                        .unwrap();
                }
                for _ in 0..2 {
                    e.reserve(
                        SlotKey::new(day(0), MealType::Dinner),
                        &stew,
                        ReserveRequest::Batch { percentage: 5, batch_id: None },
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(
        e.balance(&rice.id).unwrap(),
        StockBalance { actual: 1000.0, planned: 200.0 }
    );
    // Sixteen 5% shares fit in one batch, so no second batch was started.
    let batches = e.available_batches(&stew.id).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].percentage_remaining, 20);
}

#[test]
fn file_store_keeps_the_plan_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("larder.sqlite");

    let (rice_id, slot_id) = {
        let db: Arc<dyn SQLStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let e = PantryEngine::new(db, PantryConfig::default()).unwrap();
        let rice = e.create_ingredient("Rice", "g").unwrap();
        let dish = e
            .create_dish("Rice bowl", "", &[RecipeLine::new(&rice.id, 80.0)])
            .unwrap();
        e.adjust_stock(&rice.id, StockOperation::Set, 300.0).unwrap();
        let r = e.reserve(lunch(0), &dish.id, ReserveRequest::Portions(2)).unwrap();
        (rice.id, r.slot_id)
    };

    let db: Arc<dyn SQLStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let e = PantryEngine::new(db, PantryConfig::default()).unwrap();
    assert_eq!(
        e.balance(&rice_id).unwrap(),
        StockBalance { actual: 300.0, planned: 140.0 }
    );
    assert_eq!(e.reservations(&slot_id).unwrap().len(), 1);
    e.confirm(&slot_id).unwrap();
    assert_eq!(e.balance(&rice_id).unwrap().actual, 140.0);
}

#[test]
fn week_copy_and_listing() {
    let e = engine();
    let eggs = e.create_ingredient("Eggs", "units").unwrap();
    let omelette = e
        .create_dish("Omelette", "", &[RecipeLine::new(&eggs.id, 3.0)])
        .unwrap();
    e.adjust_stock(&eggs.id, StockOperation::Set, 12.0).unwrap();

    let monday = SlotKey::new(day(0), MealType::Breakfast);
    let r = e.reserve(monday, &omelette.id, ReserveRequest::Portions(2)).unwrap();
    for offset in 1..3 {
        e.replicate_slot(&r.slot_id, SlotKey::new(day(offset), MealType::Breakfast))
            .unwrap();
    }
    e.assign_special(SlotKey::new(day(1), MealType::Dinner), Special::EatOut)
        .unwrap();

    let slots = e.slots(day(0), day(6)).unwrap();
    assert_eq!(slots.len(), 4);
    assert_eq!(slots[2].special, Some(Special::EatOut));
    assert_eq!(e.balance(&eggs.id).unwrap().planned, -6.0);
    assert_eq!(e.shortages().unwrap()[0].to_buy, 6.0);
}
