//! Property tests for the ledger and batch invariants.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use larder_pantry::{
    ALLOWED_PERCENTAGES, MealType, PantryConfig, PantryEngine, RecipeLine, ReservationMode,
    ReserveRequest, SlotKey, StockBalance, StockOperation,
};
use larder_sql::{SQLStore, SqliteStore};
use proptest::prelude::*;

struct Kitchen {
    engine: PantryEngine,
    ingredients: Vec<String>,
    dishes: Vec<String>,
}

/// Three ingredients and three dishes with overlapping recipes.
fn kitchen(stock: [f64; 3]) -> Kitchen {
    let db: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let engine = PantryEngine::new(db, PantryConfig::default()).unwrap();

    let ingredients: Vec<String> = ["Rice", "Beans", "Onion"]
        .iter()
        .zip(stock)
        .map(|(name, qty)| {
            let id = engine.create_ingredient(name, "g").unwrap().id;
            engine.adjust_stock(&id, StockOperation::Set, qty).unwrap();
            id
        })
        .collect();

    let recipes: [&[(usize, f64)]; 3] = [
        &[(0, 120.0), (2, 30.0)],
        &[(1, 90.0), (2, 15.0)],
        &[(0, 70.0), (1, 40.0), (2, 10.0)],
    ];
    let dishes = recipes
        .iter()
        .enumerate()
        .map(|(i, lines)| {
            let lines: Vec<RecipeLine> = lines
                .iter()
                .map(|(ing, qty)| RecipeLine::new(&ingredients[*ing], *qty))
                .collect();
            engine
                .create_dish(&format!("Dish {i}"), "", &lines)
                .unwrap()
                .id
        })
        .collect();

    Kitchen {
        engine,
        ingredients,
        dishes,
    }
}

impl Kitchen {
    fn balances(&self) -> Vec<StockBalance> {
        self.ingredients
            .iter()
            .map(|id| self.engine.balance(id).unwrap())
            .collect()
    }
}

fn close(a: &[StockBalance], b: &[StockBalance]) -> bool {
    a.iter().zip(b).all(|(x, y)| {
        (x.actual - y.actual).abs() < 1e-6 && (x.planned - y.planned).abs() < 1e-6
    })
}

fn slot(offset: u64, meal: usize) -> SlotKey {
    SlotKey::new(
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap() + Days::new(offset),
        MealType::ALL[meal % 3],
    )
}

#[derive(Debug, Clone)]
enum Plan {
    Portions { dish: usize, portions: u32 },
    Share { dish: usize, percentage: u32 },
}

fn arb_plan() -> impl Strategy<Value = Plan> {
    prop_oneof![
        (0usize..3, 1u32..5).prop_map(|(dish, portions)| Plan::Portions { dish, portions }),
        (0usize..3, prop::sample::select(ALLOWED_PERCENTAGES.to_vec()))
            .prop_map(|(dish, percentage)| Plan::Share { dish, percentage }),
    ]
}

fn request(plan: &Plan) -> (usize, ReserveRequest) {
    match plan {
        Plan::Portions { dish, portions } => (*dish, ReserveRequest::Portions(*portions)),
        Plan::Share { dish, percentage } => (
            *dish,
            ReserveRequest::Batch {
                percentage: *percentage,
                batch_id: None,
            },
        ),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_reserve_then_release_nets_zero(
        plans in prop::collection::vec((arb_plan(), 0u64..3, 0usize..3), 1..12),
        order in Just((0..12usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let k = kitchen([500.0, 200.0, 50.0]);
        let before = k.balances();

        let ids: Vec<String> = plans
            .iter()
            .map(|(plan, day, meal)| {
                let (dish, req) = request(plan);
                k.engine.reserve(slot(*day, *meal), &k.dishes[dish], req).unwrap().id
            })
            .collect();

        for i in order.into_iter().filter(|i| *i < ids.len()) {
            k.engine.release(&ids[i]).unwrap();
        }

        prop_assert!(close(&k.balances(), &before));
    }

    #[test]
    fn prop_confirm_unconfirm_restores_ledger(
        stock in prop::array::uniform3(0u32..600),
        plans in prop::collection::vec(arb_plan(), 1..6),
    ) {
        let k = kitchen(stock.map(f64::from));
        let key = slot(0, 1);
        let mut slot_id = String::new();
        for plan in &plans {
            let (dish, req) = request(plan);
            slot_id = k.engine.reserve(key, &k.dishes[dish], req).unwrap().slot_id;
        }
        let planned = k.balances();

        let confirmed = k.engine.confirm(&slot_id).unwrap();
        prop_assert!(confirmed.confirmation.is_confirmed());
        for b in k.balances() {
            prop_assert!(b.actual >= 0.0);
        }

        let back = k.engine.unconfirm(&slot_id).unwrap();
        prop_assert!(back.confirmation.confirmed_at().is_none());
        prop_assert!(close(&k.balances(), &planned));
    }

    #[test]
    fn prop_batch_share_stays_in_bounds(
        steps in prop::collection::vec(
            (prop::sample::select(ALLOWED_PERCENTAGES.to_vec()), any::<bool>()),
            1..20,
        ),
    ) {
        let k = kitchen([0.0, 0.0, 0.0]);
        let dish = &k.dishes[0];
        let mut held: Vec<(String, String)> = Vec::new();

        for (i, (percentage, release)) in steps.into_iter().enumerate() {
            if release && !held.is_empty() {
                let (reservation, batch) = held.remove(0);
                let before = k.engine.batch(&batch).unwrap().percentage_remaining;
                k.engine.release(&reservation).unwrap();
                let after = k.engine.batch(&batch).unwrap().percentage_remaining;
                prop_assert!(after <= 100);
                prop_assert!(after >= before);
            } else {
                let r = k
                    .engine
                    .reserve(
                        slot(i as u64, i),
                        dish,
                        ReserveRequest::Batch { percentage, batch_id: None },
                    )
                    .unwrap();
                let ReservationMode::Batch { batch_id, .. } = r.mode else {
                    panic!("expected a batch reservation");
                };
                held.push((r.id, batch_id));
            }

            for b in k.engine.available_batches(dish).unwrap() {
                prop_assert!(b.percentage_remaining > 0 && b.percentage_remaining <= 100);
            }
        }
    }
}
