use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use larder_core::{ServiceError, format_rfc3339};
use larder_sql::{SQLStore, Transaction};

use crate::config::PantryConfig;
use crate::model::{
    Batch, Dish, Ingredient, MealSlot, RecipeLine, Reservation, ReserveRequest, Shortage,
    SlotKey, Special, StockBalance, StockOperation,
};
use crate::schema::init_schema;
use crate::{batch, catalog, confirmation, db, ledger, reservation, shortage};

// ---------------------------------------------------------------------------
// PantryEngine — plan, ledger and confirmation in one place
// ---------------------------------------------------------------------------

/// The inventory engine.
///
/// Every mutating call runs in a single immediate transaction: callers touching
/// the same ingredients or batches are serialized, and an error anywhere in
/// the call leaves the store exactly as it was.
pub struct PantryEngine {
    db: Arc<dyn SQLStore>,
    config: PantryConfig,
}

impl PantryEngine {
    /// Create the engine, creating the pantry tables if needed.
    pub fn new(db: Arc<dyn SQLStore>, config: PantryConfig) -> Result<Self, ServiceError> {
        init_schema(db.as_ref())?;
        Ok(Self { db, config })
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<dyn SQLStore> {
        &self.db
    }

    pub fn config(&self) -> &PantryConfig {
        &self.config
    }

    /// Run `f` inside one transaction, committing only if it succeeds.
    ///
    /// Everything `f` reads or writes must go through the transaction handle;
    /// the store itself is locked until the transaction ends.
    fn atomically<T>(
        &self,
        f: impl FnOnce(&dyn Transaction) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let tx = self.db.begin().map_err(db::storage)?;
        let out = f(tx.as_ref())?;
        tx.commit().map_err(db::storage)?;
        Ok(out)
    }

    // =======================================================================
    // Catalog
    // =======================================================================

    pub fn create_ingredient(&self, name: &str, unit: &str) -> Result<Ingredient, ServiceError> {
        let ingredient = self.atomically(|tx| catalog::create_ingredient(tx, name, unit))?;
        info!(id = %ingredient.id, name = %ingredient.name, "ingredient created");
        Ok(ingredient)
    }

    pub fn rename_ingredient(&self, id: &str, name: &str) -> Result<Ingredient, ServiceError> {
        self.atomically(|tx| catalog::rename_ingredient(tx, id, name))
    }

    pub fn ingredient(&self, id: &str) -> Result<Ingredient, ServiceError> {
        catalog::ingredient(self.db.as_ref(), id)
    }

    pub fn ingredients(&self) -> Result<Vec<Ingredient>, ServiceError> {
        catalog::ingredients(self.db.as_ref())
    }

    pub fn create_dish(
        &self,
        name: &str,
        description: &str,
        lines: &[RecipeLine],
    ) -> Result<Dish, ServiceError> {
        let dish = self.atomically(|tx| catalog::create_dish(tx, name, description, lines))?;
        info!(id = %dish.id, name = %dish.name, lines = dish.lines.len(), "dish created");
        Ok(dish)
    }

    /// Replace a dish's recipe. Existing reservations keep what they claimed.
    pub fn set_recipe(&self, dish_id: &str, lines: &[RecipeLine]) -> Result<Dish, ServiceError> {
        self.atomically(|tx| catalog::set_recipe(tx, dish_id, lines))
    }

    pub fn dish(&self, id: &str) -> Result<Dish, ServiceError> {
        self.atomically(|tx| catalog::dish(tx, id))
    }

    pub fn dishes(&self) -> Result<Vec<Dish>, ServiceError> {
        self.atomically(|tx| catalog::dishes(tx))
    }

    // =======================================================================
    // Planning
    // =======================================================================

    /// Plan `dish` on the slot at `key`, creating the slot if needed.
    pub fn reserve(
        &self,
        key: SlotKey,
        dish_id: &str,
        request: ReserveRequest,
    ) -> Result<Reservation, ServiceError> {
        let r = self.atomically(|tx| reservation::reserve(tx, key, dish_id, &request))?;
        info!(reservation = %r.id, slot = %key, dish = dish_id, ?request, "reserved");
        Ok(r)
    }

    /// Cancel a reservation, handing back exactly what it claimed.
    pub fn release(&self, reservation_id: &str) -> Result<(), ServiceError> {
        let r = self.atomically(|tx| reservation::release(tx, reservation_id))?;
        info!(reservation = %r.id, slot = %r.slot_id, "released");
        Ok(())
    }

    /// Replace the dish of a reservation with `portions` of another one.
    pub fn edit_dish(
        &self,
        reservation_id: &str,
        dish_id: &str,
        portions: u32,
    ) -> Result<Reservation, ServiceError> {
        let r =
            self.atomically(|tx| reservation::edit_dish(tx, reservation_id, dish_id, portions))?;
        info!(reservation = %r.id, dish = dish_id, portions, "reservation edited");
        Ok(r)
    }

    pub fn assign_special(&self, key: SlotKey, special: Special) -> Result<MealSlot, ServiceError> {
        let slot = self.atomically(|tx| reservation::assign_special(tx, key, special))?;
        info!(slot = %slot.id, key = %key, %special, "slot marked special");
        Ok(slot)
    }

    /// Clear the slot at `key` entirely.
    pub fn remove_slot(&self, key: SlotKey) -> Result<(), ServiceError> {
        let slot = self.atomically(|tx| reservation::remove_slot(tx, key))?;
        info!(slot = %slot.id, key = %key, "slot removed");
        Ok(())
    }

    /// Plan the contents of slot `source_slot_id` again on `target`.
    pub fn replicate_slot(
        &self,
        source_slot_id: &str,
        target: SlotKey,
    ) -> Result<Vec<Reservation>, ServiceError> {
        let copied =
            self.atomically(|tx| reservation::replicate_slot(tx, source_slot_id, target))?;
        info!(source = source_slot_id, target = %target, copied = copied.len(), "slot replicated");
        Ok(copied)
    }

    pub fn slot(&self, key: SlotKey) -> Result<Option<MealSlot>, ServiceError> {
        reservation::slot_by_key(self.db.as_ref(), key)
    }

    pub fn slots(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<MealSlot>, ServiceError> {
        reservation::slots_between(self.db.as_ref(), from, to)
    }

    pub fn reservations(&self, slot_id: &str) -> Result<Vec<Reservation>, ServiceError> {
        reservation::reservations(self.db.as_ref(), slot_id)
    }

    // =======================================================================
    // Confirmation
    // =======================================================================

    /// Mark the meal as cooked and debit the pantry.
    pub fn confirm(&self, slot_id: &str) -> Result<MealSlot, ServiceError> {
        let slot = self.atomically(|tx| confirmation::confirm(tx, slot_id))?;
        info!(slot = %slot.id, key = %slot.key(), "meal confirmed");
        Ok(slot)
    }

    /// Undo a confirmation, crediting back exactly what it debited.
    pub fn unconfirm(&self, slot_id: &str) -> Result<MealSlot, ServiceError> {
        let slot = self.atomically(|tx| confirmation::unconfirm(tx, slot_id))?;
        info!(slot = %slot.id, key = %slot.key(), "meal unconfirmed");
        Ok(slot)
    }

    // =======================================================================
    // Stock
    // =======================================================================

    /// Correct the pantry directly, outside of any meal.
    pub fn adjust_stock(
        &self,
        ingredient_id: &str,
        operation: StockOperation,
        quantity: f64,
    ) -> Result<StockBalance, ServiceError> {
        let balance =
            self.atomically(|tx| ledger::correct(tx, ingredient_id, operation, quantity))?;
        info!(
            ingredient = ingredient_id,
            ?operation,
            quantity,
            actual = balance.actual,
            planned = balance.planned,
            "stock adjusted"
        );
        Ok(balance)
    }

    pub fn balance(&self, ingredient_id: &str) -> Result<StockBalance, ServiceError> {
        ledger::balance(self.db.as_ref(), ingredient_id)
    }

    pub fn shortages(&self) -> Result<Vec<Shortage>, ServiceError> {
        shortage::shortages(self.db.as_ref())
    }

    /// Record a purchase of `quantity` of an ingredient.
    pub fn restock(&self, ingredient_id: &str, quantity: f64) -> Result<StockBalance, ServiceError> {
        let balance = self.atomically(|tx| shortage::restock(tx, ingredient_id, quantity))?;
        info!(ingredient = ingredient_id, quantity, "restocked");
        Ok(balance)
    }

    // =======================================================================
    // Batches
    // =======================================================================

    pub fn batch(&self, id: &str) -> Result<Batch, ServiceError> {
        batch::get(self.db.as_ref(), id)
    }

    /// Batches of a dish with something left, oldest first.
    pub fn available_batches(&self, dish_id: &str) -> Result<Vec<Batch>, ServiceError> {
        self.atomically(|tx| {
            catalog::ensure_dish(tx, dish_id)?;
            batch::available(tx, dish_id)
        })
    }

    /// Delete fully eaten batches prepared more than `retention` ago.
    pub fn purge_batches(&self, retention: chrono::Duration) -> Result<u64, ServiceError> {
        let cutoff = format_rfc3339(Utc::now() - retention);
        let purged = self.atomically(|tx| batch::purge(tx, &cutoff))?;
        if purged > 0 {
            info!(purged, %cutoff, "purged empty batches");
        } else {
            debug!(%cutoff, "no batches to purge");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MealType, ReservationMode};
    use larder_sql::SqliteStore;

    fn engine() -> PantryEngine {
        let db: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        PantryEngine::new(db, PantryConfig::default()).unwrap()
    }

    fn key(meal_type: MealType) -> SlotKey {
        SlotKey::new(NaiveDate::from_ymd_opt(2024, 7, 12).unwrap(), meal_type)
    }

    #[test]
    fn failed_call_leaves_no_trace() {
        let e = engine();
        let rice = e.create_ingredient("Rice", "g").unwrap();
        let dish = e
            .create_dish("Rice bowl", "", &[RecipeLine::new(&rice.id, 100.0)])
            .unwrap();
        let r = e
            .reserve(key(MealType::Lunch), &dish.id, ReserveRequest::Portions(1))
            .unwrap();

        // The dinner slot is created before the dish lookup fails.
        assert!(matches!(
            e.reserve(key(MealType::Dinner), "missing", ReserveRequest::Portions(1)),
            Err(ServiceError::NotFound(_))
        ));
        assert!(e.slot(key(MealType::Dinner)).unwrap().is_none());

        // A foreign batch is rejected after the slot exists and the share was picked.
        let other = e.create_dish("Stew", "", &[]).unwrap();
        let stew = e
            .reserve(
                key(MealType::Breakfast),
                &other.id,
                ReserveRequest::Batch { percentage: 10, batch_id: None },
            )
            .unwrap();
        let ReservationMode::Batch { batch_id, .. } = stew.mode.clone() else {
            panic!("expected a batch reservation");
        };
        assert!(matches!(
            e.reserve(
                key(MealType::Dinner),
                &dish.id,
                ReserveRequest::Batch { percentage: 10, batch_id: Some(batch_id) },
            ),
            Err(ServiceError::Validation(_))
        ));
        assert!(e.slot(key(MealType::Dinner)).unwrap().is_none());

        assert_eq!(e.balance(&rice.id).unwrap().planned, -100.0);
        assert_eq!(e.reservations(&r.slot_id).unwrap(), vec![r]);
    }

    #[test]
    fn batch_share_flow() {
        let e = engine();
        let rice = e.create_ingredient("Rice", "g").unwrap();
        let paella = e
            .create_dish("Paella", "", &[RecipeLine::new(&rice.id, 300.0)])
            .unwrap();

        let first = e
            .reserve(
                key(MealType::Lunch),
                &paella.id,
                ReserveRequest::Batch { percentage: 50, batch_id: None },
            )
            .unwrap();
        let ReservationMode::Batch { batch_id, .. } = first.mode.clone() else {
            panic!("expected a batch reservation");
        };
        e.reserve(
            key(MealType::Dinner),
            &paella.id,
            ReserveRequest::Batch { percentage: 25, batch_id: Some(batch_id.clone()) },
        )
        .unwrap();
        assert_eq!(e.batch(&batch_id).unwrap().percentage_remaining, 25);

        e.release(&first.id).unwrap();
        assert_eq!(e.batch(&batch_id).unwrap().percentage_remaining, 75);
        assert_eq!(e.available_batches(&paella.id).unwrap().len(), 1);
    }

    #[test]
    fn purge_keeps_batches_an_open_plan_still_names() {
        let e = engine();
        let soup = e.create_dish("Soup", "", &[]).unwrap();
        let r = e
            .reserve(
                key(MealType::Dinner),
                &soup.id,
                ReserveRequest::Batch { percentage: 100, batch_id: None },
            )
            .unwrap();
        let ReservationMode::Batch { batch_id, .. } = r.mode.clone() else {
            panic!("expected a batch reservation");
        };

        // A negative retention puts the cutoff in the future.
        let everything = chrono::Duration::days(-1);
        assert_eq!(e.purge_batches(everything).unwrap(), 0);

        e.confirm(&r.slot_id).unwrap();
        assert_eq!(e.purge_batches(everything).unwrap(), 1);
        assert!(matches!(e.batch(&batch_id), Err(ServiceError::NotFound(_))));

        // Unconfirming and releasing afterwards tolerates the missing batch.
        e.unconfirm(&r.slot_id).unwrap();
        e.release(&r.id).unwrap();
    }
}
