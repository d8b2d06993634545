use larder_core::ServiceError;
use larder_sql::SQLStore;

/// SQL DDL for the pantry database.
///
/// Unlike document-style tables, every field is a real column: the ledger and
/// batch counters are updated with in-SQL arithmetic.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ingredients (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    unit        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_balances (
    ingredient_id  TEXT NOT NULL UNIQUE REFERENCES ingredients(id) ON DELETE CASCADE,
    actual         REAL NOT NULL DEFAULT 0,
    planned        REAL NOT NULL DEFAULT 0,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dishes (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recipe_lines (
    dish_id        TEXT NOT NULL REFERENCES dishes(id) ON DELETE CASCADE,
    ingredient_id  TEXT NOT NULL REFERENCES ingredients(id),
    quantity       REAL NOT NULL CHECK (quantity > 0),
    position       INTEGER NOT NULL,
    UNIQUE (dish_id, ingredient_id)
);

CREATE TABLE IF NOT EXISTS meal_slots (
    id            TEXT PRIMARY KEY,
    day           TEXT NOT NULL,
    meal_type     TEXT NOT NULL CHECK (meal_type IN ('breakfast', 'lunch', 'dinner')),
    special       TEXT CHECK (special IS NULL OR special IN ('order', 'eat_out')),
    confirmed     INTEGER NOT NULL DEFAULT 0,
    confirmed_at  TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE (day, meal_type)
);

CREATE TABLE IF NOT EXISTS batches (
    id                    TEXT PRIMARY KEY,
    dish_id               TEXT NOT NULL REFERENCES dishes(id),
    percentage_remaining  INTEGER NOT NULL
                          CHECK (percentage_remaining >= 0 AND percentage_remaining <= 100),
    prepared_at           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_batch_dish ON batches(dish_id, prepared_at);

-- batch_id is not a foreign key: the purge sweep may delete a fully eaten
-- batch that confirmed reservations still name.
CREATE TABLE IF NOT EXISTS reservations (
    id          TEXT PRIMARY KEY,
    slot_id     TEXT NOT NULL REFERENCES meal_slots(id) ON DELETE CASCADE,
    dish_id     TEXT NOT NULL REFERENCES dishes(id),
    portions    INTEGER,
    batch_id    TEXT,
    percentage  INTEGER,
    position    INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    CHECK (
        (portions IS NOT NULL AND portions > 0 AND batch_id IS NULL AND percentage IS NULL)
        OR
        (portions IS NULL AND batch_id IS NOT NULL
         AND percentage BETWEEN 5 AND 100 AND percentage % 5 = 0)
    )
);
CREATE INDEX IF NOT EXISTS idx_reservation_slot ON reservations(slot_id, position);
CREATE INDEX IF NOT EXISTS idx_reservation_batch ON reservations(batch_id);

-- Per-ingredient quantities a reservation claimed when it was made.
CREATE TABLE IF NOT EXISTS reservation_claims (
    reservation_id  TEXT NOT NULL REFERENCES reservations(id) ON DELETE CASCADE,
    ingredient_id   TEXT NOT NULL REFERENCES ingredients(id),
    quantity        REAL NOT NULL CHECK (quantity > 0),
    PRIMARY KEY (reservation_id, ingredient_id)
);

-- What a confirmation actually did to the ledger, so unconfirm can undo it.
CREATE TABLE IF NOT EXISTS slot_consumption (
    slot_id        TEXT NOT NULL REFERENCES meal_slots(id) ON DELETE CASCADE,
    ingredient_id  TEXT NOT NULL REFERENCES ingredients(id),
    consumed       REAL NOT NULL,
    debited        REAL NOT NULL,
    released       REAL NOT NULL,
    PRIMARY KEY (slot_id, ingredient_id)
);
";

/// Create all pantry tables if they do not exist yet.
pub fn init_schema(db: &dyn SQLStore) -> Result<(), ServiceError> {
    db.exec_batch(SCHEMA)
        .map_err(|e| ServiceError::Storage(format!("pantry schema init: {e}")))
}
