//! Recipe catalog: ingredients, dishes and their recipe lines.

use std::collections::HashSet;

use larder_core::{ServiceError, new_id, now_rfc3339};
use larder_sql::{Executor, Row, Value};

use crate::db;
use crate::model::{Dish, Ingredient, RecipeLine};

// ---------------------------------------------------------------------------
// Ingredients
// ---------------------------------------------------------------------------

pub(crate) fn create_ingredient<E: Executor + ?Sized>(
    db: &E,
    name: &str,
    unit: &str,
) -> Result<Ingredient, ServiceError> {
    let name = name.trim();
    let unit = unit.trim();
    if name.is_empty() || unit.is_empty() {
        return Err(ServiceError::Validation(
            "ingredient name and unit are required".into(),
        ));
    }

    let ingredient = Ingredient {
        id: new_id(),
        name: name.to_string(),
        unit: unit.to_string(),
        created_at: now_rfc3339(),
    };
    db::exec(
        db,
        "INSERT INTO ingredients (id, name, unit, created_at) VALUES (?1, ?2, ?3, ?4)",
        &[
            Value::from(ingredient.id.as_str()),
            Value::from(ingredient.name.as_str()),
            Value::from(ingredient.unit.as_str()),
            Value::from(ingredient.created_at.as_str()),
        ],
    )
    .map_err(|e| match e {
        ServiceError::Conflict(_) => {
            ServiceError::Conflict(format!("ingredient {name} already exists"))
        }
        other => other,
    })?;

    Ok(ingredient)
}

/// Rename an ingredient. The unit is fixed once recipes refer to it.
pub(crate) fn rename_ingredient<E: Executor + ?Sized>(
    db: &E,
    id: &str,
    name: &str,
) -> Result<Ingredient, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("ingredient name is required".into()));
    }
    let affected = db::exec(
        db,
        "UPDATE ingredients SET name = ?1 WHERE id = ?2",
        &[Value::from(name), Value::from(id)],
    )?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("ingredient {id}")));
    }
    ingredient(db, id)
}

pub(crate) fn ingredient<E: Executor + ?Sized>(
    db: &E,
    id: &str,
) -> Result<Ingredient, ServiceError> {
    let rows = db::query(
        db,
        "SELECT id, name, unit, created_at FROM ingredients WHERE id = ?1",
        &[Value::from(id)],
    )?;
    let row = rows
        .first()
        .ok_or_else(|| ServiceError::NotFound(format!("ingredient {id}")))?;
    row_to_ingredient(row)
}

pub(crate) fn ingredients<E: Executor + ?Sized>(db: &E) -> Result<Vec<Ingredient>, ServiceError> {
    db::query(
        db,
        "SELECT id, name, unit, created_at FROM ingredients ORDER BY name",
        &[],
    )?
    .iter()
    .map(row_to_ingredient)
    .collect()
}

fn row_to_ingredient(row: &Row) -> Result<Ingredient, ServiceError> {
    Ok(Ingredient {
        id: db::text(row, "id")?,
        name: db::text(row, "name")?,
        unit: db::text(row, "unit")?,
        created_at: db::text(row, "created_at")?,
    })
}

// ---------------------------------------------------------------------------
// Dishes
// ---------------------------------------------------------------------------

pub(crate) fn create_dish<E: Executor + ?Sized>(
    db: &E,
    name: &str,
    description: &str,
    lines: &[RecipeLine],
) -> Result<Dish, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("dish name is required".into()));
    }
    validate_lines(db, lines)?;

    let id = new_id();
    db::exec(
        db,
        "INSERT INTO dishes (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        &[
            Value::from(id.as_str()),
            Value::from(name),
            Value::from(description),
            Value::Text(now_rfc3339()),
        ],
    )?;
    insert_lines(db, &id, lines)?;
    dish(db, &id)
}

/// Replace a dish's recipe. Reservations already made keep the quantities they
/// claimed; only later reservations see the new recipe.
pub(crate) fn set_recipe<E: Executor + ?Sized>(
    db: &E,
    dish_id: &str,
    lines: &[RecipeLine],
) -> Result<Dish, ServiceError> {
    ensure_dish(db, dish_id)?;
    validate_lines(db, lines)?;
    db::exec(
        db,
        "DELETE FROM recipe_lines WHERE dish_id = ?1",
        &[Value::from(dish_id)],
    )?;
    insert_lines(db, dish_id, lines)?;
    dish(db, dish_id)
}

pub(crate) fn dish<E: Executor + ?Sized>(db: &E, id: &str) -> Result<Dish, ServiceError> {
    let rows = db::query(
        db,
        "SELECT id, name, description, created_at FROM dishes WHERE id = ?1",
        &[Value::from(id)],
    )?;
    let row = rows
        .first()
        .ok_or_else(|| ServiceError::NotFound(format!("dish {id}")))?;

    Ok(Dish {
        id: db::text(row, "id")?,
        name: db::text(row, "name")?,
        description: db::opt_text(row, "description").unwrap_or_default(),
        lines: recipe(db, id)?,
        created_at: db::text(row, "created_at")?,
    })
}

pub(crate) fn dishes<E: Executor + ?Sized>(db: &E) -> Result<Vec<Dish>, ServiceError> {
    let ids = db::query(db, "SELECT id FROM dishes ORDER BY name", &[])?;
    ids.iter()
        .map(|row| dish(db, &db::text(row, "id")?))
        .collect()
}

pub(crate) fn ensure_dish<E: Executor + ?Sized>(db: &E, id: &str) -> Result<(), ServiceError> {
    let rows = db::query(db, "SELECT 1 AS one FROM dishes WHERE id = ?1", &[Value::from(id)])?;
    if rows.is_empty() {
        return Err(ServiceError::NotFound(format!("dish {id}")));
    }
    Ok(())
}

/// Current recipe lines of a dish, in display order.
///
/// Callers that reserve against the recipe must read it inside the same
/// transaction as their ledger writes.
pub(crate) fn recipe<E: Executor + ?Sized>(
    db: &E,
    dish_id: &str,
) -> Result<Vec<RecipeLine>, ServiceError> {
    db::query(
        db,
        "SELECT ingredient_id, quantity FROM recipe_lines WHERE dish_id = ?1 ORDER BY position",
        &[Value::from(dish_id)],
    )?
    .iter()
    .map(|row| {
        Ok(RecipeLine {
            ingredient_id: db::text(row, "ingredient_id")?,
            quantity: db::real(row, "quantity")?,
        })
    })
    .collect()
}

fn validate_lines<E: Executor + ?Sized>(db: &E, lines: &[RecipeLine]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for line in lines {
        if !line.quantity.is_finite() || line.quantity <= 0.0 {
            return Err(ServiceError::InvalidAmount(format!(
                "recipe quantity must be positive, got {}",
                line.quantity
            )));
        }
        if !seen.insert(line.ingredient_id.as_str()) {
            return Err(ServiceError::Validation(format!(
                "ingredient {} appears twice in the recipe",
                line.ingredient_id
            )));
        }
        ingredient(db, &line.ingredient_id)?;
    }
    Ok(())
}

fn insert_lines<E: Executor + ?Sized>(
    db: &E,
    dish_id: &str,
    lines: &[RecipeLine],
) -> Result<(), ServiceError> {
    for (position, line) in lines.iter().enumerate() {
        db::exec(
            db,
            "INSERT INTO recipe_lines (dish_id, ingredient_id, quantity, position) \
             VALUES (?1, ?2, ?3, ?4)",
            &[
                Value::from(dish_id),
                Value::from(line.ingredient_id.as_str()),
                Value::Real(line.quantity),
                Value::Integer(position as i64),
            ],
        )?;
    }
    Ok(())
}
