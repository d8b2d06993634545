use anyhow::Result;
use larder_pantry::{Batch, PantryEngine, StockBalance, StockOperation};

use super::{emit, qty, service_error};

fn print_balance(name: &str, unit: &str, b: &StockBalance) {
    println!(
        "{name}: {} {unit} on the shelf, {} {unit} after planned meals",
        qty(b.actual),
        qty(b.planned)
    );
}

pub fn adjust(
    engine: &PantryEngine,
    ingredient_id: &str,
    operation: StockOperation,
    quantity: f64,
    json: bool,
) -> Result<()> {
    let balance = engine
        .adjust_stock(ingredient_id, operation, quantity)
        .map_err(service_error)?;
    let ingredient = engine.ingredient(ingredient_id).map_err(service_error)?;
    emit(json, &balance, |b| print_balance(&ingredient.name, &ingredient.unit, b))
}

pub fn restock(engine: &PantryEngine, ingredient_id: &str, quantity: f64, json: bool) -> Result<()> {
    let balance = engine
        .restock(ingredient_id, quantity)
        .map_err(service_error)?;
    let ingredient = engine.ingredient(ingredient_id).map_err(service_error)?;
    emit(json, &balance, |b| print_balance(&ingredient.name, &ingredient.unit, b))
}

pub fn show(engine: &PantryEngine, ingredient_id: Option<&str>, json: bool) -> Result<()> {
    let ingredients = match ingredient_id {
        Some(id) => vec![engine.ingredient(id).map_err(service_error)?],
        None => engine.ingredients().map_err(service_error)?,
    };
    let rows = ingredients
        .into_iter()
        .map(|i| {
            let balance = engine.balance(&i.id).map_err(service_error)?;
            Ok((i, balance))
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        let body: Vec<_> = rows
            .iter()
            .map(|(i, b)| {
                serde_json::json!({
                    "ingredientId": i.id,
                    "name": i.name,
                    "unit": i.unit,
                    "actual": b.actual,
                    "planned": b.planned,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for (i, b) in &rows {
            print_balance(&i.name, &i.unit, b);
        }
    }
    Ok(())
}

pub fn shortages(engine: &PantryEngine, json: bool) -> Result<()> {
    let list = engine.shortages().map_err(service_error)?;
    emit(json, list.as_slice(), |list| {
        if list.is_empty() {
            println!("Nothing to buy.");
        }
        for s in list {
            println!(
                "{:<24} buy {} {} (have {})",
                s.name,
                qty(s.to_buy),
                s.unit,
                qty(s.actual)
            );
        }
    })
}

fn print_batches(list: &[Batch]) {
    if list.is_empty() {
        println!("No batches with anything left.");
    }
    for b in list {
        println!("{:<34} {:>3}% left  prepared {}", b.id, b.percentage_remaining, b.prepared_at);
    }
}

pub fn batches(engine: &PantryEngine, dish_id: &str, json: bool) -> Result<()> {
    let list = engine.available_batches(dish_id).map_err(service_error)?;
    emit(json, list.as_slice(), print_batches)
}

pub fn purge(engine: &PantryEngine, days: Option<u32>, json: bool) -> Result<()> {
    let days = days.unwrap_or(engine.config().batch_retention_days);
    let purged = engine
        .purge_batches(chrono::Duration::days(i64::from(days)))
        .map_err(service_error)?;
    emit(json, &serde_json::json!({ "purged": purged }), |_| {
        println!("Purged {purged} empty batches older than {days} days.")
    })
}
