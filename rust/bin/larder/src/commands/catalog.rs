use anyhow::Result;
use larder_pantry::{Dish, Ingredient, PantryEngine, RecipeLine};

use super::{emit, qty, service_error};

fn print_ingredients(list: &[Ingredient]) {
    println!("{:<34} {:<24} UNIT", "ID", "NAME");
    for i in list {
        println!("{:<34} {:<24} {}", i.id, i.name, i.unit);
    }
}

fn print_dish(engine: &PantryEngine, dish: &Dish) {
    println!("{}  {}", dish.id, dish.name);
    if !dish.description.is_empty() {
        println!("  {}", dish.description);
    }
    for line in &dish.lines {
        match engine.ingredient(&line.ingredient_id) {
            Ok(i) => println!("  - {} {} {}", qty(line.quantity), i.unit, i.name),
            Err(_) => println!("  - {} of {}", qty(line.quantity), line.ingredient_id),
        }
    }
}

pub fn add_ingredient(engine: &PantryEngine, name: &str, unit: &str, json: bool) -> Result<()> {
    let ingredient = engine.create_ingredient(name, unit).map_err(service_error)?;
    emit(json, &ingredient, |i| println!("Ingredient {} created ({}).", i.name, i.id))
}

pub fn rename_ingredient(engine: &PantryEngine, id: &str, name: &str, json: bool) -> Result<()> {
    let ingredient = engine.rename_ingredient(id, name).map_err(service_error)?;
    emit(json, &ingredient, |i| println!("Ingredient {} renamed to {}.", i.id, i.name))
}

pub fn list_ingredients(engine: &PantryEngine, json: bool) -> Result<()> {
    let list = engine.ingredients().map_err(service_error)?;
    emit(json, list.as_slice(), print_ingredients)
}

pub fn add_dish(
    engine: &PantryEngine,
    name: &str,
    description: &str,
    lines: &[RecipeLine],
    json: bool,
) -> Result<()> {
    let dish = engine
        .create_dish(name, description, lines)
        .map_err(service_error)?;
    emit(json, &dish, |d| print_dish(engine, d))
}

pub fn set_recipe(engine: &PantryEngine, id: &str, lines: &[RecipeLine], json: bool) -> Result<()> {
    let dish = engine.set_recipe(id, lines).map_err(service_error)?;
    emit(json, &dish, |d| print_dish(engine, d))
}

pub fn show_dish(engine: &PantryEngine, id: &str, json: bool) -> Result<()> {
    let dish = engine.dish(id).map_err(service_error)?;
    emit(json, &dish, |d| print_dish(engine, d))
}

pub fn list_dishes(engine: &PantryEngine, json: bool) -> Result<()> {
    let dishes = engine.dishes().map_err(service_error)?;
    emit(json, dishes.as_slice(), |list| {
        for d in list {
            println!("{:<34} {:<28} {} ingredients", d.id, d.name, d.lines.len());
        }
    })
}
