//! `larder` — plan meals against the pantry from the command line.
//!
//! Every command opens the SQLite store, runs one engine operation and exits.
//! `larder sweeper` instead stays up and purges fully eaten batches on a timer.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use larder_core::ServiceConfig;
use larder_pantry::{
    MealType, PantryEngine, PantryModule, RecipeLine, ReserveRequest, SlotKey, Special,
    StockOperation,
};
use larder_sql::{SQLStore, SqliteStore};
use tracing::info;

use config::LarderConfig;

/// Larder CLI tool.
#[derive(Parser, Debug)]
#[command(name = "larder", about = "Meal planning against a two-counter pantry")]
struct Cli {
    /// Path to config file (default: ./larder.toml).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides [storage] data_dir).
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// SQLite database file (overrides [storage] sqlite_path).
    #[arg(long = "sqlite", global = true)]
    sqlite: Option<PathBuf>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage ingredients.
    Ingredient {
        #[command(subcommand)]
        action: IngredientAction,
    },

    /// Manage dishes and their recipes.
    Dish {
        #[command(subcommand)]
        action: DishAction,
    },

    /// Inspect or correct the pantry.
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },

    /// Ingredients the plan needs more of than the pantry holds.
    Shortages,

    /// Plan meals.
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Confirm or unconfirm a cooked meal.
    Meal {
        #[command(subcommand)]
        action: MealAction,
    },

    /// Batch bookkeeping.
    Batch {
        #[command(subcommand)]
        action: BatchAction,
    },

    /// Run the batch purge sweeper until interrupted.
    Sweeper,

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum IngredientAction {
    /// Create an ingredient.
    Add {
        name: String,
        /// Unit all quantities are expressed in (g, ml, units...).
        #[arg(long)]
        unit: String,
    },
    /// Rename an ingredient.
    Rename { id: String, name: String },
    /// List ingredients.
    List,
}

#[derive(Subcommand, Debug)]
enum DishAction {
    /// Create a dish.
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Recipe line as INGREDIENT_ID=QUANTITY (repeatable).
        #[arg(long = "line", value_parser = parse_line)]
        lines: Vec<RecipeLine>,
    },
    /// Replace the recipe of a dish.
    Recipe {
        id: String,
        #[arg(long = "line", value_parser = parse_line, required = true)]
        lines: Vec<RecipeLine>,
    },
    /// Show one dish.
    Show { id: String },
    /// List dishes.
    List,
}

#[derive(Subcommand, Debug)]
enum StockAction {
    /// Show balances (all ingredients if none given).
    Show { ingredient: Option<String> },
    /// Correct the pantry: set, add or subtract.
    Adjust {
        #[arg(value_parser = parse_operation)]
        operation: StockOperation,
        ingredient: String,
        quantity: f64,
    },
    /// Record a purchase.
    Restock { ingredient: String, quantity: f64 },
}

#[derive(Subcommand, Debug)]
enum PlanAction {
    /// Reserve a dish for a meal.
    Reserve {
        #[arg(value_parser = parse_day)]
        day: NaiveDate,
        #[arg(value_parser = parse_meal)]
        meal: MealType,
        dish: String,
        /// Number of portions (portion mode).
        #[arg(long, conflicts_with = "percent")]
        portions: Option<u32>,
        /// Share of a batch in percent (batch mode).
        #[arg(long)]
        percent: Option<u32>,
        /// Take the share from this batch instead of the oldest with room.
        #[arg(long, requires = "percent")]
        batch: Option<String>,
    },
    /// Release a reservation.
    Release { reservation: String },
    /// Replace the dish of a reservation.
    Edit {
        reservation: String,
        dish: String,
        #[arg(long, default_value_t = 1)]
        portions: u32,
    },
    /// Mark a meal as ordered in or eaten out.
    Special {
        #[arg(value_parser = parse_day)]
        day: NaiveDate,
        #[arg(value_parser = parse_meal)]
        meal: MealType,
        #[arg(value_parser = parse_special)]
        tag: Special,
    },
    /// Drop everything planned for a meal.
    Clear {
        #[arg(value_parser = parse_day)]
        day: NaiveDate,
        #[arg(value_parser = parse_meal)]
        meal: MealType,
    },
    /// Copy a slot's plan onto another meal.
    Copy {
        slot: String,
        #[arg(value_parser = parse_day)]
        day: NaiveDate,
        #[arg(value_parser = parse_meal)]
        meal: MealType,
    },
    /// Show the plan for a day or a range of days.
    Show {
        #[arg(value_parser = parse_day)]
        from: NaiveDate,
        #[arg(value_parser = parse_day)]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
enum MealAction {
    /// The meal was cooked: debit the pantry.
    Confirm { slot: String },
    /// Undo a confirmation.
    Unconfirm { slot: String },
}

#[derive(Subcommand, Debug)]
enum BatchAction {
    /// Batches of a dish that still have something left.
    List { dish: String },
    /// Delete fully eaten batches older than the retention window.
    Purge {
        /// Retention in days (default: [pantry] batch_retention_days).
        #[arg(long)]
        days: Option<u32>,
    },
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_meal(s: &str) -> Result<MealType, String> {
    MealType::from_str(s).ok_or_else(|| "expected breakfast, lunch or dinner".to_string())
}

fn parse_special(s: &str) -> Result<Special, String> {
    Special::from_str(s).ok_or_else(|| "expected order or eat_out".to_string())
}

fn parse_operation(s: &str) -> Result<StockOperation, String> {
    StockOperation::from_str(s).ok_or_else(|| "expected set, add or subtract".to_string())
}

fn parse_line(s: &str) -> Result<RecipeLine, String> {
    let (id, quantity) = s
        .split_once('=')
        .ok_or_else(|| "expected INGREDIENT_ID=QUANTITY".to_string())?;
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|e| format!("bad quantity {quantity:?}: {e}"))?;
    Ok(RecipeLine::new(id.trim(), quantity))
}

fn open_store(service: &ServiceConfig) -> anyhow::Result<Arc<dyn SQLStore>> {
    if let Some(dir) = &service.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let path = service.resolve_sqlite_path();
    let store = SqliteStore::open(&path)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {e}", path.display()))?;
    Ok(Arc::new(store))
}

fn run_sweeper(db: Arc<dyn SQLStore>, config: &LarderConfig) -> anyhow::Result<()> {
    if !config.pantry.purge_enabled {
        anyhow::bail!("purge is disabled in [pantry]; nothing to run.");
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let module = PantryModule::new(db, config.pantry.clone())
            .map_err(commands::service_error)?;
        info!("sweeper running; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        module.shutdown();
        info!("sweeper shutting down");
        Ok::<(), anyhow::Error>(())
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.output == "json";

    if let Commands::Version = cli.command {
        println!("larder v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = cli.config.unwrap_or_else(LarderConfig::default_path);
    let config = LarderConfig::load(&config_path)?;
    let service = config.service_config(ServiceConfig {
        data_dir: cli.data_dir,
        sqlite_path: cli.sqlite,
    });
    let db = open_store(&service)?;

    if let Commands::Sweeper = cli.command {
        return run_sweeper(db, &config);
    }

    let engine =
        PantryEngine::new(db, config.pantry.clone()).map_err(commands::service_error)?;

    match cli.command {
        Commands::Ingredient { action } => match action {
            IngredientAction::Add { name, unit } => {
                commands::catalog::add_ingredient(&engine, &name, &unit, json)?;
            }
            IngredientAction::Rename { id, name } => {
                commands::catalog::rename_ingredient(&engine, &id, &name, json)?;
            }
            IngredientAction::List => {
                commands::catalog::list_ingredients(&engine, json)?;
            }
        },

        Commands::Dish { action } => match action {
            DishAction::Add {
                name,
                description,
                lines,
            } => {
                commands::catalog::add_dish(&engine, &name, &description, &lines, json)?;
            }
            DishAction::Recipe { id, lines } => {
                commands::catalog::set_recipe(&engine, &id, &lines, json)?;
            }
            DishAction::Show { id } => {
                commands::catalog::show_dish(&engine, &id, json)?;
            }
            DishAction::List => {
                commands::catalog::list_dishes(&engine, json)?;
            }
        },

        Commands::Stock { action } => match action {
            StockAction::Show { ingredient } => {
                commands::stock::show(&engine, ingredient.as_deref(), json)?;
            }
            StockAction::Adjust {
                operation,
                ingredient,
                quantity,
            } => {
                commands::stock::adjust(&engine, &ingredient, operation, quantity, json)?;
            }
            StockAction::Restock {
                ingredient,
                quantity,
            } => {
                commands::stock::restock(&engine, &ingredient, quantity, json)?;
            }
        },

        Commands::Shortages => {
            commands::stock::shortages(&engine, json)?;
        }

        Commands::Plan { action } => match action {
            PlanAction::Reserve {
                day,
                meal,
                dish,
                portions,
                percent,
                batch,
            } => {
                let request = match (portions, percent) {
                    (_, Some(percentage)) => ReserveRequest::Batch {
                        percentage,
                        batch_id: batch,
                    },
                    (portions, None) => ReserveRequest::Portions(portions.unwrap_or(1)),
                };
                commands::plan::reserve(&engine, SlotKey::new(day, meal), &dish, request, json)?;
            }
            PlanAction::Release { reservation } => {
                commands::plan::release(&engine, &reservation)?;
            }
            PlanAction::Edit {
                reservation,
                dish,
                portions,
            } => {
                commands::plan::edit(&engine, &reservation, &dish, portions, json)?;
            }
            PlanAction::Special { day, meal, tag } => {
                commands::plan::special(&engine, SlotKey::new(day, meal), tag, json)?;
            }
            PlanAction::Clear { day, meal } => {
                commands::plan::clear(&engine, SlotKey::new(day, meal))?;
            }
            PlanAction::Copy { slot, day, meal } => {
                commands::plan::copy(&engine, &slot, SlotKey::new(day, meal), json)?;
            }
            PlanAction::Show { from, to } => {
                commands::plan::show(&engine, from, to.unwrap_or(from), json)?;
            }
        },

        Commands::Meal { action } => match action {
            MealAction::Confirm { slot } => {
                commands::plan::confirm(&engine, &slot, json)?;
            }
            MealAction::Unconfirm { slot } => {
                commands::plan::unconfirm(&engine, &slot, json)?;
            }
        },

        Commands::Batch { action } => match action {
            BatchAction::List { dish } => {
                commands::stock::batches(&engine, &dish, json)?;
            }
            BatchAction::Purge { days } => {
                commands::stock::purge(&engine, days, json)?;
            }
        },

        Commands::Sweeper | Commands::Version => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_reserve_in_batch_mode() {
        let cli = Cli::try_parse_from([
            "larder", "plan", "reserve", "2024-05-01", "dinner", "d1", "--percent", "25",
        ])
        .unwrap();
        let Commands::Plan {
            action: PlanAction::Reserve { day, meal, percent, portions, .. },
        } = cli.command
        else {
            panic!("expected plan reserve");
        };
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(meal, MealType::Dinner);
        assert_eq!(percent, Some(25));
        assert_eq!(portions, None);
    }

    #[test]
    fn recipe_lines_parse() {
        let line = parse_line("rice=200.5").unwrap();
        assert_eq!(line.ingredient_id, "rice");
        assert_eq!(line.quantity, 200.5);
        assert!(parse_line("rice").is_err());
        assert!(parse_line("rice=lots").is_err());
        assert!(parse_meal("brunch").is_err());
    }
}
