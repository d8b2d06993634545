pub mod catalog;
pub mod plan;
pub mod stock;

use anyhow::Result;
use larder_core::ServiceError;
use serde::Serialize;

/// Attach the stable error code to engine failures shown to the user.
pub fn service_error(e: ServiceError) -> anyhow::Error {
    if e.is_storage() {
        anyhow::anyhow!("storage failure: {e}")
    } else {
        anyhow::anyhow!("{e} [{}]", e.error_code())
    }
}

/// Print `value` as pretty JSON or through the given table printer.
pub fn emit<T: Serialize + ?Sized>(json: bool, value: &T, table: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        table(value);
    }
    Ok(())
}

fn qty(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
