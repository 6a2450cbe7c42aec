//! Procurement forecast from a trailing shipped average.
//!
//! ```text
//! daily_average   = shipped over the trailing window ÷ trailing_days
//! forecast_demand = ⌈shipped × forecast_days ÷ trailing_days⌉
//! deficit         = quantity − forecast_demand
//! need_to_order   = max(0, −deficit)
//! status          = critical  if quantity < min_quantity
//!                   warning   if deficit < 0
//!                   ok        otherwise
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::document::DocumentKind;
use crate::types::{Product, StockEntry, StockMovement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Critical,
    Warning,
    Ok,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ForecastRow {
    pub product_id: String,
    pub product_name: String,
    /// On hand across all warehouses.
    pub quantity: i64,
    pub min_quantity: i64,
    /// Units shipped within the trailing window.
    pub shipped: i64,
    pub daily_average: f64,
    pub forecast_demand: i64,
    pub deficit: i64,
    pub need_to_order: i64,
    pub status: ForecastStatus,
}

/// Forecast demand over `forecast_days`, rounded up to whole units.
pub fn forecast_demand(shipped: i64, forecast_days: i64, trailing_days: i64) -> i64 {
    if trailing_days <= 0 || shipped <= 0 || forecast_days <= 0 {
        return 0;
    }
    let numerator = shipped.saturating_mul(forecast_days);
    numerator.saturating_add(trailing_days - 1) / trailing_days
}

pub fn forecast_status(quantity: i64, min_quantity: i64, deficit: i64) -> ForecastStatus {
    if quantity < min_quantity {
        ForecastStatus::Critical
    } else if deficit < 0 {
        ForecastStatus::Warning
    } else {
        ForecastStatus::Ok
    }
}

/// One row per active product, ordered by product name.
///
/// `movements` are the ledger movements of the trailing window; only
/// shipment outflows count as demand.
pub fn procurement_forecast(
    products: &[Product],
    entries: &[StockEntry],
    movements: &[StockMovement],
    forecast_days: i64,
    trailing_days: i64,
) -> Vec<ForecastRow> {
    let mut on_hand: HashMap<&str, i64> = HashMap::new();
    for e in entries {
        *on_hand.entry(e.product_id.as_str()).or_default() += e.quantity;
    }

    let mut shipped: HashMap<&str, i64> = HashMap::new();
    for m in movements
        .iter()
        .filter(|m| m.document_kind == DocumentKind::Shipment && m.quantity_delta < 0)
    {
        *shipped.entry(m.product_id.as_str()).or_default() -= m.quantity_delta;
    }

    let mut rows: Vec<ForecastRow> = products
        .iter()
        .filter(|p| p.is_active)
        .map(|p| {
            let quantity = on_hand.get(p.id.as_str()).copied().unwrap_or(0);
            let shipped = shipped.get(p.id.as_str()).copied().unwrap_or(0);
            let daily_average = if trailing_days > 0 {
                shipped as f64 / trailing_days as f64
            } else {
                0.0
            };
            let demand = forecast_demand(shipped, forecast_days, trailing_days);
            let deficit = quantity - demand;
            ForecastRow {
                product_id: p.id.clone(),
                product_name: p.name.clone(),
                quantity,
                min_quantity: p.min_quantity,
                shipped,
                daily_average,
                forecast_demand: demand,
                deficit,
                need_to_order: (-deficit).max(0),
                status: forecast_status(quantity, p.min_quantity, deficit),
            }
        })
        .collect();

    rows.sort_by(|a, b| a.product_name.cmp(&b.product_name));
    rows
}
