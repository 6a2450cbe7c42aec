//! # Reports
//!
//! Read-only aggregation over documents and the ledger. Every function here
//! is pure: the engine loads a consistent snapshot and hands it in.
//!
//! - [`debt`] - balances per supplier / customer
//! - [`turnover`] - opening / incoming / outgoing / closing per period
//! - [`forecast`] - procurement deficits from a trailing average

pub mod debt;
pub mod forecast;
pub mod turnover;

pub use debt::{debt_report, DebtRow, DebtStatus};
pub use forecast::{procurement_forecast, ForecastRow, ForecastStatus};
pub use turnover::{turnover_report, TurnoverFilter, TurnoverRow};
