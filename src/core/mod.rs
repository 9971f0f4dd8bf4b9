mod engine;
mod types;

pub use engine::{derive_monthly_rates, run_projection};
pub use types::{Inputs, MonthlyRates, PeriodBand, Projection, Summary};
