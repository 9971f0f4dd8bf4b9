use serde::Serialize;

/// Parameters for one projection run. Constructed fresh per request; the
/// engine never mutates them and keeps no state between runs.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub initial_amount: f64,
    pub horizon_months: u32,
    /// 0 = most conservative, 100 = most aggressive. Values outside the
    /// range are clamped when rates are derived.
    pub risk_tolerance: f64,
    pub monthly_contribution: f64,
    /// Annual inflation used to deflate projected values into today's
    /// money. Zero disables deflation.
    pub annual_inflation: f64,
    pub baseline_annual_return: f64,
    pub baseline_annual_risk: f64,
    /// Ensemble size: number of independent paths per run.
    pub paths: u32,
    pub seed: u64,
}

/// Cross-sectional spread of the ensemble at one period: 90th percentile,
/// arithmetic mean, 10th percentile.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBand {
    pub optimistic: f64,
    pub expected: f64,
    pub pessimistic: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub expected_final_value: f64,
    pub total_invested: f64,
    pub profit: f64,
    pub profit_percentage: f64,
    pub best_case: f64,
    pub worst_case: f64,
    pub volatility_percent: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub bands: Vec<PeriodBand>,
    pub summary: Summary,
}

/// Expected return and volatility after the risk-tolerance dial has been
/// applied to the baseline, in both annual and monthly terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyRates {
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub monthly_return: f64,
    pub monthly_volatility: f64,
}
