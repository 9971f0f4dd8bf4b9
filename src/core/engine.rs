use std::f64::consts::PI;

use super::types::{Inputs, MonthlyRates, PeriodBand, Projection, Summary};

/// Annual risk-free rate used in the Sharpe ratio.
const RISK_FREE_RATE: f64 = 0.02;

/// Translate the annual baseline metrics and the 0-100 risk-tolerance dial
/// into the monthly return/volatility pair the path generator consumes.
///
/// The dial moves return and volatility in opposite directions relative to
/// the baseline: 40%..120% of baseline return and 150%..70% of baseline
/// volatility as the dial goes from 0 to 100.
pub fn derive_monthly_rates(
    baseline_annual_return: f64,
    baseline_annual_risk: f64,
    risk_tolerance: f64,
) -> MonthlyRates {
    let risk_factor = (risk_tolerance / 100.0).clamp(0.0, 1.0);

    let annual_return = baseline_annual_return * (0.5 + risk_factor * 0.8);
    let annual_volatility = baseline_annual_risk * (1.5 - risk_factor * 0.8);

    MonthlyRates {
        annual_return,
        annual_volatility,
        monthly_return: annual_return / 12.0,
        // Square-root-of-time scaling.
        monthly_volatility: annual_volatility / 12.0_f64.sqrt(),
    }
}

/// Run the full ensemble and aggregate it into per-period bands plus the
/// final-period summary statistics.
pub fn run_projection(inputs: &Inputs) -> Result<Projection, String> {
    validate_inputs(inputs)?;

    let rates = derive_monthly_rates(
        inputs.baseline_annual_return,
        inputs.baseline_annual_risk,
        inputs.risk_tolerance,
    );

    let path_count = inputs.paths as usize;
    let periods = inputs.horizon_months as usize + 1;

    let mut paths = Vec::with_capacity(path_count);
    for path_id in 0..inputs.paths {
        let mut rng = Rng::new(derive_seed(inputs.seed, path_id));
        paths.push(generate_path(inputs, &rates, &mut rng));
    }

    let mut bands = Vec::with_capacity(periods);
    let mut cross_section = Vec::with_capacity(path_count);
    let mut final_values = Vec::new();

    for period in 0..periods {
        let deflator = deflator_at(inputs.annual_inflation, period);
        cross_section.clear();
        cross_section.extend(paths.iter().map(|path| path[period] / deflator));
        cross_section.sort_by(|a, b| a.total_cmp(b));

        let expected = mean(&cross_section);
        // Rank percentiles bound the band; the mean can escape them in a
        // heavily skewed cross-section, so the band is widened to keep
        // pessimistic <= expected <= optimistic.
        let pessimistic = rank_value(&cross_section, 0.10).min(expected);
        let optimistic = rank_value(&cross_section, 0.90).max(expected);

        bands.push(PeriodBand {
            optimistic,
            expected,
            pessimistic,
        });

        if period + 1 == periods {
            final_values = cross_section.clone();
        }
    }

    let summary = summarize(inputs, &rates, &final_values);

    Ok(Projection { bands, summary })
}

fn validate_inputs(inputs: &Inputs) -> Result<(), String> {
    if inputs.paths == 0 {
        return Err("paths must be > 0".to_string());
    }

    if !inputs.initial_amount.is_finite() || inputs.initial_amount <= 0.0 {
        return Err("initial amount must be > 0".to_string());
    }

    if !inputs.monthly_contribution.is_finite() || inputs.monthly_contribution < 0.0 {
        return Err("monthly contribution must be >= 0".to_string());
    }

    if !inputs.annual_inflation.is_finite() || inputs.annual_inflation < 0.0 {
        return Err("annual inflation must be >= 0".to_string());
    }

    if !inputs.baseline_annual_return.is_finite() {
        return Err("baseline annual return must be finite".to_string());
    }

    if !inputs.baseline_annual_risk.is_finite() || inputs.baseline_annual_risk < 0.0 {
        return Err("baseline annual risk must be >= 0".to_string());
    }

    Ok(())
}

/// One ensemble member: `horizon_months + 1` values with the unmodified
/// initial amount at index 0. Negative values are legitimate modeled
/// outcomes and stay on the path unfloored.
fn generate_path(inputs: &Inputs, rates: &MonthlyRates, rng: &mut Rng) -> Vec<f64> {
    let mut path = Vec::with_capacity(inputs.horizon_months as usize + 1);
    let mut value = inputs.initial_amount;
    path.push(value);

    for _ in 0..inputs.horizon_months {
        let monthly = rng.sample_normal(rates.monthly_return, rates.monthly_volatility);
        value = value * (1.0 + monthly) + inputs.monthly_contribution;
        path.push(value);
    }

    path
}

fn summarize(inputs: &Inputs, rates: &MonthlyRates, sorted_finals: &[f64]) -> Summary {
    let expected_final_value = mean(sorted_finals);
    let best_case = rank_value(sorted_finals, 0.95).max(expected_final_value);
    let worst_case = rank_value(sorted_finals, 0.05).min(expected_final_value);

    let total_invested =
        inputs.initial_amount + inputs.monthly_contribution * inputs.horizon_months as f64;
    let profit = expected_final_value - total_invested;
    let profit_percentage = if total_invested > 0.0 {
        profit / total_invested * 100.0
    } else {
        0.0
    };

    let volatility_percent = if expected_final_value.abs() > 1e-12 {
        population_std(sorted_finals, expected_final_value) / expected_final_value * 100.0
    } else {
        0.0
    };

    let sharpe_ratio = if rates.annual_volatility > 1e-12 {
        (rates.annual_return - RISK_FREE_RATE) / rates.annual_volatility
    } else {
        0.0
    };

    Summary {
        expected_final_value,
        total_invested,
        profit,
        profit_percentage,
        best_case,
        worst_case,
        volatility_percent,
        sharpe_ratio,
    }
}

/// Percentile by direct rank: index `floor(n * p)` of the ascending
/// cross-section, not interpolated between adjacent ranks.
fn rank_value(sorted: &[f64], p: f64) -> f64 {
    let idx = (sorted.len() as f64 * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Deflator applied to nominal values at a given period when an inflation
/// rate is supplied: `(1 + annual_inflation)^(period / 12)`.
fn deflator_at(annual_inflation: f64, period: usize) -> f64 {
    if annual_inflation <= 0.0 {
        return 1.0;
    }
    (1.0 + annual_inflation).powf(period as f64 / 12.0)
}

fn derive_seed(base_seed: u64, path_id: u32) -> u64 {
    splitmix64(base_seed ^ ((path_id as u64) << 32) ^ path_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self {
            state,
            cached_normal: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform draw in (0, 1); never returns exactly 0 or 1.
    fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    /// Box-Muller transform over two independent uniforms. The first
    /// uniform is floored away from zero so ln(u1) stays finite; the
    /// second draw of the pair is cached for the next call.
    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        let z0 = r * theta.cos();
        let z1 = r * theta.sin();
        self.cached_normal = Some(z1);
        z0
    }

    fn sample_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        mean + std_dev * self.standard_normal()
    }
}
