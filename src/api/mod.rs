use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{Inputs, PeriodBand, Summary, run_projection};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

/// JSON payload for `/api/simulate`. Every field is optional; missing
/// fields fall back to the documented CLI defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    initial_amount: Option<f64>,
    horizon_months: Option<u32>,
    risk_tolerance: Option<f64>,
    monthly_contribution: Option<f64>,
    inflation_rate: Option<f64>,
    expected_return: Option<f64>,
    risk: Option<f64>,
    paths: Option<u32>,
    seed: Option<u64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "portsim",
    about = "Monte Carlo portfolio projection (percentile bands + summary statistics)"
)]
struct Cli {
    #[arg(long, default_value_t = 10_000.0, help = "Starting capital")]
    initial_amount: f64,
    #[arg(long, default_value_t = 12, help = "Projection horizon in months")]
    horizon_months: u32,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Risk tolerance dial, 0 (conservative) to 100 (aggressive)"
    )]
    risk_tolerance: f64,
    #[arg(long, default_value_t = 0.0, help = "Contribution added every month")]
    monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual inflation in percent; projected values are deflated into today's money"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Baseline annual expected return in percent, from the optimized portfolio"
    )]
    expected_return: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Baseline annual risk in percent, from the optimized portfolio"
    )]
    risk: f64,
    #[arg(long, default_value_t = 100, help = "Ensemble size (paths per run)")]
    paths: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    horizon_months: u32,
    paths: u32,
    bands: Vec<PeriodBand>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if !cli.initial_amount.is_finite() || cli.initial_amount <= 0.0 {
        return Err("--initial-amount must be > 0".to_string());
    }

    if !(0.0..=100.0).contains(&cli.risk_tolerance) {
        return Err("--risk-tolerance must be between 0 and 100".to_string());
    }

    if !cli.monthly_contribution.is_finite() || cli.monthly_contribution < 0.0 {
        return Err("--monthly-contribution must be >= 0".to_string());
    }

    if !cli.inflation_rate.is_finite() || cli.inflation_rate < 0.0 {
        return Err("--inflation-rate must be >= 0".to_string());
    }

    if !cli.expected_return.is_finite() {
        return Err("--expected-return must be finite".to_string());
    }

    if !cli.risk.is_finite() || cli.risk < 0.0 {
        return Err("--risk must be >= 0".to_string());
    }

    if cli.paths == 0 {
        return Err("--paths must be > 0".to_string());
    }

    Ok(Inputs {
        initial_amount: cli.initial_amount,
        horizon_months: cli.horizon_months,
        risk_tolerance: cli.risk_tolerance,
        monthly_contribution: cli.monthly_contribution,
        annual_inflation: cli.inflation_rate / 100.0,
        baseline_annual_return: cli.expected_return / 100.0,
        baseline_annual_risk: cli.risk / 100.0,
        paths: cli.paths,
        seed: cli.seed,
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("portsim HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let projection = match run_projection(&inputs) {
        Ok(projection) => projection,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let response = SimulateResponse {
        horizon_months: inputs.horizon_months,
        paths: inputs.paths,
        bands: projection.bands,
        summary: projection.summary,
    };
    json_response(StatusCode::OK, response)
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: SimulatePayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.initial_amount {
        cli.initial_amount = v;
    }
    if let Some(v) = payload.horizon_months {
        cli.horizon_months = v;
    }
    if let Some(v) = payload.risk_tolerance {
        cli.risk_tolerance = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.expected_return {
        cli.expected_return = v;
    }
    if let Some(v) = payload.risk {
        cli.risk = v;
    }
    if let Some(v) = payload.paths {
        cli.paths = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        initial_amount: 10_000.0,
        horizon_months: 12,
        risk_tolerance: 50.0,
        monthly_contribution: 0.0,
        inflation_rate: 0.0,
        expected_return: 8.0,
        risk: 15.0,
        paths: 100,
        seed: 42,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_inputs_converts_percent_fields_to_fractions() {
        let mut cli = sample_cli();
        cli.expected_return = 8.0;
        cli.risk = 15.0;
        cli.inflation_rate = 3.0;

        let inputs = build_inputs(cli).expect("valid inputs");
        assert_approx(inputs.baseline_annual_return, 0.08);
        assert_approx(inputs.baseline_annual_risk, 0.15);
        assert_approx(inputs.annual_inflation, 0.03);
    }

    #[test]
    fn build_inputs_rejects_non_positive_initial_amount() {
        let mut cli = sample_cli();
        cli.initial_amount = 0.0;
        let err = build_inputs(cli).expect_err("must reject zero initial amount");
        assert!(err.contains("--initial-amount"));
    }

    #[test]
    fn build_inputs_rejects_out_of_range_risk_tolerance() {
        let mut cli = sample_cli();
        cli.risk_tolerance = 130.0;
        let err = build_inputs(cli).expect_err("must reject out-of-range dial");
        assert!(err.contains("--risk-tolerance"));
    }

    #[test]
    fn build_inputs_rejects_zero_paths() {
        let mut cli = sample_cli();
        cli.paths = 0;
        let err = build_inputs(cli).expect_err("must reject zero paths");
        assert!(err.contains("--paths"));
    }

    #[test]
    fn build_inputs_rejects_negative_contribution() {
        let mut cli = sample_cli();
        cli.monthly_contribution = -10.0;
        let err = build_inputs(cli).expect_err("must reject negative contribution");
        assert!(err.contains("--monthly-contribution"));
    }

    #[test]
    fn inputs_from_json_parses_web_keys() {
        let json = r#"{
          "initialAmount": 25000,
          "horizonMonths": 36,
          "riskTolerance": 70,
          "monthlyContribution": 500,
          "inflationRate": 2.5,
          "expectedReturn": 9,
          "risk": 18,
          "paths": 250,
          "seed": 7
        }"#;
        let inputs = inputs_from_json(json).expect("json should parse");

        assert_approx(inputs.initial_amount, 25_000.0);
        assert_eq!(inputs.horizon_months, 36);
        assert_approx(inputs.risk_tolerance, 70.0);
        assert_approx(inputs.monthly_contribution, 500.0);
        assert_approx(inputs.annual_inflation, 0.025);
        assert_approx(inputs.baseline_annual_return, 0.09);
        assert_approx(inputs.baseline_annual_risk, 0.18);
        assert_eq!(inputs.paths, 250);
        assert_eq!(inputs.seed, 7);
    }

    #[test]
    fn inputs_from_json_uses_defaults_for_missing_fields() {
        let inputs = inputs_from_json("{}").expect("empty payload is valid");

        assert_approx(inputs.initial_amount, 10_000.0);
        assert_eq!(inputs.horizon_months, 12);
        assert_approx(inputs.baseline_annual_return, 0.08);
        assert_approx(inputs.baseline_annual_risk, 0.15);
        assert_eq!(inputs.paths, 100);
    }

    #[test]
    fn inputs_from_json_surfaces_validation_errors() {
        let err = inputs_from_json(r#"{"initialAmount": -100}"#)
            .expect_err("must reject negative amount");
        assert!(err.contains("--initial-amount"));
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let inputs = inputs_from_json(r#"{"horizonMonths": 6, "paths": 20}"#).expect("valid");
        let projection = run_projection(&inputs).expect("projection should run");
        let response = SimulateResponse {
            horizon_months: inputs.horizon_months,
            paths: inputs.paths,
            bands: projection.bands,
            summary: projection.summary,
        };

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"horizonMonths\""));
        assert!(json.contains("\"bands\""));
        assert!(json.contains("\"optimistic\""));
        assert!(json.contains("\"expected\""));
        assert!(json.contains("\"pessimistic\""));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"expectedFinalValue\""));
        assert!(json.contains("\"profitPercentage\""));
        assert!(json.contains("\"bestCase\""));
        assert!(json.contains("\"worstCase\""));
        assert!(json.contains("\"volatilityPercent\""));
        assert!(json.contains("\"sharpeRatio\""));
    }

    #[test]
    fn simulate_response_band_count_matches_horizon() {
        let inputs = inputs_from_json(r#"{"horizonMonths": 24, "paths": 50}"#).expect("valid");
        let projection = run_projection(&inputs).expect("projection should run");
        assert_eq!(projection.bands.len(), 25);
    }
}
