use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    BracketRoom, ConversionStrategy, FilingStatus, Inputs, MonteCarloInputs, PercentileOutcome,
    TaxBracket, YearResult, bracket_room_breakdown, brackets, compute_percentiles, run_paths,
    run_simulation, standard_deduction,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFilingStatus {
    Single,
    MarriedFilingJointly,
}

impl From<CliFilingStatus> for FilingStatus {
    fn from(value: CliFilingStatus) -> Self {
        match value {
            CliFilingStatus::Single => FilingStatus::Single,
            CliFilingStatus::MarriedFilingJointly => FilingStatus::MarriedFilingJointly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliConversionStrategy {
    OneTime,
    Annual,
    BracketOptimization,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiFilingStatus {
    Single,
    #[serde(
        alias = "mfj",
        alias = "marriedFilingJointly",
        alias = "married_filing_jointly"
    )]
    MarriedFilingJointly,
}

impl From<ApiFilingStatus> for CliFilingStatus {
    fn from(value: ApiFilingStatus) -> Self {
        match value {
            ApiFilingStatus::Single => CliFilingStatus::Single,
            ApiFilingStatus::MarriedFilingJointly => CliFilingStatus::MarriedFilingJointly,
        }
    }
}

impl From<FilingStatus> for ApiFilingStatus {
    fn from(value: FilingStatus) -> Self {
        match value {
            FilingStatus::Single => ApiFilingStatus::Single,
            FilingStatus::MarriedFilingJointly => ApiFilingStatus::MarriedFilingJointly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiConversionStrategy {
    #[serde(alias = "oneTime", alias = "one_time")]
    OneTime,
    Annual,
    #[serde(alias = "bracketOptimization", alias = "bracket_optimization")]
    BracketOptimization,
}

impl From<ApiConversionStrategy> for CliConversionStrategy {
    fn from(value: ApiConversionStrategy) -> Self {
        match value {
            ApiConversionStrategy::OneTime => CliConversionStrategy::OneTime,
            ApiConversionStrategy::Annual => CliConversionStrategy::Annual,
            ApiConversionStrategy::BracketOptimization => {
                CliConversionStrategy::BracketOptimization
            }
        }
    }
}

impl From<CliConversionStrategy> for ApiConversionStrategy {
    fn from(value: CliConversionStrategy) -> Self {
        match value {
            CliConversionStrategy::OneTime => ApiConversionStrategy::OneTime,
            CliConversionStrategy::Annual => ApiConversionStrategy::Annual,
            CliConversionStrategy::BracketOptimization => {
                ApiConversionStrategy::BracketOptimization
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    age1: Option<u32>,
    age2: Option<u32>,
    filing_status: Option<ApiFilingStatus>,
    retirement_age: Option<u32>,

    traditional_balance: Option<f64>,
    roth_balance: Option<f64>,
    taxable_balance: Option<f64>,

    conversion_strategy: Option<ApiConversionStrategy>,
    one_time_conversion_amount: Option<f64>,
    annual_conversion_amount: Option<f64>,
    annual_balance_percent: Option<f64>,
    target_tax_bracket: Option<f64>,

    annual_income: Option<f64>,
    yearly_incomes: Option<Vec<Option<f64>>>,
    retirement_income: Option<f64>,

    investment_return: Option<f64>,
    taxable_yield: Option<f64>,

    simulation_years: Option<u32>,
    state_tax_rate: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "rothsim",
    about = "Roth conversion projector (bracket-aware conversions + RMDs + Monte Carlo)"
)]
struct Cli {
    #[arg(long)]
    current_age: u32,
    #[arg(long, help = "Spouse age, omit for a single-person projection")]
    spouse_age: Option<u32>,
    #[arg(long, value_enum, default_value_t = CliFilingStatus::Single)]
    filing_status: CliFilingStatus,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(long)]
    traditional_start: f64,
    #[arg(long, default_value_t = 0.0)]
    roth_start: f64,
    #[arg(long, help = "Ordinary taxable account balance, omit to skip tracking")]
    taxable_start: Option<f64>,
    #[arg(
        long,
        value_enum,
        default_value_t = CliConversionStrategy::BracketOptimization
    )]
    strategy: CliConversionStrategy,
    #[arg(
        long,
        default_value_t = 100_000.0,
        help = "Amount converted in the first year under --strategy=one-time"
    )]
    one_time_amount: f64,
    #[arg(
        long,
        default_value_t = 50_000.0,
        help = "Amount converted every year under --strategy=annual"
    )]
    annual_amount: f64,
    #[arg(
        long,
        default_value_t = 100.0,
        help = "Annual conversion ceiling as percent of the traditional balance"
    )]
    annual_balance_percent: f64,
    #[arg(
        long,
        default_value_t = 22.0,
        help = "Target marginal bracket in percent for --strategy=bracket-optimization"
    )]
    target_bracket: f64,
    #[arg(long, default_value_t = 150_000.0)]
    annual_income: f64,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Explicit incomes for the first simulated years, comma separated (max 10)"
    )]
    yearly_incomes: Vec<f64>,
    #[arg(long, default_value_t = 60_000.0)]
    retirement_income: f64,
    #[arg(
        long,
        help = "Expected annual return on retirement accounts in percent, omit to skip growth"
    )]
    growth_rate: Option<f64>,
    #[arg(
        long,
        help = "Expected annual yield on the taxable account in percent, omit to skip"
    )]
    taxable_yield: Option<f64>,
    #[arg(long, default_value_t = 30)]
    simulation_years: u32,
    #[arg(long, help = "Flat state tax rate in percent, omit to disable state tax")]
    state_tax_rate: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    filing_status: ApiFilingStatus,
    strategy: ApiConversionStrategy,
    simulation_years: u32,
    state_tax_enabled: bool,
    years: Vec<YearResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MonteCarloPayload {
    initial_traditional: Option<f64>,
    initial_roth: Option<f64>,
    years: Option<u32>,
    mean_return: Option<f64>,
    volatility: Option<f64>,
    paths: Option<u32>,
    seed: Option<u64>,
    percentiles: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonteCarloResponse {
    paths: u32,
    years: u32,
    mean_return: f64,
    volatility: f64,
    percentiles: Vec<PercentileOutcome>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BracketsQuery {
    income: Option<f64>,
    filing_status: Option<ApiFilingStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BracketsResponse {
    filing_status: ApiFilingStatus,
    standard_deduction: f64,
    income: f64,
    brackets: &'static [TaxBracket],
    rooms: Vec<BracketRoom>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

const MAX_SIMULATION_YEARS: u32 = 50;
const MAX_YEARLY_INCOMES: usize = 10;
const MAX_MONTE_CARLO_PATHS: u32 = 20_000;

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if !(18..=100).contains(&cli.current_age) {
        return Err("--current-age must be between 18 and 100".to_string());
    }

    if let Some(spouse_age) = cli.spouse_age {
        if !(18..=100).contains(&spouse_age) {
            return Err("--spouse-age must be between 18 and 100".to_string());
        }
    }

    if !(18..=120).contains(&cli.retirement_age) {
        return Err("--retirement-age must be between 18 and 120".to_string());
    }

    if cli.simulation_years == 0 || cli.simulation_years > MAX_SIMULATION_YEARS {
        return Err(format!(
            "--simulation-years must be between 1 and {MAX_SIMULATION_YEARS}"
        ));
    }

    for (name, value) in [
        ("--traditional-start", cli.traditional_start),
        ("--roth-start", cli.roth_start),
        ("--annual-income", cli.annual_income),
        ("--retirement-income", cli.retirement_income),
        ("--one-time-amount", cli.one_time_amount),
        ("--annual-amount", cli.annual_amount),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    if let Some(taxable) = cli.taxable_start {
        if !taxable.is_finite() || taxable < 0.0 {
            return Err("--taxable-start must be >= 0".to_string());
        }
    }

    if cli.yearly_incomes.len() > MAX_YEARLY_INCOMES {
        return Err(format!(
            "--yearly-incomes accepts at most {MAX_YEARLY_INCOMES} values"
        ));
    }

    for income in &cli.yearly_incomes {
        if !income.is_finite() || *income < 0.0 {
            return Err("--yearly-incomes values must be >= 0".to_string());
        }
    }

    if !(0.0..=100.0).contains(&cli.annual_balance_percent) {
        return Err("--annual-balance-percent must be between 0 and 100".to_string());
    }

    if !(0.0..=100.0).contains(&cli.target_bracket) {
        return Err("--target-bracket must be between 0 and 100".to_string());
    }

    if let Some(rate) = cli.growth_rate {
        if !rate.is_finite() || rate <= -100.0 || rate > 100.0 {
            return Err("--growth-rate must be between -100 and 100".to_string());
        }
    }

    if let Some(rate) = cli.taxable_yield {
        if !rate.is_finite() || rate <= -100.0 || rate > 100.0 {
            return Err("--taxable-yield must be between -100 and 100".to_string());
        }
    }

    if let Some(rate) = cli.state_tax_rate {
        if !(0.0..=100.0).contains(&rate) {
            return Err("--state-tax-rate must be between 0 and 100".to_string());
        }
    }

    let strategy = match cli.strategy {
        CliConversionStrategy::OneTime => ConversionStrategy::OneTime {
            amount: cli.one_time_amount,
        },
        CliConversionStrategy::Annual => ConversionStrategy::Annual {
            amount: cli.annual_amount,
            percent_of_balance: cli.annual_balance_percent / 100.0,
        },
        CliConversionStrategy::BracketOptimization => ConversionStrategy::BracketOptimization {
            target_rate: cli.target_bracket / 100.0,
        },
    };

    Ok(Inputs {
        current_age: cli.current_age,
        spouse_age: cli.spouse_age,
        filing_status: cli.filing_status.into(),
        retirement_age: cli.retirement_age,
        traditional_start: cli.traditional_start,
        roth_start: cli.roth_start,
        taxable_start: cli.taxable_start,
        strategy,
        annual_income: cli.annual_income,
        yearly_incomes: cli.yearly_incomes.iter().map(|income| Some(*income)).collect(),
        retirement_income: cli.retirement_income,
        investment_return: cli.growth_rate.map(|rate| rate / 100.0),
        taxable_yield: cli.taxable_yield.map(|rate| rate / 100.0),
        simulation_years: cli.simulation_years,
        state_tax_rate: cli.state_tax_rate.map(|rate| rate / 100.0),
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 55,
        spouse_age: None,
        filing_status: CliFilingStatus::Single,
        retirement_age: 65,
        traditional_start: 1_000_000.0,
        roth_start: 100_000.0,
        taxable_start: Some(250_000.0),
        strategy: CliConversionStrategy::BracketOptimization,
        one_time_amount: 100_000.0,
        annual_amount: 50_000.0,
        annual_balance_percent: 100.0,
        target_bracket: 22.0,
        annual_income: 150_000.0,
        yearly_incomes: Vec::new(),
        retirement_income: 60_000.0,
        growth_rate: Some(6.0),
        taxable_yield: Some(2.0),
        simulation_years: 30,
        state_tax_rate: None,
    }
}

struct ApiRequest {
    inputs: Inputs,
    strategy: CliConversionStrategy,
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.age1 {
        cli.current_age = v;
    }
    cli.spouse_age = payload.age2.or(cli.spouse_age);
    if let Some(v) = payload.filing_status {
        cli.filing_status = v.into();
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }

    if let Some(v) = payload.traditional_balance {
        cli.traditional_start = v;
    }
    if let Some(v) = payload.roth_balance {
        cli.roth_start = v;
    }
    if let Some(v) = payload.taxable_balance {
        cli.taxable_start = Some(v);
    }

    if let Some(v) = payload.conversion_strategy {
        cli.strategy = v.into();
    }
    if let Some(v) = payload.one_time_conversion_amount {
        cli.one_time_amount = v;
    }
    if let Some(v) = payload.annual_conversion_amount {
        cli.annual_amount = v;
    }
    if let Some(v) = payload.annual_balance_percent {
        cli.annual_balance_percent = v;
    }
    if let Some(v) = payload.target_tax_bracket {
        cli.target_bracket = v;
    }

    if let Some(v) = payload.annual_income {
        cli.annual_income = v;
    }
    if let Some(v) = payload.retirement_income {
        cli.retirement_income = v;
    }
    if let Some(v) = payload.investment_return {
        cli.growth_rate = Some(v);
    }
    if let Some(v) = payload.taxable_yield {
        cli.taxable_yield = Some(v);
    }
    if let Some(v) = payload.simulation_years {
        cli.simulation_years = v;
    }
    if let Some(v) = payload.state_tax_rate {
        cli.state_tax_rate = Some(v);
    }

    let strategy = cli.strategy;
    let mut inputs = build_inputs(cli)?;

    // The JSON payload can leave holes in the yearly income schedule, which
    // the flat CLI list cannot express.
    if let Some(yearly) = payload.yearly_incomes {
        if yearly.len() > MAX_YEARLY_INCOMES {
            return Err(format!(
                "yearlyIncomes accepts at most {MAX_YEARLY_INCOMES} values"
            ));
        }
        for income in yearly.iter().flatten() {
            if !income.is_finite() || *income < 0.0 {
                return Err("yearlyIncomes values must be >= 0".to_string());
            }
        }
        inputs.yearly_incomes = yearly;
    }

    Ok(ApiRequest { inputs, strategy })
}

fn build_monte_carlo_inputs(
    payload: MonteCarloPayload,
) -> Result<(MonteCarloInputs, Vec<f64>), String> {
    let inputs = MonteCarloInputs {
        initial_traditional: payload.initial_traditional.unwrap_or(1_000_000.0),
        initial_roth: payload.initial_roth.unwrap_or(100_000.0),
        years: payload.years.unwrap_or(30),
        mean_return: payload.mean_return.unwrap_or(7.0) / 100.0,
        volatility: payload.volatility.unwrap_or(15.0) / 100.0,
        paths: payload.paths.unwrap_or(1_000),
        seed: payload.seed.unwrap_or(42),
    };

    if !inputs.initial_traditional.is_finite() || inputs.initial_traditional < 0.0 {
        return Err("initialTraditional must be >= 0".to_string());
    }

    if !inputs.initial_roth.is_finite() || inputs.initial_roth < 0.0 {
        return Err("initialRoth must be >= 0".to_string());
    }

    if inputs.years == 0 || inputs.years > MAX_SIMULATION_YEARS {
        return Err(format!(
            "years must be between 1 and {MAX_SIMULATION_YEARS}"
        ));
    }

    if inputs.paths == 0 || inputs.paths > MAX_MONTE_CARLO_PATHS {
        return Err(format!(
            "paths must be between 1 and {MAX_MONTE_CARLO_PATHS}"
        ));
    }

    if !inputs.mean_return.is_finite() || inputs.mean_return <= -1.0 {
        return Err("meanReturn must be > -100".to_string());
    }

    if !inputs.volatility.is_finite() || inputs.volatility < 0.0 {
        return Err("volatility must be >= 0".to_string());
    }

    let percentiles = payload
        .percentiles
        .unwrap_or_else(|| vec![10.0, 25.0, 50.0, 75.0, 90.0]);
    for percentile in &percentiles {
        if !(0.0..=100.0).contains(percentile) {
            return Err("percentiles must be between 0 and 100".to_string());
        }
    }

    Ok((inputs, percentiles))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/montecarlo",
            get(monte_carlo_get_handler).post(monte_carlo_post_handler),
        )
        .route("/api/brackets", get(brackets_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("Roth conversion API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let years = run_simulation(&request.inputs);
    let response = SimulateResponse {
        filing_status: request.inputs.filing_status.into(),
        strategy: request.strategy.into(),
        simulation_years: request.inputs.simulation_years,
        state_tax_enabled: request.inputs.state_tax_rate.is_some(),
        years,
    };

    json_response(StatusCode::OK, response)
}

async fn monte_carlo_get_handler(Query(payload): Query<MonteCarloPayload>) -> Response {
    monte_carlo_handler_impl(payload)
}

async fn monte_carlo_post_handler(Json(payload): Json<MonteCarloPayload>) -> Response {
    monte_carlo_handler_impl(payload)
}

fn monte_carlo_handler_impl(payload: MonteCarloPayload) -> Response {
    let (inputs, requested) = match build_monte_carlo_inputs(payload) {
        Ok(built) => built,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let mut outcomes = run_paths(&inputs);
    let percentiles = compute_percentiles(&mut outcomes, &requested);
    let response = MonteCarloResponse {
        paths: inputs.paths,
        years: inputs.years,
        mean_return: inputs.mean_return,
        volatility: inputs.volatility,
        percentiles,
    };

    json_response(StatusCode::OK, response)
}

async fn brackets_handler(Query(query): Query<BracketsQuery>) -> Response {
    let income = query.income.unwrap_or(0.0);
    if !income.is_finite() || income < 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "income must be >= 0");
    }

    let filing_status = match query.filing_status.unwrap_or(ApiFilingStatus::Single) {
        ApiFilingStatus::Single => FilingStatus::Single,
        ApiFilingStatus::MarriedFilingJointly => FilingStatus::MarriedFilingJointly,
    };

    let response = BracketsResponse {
        filing_status: filing_status.into(),
        standard_deduction: standard_deduction(filing_status),
        income,
        brackets: brackets(filing_status),
        rooms: bracket_room_breakdown(income, filing_status),
    };

    json_response(StatusCode::OK, response)
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
