use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Local};
use clap::Parser;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    AccumulationInput, AccumulationYearRecord, BudgetBaseline, BudgetGrowth, BudgetYearRecord,
    CategoryTotal, DEFAULT_DRAWDOWN_YEARS, DrawdownSummary, DrawdownYearRecord, GoalSolveConfig,
    GoalType, PostRetirementInput, RetirementPlan, RetirementProjection, SolveError, SuperPolicy,
    Transaction, TransactionKind, annualize, category_totals, project_budget, project_retirement,
    solve_goal,
};

const MAX_AGE: u32 = 120;
const MAX_HORIZON_YEARS: u32 = 100;
const MIN_START_YEAR: i32 = 1900;
const MAX_START_YEAR: i32 = 3000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("--retirement-age must be > --current-age")]
    RetirementAgeNotAfterCurrentAge,
    #[error("{flag} must be <= 120")]
    AgeOutOfRange { flag: &'static str },
    #[error("{flag} must be >= 0")]
    NegativeAmount { flag: &'static str },
    #[error("{flag} must be > -100")]
    RateTooLow { flag: &'static str },
    #[error("{flag} must be between 0 and 100")]
    PercentOutOfRange { flag: &'static str },
    #[error("--max-years must be between 1 and 100")]
    InvalidHorizon,
    #[error("--start-year must be between 1900 and 3000")]
    StartYearOutOfRange,
    #[error("years must be between 1 and 100")]
    InvalidBudgetYears,
    #[error("annualIncome and annualExpenses are required when no transactions are given")]
    MissingBudgetBaseline,
    #[error(transparent)]
    Solve(#[from] SolveError),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Parse(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to encode projection: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "superforecast",
    about = "Superannuation accumulation and retirement drawdown projector (Australian rules)"
)]
struct Cli {
    #[arg(long, default_value_t = 30)]
    current_age: u32,
    #[arg(long, default_value_t = 67)]
    retirement_age: u32,
    #[arg(long, default_value_t = 50_000.0, help = "Current super balance")]
    current_balance: f64,
    #[arg(long, default_value_t = 80_000.0, help = "Gross annual salary")]
    annual_salary: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual pre-tax voluntary contribution (salary sacrifice), not indexed"
    )]
    voluntary_concessional: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual post-tax voluntary contribution")]
    voluntary_non_concessional: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        allow_negative_numbers = true,
        help = "Expected annual return in percent, used in both phases"
    )]
    return_rate: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        allow_negative_numbers = true,
        help = "Annual salary growth in percent"
    )]
    salary_growth_rate: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        allow_negative_numbers = true,
        help = "Annual inflation of living expenses in retirement, in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 50_000.0,
        help = "Living expenses in the first retirement year"
    )]
    living_expenses: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Other annual investment income in retirement (not inflated)"
    )]
    other_income: f64,
    #[arg(long, default_value_t = DEFAULT_DRAWDOWN_YEARS, help = "Drawdown horizon in years")]
    max_years: u32,
    #[arg(long, help = "Calendar year of the first projected year; defaults to this year")]
    start_year: Option<i32>,
    #[arg(
        long,
        default_value_t = 11.5,
        help = "Superannuation guarantee rate in percent"
    )]
    guarantee_rate: f64,
    #[arg(long, default_value_t = 30_000.0)]
    concessional_cap: f64,
    #[arg(long, default_value_t = 120_000.0)]
    non_concessional_cap: f64,
    #[arg(
        long,
        default_value_t = 1_900_000.0,
        help = "Balance at which the non-concessional cap drops to zero"
    )]
    total_super_balance_limit: f64,
    #[arg(long, default_value_t = 15.0, help = "Tax on fund earnings in percent")]
    earnings_tax_rate: f64,
    #[arg(long, default_value_t = 250_000.0)]
    division_293_threshold: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RetirementPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    current_balance: Option<f64>,
    annual_salary: Option<f64>,
    voluntary_concessional: Option<f64>,
    voluntary_non_concessional: Option<f64>,
    return_rate: Option<f64>,
    salary_growth: Option<f64>,
    inflation_rate: Option<f64>,
    living_expenses: Option<f64>,
    other_income: Option<f64>,
    max_years: Option<u32>,
    start_year: Option<i32>,

    guarantee_rate: Option<f64>,
    concessional_cap: Option<f64>,
    non_concessional_cap: Option<f64>,
    total_super_balance_limit: Option<f64>,
    earnings_tax_rate: Option<f64>,
    #[serde(alias = "div293Threshold")]
    division_293_threshold: Option<f64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGoalType {
    #[serde(alias = "requiredContribution", alias = "required_contribution")]
    RequiredContribution,
    #[serde(
        alias = "maxLivingExpenses",
        alias = "max_living_expenses",
        alias = "max-expenses"
    )]
    MaxLivingExpenses,
}

impl From<ApiGoalType> for GoalType {
    fn from(value: ApiGoalType) -> Self {
        match value {
            ApiGoalType::RequiredContribution => GoalType::RequiredContribution,
            ApiGoalType::MaxLivingExpenses => GoalType::MaxLivingExpenses,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GoalPayload {
    #[serde(flatten)]
    plan: RetirementPayload,
    goal: Option<ApiGoalType>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BudgetPayload {
    annual_income: Option<f64>,
    annual_expenses: Option<f64>,
    income_growth: Option<f64>,
    expense_growth: Option<f64>,
    years: Option<u32>,
    transactions: Option<Vec<Transaction>>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum BaselineSource {
    Manual,
    Transactions,
}

#[derive(Debug)]
struct BudgetRequest {
    baseline: BudgetBaseline,
    source: BaselineSource,
    growth: BudgetGrowth,
    years: u32,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetirementResponse {
    start_year: i32,
    retirement_year: i32,
    balance_at_retirement: f64,
    division_293_flag: bool,
    policy: SuperPolicy,
    summary: DrawdownSummary,
    accumulation_years: Vec<AccumulationYearRecord>,
    drawdown_years: Vec<DrawdownYearRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetResponse {
    baseline_source: BaselineSource,
    baseline: BudgetBaseline,
    years: Vec<BudgetYearRecord>,
    income_categories: Vec<CategoryTotal>,
    expense_categories: Vec<CategoryTotal>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn current_year() -> i32 {
    Local::now().year()
}

fn build_plan(cli: Cli) -> Result<RetirementPlan, InputError> {
    if cli.current_age > MAX_AGE {
        return Err(InputError::AgeOutOfRange {
            flag: "--current-age",
        });
    }

    if cli.retirement_age > MAX_AGE {
        return Err(InputError::AgeOutOfRange {
            flag: "--retirement-age",
        });
    }

    if cli.retirement_age <= cli.current_age {
        return Err(InputError::RetirementAgeNotAfterCurrentAge);
    }

    for (flag, amount) in [
        ("--current-balance", cli.current_balance),
        ("--annual-salary", cli.annual_salary),
        ("--voluntary-concessional", cli.voluntary_concessional),
        ("--voluntary-non-concessional", cli.voluntary_non_concessional),
        ("--living-expenses", cli.living_expenses),
        ("--other-income", cli.other_income),
        ("--concessional-cap", cli.concessional_cap),
        ("--non-concessional-cap", cli.non_concessional_cap),
        ("--total-super-balance-limit", cli.total_super_balance_limit),
        ("--division-293-threshold", cli.division_293_threshold),
    ] {
        check_amount(flag, amount)?;
    }

    for (flag, rate) in [
        ("--return-rate", cli.return_rate),
        ("--salary-growth-rate", cli.salary_growth_rate),
        ("--inflation-rate", cli.inflation_rate),
    ] {
        check_growth_rate(flag, rate)?;
    }

    for (flag, rate) in [
        ("--guarantee-rate", cli.guarantee_rate),
        ("--earnings-tax-rate", cli.earnings_tax_rate),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(InputError::PercentOutOfRange { flag });
        }
    }

    if cli.max_years == 0 || cli.max_years > MAX_HORIZON_YEARS {
        return Err(InputError::InvalidHorizon);
    }

    let start_year = cli.start_year.unwrap_or_else(current_year);
    if !(MIN_START_YEAR..=MAX_START_YEAR).contains(&start_year) {
        return Err(InputError::StartYearOutOfRange);
    }

    Ok(RetirementPlan {
        accumulation: AccumulationInput {
            current_age: cli.current_age,
            retirement_age: cli.retirement_age,
            current_balance: cli.current_balance,
            annual_salary: cli.annual_salary,
            voluntary_concessional_contribution: cli.voluntary_concessional,
            voluntary_non_concessional_contribution: cli.voluntary_non_concessional,
            expected_return_rate: cli.return_rate,
            salary_growth_rate: cli.salary_growth_rate,
        },
        retirement: PostRetirementInput {
            annual_living_expenses: cli.living_expenses,
            other_investment_income: cli.other_income,
        },
        inflation_rate: cli.inflation_rate,
        max_years: cli.max_years,
        start_year,
        policy: SuperPolicy {
            guarantee_rate: cli.guarantee_rate / 100.0,
            concessional_cap: cli.concessional_cap,
            non_concessional_cap: cli.non_concessional_cap,
            total_super_balance_limit: cli.total_super_balance_limit,
            earnings_tax_rate: cli.earnings_tax_rate / 100.0,
            division_293_threshold: cli.division_293_threshold,
        },
    })
}

fn check_amount(flag: &'static str, amount: f64) -> Result<(), InputError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(InputError::NegativeAmount { flag });
    }
    Ok(())
}

fn check_growth_rate(flag: &'static str, rate: f64) -> Result<(), InputError> {
    if !rate.is_finite() || rate <= -100.0 {
        return Err(InputError::RateTooLow { flag });
    }
    Ok(())
}

/// Runs the chained projection from command-line flags and returns the
/// pretty-printed JSON report.
pub fn run_cli<I, T>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let plan = build_plan(cli)?;
    let projection = project_retirement(&plan);
    let response = build_retirement_response(&plan, projection);
    Ok(serde_json::to_string_pretty(&response)?)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/retirement",
            get(retirement_get_handler).post(retirement_post_handler),
        )
        .route("/api/sustainable-spend", post(goal_handler))
        .route("/api/budget", post(budget_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("superforecast HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/health");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn retirement_get_handler(Query(payload): Query<RetirementPayload>) -> Response {
    retirement_handler_impl(payload).await
}

async fn retirement_post_handler(Json(payload): Json<RetirementPayload>) -> Response {
    retirement_handler_impl(payload).await
}

async fn retirement_handler_impl(payload: RetirementPayload) -> Response {
    debug!("retirement projection requested");
    let plan = match plan_from_payload(payload) {
        Ok(plan) => plan,
        Err(err) => return rejected(err),
    };

    let projection = project_retirement(&plan);
    json_response(StatusCode::OK, build_retirement_response(&plan, projection))
}

async fn goal_handler(Json(payload): Json<GoalPayload>) -> Response {
    debug!("goal solve requested");
    let (plan, config) = match goal_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return rejected(err),
    };

    match solve_goal(&plan, config) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => rejected(err.into()),
    }
}

async fn budget_handler(Json(payload): Json<BudgetPayload>) -> Response {
    debug!("budget projection requested");
    let request = match budget_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return rejected(err),
    };

    json_response(StatusCode::OK, build_budget_response(&request))
}

fn rejected(err: InputError) -> Response {
    warn!("rejected request: {err}");
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
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
fn plan_from_json(json: &str) -> Result<RetirementPlan, String> {
    let payload = serde_json::from_str::<RetirementPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    plan_from_payload(payload).map_err(|e| e.to_string())
}

fn plan_from_payload(payload: RetirementPayload) -> Result<RetirementPlan, InputError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.current_balance {
        cli.current_balance = v;
    }
    if let Some(v) = payload.annual_salary {
        cli.annual_salary = v;
    }
    if let Some(v) = payload.voluntary_concessional {
        cli.voluntary_concessional = v;
    }
    if let Some(v) = payload.voluntary_non_concessional {
        cli.voluntary_non_concessional = v;
    }
    if let Some(v) = payload.return_rate {
        cli.return_rate = v;
    }
    if let Some(v) = payload.salary_growth {
        cli.salary_growth_rate = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.living_expenses {
        cli.living_expenses = v;
    }
    if let Some(v) = payload.other_income {
        cli.other_income = v;
    }
    if let Some(v) = payload.max_years {
        cli.max_years = v;
    }
    if let Some(v) = payload.start_year {
        cli.start_year = Some(v);
    }

    if let Some(v) = payload.guarantee_rate {
        cli.guarantee_rate = v;
    }
    if let Some(v) = payload.concessional_cap {
        cli.concessional_cap = v;
    }
    if let Some(v) = payload.non_concessional_cap {
        cli.non_concessional_cap = v;
    }
    if let Some(v) = payload.total_super_balance_limit {
        cli.total_super_balance_limit = v;
    }
    if let Some(v) = payload.earnings_tax_rate {
        cli.earnings_tax_rate = v;
    }
    if let Some(v) = payload.division_293_threshold {
        cli.division_293_threshold = v;
    }

    build_plan(cli)
}

fn goal_request_from_payload(
    payload: GoalPayload,
) -> Result<(RetirementPlan, GoalSolveConfig), InputError> {
    let plan = plan_from_payload(payload.plan)?;
    let goal_type = payload
        .goal
        .map(GoalType::from)
        .unwrap_or(GoalType::MaxLivingExpenses);
    let default_max = match goal_type {
        GoalType::RequiredContribution => plan.policy.concessional_cap,
        GoalType::MaxLivingExpenses => 500_000.0,
    };

    let config = GoalSolveConfig {
        goal_type,
        search_min: payload.search_min.unwrap_or(0.0),
        search_max: payload.search_max.unwrap_or(default_max),
        tolerance: payload.tolerance.unwrap_or(10.0),
        max_iterations: payload.max_iterations.unwrap_or(60),
    };
    Ok((plan, config))
}

fn budget_request_from_payload(payload: BudgetPayload) -> Result<BudgetRequest, InputError> {
    let income_growth = payload.income_growth.unwrap_or(3.0);
    let expense_growth = payload.expense_growth.unwrap_or(2.5);
    check_growth_rate("incomeGrowth", income_growth)?;
    check_growth_rate("expenseGrowth", expense_growth)?;

    let years = payload.years.unwrap_or(10);
    if years == 0 || years > MAX_HORIZON_YEARS {
        return Err(InputError::InvalidBudgetYears);
    }

    let transactions = payload.transactions.unwrap_or_default();
    for transaction in &transactions {
        check_amount("transactions[].amount", transaction.amount)?;
    }

    let (baseline, source) = match annualize(&transactions) {
        Some(baseline) => (baseline, BaselineSource::Transactions),
        None => {
            let (Some(annual_income), Some(annual_expenses)) =
                (payload.annual_income, payload.annual_expenses)
            else {
                return Err(InputError::MissingBudgetBaseline);
            };
            check_amount("annualIncome", annual_income)?;
            check_amount("annualExpenses", annual_expenses)?;
            (
                BudgetBaseline {
                    annual_income,
                    annual_expenses,
                },
                BaselineSource::Manual,
            )
        }
    };

    Ok(BudgetRequest {
        baseline,
        source,
        growth: BudgetGrowth {
            income_growth_rate: income_growth,
            expense_growth_rate: expense_growth,
        },
        years,
        transactions,
    })
}

fn default_cli_for_api() -> Cli {
    let accumulation = AccumulationInput::default();
    let retirement = PostRetirementInput::default();
    let policy = SuperPolicy::default();
    Cli {
        current_age: accumulation.current_age,
        retirement_age: accumulation.retirement_age,
        current_balance: accumulation.current_balance,
        annual_salary: accumulation.annual_salary,
        voluntary_concessional: accumulation.voluntary_concessional_contribution,
        voluntary_non_concessional: accumulation.voluntary_non_concessional_contribution,
        return_rate: accumulation.expected_return_rate,
        salary_growth_rate: accumulation.salary_growth_rate,
        inflation_rate: 2.5,
        living_expenses: retirement.annual_living_expenses,
        other_income: retirement.other_investment_income,
        max_years: DEFAULT_DRAWDOWN_YEARS,
        start_year: None,
        guarantee_rate: policy.guarantee_rate * 100.0,
        concessional_cap: policy.concessional_cap,
        non_concessional_cap: policy.non_concessional_cap,
        total_super_balance_limit: policy.total_super_balance_limit,
        earnings_tax_rate: policy.earnings_tax_rate * 100.0,
        division_293_threshold: policy.division_293_threshold,
    }
}

fn build_retirement_response(
    plan: &RetirementPlan,
    projection: RetirementProjection,
) -> RetirementResponse {
    RetirementResponse {
        start_year: plan.start_year,
        retirement_year: projection.retirement_year,
        balance_at_retirement: projection.balance_at_retirement,
        division_293_flag: projection.division_293_flag,
        policy: plan.policy,
        summary: projection.summary,
        accumulation_years: projection.accumulation,
        drawdown_years: projection.drawdown,
    }
}

fn build_budget_response(request: &BudgetRequest) -> BudgetResponse {
    BudgetResponse {
        baseline_source: request.source,
        baseline: request.baseline,
        years: project_budget(request.baseline, request.growth, request.years),
        income_categories: category_totals(&request.transactions, TransactionKind::Income),
        expense_categories: category_totals(&request.transactions, TransactionKind::Expense),
    }
}
