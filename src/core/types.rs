use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Superannuation guarantee rate for FY2024-25.
pub const SUPER_GUARANTEE_RATE: f64 = 0.115;
pub const CONCESSIONAL_CONTRIBUTION_CAP: f64 = 30_000.0;
pub const NON_CONCESSIONAL_CONTRIBUTION_CAP: f64 = 120_000.0;
/// Non-concessional contributions are capped at zero once the start-of-year
/// balance reaches this limit.
pub const TOTAL_SUPER_BALANCE_LIMIT: f64 = 1_900_000.0;
pub const EARNINGS_TAX_RATE: f64 = 0.15;
/// Income level above which Division 293 applies. Flagged only.
pub const DIVISION_293_THRESHOLD: f64 = 250_000.0;
pub const DEFAULT_DRAWDOWN_YEARS: u32 = 35;

/// Per-financial-year policy values. Fixed for the duration of a run.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperPolicy {
    pub guarantee_rate: f64,
    pub concessional_cap: f64,
    pub non_concessional_cap: f64,
    pub total_super_balance_limit: f64,
    pub earnings_tax_rate: f64,
    pub division_293_threshold: f64,
}

impl Default for SuperPolicy {
    fn default() -> Self {
        Self {
            guarantee_rate: SUPER_GUARANTEE_RATE,
            concessional_cap: CONCESSIONAL_CONTRIBUTION_CAP,
            non_concessional_cap: NON_CONCESSIONAL_CONTRIBUTION_CAP,
            total_super_balance_limit: TOTAL_SUPER_BALANCE_LIMIT,
            earnings_tax_rate: EARNINGS_TAX_RATE,
            division_293_threshold: DIVISION_293_THRESHOLD,
        }
    }
}

/// Pre-retirement assumptions. Rates are in percent (7.0 means 7 %).
///
/// Inputs are not validated by the projectors: callers are expected to pass
/// non-negative money amounts and `retirement_age > current_age`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_balance: f64,
    pub annual_salary: f64,
    pub voluntary_concessional_contribution: f64,
    pub voluntary_non_concessional_contribution: f64,
    pub expected_return_rate: f64,
    pub salary_growth_rate: f64,
}

impl Default for AccumulationInput {
    fn default() -> Self {
        Self {
            current_age: 30,
            retirement_age: 67,
            current_balance: 50_000.0,
            annual_salary: 80_000.0,
            voluntary_concessional_contribution: 0.0,
            voluntary_non_concessional_contribution: 0.0,
            expected_return_rate: 7.0,
            salary_growth_rate: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationYearRecord {
    pub year: i32,
    pub age: u32,
    pub starting_balance: f64,
    pub sg_contributions: f64,
    pub voluntary_concessional: f64,
    /// Amount actually contributed after the effective cap.
    pub voluntary_non_concessional: f64,
    pub total_concessional: f64,
    pub investment_returns: f64,
    pub tax_on_earnings: f64,
    pub ending_balance: f64,
    pub concessional_cap_exceeded_by: Option<f64>,
    pub non_concessional_cap_exceeded_by: Option<f64>,
}

/// Rates shared with the accumulation phase, in percent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SharedRates {
    pub return_rate: f64,
    pub inflation_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostRetirementInput {
    /// Living expenses in the first retirement year; inflated afterwards.
    pub annual_living_expenses: f64,
    /// Not inflated.
    pub other_investment_income: f64,
}

impl Default for PostRetirementInput {
    fn default() -> Self {
        Self {
            annual_living_expenses: 50_000.0,
            other_investment_income: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownYearRecord {
    pub year: i32,
    pub age: u32,
    pub starting_balance: f64,
    pub investment_returns: f64,
    pub drawdown: f64,
    pub other_income: f64,
    pub total_income: f64,
    pub shortfall: Option<f64>,
    pub ending_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownSummary {
    /// Age of the year in which the balance ran out, if it did.
    pub depleted_at_age: Option<u32>,
    pub years_projected: u32,
    /// Years without a shortfall.
    pub years_fully_funded: u32,
    pub total_shortfall: f64,
    pub final_balance: f64,
}

/// Everything needed to chain accumulation into drawdown.
#[derive(Debug, Clone, PartialEq)]
pub struct RetirementPlan {
    pub accumulation: AccumulationInput,
    pub retirement: PostRetirementInput,
    pub inflation_rate: f64,
    pub max_years: u32,
    pub start_year: i32,
    pub policy: SuperPolicy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProjection {
    pub balance_at_retirement: f64,
    pub retirement_year: i32,
    pub division_293_flag: bool,
    pub accumulation: Vec<AccumulationYearRecord>,
    pub drawdown: Vec<DrawdownYearRecord>,
    pub summary: DrawdownSummary,
}

/// Annual income and expense figures that seed a budget forecast.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetBaseline {
    pub annual_income: f64,
    pub annual_expenses: f64,
}

/// Growth rates in percent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BudgetGrowth {
    pub income_growth_rate: f64,
    pub expense_growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetYearRecord {
    pub year: u32,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: TransactionKind,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "Uncategorised".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
}
