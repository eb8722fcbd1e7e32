use log::{debug, trace};

use super::types::{
    AccumulationInput, AccumulationYearRecord, DrawdownSummary, DrawdownYearRecord,
    PostRetirementInput, RetirementPlan, RetirementProjection, SharedRates, SuperPolicy,
};

/// Projects the superannuation balance for every age from `current_age` up to
/// (but excluding) `retirement_age`.
///
/// The input is trusted as given: negative rates and amounts flow through the
/// arithmetic unchanged and `retirement_age <= current_age` yields an empty
/// sequence. Cap breaches are reported on the record, never enforced on
/// concessional contributions.
pub fn project_accumulation(
    input: &AccumulationInput,
    policy: &SuperPolicy,
    start_year: i32,
) -> Vec<AccumulationYearRecord> {
    if input.retirement_age <= input.current_age {
        return Vec::new();
    }

    let years = input.retirement_age - input.current_age;
    let mut records = Vec::with_capacity(years as usize);
    let mut balance = input.current_balance;
    let mut salary = input.annual_salary;

    for offset in 0..years {
        let record = accumulate_year(
            input,
            policy,
            start_year + offset as i32,
            input.current_age + offset,
            balance,
            salary,
        );
        trace!(
            "accumulation age {}: {:.2} -> {:.2}",
            record.age, record.starting_balance, record.ending_balance
        );
        balance = record.ending_balance;
        // Contributions use start-of-year salary; growth applies afterwards.
        salary *= 1.0 + input.salary_growth_rate / 100.0;
        records.push(record);
    }

    records
}

fn accumulate_year(
    input: &AccumulationInput,
    policy: &SuperPolicy,
    year: i32,
    age: u32,
    starting_balance: f64,
    salary: f64,
) -> AccumulationYearRecord {
    let sg_contributions = salary * policy.guarantee_rate;
    let voluntary_concessional = input.voluntary_concessional_contribution;
    let total_concessional = sg_contributions + voluntary_concessional;
    let concessional_cap_exceeded_by = excess_over(total_concessional, policy.concessional_cap);

    let non_concessional_cap = effective_non_concessional_cap(starting_balance, policy);
    let requested_non_concessional = input.voluntary_non_concessional_contribution;
    let voluntary_non_concessional = requested_non_concessional.min(non_concessional_cap);
    let non_concessional_cap_exceeded_by =
        excess_over(requested_non_concessional, non_concessional_cap);

    let balance_before_returns =
        starting_balance + total_concessional + voluntary_non_concessional;
    let investment_returns = balance_before_returns * (input.expected_return_rate / 100.0);
    let tax_on_earnings = earnings_tax(investment_returns, policy);
    let ending_balance = balance_before_returns + investment_returns - tax_on_earnings;

    AccumulationYearRecord {
        year,
        age,
        starting_balance,
        sg_contributions,
        voluntary_concessional,
        voluntary_non_concessional,
        total_concessional,
        investment_returns,
        tax_on_earnings,
        ending_balance,
        concessional_cap_exceeded_by,
        non_concessional_cap_exceeded_by,
    }
}

/// Standard cap, or nothing once the start-of-year balance reaches the total
/// super balance limit.
fn effective_non_concessional_cap(starting_balance: f64, policy: &SuperPolicy) -> f64 {
    if starting_balance >= policy.total_super_balance_limit {
        0.0
    } else {
        policy.non_concessional_cap
    }
}

/// Negative returns carry no offset.
fn earnings_tax(investment_returns: f64, policy: &SuperPolicy) -> f64 {
    if investment_returns > 0.0 {
        investment_returns * policy.earnings_tax_rate
    } else {
        0.0
    }
}

fn excess_over(amount: f64, limit: f64) -> Option<f64> {
    (amount > limit).then(|| amount - limit)
}

/// Draws living expenses from the fund year by year, starting at
/// `retirement_age` in calendar year `start_year`.
///
/// Returns at most `max_years` records. The sequence stops early with the
/// first year whose ending balance reaches zero, so a final record with
/// `ending_balance <= 0` marks depletion at that record's age. Returns are
/// untaxed in this phase and other income is not inflated.
pub fn project_drawdown(
    starting_balance: f64,
    retirement_age: u32,
    rates: SharedRates,
    input: &PostRetirementInput,
    max_years: u32,
    start_year: i32,
) -> Vec<DrawdownYearRecord> {
    let mut records = Vec::with_capacity(max_years.min(128) as usize);
    let mut balance = starting_balance;
    let mut living_expenses = input.annual_living_expenses;
    let other_income = input.other_investment_income;

    for offset in 0..max_years {
        let investment_returns = balance * (rates.return_rate / 100.0);
        let available = balance + investment_returns;
        let desired_drawdown = (living_expenses - other_income).max(0.0);
        let drawdown = desired_drawdown.min(available).max(0.0);
        let ending_balance = (available - drawdown).max(0.0);
        let total_income = drawdown + other_income;

        records.push(DrawdownYearRecord {
            year: start_year + offset as i32,
            age: retirement_age + offset,
            starting_balance: balance,
            investment_returns,
            drawdown,
            other_income,
            total_income,
            shortfall: excess_over(living_expenses, total_income),
            ending_balance,
        });

        if ending_balance <= 0.0 {
            debug!(
                "drawdown depleted at age {} after {} years",
                retirement_age + offset,
                offset + 1
            );
            break;
        }

        balance = ending_balance;
        living_expenses *= 1.0 + rates.inflation_rate / 100.0;
    }

    records
}

impl DrawdownSummary {
    pub fn from_records(records: &[DrawdownYearRecord]) -> Self {
        let last = records.last();
        Self {
            depleted_at_age: last
                .filter(|record| record.ending_balance <= 0.0)
                .map(|record| record.age),
            years_projected: records.len() as u32,
            years_fully_funded: records
                .iter()
                .filter(|record| record.shortfall.is_none())
                .count() as u32,
            total_shortfall: records.iter().filter_map(|record| record.shortfall).sum(),
            final_balance: last.map_or(0.0, |record| record.ending_balance),
        }
    }
}

/// Runs accumulation, then feeds the balance at retirement into drawdown.
pub fn project_retirement(plan: &RetirementPlan) -> RetirementProjection {
    let accumulation_input = &plan.accumulation;
    let accumulation = project_accumulation(accumulation_input, &plan.policy, plan.start_year);
    let balance_at_retirement = accumulation
        .last()
        .map_or(accumulation_input.current_balance, |record| {
            record.ending_balance
        });

    let retirement_year = plan.start_year + accumulation.len() as i32;
    let rates = SharedRates {
        return_rate: accumulation_input.expected_return_rate,
        inflation_rate: plan.inflation_rate,
    };
    let drawdown = project_drawdown(
        balance_at_retirement,
        accumulation_input.retirement_age,
        rates,
        &plan.retirement,
        plan.max_years,
        retirement_year,
    );
    let summary = DrawdownSummary::from_records(&drawdown);

    debug!(
        "retirement projection: {} accumulation years, balance at retirement {:.2}, depleted at {:?}",
        accumulation.len(),
        balance_at_retirement,
        summary.depleted_at_age
    );

    RetirementProjection {
        balance_at_retirement,
        retirement_year,
        division_293_flag: exceeds_division_293_threshold(accumulation_input, &plan.policy),
        accumulation,
        drawdown,
        summary,
    }
}

/// Salary plus first-year concessional contributions against the Division
/// 293 threshold. No extra tax is computed.
fn exceeds_division_293_threshold(input: &AccumulationInput, policy: &SuperPolicy) -> bool {
    let concessional =
        input.annual_salary * policy.guarantee_rate + input.voluntary_concessional_contribution;
    input.annual_salary + concessional > policy.division_293_threshold
}
