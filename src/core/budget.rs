use std::collections::HashMap;

use super::types::{
    BudgetBaseline, BudgetGrowth, BudgetYearRecord, CategoryTotal, Transaction, TransactionKind,
};

const DAYS_PER_YEAR: f64 = 365.25;

/// Compounds income and expenses separately. Year 1 is the baseline itself.
pub fn project_budget(
    baseline: BudgetBaseline,
    growth: BudgetGrowth,
    years: u32,
) -> Vec<BudgetYearRecord> {
    let mut records = Vec::with_capacity(years as usize);
    let mut income = baseline.annual_income;
    let mut expenses = baseline.annual_expenses;

    for year in 1..=years {
        records.push(BudgetYearRecord {
            year,
            income,
            expenses,
            net: income - expenses,
        });
        income *= 1.0 + growth.income_growth_rate / 100.0;
        expenses *= 1.0 + growth.expense_growth_rate / 100.0;
    }

    records
}

/// Scales observed income and expense totals to a 365.25-day year.
///
/// The observed span is the day count between the earliest and latest
/// transaction, floored at one day so a single day of activity still
/// annualises.
pub fn annualize(transactions: &[Transaction]) -> Option<BudgetBaseline> {
    let first = transactions.iter().map(|t| t.date).min()?;
    let last = transactions.iter().map(|t| t.date).max()?;
    let span_days = (last - first).num_days().max(1) as f64;
    let scale = DAYS_PER_YEAR / span_days;

    Some(BudgetBaseline {
        annual_income: total_of(transactions, TransactionKind::Income) * scale,
        annual_expenses: total_of(transactions, TransactionKind::Expense) * scale,
    })
}

fn total_of(transactions: &[Transaction], kind: TransactionKind) -> f64 {
    transactions
        .iter()
        .filter(|t| t.kind == kind)
        .map(|t| t.amount)
        .sum()
}

/// Per-category totals for one kind, largest first.
pub fn category_totals(transactions: &[Transaction], kind: TransactionKind) -> Vec<CategoryTotal> {
    let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();
    for transaction in transactions.iter().filter(|t| t.kind == kind) {
        let entry = by_category
            .entry(transaction.category.as_str())
            .or_insert((0.0, 0));
        entry.0 += transaction.amount;
        entry.1 += 1;
    }

    let mut totals: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.to_string(),
            total,
            count,
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });
    totals
}
