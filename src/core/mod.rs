mod budget;
mod engine;
mod solver;
mod types;

pub use budget::{annualize, category_totals, project_budget};
pub use engine::{project_accumulation, project_drawdown, project_retirement};
pub use solver::{
    GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, SolveError, solve_goal,
};
pub use types::{
    AccumulationInput, AccumulationYearRecord, BudgetBaseline, BudgetGrowth, BudgetYearRecord,
    CONCESSIONAL_CONTRIBUTION_CAP, CategoryTotal, DEFAULT_DRAWDOWN_YEARS, DIVISION_293_THRESHOLD,
    DrawdownSummary, DrawdownYearRecord, EARNINGS_TAX_RATE, NON_CONCESSIONAL_CONTRIBUTION_CAP,
    PostRetirementInput, RetirementPlan, RetirementProjection, SUPER_GUARANTEE_RATE, SharedRates,
    SuperPolicy, TOTAL_SUPER_BALANCE_LIMIT, Transaction, TransactionKind,
};
