use log::debug;
use serde::Serialize;
use thiserror::Error;

use super::{DrawdownSummary, RetirementPlan, project_retirement};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalType {
    /// Smallest voluntary concessional contribution that funds the horizon.
    RequiredContribution,
    /// Largest first-year living expenses the fund sustains.
    MaxLivingExpenses,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub funded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub solved_summary: Option<DrawdownSummary>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("search bounds must be finite")]
    NonFiniteBounds,
    #[error("search_max must be greater than search_min")]
    InvertedBounds,
    #[error("search_min must be >= 0")]
    NegativeLowerBound,
    #[error("tolerance must be > 0")]
    InvalidTolerance,
    #[error("max_iterations must be > 0")]
    NoIterations,
    #[error("max_years must be > 0")]
    EmptyHorizon,
}

/// Bisects a single plan input until the drawdown is fully funded through
/// `plan.max_years`: every year projected and none with a shortfall.
pub fn solve_goal(
    plan: &RetirementPlan,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult, SolveError> {
    validate_config(plan, config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_funded = evaluate_candidate(plan, config, config.search_min).funded;
    let high_funded = evaluate_candidate(plan, config, config.search_max).funded;

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    match config.goal_type {
        GoalType::RequiredContribution => {
            if low_funded {
                solved_value = Some(config.search_min);
                converged = true;
                feasible = true;
                message = "Already funded at lower contribution bound.".to_string();
            } else if !high_funded {
                feasible = false;
                message = "No funding contribution found within the search bounds.".to_string();
            } else {
                let (value, done) = bisect(plan, config, true, &mut iterations);
                solved_value = Some(value);
                converged = done;
                feasible = true;
                message = solved_message(done, "Solved required voluntary contribution.");
            }
        }
        GoalType::MaxLivingExpenses => {
            if !low_funded {
                feasible = false;
                message =
                    "No sustainable expense level found within the search bounds.".to_string();
            } else if high_funded {
                solved_value = Some(config.search_max);
                converged = true;
                feasible = true;
                message =
                    "Upper expense bound is still funded; increase search max for a higher figure."
                        .to_string();
            } else {
                let (value, done) = bisect(plan, config, false, &mut iterations);
                solved_value = Some(value);
                converged = done;
                feasible = true;
                message = solved_message(done, "Solved maximum sustainable living expenses.");
            }
        }
    }

    let solved_summary = solved_value.map(|value| evaluate_candidate(plan, config, value).summary);
    debug!(
        "goal {:?} solved to {:?} after {} iterations",
        config.goal_type,
        solved_value,
        iterations.len()
    );

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        solved_summary,
        iterations,
        converged,
        feasible,
        message,
    })
}

/// Narrows `[search_min, search_max]` around the funded/unfunded boundary.
///
/// With `funded_moves_hi` a funded midpoint becomes the new upper bound and
/// the upper bound is returned (smallest funded value); otherwise a funded
/// midpoint raises the lower bound and the lower bound is returned (largest
/// funded value). The flag reports whether the bracket shrank to `tolerance`.
fn bisect(
    plan: &RetirementPlan,
    config: GoalSolveConfig,
    funded_moves_hi: bool,
    iterations: &mut Vec<GoalSolveIteration>,
) -> (f64, bool) {
    let mut lo = config.search_min;
    let mut hi = config.search_max;
    let mut converged = false;

    for iteration in 1..=config.max_iterations {
        let mid = (lo + hi) * 0.5;
        let funded = evaluate_candidate(plan, config, mid).funded;
        iterations.push(GoalSolveIteration {
            iteration,
            lower_bound: lo,
            upper_bound: hi,
            candidate_value: mid,
            funded,
        });

        if funded == funded_moves_hi {
            hi = mid;
        } else {
            lo = mid;
        }

        if (hi - lo).abs() <= config.tolerance {
            converged = true;
            break;
        }
    }

    (if funded_moves_hi { hi } else { lo }, converged)
}

fn solved_message(converged: bool, solved: &str) -> String {
    if converged {
        solved.to_string()
    } else {
        "Reached max iterations before tolerance was met; returning best estimate.".to_string()
    }
}

struct CandidateEval {
    funded: bool,
    summary: DrawdownSummary,
}

fn evaluate_candidate(
    base_plan: &RetirementPlan,
    config: GoalSolveConfig,
    candidate_value: f64,
) -> CandidateEval {
    let mut plan = base_plan.clone();
    match config.goal_type {
        GoalType::RequiredContribution => {
            plan.accumulation.voluntary_concessional_contribution = candidate_value.max(0.0);
        }
        GoalType::MaxLivingExpenses => {
            plan.retirement.annual_living_expenses = candidate_value.max(0.0);
        }
    }

    let summary = project_retirement(&plan).summary;
    CandidateEval {
        funded: summary.years_fully_funded == plan.max_years,
        summary,
    }
}

fn validate_config(plan: &RetirementPlan, config: GoalSolveConfig) -> Result<(), SolveError> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SolveError::NonFiniteBounds);
    }
    if config.search_max <= config.search_min {
        return Err(SolveError::InvertedBounds);
    }
    if config.search_min < 0.0 {
        return Err(SolveError::NegativeLowerBound);
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SolveError::InvalidTolerance);
    }
    if config.max_iterations == 0 {
        return Err(SolveError::NoIterations);
    }
    if plan.max_years == 0 {
        return Err(SolveError::EmptyHorizon);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AccumulationInput, PostRetirementInput, SuperPolicy};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    /// One accumulation year with no growth, then a flat drawdown.
    fn deterministic_plan() -> RetirementPlan {
        RetirementPlan {
            accumulation: AccumulationInput {
                current_age: 66,
                retirement_age: 67,
                current_balance: 100_000.0,
                annual_salary: 0.0,
                voluntary_concessional_contribution: 0.0,
                voluntary_non_concessional_contribution: 0.0,
                expected_return_rate: 0.0,
                salary_growth_rate: 0.0,
            },
            retirement: PostRetirementInput {
                annual_living_expenses: 10_000.0,
                other_investment_income: 0.0,
            },
            inflation_rate: 0.0,
            max_years: 10,
            start_year: 2025,
            policy: SuperPolicy::default(),
        }
    }

    fn config(goal_type: GoalType, search_max: f64) -> GoalSolveConfig {
        GoalSolveConfig {
            goal_type,
            search_min: 0.0,
            search_max,
            tolerance: 1.0,
            max_iterations: 40,
        }
    }

    #[test]
    fn max_expenses_solver_finds_deterministic_solution() {
        let mut plan = deterministic_plan();
        plan.accumulation.current_balance = 200_000.0;

        let result = solve_goal(&plan, config(GoalType::MaxLivingExpenses, 100_000.0))
            .expect("must solve");

        assert!(result.feasible);
        assert!(result.converged);
        // 200k over 10 flat years; the last year may drain the fund to zero.
        let solved = result.solved_value.expect("value expected");
        assert_close(solved, 20_000.0, 1.0);
        assert!(solved <= 20_000.0);
        let summary = result.solved_summary.expect("summary expected");
        assert_eq!(summary.years_fully_funded, 10);
    }

    #[test]
    fn required_contribution_solver_finds_deterministic_solution() {
        let mut plan = deterministic_plan();
        plan.accumulation.current_balance = 80_000.0;

        let result = solve_goal(&plan, config(GoalType::RequiredContribution, 30_000.0))
            .expect("must solve");

        // 80k plus one year of voluntary contributions must cover 10 x 10k.
        assert!(result.feasible);
        assert!(result.converged);
        let solved = result.solved_value.expect("value expected");
        assert_close(solved, 20_000.0, 1.0);
        assert!(solved >= 20_000.0);
        assert!(result.iterations.iter().any(|it| it.funded));
    }

    #[test]
    fn required_contribution_solver_reports_already_funded() {
        let result = solve_goal(
            &deterministic_plan(),
            config(GoalType::RequiredContribution, 30_000.0),
        )
        .expect("must solve");

        assert!(result.feasible);
        assert_eq!(result.solved_value, Some(0.0));
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn required_contribution_solver_reports_infeasible_when_bounds_too_low() {
        let mut plan = deterministic_plan();
        plan.accumulation.current_balance = 0.0;

        let result = solve_goal(&plan, config(GoalType::RequiredContribution, 5_000.0))
            .expect("must return result");

        assert!(!result.feasible);
        assert!(result.solved_value.is_none());
        assert!(result.solved_summary.is_none());
    }

    #[test]
    fn max_expenses_solver_reports_when_upper_bound_is_funded() {
        let result = solve_goal(
            &deterministic_plan(),
            config(GoalType::MaxLivingExpenses, 5_000.0),
        )
        .expect("must solve");

        assert_eq!(result.solved_value, Some(5_000.0));
        assert!(result.message.contains("increase search max"));
    }

    #[test]
    fn bisection_brackets_shrink_toward_the_solution() {
        let mut plan = deterministic_plan();
        plan.accumulation.current_balance = 200_000.0;

        let expenses = solve_goal(&plan, config(GoalType::MaxLivingExpenses, 100_000.0))
            .expect("must solve");
        plan.accumulation.current_balance = 80_000.0;
        let contribution = solve_goal(&plan, config(GoalType::RequiredContribution, 30_000.0))
            .expect("must solve");

        for result in [&expenses, &contribution] {
            assert!(!result.iterations.is_empty());
            for pair in result.iterations.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                assert_eq!(next.iteration, prev.iteration + 1);
                assert!(next.upper_bound - next.lower_bound < prev.upper_bound - prev.lower_bound);
                assert!(next.lower_bound >= prev.lower_bound);
                assert!(next.upper_bound <= prev.upper_bound);
            }
            let solved = result.solved_value.expect("value expected");
            let last = result.iterations[result.iterations.len() - 1];
            assert!(solved >= last.lower_bound && solved <= last.upper_bound);
        }
    }

    #[test]
    fn bisection_reports_best_estimate_when_iterations_run_out() {
        let mut plan = deterministic_plan();
        plan.accumulation.current_balance = 200_000.0;
        let mut short = config(GoalType::MaxLivingExpenses, 100_000.0);
        short.max_iterations = 3;

        let result = solve_goal(&plan, short).expect("must solve");

        assert!(result.feasible);
        assert!(!result.converged);
        assert_eq!(result.iterations.len(), 3);
        // 50k unfunded, 25k unfunded, 12.5k funded.
        assert_eq!(result.solved_value, Some(12_500.0));
        assert!(result.message.contains("max iterations"));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let plan = deterministic_plan();

        let mut bad = config(GoalType::MaxLivingExpenses, 10.0);
        bad.search_min = 20.0;
        assert_eq!(solve_goal(&plan, bad).unwrap_err(), SolveError::InvertedBounds);

        let mut bad = config(GoalType::MaxLivingExpenses, f64::INFINITY);
        bad.search_min = 0.0;
        assert_eq!(solve_goal(&plan, bad).unwrap_err(), SolveError::NonFiniteBounds);

        let mut bad = config(GoalType::MaxLivingExpenses, 10.0);
        bad.tolerance = 0.0;
        assert_eq!(solve_goal(&plan, bad).unwrap_err(), SolveError::InvalidTolerance);

        let mut bad = config(GoalType::MaxLivingExpenses, 10.0);
        bad.max_iterations = 0;
        assert_eq!(solve_goal(&plan, bad).unwrap_err(), SolveError::NoIterations);

        let mut empty = plan.clone();
        empty.max_years = 0;
        assert_eq!(
            solve_goal(&empty, config(GoalType::MaxLivingExpenses, 10.0)).unwrap_err(),
            SolveError::EmptyHorizon
        );
    }
}
