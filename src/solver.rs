use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use good_lp::solvers::SolutionStatus;
use good_lp::solvers::highs::highs;
use good_lp::solvers::microlp::microlp;
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    constraint, variable,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::evaluate::SolvedModel;
use crate::model::{Comparison, LinearExpr, ObjectiveForm, ScheduleModel};

/// Terminal status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Optimal,
    /// A valid but not provably optimal assignment, e.g. after a time limit.
    Feasible,
    Infeasible,
    Error,
}

impl SolveStatus {
    /// Whether the solve produced an assignment that can be evaluated.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// What a backend can consume natively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Accepts `Σ (x - t)^2` directly; otherwise the model hands over the exact linear form.
    pub quadratic_objective: bool,
}

/// Options passed through to the backend untouched by the model layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    pub threads: u32,
    pub random_seed: i32,
    pub time_limit: Option<Duration>,
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        // one thread and a fixed seed for reproducibility
        SolveOptions {
            threads: 1,
            random_seed: 1234,
            time_limit: None,
            verbose: false,
        }
    }
}

/// Status plus, when a solution exists, one value per model variable.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub values: Option<Vec<f64>>,
    /// Solver message for `Error` outcomes.
    pub message: Option<String>,
}

impl SolveOutcome {
    pub fn solved(status: SolveStatus, values: Vec<f64>) -> Self {
        SolveOutcome {
            status,
            values: Some(values),
            message: None,
        }
    }

    pub fn infeasible() -> Self {
        SolveOutcome {
            status: SolveStatus::Infeasible,
            values: None,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SolveOutcome {
            status: SolveStatus::Error,
            values: None,
            message: Some(message.into()),
        }
    }
}

/// A MIP engine that can solve a [`ScheduleModel`]. The call is blocking.
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn solve(&self, model: &ScheduleModel, options: &SolveOptions) -> SolveOutcome;
}

/// HiGHS through `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend;

impl SolverBackend for HighsBackend {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn solve(&self, model: &ScheduleModel, options: &SolveOptions) -> SolveOutcome {
        let objective = match model.objective().encode(self.capabilities()) {
            ObjectiveForm::Linear(expr) => expr,
            ObjectiveForm::Quadratic(_) => {
                return SolveOutcome::error("highs backend takes linear objectives only");
            }
        };
        let translated = Translated::new(model, &objective);
        let threads = i32::try_from(options.threads).unwrap_or(i32::MAX);
        let mut problem = translated
            .problem
            .minimise(translated.objective)
            .using(highs)
            .set_option("threads", threads)
            .set_option("random_seed", options.random_seed)
            .set_option("log_to_console", if options.verbose { "true" } else { "false" });
        if let Some(limit) = options.time_limit {
            problem = problem.set_option("time_limit", limit.as_secs_f64());
        }
        for c in translated.constraints {
            problem.add_constraint(c);
        }
        collect(problem.solve(), &translated.vars)
    }
}

/// Pure-Rust `microlp` through `good_lp`. Ignores every option.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpBackend;

impl SolverBackend for MicroLpBackend {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn solve(&self, model: &ScheduleModel, options: &SolveOptions) -> SolveOutcome {
        if options.time_limit.is_some() {
            warn!("microlp does not support time limits, ignoring");
        }
        let objective = match model.objective().encode(self.capabilities()) {
            ObjectiveForm::Linear(expr) => expr,
            ObjectiveForm::Quadratic(_) => {
                return SolveOutcome::error("microlp backend takes linear objectives only");
            }
        };
        let translated = Translated::new(model, &objective);
        let mut problem = translated
            .problem
            .minimise(translated.objective)
            .using(microlp);
        for c in translated.constraints {
            problem.add_constraint(c);
        }
        collect(problem.solve(), &translated.vars)
    }
}

/// Selects a shipped backend by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Highs,
    MicroLp,
}

impl BackendKind {
    pub fn backend(self) -> Box<dyn SolverBackend> {
        match self {
            BackendKind::Highs => Box::new(HighsBackend),
            BackendKind::MicroLp => Box::new(MicroLpBackend),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highs" => Ok(BackendKind::Highs),
            "microlp" => Ok(BackendKind::MicroLp),
            other => Err(format!("unknown solver backend `{other}`")),
        }
    }
}

/// Runs `backend` on `model` and wraps the result for evaluation.
pub fn solve(model: ScheduleModel, backend: &dyn SolverBackend, options: &SolveOptions) -> SolvedModel {
    info!(
        "Starting {} solver on {} variables and {} constraints...",
        backend.name(),
        model.variables().len(),
        model.constraints().len()
    );
    let start_time = Instant::now();
    let outcome = backend.solve(&model, options);
    let duration = start_time.elapsed();

    match outcome.status {
        SolveStatus::Optimal | SolveStatus::Feasible => {
            info!("Solution ({}) found in {:.2?}", outcome.status, duration)
        }
        SolveStatus::Infeasible => warn!("Model proven infeasible after {:.2?}", duration),
        SolveStatus::Error => warn!(
            "Solver failed after {:.2?}: {}",
            duration,
            outcome.message.as_deref().unwrap_or("no message")
        ),
    }
    SolvedModel::new(model, outcome)
}

/// The model in `good_lp` terms.
struct Translated {
    problem: ProblemVariables,
    vars: Vec<Variable>,
    objective: Expression,
    constraints: Vec<Constraint>,
}

impl Translated {
    fn new(model: &ScheduleModel, objective: &LinearExpr) -> Self {
        let mut problem = ProblemVariables::new();
        let vars = problem.add_vector(variable().binary(), model.variables().len());
        let objective = expression(objective, &vars);
        let constraints = model
            .constraints()
            .iter()
            .map(|c| {
                let lhs = expression(&c.expr, &vars);
                let rhs = c.rhs;
                match c.comparison {
                    Comparison::Eq => constraint!(lhs == rhs),
                    Comparison::Le => constraint!(lhs <= rhs),
                    Comparison::Ge => constraint!(lhs >= rhs),
                }
            })
            .collect();
        debug!(
            "Translated model into {} good_lp variables and {} constraints",
            vars.len(),
            model.constraints().len()
        );
        Translated {
            problem,
            vars,
            objective,
            constraints,
        }
    }
}

fn expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant);
    for &(var, coef) in &expr.terms {
        out += coef * vars[var];
    }
    out
}

fn collect<S: Solution>(result: Result<S, ResolutionError>, vars: &[Variable]) -> SolveOutcome {
    match result {
        Ok(solution) => {
            let status = match solution.status() {
                SolutionStatus::Optimal => SolveStatus::Optimal,
                // stopped at a time or gap limit with an incumbent
                _ => SolveStatus::Feasible,
            };
            let values = vars.iter().map(|&v| solution.value(v)).collect();
            SolveOutcome::solved(status, values)
        }
        Err(ResolutionError::Infeasible) => SolveOutcome::infeasible(),
        // every variable is binary, so an unbounded verdict can only mean "unbounded or infeasible"
        Err(ResolutionError::Unbounded) => SolveOutcome::infeasible(),
        Err(e) => SolveOutcome::error(e.to_string()),
    }
}
