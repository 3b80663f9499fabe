//! Preference-driven rostering: assigns persons to slots by solving a binary program that keeps
//! every assignment close to what the person asked for, under capacity, coverage and skill-mix
//! rules, and explains the result with per-slot desirability and per-person flexibility.
//!
//! The pipeline is a chain of values:
//!
//! ```text
//! PreferenceTable ─ normalize ─┐
//! ExperienceTable ─ classify ──┼─ model::build ─ solver::solve ─ SolvedModel::evaluate
//! Config ──────────────────────┘
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod experience;
pub mod lifecycle;
pub mod model;
pub mod normalize;
pub mod server;
pub mod solver;

pub use config::{Config, NormalizationMode};
pub use data::{AssignmentMatrix, ExperienceTable, PreferenceTable};
pub use error::{Result, RosterError};
pub use evaluate::{Evaluation, SolvedModel};
pub use lifecycle::{Lifecycle, ModelState, PreparedInputs};
pub use model::ScheduleModel;
pub use solver::{BackendKind, SolveOptions, SolveStatus, SolverBackend};

/// Runs the whole pipeline once. Infeasible and failed solves come back as
/// [`RosterError::InfeasibleModel`] and [`RosterError::SolverError`].
pub fn roster(
    config: Config,
    prefs: &PreferenceTable,
    months: &ExperienceTable,
    backend: &dyn SolverBackend,
    options: &SolveOptions,
) -> Result<Evaluation> {
    let inputs = PreparedInputs::new(config, prefs, months)?;
    let model = inputs.build()?;
    let solved = solver::solve(model, backend, options);
    solved.check()?;
    solved.evaluate()
}
