//! Lifecycle of one roster model.
//!
//! The stages are plain values: [`PreparedInputs`] → [`ScheduleModel`] → [`SolvedModel`] →
//! [`Evaluation`]. [`ModelState`] wraps them for callers that want to hold one model and drive
//! it step by step while inspecting its [`Lifecycle`] tag.

use std::fmt;

use log::debug;

use crate::config::Config;
use crate::data::{
    AssignmentMatrix, ExperienceIndicator, ExperienceTable, NormalizedPreferences, PreferenceTable,
};
use crate::error::{Result, RosterError};
use crate::evaluate::{Evaluation, SolvedModel};
use crate::model::{self, ScheduleModel};
use crate::solver::{self, SolveOptions, SolveStatus, SolverBackend};
use crate::{experience, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Unconfigured,
    Configured,
    Built,
    Solved(SolveStatus),
    Evaluated,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Unconfigured => write!(f, "UNCONFIGURED"),
            Lifecycle::Configured => write!(f, "CONFIGURED"),
            Lifecycle::Built => write!(f, "BUILT"),
            Lifecycle::Solved(status) => write!(f, "SOLVED({})", status.to_string().to_uppercase()),
            Lifecycle::Evaluated => write!(f, "EVALUATED"),
        }
    }
}

/// Validated inputs: config, normalized preferences and the experience indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInputs {
    config: Config,
    prefs: NormalizedPreferences,
    indicator: ExperienceIndicator,
}

impl PreparedInputs {
    /// Normalizes and classifies eagerly, so a bad table never reaches the builder.
    pub fn new(config: Config, prefs: &PreferenceTable, months: &ExperienceTable) -> Result<Self> {
        let normalized = normalize::normalize(prefs, config.normalization())?;
        let indicator = experience::classify(prefs.persons(), months, config.experience_months())?;
        Ok(PreparedInputs {
            config,
            prefs: normalized,
            indicator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn preferences(&self) -> &NormalizedPreferences {
        &self.prefs
    }

    pub fn indicator(&self) -> &ExperienceIndicator {
        &self.indicator
    }

    pub fn build(&self) -> Result<ScheduleModel> {
        model::build(&self.prefs, &self.indicator, &self.config)
    }
}

/// One model driven through its lifecycle.
#[derive(Debug, Clone, Default)]
pub enum ModelState {
    #[default]
    Unconfigured,
    Configured(PreparedInputs),
    Built(ScheduleModel),
    Solved(SolvedModel),
    Evaluated {
        solved: SolvedModel,
        evaluation: Evaluation,
    },
}

impl ModelState {
    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            ModelState::Unconfigured => Lifecycle::Unconfigured,
            ModelState::Configured(_) => Lifecycle::Configured,
            ModelState::Built(_) => Lifecycle::Built,
            ModelState::Solved(solved) => solved.lifecycle(),
            ModelState::Evaluated { .. } => Lifecycle::Evaluated,
        }
    }

    /// UNCONFIGURED → CONFIGURED. On error the state is left unchanged.
    pub fn configure(
        &mut self,
        config: Config,
        prefs: &PreferenceTable,
        months: &ExperienceTable,
    ) -> Result<()> {
        self.require(Lifecycle::Unconfigured, "configure")?;
        *self = ModelState::Configured(PreparedInputs::new(config, prefs, months)?);
        Ok(())
    }

    /// CONFIGURED → BUILT.
    pub fn build(&mut self) -> Result<()> {
        let ModelState::Configured(inputs) = &*self else {
            return Err(self.invalid("build"));
        };
        let model = inputs.build()?;
        *self = ModelState::Built(model);
        Ok(())
    }

    /// BUILT → SOLVED. Infeasible and failed solves are terminal states, not errors.
    pub fn solve(&mut self, backend: &dyn SolverBackend, options: &SolveOptions) -> Result<SolveStatus> {
        self.require(Lifecycle::Built, "solve")?;
        let ModelState::Built(model) = std::mem::take(self) else {
            unreachable!("state checked above");
        };
        let solved = solver::solve(model, backend, options);
        let status = solved.status();
        *self = ModelState::Solved(solved);
        Ok(status)
    }

    /// SOLVED{OPTIMAL|FEASIBLE} → EVALUATED.
    pub fn evaluate(&mut self) -> Result<&Evaluation> {
        let evaluation = match &*self {
            ModelState::Solved(solved) => solved.evaluate()?,
            ModelState::Evaluated { .. } => return Err(self.invalid("evaluate")),
            other => return Err(RosterError::NotConverged(other.lifecycle())),
        };
        let ModelState::Solved(solved) = std::mem::take(self) else {
            unreachable!("state checked above");
        };
        debug!("Model evaluated ({})", evaluation.status);
        *self = ModelState::Evaluated { solved, evaluation };
        match &*self {
            ModelState::Evaluated { evaluation, .. } => Ok(evaluation),
            _ => unreachable!("state set above"),
        }
    }

    pub fn extract_schedule(&self) -> Result<AssignmentMatrix> {
        self.solved()?.extract_schedule()
    }

    pub fn desirability(&self) -> Result<Vec<f64>> {
        self.solved()?.desirability()
    }

    pub fn flexibility(&self) -> Result<Vec<f64>> {
        self.solved()?.flexibility()
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match self {
            ModelState::Evaluated { evaluation, .. } => Some(evaluation),
            _ => None,
        }
    }

    fn solved(&self) -> Result<&SolvedModel> {
        match self {
            ModelState::Solved(solved) | ModelState::Evaluated { solved, .. } => Ok(solved),
            other => Err(RosterError::NotConverged(other.lifecycle())),
        }
    }

    fn require(&self, state: Lifecycle, action: &'static str) -> Result<()> {
        if self.lifecycle() == state {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> RosterError {
        RosterError::InvalidTransition {
            action,
            state: self.lifecycle(),
        }
    }
}
