//! Schedule extraction and explanatory metrics.
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Desirability (per slot) | `Σ_p pref[s,p] / persons`, on the slot-count scale; 1.0 = uniform |
//! | Flexibility (per person) | `1 / max_s pref[s,p]` |
//!
//! Under [`NormalizationMode::SlotCount`] flexibility runs from `1/slots` (one slot acceptable)
//! to `1.0` (every slot equally acceptable). Under [`NormalizationMode::UnitSum`] the same
//! person scores `1.0` and `slots` respectively.
//!
//! [`NormalizationMode::SlotCount`]: crate::config::NormalizationMode::SlotCount
//! [`NormalizationMode::UnitSum`]: crate::config::NormalizationMode::UnitSum

use log::{debug, warn};
use serde::Serialize;

use crate::data::{
    AssignmentMatrix, Grid, NormalizedPreferences, PersonFlexibility, SlotAssignment,
    SlotDesirability, SolveResponse,
};
use crate::error::{Result, RosterError};
use crate::lifecycle::Lifecycle;
use crate::model::ScheduleModel;
use crate::solver::{SolveOutcome, SolveStatus};

/// A model together with what the solver made of it.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    model: ScheduleModel,
    outcome: SolveOutcome,
}

impl SolvedModel {
    /// A solution status without one value per variable is downgraded to `Error`.
    pub fn new(model: ScheduleModel, outcome: SolveOutcome) -> Self {
        let expected = model.variables().len();
        let outcome = match &outcome.values {
            Some(values) if values.len() != expected => {
                warn!("Solver returned {} values for {} variables", values.len(), expected);
                SolveOutcome::error(format!(
                    "solver returned {} values for {} variables",
                    values.len(),
                    expected
                ))
            }
            None if outcome.status.has_solution() => {
                SolveOutcome::error(format!("solver reported {} without values", outcome.status))
            }
            _ => outcome,
        };
        if let Some(values) = &outcome.values {
            let broken: Vec<_> = model.violations(values).map(|c| c.name.as_str()).collect();
            if !broken.is_empty() {
                warn!("Solver returned values violating {}", broken.join(", "));
            }
        }
        SolvedModel { model, outcome }
    }

    pub fn status(&self) -> SolveStatus {
        self.outcome.status
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Solved(self.outcome.status)
    }

    pub fn model(&self) -> &ScheduleModel {
        &self.model
    }

    pub fn outcome(&self) -> &SolveOutcome {
        &self.outcome
    }

    /// Turns a dead-end status into its error.
    pub fn check(&self) -> Result<()> {
        match self.outcome.status {
            SolveStatus::Optimal | SolveStatus::Feasible => Ok(()),
            SolveStatus::Infeasible => Err(RosterError::InfeasibleModel),
            SolveStatus::Error => Err(RosterError::SolverError(
                self.outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| "solver reported an error".to_string()),
            )),
        }
    }

    fn values(&self) -> Result<&[f64]> {
        match &self.outcome.values {
            Some(values) if self.outcome.status.has_solution() => Ok(values),
            _ => Err(RosterError::NotConverged(self.lifecycle())),
        }
    }

    /// The solved 0/1 schedule, slot x person.
    pub fn extract_schedule(&self) -> Result<AssignmentMatrix> {
        let values = self.values()?;
        let prefs = self.model.preferences();
        let mut cells = Grid::filled(prefs.slots.len(), prefs.persons.len(), false);
        for var in self.model.variables() {
            let index = self.model.var_index(var.slot, var.person);
            cells.set(var.slot, var.person, values[index] > 0.5);
        }
        Ok(AssignmentMatrix {
            slots: prefs.slots.clone(),
            persons: prefs.persons.clone(),
            cells,
        })
    }

    pub fn desirability(&self) -> Result<Vec<f64>> {
        self.values()?;
        Ok(desirability(self.model.preferences()))
    }

    pub fn flexibility(&self) -> Result<Vec<f64>> {
        self.values()?;
        flexibility(self.model.preferences())
    }

    /// Objective value of the solved assignment.
    pub fn objective_value(&self) -> Result<f64> {
        let values = self.values()?;
        Ok(self.model.objective().evaluate(values))
    }

    /// Everything the output sink needs.
    pub fn evaluate(&self) -> Result<Evaluation> {
        self.check().map_err(|e| {
            debug!("Refusing to evaluate: {e}");
            RosterError::NotConverged(self.lifecycle())
        })?;
        Ok(Evaluation {
            status: self.outcome.status,
            schedule: self.extract_schedule()?,
            desirability: self.desirability()?,
            flexibility: self.flexibility()?,
            objective: self.objective_value()?,
        })
    }
}

/// Per-slot attractiveness; 1.0 for a slot everybody scored like every other slot.
pub fn desirability(prefs: &NormalizedPreferences) -> Vec<f64> {
    let persons = prefs.persons.len() as f64;
    // report on the slot-count scale whatever the normalization
    let rescale = prefs.slots.len() as f64 / prefs.column_total();
    (0..prefs.slots.len())
        .map(|s| prefs.weights.row(s).iter().sum::<f64>() / persons * rescale)
        .collect()
}

/// Per-person `1 / max_s pref[s,p]`.
pub fn flexibility(prefs: &NormalizedPreferences) -> Result<Vec<f64>> {
    prefs
        .persons
        .iter()
        .enumerate()
        .map(|(p, person)| {
            let max = prefs.weights.column(p).fold(0.0_f64, f64::max);
            if max <= 0.0 {
                return Err(RosterError::InvalidPreferenceData(format!(
                    "person `{person}` has no positive preference"
                )));
            }
            Ok(1.0 / max)
        })
        .collect()
}

/// The three output tables of a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: SolveStatus,
    pub schedule: AssignmentMatrix,
    pub desirability: Vec<f64>,
    pub flexibility: Vec<f64>,
    pub objective: f64,
}

impl Evaluation {
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Evaluated
    }

    pub fn slot_desirability(&self) -> Vec<SlotDesirability> {
        self.schedule
            .slots()
            .iter()
            .zip(&self.desirability)
            .map(|(slot, &desirability)| SlotDesirability {
                slot: slot.clone(),
                desirability,
            })
            .collect()
    }

    pub fn person_flexibility(&self) -> Vec<PersonFlexibility> {
        self.schedule
            .persons()
            .iter()
            .zip(&self.flexibility)
            .map(|(person, &flexibility)| PersonFlexibility {
                person: person.clone(),
                flexibility,
            })
            .collect()
    }

    pub fn to_response(&self) -> SolveResponse {
        let crews = (0..self.schedule.slots().len())
            .map(|s| SlotAssignment {
                slot: self.schedule.slots()[s].clone(),
                persons: self.schedule.crew(s).into_iter().cloned().collect(),
            })
            .collect();
        SolveResponse {
            status: self.status.to_string(),
            slots: self.schedule.slots().to_vec(),
            persons: self.schedule.persons().to_vec(),
            assignments: self.schedule.to_binary_rows(),
            crews,
            desirability: self.slot_desirability(),
            flexibility: self.person_flexibility(),
            objective: self.objective,
        }
    }
}

impl Serialize for Evaluation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_response().serialize(serializer)
    }
}
