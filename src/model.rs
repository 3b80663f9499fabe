//! Solver-agnostic roster model.
//!
//! [`build`] turns normalized preferences, the experience indicator and a [`Config`] into one
//! binary decision variable per (slot, person) pair, a deviation-from-preference objective and a
//! list of individually named linear constraints. Nothing here knows about a particular solver;
//! backends in [`crate::solver`] translate a [`ScheduleModel`] into their own representation.

use std::fmt;

use itertools::iproduct;
use log::{debug, info};

use crate::config::Config;
use crate::data::{ExperienceIndicator, ID_SEPARATOR, NormalizedPreferences, PersonId, SlotId};
use crate::error::{Result, RosterError};
use crate::solver::Capabilities;

/// Slack allowed when checking a concrete assignment against a constraint.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// x_sp = 1 if person p works slot s, 0 otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionVar {
    pub slot: usize,
    pub person: usize,
    pub name: String,
}

/// `Σ coef · x[var] + constant`, variables referenced by their index in the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(usize, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn sum_of(vars: impl IntoIterator<Item = usize>) -> Self {
        LinearExpr {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(var, coef)| coef * values[var])
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Le,
    Ge,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Eq => write!(f, "=="),
            Comparison::Le => write!(f, "<="),
            Comparison::Ge => write!(f, ">="),
        }
    }
}

/// Which rule a constraint enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintFamily {
    /// No one works a slot they scored 0.
    Availability,
    /// At most `slots_per_person_max` slots per person.
    PersonCapacity,
    /// At least `persons_per_slot_min` persons per slot.
    SlotCoverageMin,
    /// At most `persons_per_slot_max` persons per slot.
    SlotCoverageMax,
    /// At least `min_experienced_persons` experienced persons per slot.
    SkillMix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedConstraint {
    pub name: String,
    pub family: ConstraintFamily,
    pub expr: LinearExpr,
    pub comparison: Comparison,
    pub rhs: f64,
}

impl NamedConstraint {
    pub fn is_satisfied(&self, values: &[f64]) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.comparison {
            Comparison::Eq => (lhs - self.rhs).abs() <= FEASIBILITY_TOLERANCE,
            Comparison::Le => lhs <= self.rhs + FEASIBILITY_TOLERANCE,
            Comparison::Ge => lhs >= self.rhs - FEASIBILITY_TOLERANCE,
        }
    }
}

impl fmt::Display for NamedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} terms {} {}",
            self.name,
            self.expr.terms.len(),
            self.comparison,
            self.rhs
        )
    }
}

/// One `(x[var] - target)^2` summand of the objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationTerm {
    pub var: usize,
    pub target: f64,
}

/// Minimise `Σ (x[s,p] - pref[s,p])^2` over every cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    terms: Vec<DeviationTerm>,
}

/// The objective in the shape a backend can consume.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveForm<'a> {
    Quadratic(&'a [DeviationTerm]),
    Linear(LinearExpr),
}

impl Objective {
    pub fn terms(&self) -> &[DeviationTerm] {
        &self.terms
    }

    /// Value of the quadratic objective at `values`.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|t| {
                let d = values[t.var] - t.target;
                d * d
            })
            .sum()
    }

    /// Exact linear form for binary variables: since x^2 = x,
    /// (x - t)^2 = (1 - 2t) x + t^2.
    pub fn linearized(&self) -> LinearExpr {
        LinearExpr {
            terms: self
                .terms
                .iter()
                .map(|t| (t.var, 1.0 - 2.0 * t.target))
                .collect(),
            constant: self.terms.iter().map(|t| t.target * t.target).sum(),
        }
    }

    pub fn encode(&self, capabilities: Capabilities) -> ObjectiveForm<'_> {
        if capabilities.quadratic_objective {
            ObjectiveForm::Quadratic(&self.terms)
        } else {
            ObjectiveForm::Linear(self.linearized())
        }
    }
}

/// Variables, objective and constraints of one roster problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleModel {
    prefs: NormalizedPreferences,
    variables: Vec<DecisionVar>,
    objective: Objective,
    constraints: Vec<NamedConstraint>,
}

impl ScheduleModel {
    pub fn slots(&self) -> &[SlotId] {
        &self.prefs.slots
    }

    pub fn persons(&self) -> &[PersonId] {
        &self.prefs.persons
    }

    pub fn preferences(&self) -> &NormalizedPreferences {
        &self.prefs
    }

    pub fn variables(&self) -> &[DecisionVar] {
        &self.variables
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &[NamedConstraint] {
        &self.constraints
    }

    pub fn constraints_in(&self, family: ConstraintFamily) -> impl Iterator<Item = &NamedConstraint> {
        self.constraints.iter().filter(move |c| c.family == family)
    }

    pub fn constraint(&self, name: &str) -> Option<&NamedConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Index of x[slot, person] in [`Self::variables`].
    pub fn var_index(&self, slot: usize, person: usize) -> usize {
        slot * self.prefs.persons.len() + person
    }

    /// Constraints that `values` break.
    pub fn violations<'a>(&'a self, values: &'a [f64]) -> impl Iterator<Item = &'a NamedConstraint> + 'a {
        self.constraints.iter().filter(move |c| !c.is_satisfied(values))
    }
}

/// Builds the roster model. Every rule becomes one constraint per slot or per person; none is
/// dropped or loosened, even when the config cannot be satisfied.
pub fn build(
    prefs: &NormalizedPreferences,
    indicator: &ExperienceIndicator,
    config: &Config,
) -> Result<ScheduleModel> {
    let slots = prefs.slots();
    let persons = prefs.persons();
    if indicator.len() != persons.len() {
        return Err(RosterError::InvalidExperienceData(format!(
            "experience indicator covers {} persons, preference table has {}",
            indicator.len(),
            persons.len()
        )));
    }
    info!(
        "Setting up roster model with {} slots and {} persons...",
        slots.len(),
        persons.len()
    );
    let index = |s: usize, p: usize| s * persons.len() + p;

    let variables: Vec<DecisionVar> = iproduct!(0..slots.len(), 0..persons.len())
        .map(|(s, p)| DecisionVar {
            slot: s,
            person: p,
            name: format!("x[{}{ID_SEPARATOR}{}]", persons[p], slots[s]),
        })
        .collect();

    let objective = Objective {
        terms: iproduct!(0..slots.len(), 0..persons.len())
            .map(|(s, p)| DeviationTerm {
                var: index(s, p),
                target: prefs.get(s, p),
            })
            .collect(),
    };

    let mut constraints = Vec::new();

    // persons cannot be assigned to unavailable slots
    for ((s, p), weight) in prefs.weights().indexed() {
        if weight == 0.0 {
            constraints.push(NamedConstraint {
                name: format!("unavail[{}{ID_SEPARATOR}{}]", persons[p], slots[s]),
                family: ConstraintFamily::Availability,
                expr: LinearExpr::sum_of([index(s, p)]),
                comparison: Comparison::Eq,
                rhs: 0.0,
            });
        }
    }

    for (p, person) in persons.iter().enumerate() {
        constraints.push(NamedConstraint {
            name: format!("maxslots[{person}]"),
            family: ConstraintFamily::PersonCapacity,
            expr: LinearExpr::sum_of((0..slots.len()).map(|s| index(s, p))),
            comparison: Comparison::Le,
            rhs: f64::from(config.slots_per_person_max()),
        });
    }

    for (s, slot) in slots.iter().enumerate() {
        let crew = LinearExpr::sum_of((0..persons.len()).map(|p| index(s, p)));
        constraints.push(NamedConstraint {
            name: format!("minpersons[{slot}]"),
            family: ConstraintFamily::SlotCoverageMin,
            expr: crew.clone(),
            comparison: Comparison::Ge,
            rhs: f64::from(config.persons_per_slot_min()),
        });
        constraints.push(NamedConstraint {
            name: format!("maxpersons[{slot}]"),
            family: ConstraintFamily::SlotCoverageMax,
            expr: crew,
            comparison: Comparison::Le,
            rhs: f64::from(config.persons_per_slot_max()),
        });
    }

    for (s, slot) in slots.iter().enumerate() {
        let experienced = (0..persons.len())
            .filter(|&p| indicator.is_experienced(p))
            .map(|p| index(s, p));
        constraints.push(NamedConstraint {
            name: format!("expperson[{slot}]"),
            family: ConstraintFamily::SkillMix,
            expr: LinearExpr::sum_of(experienced),
            comparison: Comparison::Ge,
            rhs: f64::from(config.min_experienced_persons()),
        });
    }

    let model = ScheduleModel {
        prefs: prefs.clone(),
        variables,
        objective,
        constraints,
    };
    debug!(
        "Model has {} variables; {} availability, {} capacity, {} coverage and {} skill-mix constraints",
        model.variables.len(),
        model.constraints_in(ConstraintFamily::Availability).count(),
        model.constraints_in(ConstraintFamily::PersonCapacity).count(),
        model.constraints_in(ConstraintFamily::SlotCoverageMin).count()
            + model.constraints_in(ConstraintFamily::SlotCoverageMax).count(),
        model.constraints_in(ConstraintFamily::SkillMix).count(),
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use crate::config::NormalizationMode;
    use crate::data::{ExperienceTable, PreferenceTable};
    use crate::{experience, normalize};

    fn config() -> Config {
        Config::from_yaml_str(
            "slots_per_person_max: 2
persons_per_slot_min: 1
persons_per_slot_max: 2
experience_months: 6
min_experienced_persons: 1",
        )
        .unwrap()
    }

    fn model() -> ScheduleModel {
        let prefs = PreferenceTable::new(
            vec!["mon".into(), "tue".into(), "wed".into()],
            vec!["ann".into(), "bob".into()],
            vec![vec![1.0, 2.0], vec![0.0, 2.0], vec![3.0, 0.0]],
        )
        .unwrap();
        let norm = normalize::normalize(&prefs, NormalizationMode::SlotCount).unwrap();
        let months = ExperienceTable::from([("ann".to_string(), 12.0), ("bob".to_string(), 2.0)]);
        let indicator = experience::classify(norm.persons(), &months, 6).unwrap();
        build(&norm, &indicator, &config()).unwrap()
    }

    #[test]
    fn one_variable_per_cell() {
        let model = model();
        assert_eq!(model.variables().len(), 6);
        let var = &model.variables()[model.var_index(1, 0)];
        assert_eq!((var.slot, var.person), (1, 0));
        assert_eq!(var.name, "x[ann|tue]");
    }

    #[test]
    fn constraints_are_named_per_slot_and_person() {
        let model = model();
        let names: Vec<_> = model.constraints().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "unavail[ann|tue]",
                "unavail[bob|wed]",
                "maxslots[ann]",
                "maxslots[bob]",
                "minpersons[mon]",
                "maxpersons[mon]",
                "minpersons[tue]",
                "maxpersons[tue]",
                "minpersons[wed]",
                "maxpersons[wed]",
                "expperson[mon]",
                "expperson[tue]",
                "expperson[wed]",
            ]
        );
    }

    #[test]
    fn skill_mix_only_counts_experienced_persons() {
        let model = model();
        let c = model.constraint("expperson[tue]").unwrap();
        assert_eq!(c.expr.terms, vec![(model.var_index(1, 0), 1.0)]);
        assert_eq!(c.comparison, Comparison::Ge);
        assert_eq!(c.rhs, 1.0);
    }

    #[test]
    fn underscored_identifiers_get_distinct_names() {
        // (a_b, c) and (a, b_c) would both read `a_b_c` if joined with `_`
        let prefs = PreferenceTable::new(
            vec!["c".into(), "b_c".into()],
            vec!["a_b".into(), "a".into()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let norm = normalize::normalize(&prefs, NormalizationMode::SlotCount).unwrap();
        let indicator = ExperienceIndicator(vec![true, true]);
        let model = build(&norm, &indicator, &config()).unwrap();

        let vars: Vec<_> = model.variables().iter().map(|v| v.name.as_str()).collect();
        assert!(vars.iter().all_unique());
        assert!(vars.contains(&"x[a_b|c]") && vars.contains(&"x[a|b_c]"));
        let unavail: Vec<_> = model
            .constraints_in(ConstraintFamily::Availability)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(unavail, vec!["unavail[a|c]", "unavail[a_b|b_c]"]);
        assert!(model.constraints().iter().map(|c| &c.name).all_unique());
    }

    #[test]
    fn build_is_deterministic() {
        assert_eq!(model(), model());
    }

    #[test]
    fn linearized_objective_matches_quadratic_on_binaries() {
        let model = model();
        let n = model.variables().len();
        let linear = model.objective().linearized();
        for mask in 0u32..(1 << n) {
            let values: Vec<f64> = (0..n).map(|i| f64::from((mask >> i) & 1)).collect();
            let quadratic = model.objective().evaluate(&values);
            assert!((quadratic - linear.evaluate(&values)).abs() < 1e-9);
        }
    }

    #[test]
    fn encode_follows_capability_flag() {
        let model = model();
        let quad = model.objective().encode(Capabilities {
            quadratic_objective: true,
        });
        assert!(matches!(quad, ObjectiveForm::Quadratic(terms) if terms.len() == 6));
        let lin = model.objective().encode(Capabilities {
            quadratic_objective: false,
        });
        assert_eq!(lin, ObjectiveForm::Linear(model.objective().linearized()));
    }

    #[test]
    fn violations_report_broken_rules() {
        let model = model();
        // ann works tue (unavailable), nobody works wed
        let mut values = vec![0.0; 6];
        values[model.var_index(0, 0)] = 1.0;
        values[model.var_index(1, 0)] = 1.0;
        let broken: Vec<_> = model.violations(&values).map(|c| c.name.clone()).collect();
        assert_eq!(
            broken,
            vec!["unavail[ann|tue]", "minpersons[wed]", "expperson[wed]"]
        );
    }

    #[test]
    fn mismatched_indicator_is_rejected() {
        let model = model();
        let short = ExperienceIndicator(vec![true]);
        assert!(matches!(
            build(model.preferences(), &short, &config()),
            Err(RosterError::InvalidExperienceData(_))
        ));
    }
}
