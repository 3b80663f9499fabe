use slot_roster::data::ExperienceTable;
use slot_roster::evaluate::SolvedModel;
use slot_roster::solver::{HighsBackend, MicroLpBackend};
use slot_roster::{
    Config, Lifecycle, ModelState, PreferenceTable, PreparedInputs, RosterError, SolveOptions,
    SolveStatus, SolverBackend, solver,
};

fn config(overrides: &[(&str, u32)]) -> Config {
    let mut values = vec![
        ("slots_per_person_max", 2),
        ("persons_per_slot_min", 2),
        ("persons_per_slot_max", 2),
        ("experience_months", 6),
        ("min_experienced_persons", 1),
    ];
    for (key, value) in overrides {
        values
            .iter_mut()
            .filter(|(k, _)| k == key)
            .for_each(|(_, v)| *v = *value);
    }
    let yaml: String = values
        .iter()
        .map(|(k, v)| format!("{k}: {v}\n"))
        .collect();
    Config::from_yaml_str(&yaml).unwrap()
}

/// 3 slots, 4 persons; person 2 cannot make slot 1.
fn scenario() -> (PreferenceTable, ExperienceTable) {
    let prefs = PreferenceTable::new(
        vec!["fri".into(), "sat".into(), "sun".into()],
        vec!["ann".into(), "bob".into(), "cas".into(), "dee".into()],
        vec![
            vec![5.0, 1.0, 2.0, 3.0],
            vec![1.0, 4.0, 0.0, 3.0],
            vec![2.0, 4.0, 5.0, 1.0],
        ],
    )
    .unwrap();
    let months = ExperienceTable::from([
        ("ann".to_string(), 24.0),
        ("bob".to_string(), 2.0),
        ("cas".to_string(), 7.0),
        ("dee".to_string(), 6.0),
    ]);
    (prefs, months)
}

fn solve_with(backend: &dyn SolverBackend, config: Config) -> SolvedModel {
    let (prefs, months) = scenario();
    let inputs = PreparedInputs::new(config, &prefs, &months).unwrap();
    solver::solve(inputs.build().unwrap(), backend, &SolveOptions::default())
}

fn assert_rules_hold(solved: &SolvedModel, config: &Config) {
    let schedule = solved.extract_schedule().unwrap();
    let experienced = [true, false, true, false];

    for total in schedule.slots_per_person() {
        assert!(total <= config.slots_per_person_max() as usize);
    }
    for (s, total) in schedule.persons_per_slot().into_iter().enumerate() {
        assert!(total >= config.persons_per_slot_min() as usize);
        assert!(total <= config.persons_per_slot_max() as usize);
        let skilled = (0..4)
            .filter(|&p| schedule.is_assigned(s, p) && experienced[p])
            .count();
        assert!(skilled >= config.min_experienced_persons() as usize);
    }
    let prefs = solved.model().preferences();
    for s in 0..3 {
        for p in 0..4 {
            if prefs.get(s, p) == 0.0 {
                assert!(!schedule.is_assigned(s, p));
            }
        }
    }
}

#[test]
fn unavailable_cell_is_never_assigned() {
    let config = config(&[]);
    let solved = solve_with(&HighsBackend, config);
    assert_eq!(solved.status(), SolveStatus::Optimal);
    let schedule = solved.extract_schedule().unwrap();
    assert!(!schedule.is_assigned(1, 2));
    assert_rules_hold(&solved, &config);
}

#[test]
fn skill_mix_forces_experienced_cover() {
    // cas cannot make sat, so ann must
    let config = config(&[("persons_per_slot_min", 1)]);
    let solved = solve_with(&HighsBackend, config);
    let schedule = solved.extract_schedule().unwrap();
    assert!(schedule.is_assigned(1, 0));
    assert_rules_hold(&solved, &config);
}

#[test]
fn loose_rules_follow_preferences() {
    let config = Config::from_yaml_str(
        "slots_per_person_max: 3
persons_per_slot_min: 0
persons_per_slot_max: 4
experience_months: 6
min_experienced_persons: 0",
    )
    .unwrap();
    let solved = solve_with(&HighsBackend, config);
    let schedule = solved.extract_schedule().unwrap();
    let prefs = solved.model().preferences();
    // unconstrained, (x - t)^2 picks x = 1 exactly when t > 0.5
    for s in 0..3 {
        for p in 0..4 {
            assert_eq!(schedule.is_assigned(s, p), prefs.get(s, p) > 0.5, "cell ({s}, {p})");
        }
    }
}

#[test]
fn coverage_beyond_capacity_is_infeasible() {
    // 4 persons x 1 slot = 4 < 3 slots x 2 persons
    let config = config(&[("slots_per_person_max", 1)]);
    let (prefs, months) = scenario();

    let mut state = ModelState::default();
    state.configure(config, &prefs, &months).unwrap();
    state.build().unwrap();
    let status = state
        .solve(&HighsBackend, &SolveOptions::default())
        .unwrap();
    assert_eq!(status, SolveStatus::Infeasible);
    assert_eq!(state.lifecycle(), Lifecycle::Solved(SolveStatus::Infeasible));
    assert!(matches!(state.extract_schedule(), Err(RosterError::NotConverged(_))));
    assert!(matches!(state.desirability(), Err(RosterError::NotConverged(_))));
    assert!(matches!(state.flexibility(), Err(RosterError::NotConverged(_))));
    assert!(matches!(state.evaluate(), Err(RosterError::NotConverged(_))));

    let result = slot_roster::roster(
        config,
        &prefs,
        &months,
        &HighsBackend,
        &SolveOptions::default(),
    );
    assert!(matches!(result, Err(RosterError::InfeasibleModel)));
}

#[test]
fn schedule_extraction_is_idempotent() {
    let solved = solve_with(&HighsBackend, config(&[]));
    assert_eq!(solved.extract_schedule().unwrap(), solved.extract_schedule().unwrap());
}

#[test]
fn backends_agree_on_the_optimum() {
    let config = config(&[]);
    let highs = solve_with(&HighsBackend, config);
    let micro = solve_with(&MicroLpBackend, config);
    assert_eq!(micro.status(), SolveStatus::Optimal);
    assert_rules_hold(&micro, &config);
    let (a, b) = (
        highs.objective_value().unwrap(),
        micro.objective_value().unwrap(),
    );
    assert!((a - b).abs() < 1e-4, "highs {a} vs microlp {b}");
}

#[test]
fn full_pipeline_reports_metrics() {
    let (prefs, months) = scenario();
    let evaluation = slot_roster::roster(
        config(&[]),
        &prefs,
        &months,
        &HighsBackend,
        &SolveOptions::default(),
    )
    .unwrap();
    assert_eq!(evaluation.desirability.len(), 3);
    assert_eq!(evaluation.flexibility.len(), 4);
    // desirability averages to one across slots on the slot-count scale
    let mean: f64 = evaluation.desirability.iter().sum::<f64>() / 3.0;
    assert!((mean - 1.0).abs() < 1e-9);
    for f in &evaluation.flexibility {
        assert!(*f > 0.0 && *f <= 1.0);
    }
    let json = serde_json::to_value(&evaluation).unwrap();
    assert_eq!(json["slots"][0], "fri");
}
