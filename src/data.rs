use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::config::NormalizationMode;
use crate::error::{Result, RosterError};

// Type aliases for clarity
pub type SlotId = String;
pub type PersonId = String;
pub type Months = f64;

/// Joins a person and a slot in model names. Never part of an identifier.
pub const ID_SEPARATOR: char = '|';

/// Months of experience per person, as read from the one-row experience table.
pub type ExperienceTable = BTreeMap<PersonId, Months>;

/// Dense row-major matrix, rows are slots and columns are persons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Grid {
            rows,
            cols,
            cells: vec![value; rows * cols],
        }
    }

    /// Returns `None` if the rows are ragged or `cols` does not match.
    pub fn from_rows(rows: Vec<Vec<T>>, cols: usize) -> Option<Self> {
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        Some(Grid {
            rows: rows.len(),
            cols,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.cells[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.cells[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = T> + '_ {
        self.cells.iter().skip(col).step_by(self.cols.max(1)).copied()
    }

    /// Cells with their `(row, col)` position, row-major.
    pub fn indexed(&self) -> impl Iterator<Item = ((usize, usize), T)> + '_ {
        let cols = self.cols.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &v)| ((i / cols, i % cols), v))
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn to_rows(&self) -> Vec<Vec<T>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }
}

/// Raw slot x person preference scores. `0` marks a person unavailable for a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceTable {
    slots: Vec<SlotId>,
    persons: Vec<PersonId>,
    scores: Grid<f64>,
}

impl PreferenceTable {
    /// Checks the table's shape and identifiers. Cell values are checked by the normalizer.
    pub fn new(slots: Vec<SlotId>, persons: Vec<PersonId>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if slots.is_empty() || persons.is_empty() {
            return Err(RosterError::InvalidPreferenceData(format!(
                "table needs at least one slot and one person, got {} slots and {} persons",
                slots.len(),
                persons.len()
            )));
        }
        if rows.len() != slots.len() {
            return Err(RosterError::InvalidPreferenceData(format!(
                "{} slots but {} preference rows",
                slots.len(),
                rows.len()
            )));
        }
        if let Some(dup) = slots.iter().duplicates().next() {
            return Err(RosterError::InvalidPreferenceData(format!(
                "duplicate slot `{dup}`"
            )));
        }
        if let Some(dup) = persons.iter().duplicates().next() {
            return Err(RosterError::InvalidPreferenceData(format!(
                "duplicate person `{dup}`"
            )));
        }
        // variable and constraint names join ids with the separator
        if let Some(id) = slots.iter().chain(&persons).find(|id| id.contains(ID_SEPARATOR)) {
            return Err(RosterError::InvalidPreferenceData(format!(
                "identifier `{id}` must not contain `{ID_SEPARATOR}`"
            )));
        }
        let scores = Grid::from_rows(rows, persons.len()).ok_or_else(|| {
            RosterError::InvalidPreferenceData(format!(
                "every preference row must have {} columns",
                persons.len()
            ))
        })?;
        Ok(PreferenceTable {
            slots,
            persons,
            scores,
        })
    }

    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn persons(&self) -> &[PersonId] {
        &self.persons
    }

    pub fn scores(&self) -> &Grid<f64> {
        &self.scores
    }
}

/// Preferences rescaled per person, same shape as the raw table.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPreferences {
    pub(crate) slots: Vec<SlotId>,
    pub(crate) persons: Vec<PersonId>,
    pub(crate) weights: Grid<f64>,
    pub(crate) mode: NormalizationMode,
}

impl NormalizedPreferences {
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn persons(&self) -> &[PersonId] {
        &self.persons
    }

    pub fn weights(&self) -> &Grid<f64> {
        &self.weights
    }

    pub fn get(&self, slot: usize, person: usize) -> f64 {
        self.weights.get(slot, person)
    }

    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    /// What each column sums to.
    pub fn column_total(&self) -> f64 {
        self.mode.column_total(self.slots.len())
    }
}

/// Experienced flag per person, in the preference table's person order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperienceIndicator(pub(crate) Vec<bool>);

impl ExperienceIndicator {
    pub fn is_experienced(&self, person: usize) -> bool {
        self.0[person]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn experienced_count(&self) -> usize {
        self.0.iter().filter(|&&e| e).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

/// Concrete slot x person schedule; `true` means the person works that slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentMatrix {
    pub(crate) slots: Vec<SlotId>,
    pub(crate) persons: Vec<PersonId>,
    pub(crate) cells: Grid<bool>,
}

impl AssignmentMatrix {
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn persons(&self) -> &[PersonId] {
        &self.persons
    }

    pub fn is_assigned(&self, slot: usize, person: usize) -> bool {
        self.cells.get(slot, person)
    }

    /// Number of slots each person works, in person order.
    pub fn slots_per_person(&self) -> Vec<usize> {
        (0..self.persons.len())
            .map(|p| self.cells.column(p).filter(|&a| a).count())
            .collect()
    }

    /// Number of persons on each slot, in slot order.
    pub fn persons_per_slot(&self) -> Vec<usize> {
        (0..self.slots.len())
            .map(|s| self.cells.row(s).iter().filter(|&&a| a).count())
            .collect()
    }

    /// Names of the persons working `slot`.
    pub fn crew(&self, slot: usize) -> Vec<&PersonId> {
        self.cells
            .row(slot)
            .iter()
            .zip(&self.persons)
            .filter(|(assigned, _)| **assigned)
            .map(|(_, person)| person)
            .collect()
    }

    /// 0/1 rows, the shape the output sink writes.
    pub fn to_binary_rows(&self) -> Vec<Vec<u8>> {
        self.cells.map(u8::from).to_rows()
    }
}

/// The complete input for one roster solve.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub slots: Vec<SlotId>,
    pub persons: Vec<PersonId>,
    /// One row per slot, one column per person.
    pub preferences: Vec<Vec<f64>>,
    pub experience: ExperienceTable,
    #[serde(default)]
    pub config: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub time_limit_seconds: Option<f64>,
}

/// Per-slot desirability row of the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotDesirability {
    pub slot: SlotId,
    pub desirability: f64,
}

/// Per-person flexibility row of the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonFlexibility {
    pub person: PersonId,
    pub flexibility: f64,
}

/// One slot of the final schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAssignment {
    pub slot: SlotId,
    pub persons: Vec<PersonId>,
}

/// The final output of a roster solve.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub status: String,
    pub slots: Vec<SlotId>,
    pub persons: Vec<PersonId>,
    /// Binary slot x person matrix.
    pub assignments: Vec<Vec<u8>>,
    pub crews: Vec<SlotAssignment>,
    pub desirability: Vec<SlotDesirability>,
    pub flexibility: Vec<PersonFlexibility>,
    pub objective: f64,
}
