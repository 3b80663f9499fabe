//! Per-person rescaling of raw preference scores.

use log::{debug, warn};

use crate::config::NormalizationMode;
use crate::data::{NormalizedPreferences, PreferenceTable};
use crate::error::{Result, RosterError};

/// Divides each person's column by its sum, then scales it to the mode's column total.
///
/// Fails with [`RosterError::InvalidPreferenceData`] when a column holds a negative or
/// non-finite score, or sums to zero (the person stated no availability at all).
pub fn normalize(prefs: &PreferenceTable, mode: NormalizationMode) -> Result<NormalizedPreferences> {
    let scores = prefs.scores();
    let total = mode.column_total(prefs.slots().len());

    let mut column_sums = Vec::with_capacity(prefs.persons().len());
    for (p, person) in prefs.persons().iter().enumerate() {
        let mut sum = 0.0;
        for (s, score) in scores.column(p).enumerate() {
            if !score.is_finite() || score < 0.0 {
                return Err(RosterError::InvalidPreferenceData(format!(
                    "person `{person}` has score {score} for slot `{}`",
                    prefs.slots()[s]
                )));
            }
            sum += score;
        }
        if sum <= 0.0 {
            warn!("Person `{}` is unavailable for every slot", person);
            return Err(RosterError::InvalidPreferenceData(format!(
                "preferences of person `{person}` sum to zero"
            )));
        }
        column_sums.push(sum);
    }

    let mut weights = scores.clone();
    for ((s, p), score) in scores.indexed() {
        weights.set(s, p, score / column_sums[p] * total);
    }
    debug!(
        "Normalized {} x {} preferences ({}), column total {}",
        prefs.slots().len(),
        prefs.persons().len(),
        mode,
        total
    );

    Ok(NormalizedPreferences {
        slots: prefs.slots().to_vec(),
        persons: prefs.persons().to_vec(),
        weights,
        mode,
    })
}
