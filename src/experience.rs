use log::debug;

use crate::data::{ExperienceIndicator, ExperienceTable, PersonId};
use crate::error::{Result, RosterError};

/// Flags every person whose months of experience strictly exceed `threshold`.
///
/// The indicator follows the order of `persons` (the preference table's columns). Every one of
/// them needs an entry in `months`; extra entries are ignored.
pub fn classify(
    persons: &[PersonId],
    months: &ExperienceTable,
    threshold: u32,
) -> Result<ExperienceIndicator> {
    let threshold = f64::from(threshold);
    let flags = persons
        .iter()
        .map(|person| match months.get(person) {
            Some(m) if m.is_finite() => Ok(*m > threshold),
            Some(m) => Err(RosterError::InvalidExperienceData(format!(
                "person `{person}` has {m} months of experience"
            ))),
            None => Err(RosterError::InvalidExperienceData(format!(
                "no experience entry for person `{person}`"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let indicator = ExperienceIndicator(flags);
    debug!(
        "{} of {} persons have more than {} months of experience",
        indicator.experienced_count(),
        indicator.len(),
        threshold
    );
    Ok(indicator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persons() -> Vec<PersonId> {
        vec!["ann".into(), "bob".into(), "cas".into()]
    }

    #[test]
    fn threshold_is_strict() {
        let months = ExperienceTable::from([
            ("ann".to_string(), 6.0),
            ("bob".to_string(), 7.0),
            ("cas".to_string(), 0.5),
        ]);
        let indicator = classify(&persons(), &months, 6).unwrap();
        assert_eq!(indicator.as_slice(), &[false, true, false]);
        assert_eq!(indicator.experienced_count(), 1);
    }

    #[test]
    fn follows_person_order_and_ignores_extras() {
        let months = ExperienceTable::from([
            ("cas".to_string(), 24.0),
            ("zed".to_string(), 99.0),
            ("ann".to_string(), 12.0),
            ("bob".to_string(), 1.0),
        ]);
        let indicator = classify(&persons(), &months, 6).unwrap();
        assert_eq!(indicator.as_slice(), &[true, false, true]);
    }

    #[test]
    fn missing_person_is_rejected() {
        let months = ExperienceTable::from([("ann".to_string(), 6.0), ("cas".to_string(), 1.0)]);
        match classify(&persons(), &months, 6) {
            Err(RosterError::InvalidExperienceData(msg)) => assert!(msg.contains("bob")),
            other => panic!("expected invalid experience data, got {other:?}"),
        }
    }
}
