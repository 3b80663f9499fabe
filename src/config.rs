//! Tunable roster parameters.
//!
//! A [`Config`] is read once from a key/value map (YAML file, or the `config` object of a
//! solve request) and never changes for the lifetime of a model. All five capacity, coverage
//! and skill-mix keys are required; `normalization` is optional.
//!
//! ```
//! use slot_roster::config::{Config, NormalizationMode};
//!
//! let config = Config::from_yaml_str(
//!     "slots_per_person_max: 2
//! persons_per_slot_min: 2
//! persons_per_slot_max: 2
//! experience_months: 6
//! min_experienced_persons: 1",
//! )
//! .unwrap();
//!
//! assert_eq!(config.persons_per_slot_min(), 2);
//! assert_eq!(config.normalization(), NormalizationMode::SlotCount);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{Result, RosterError};

pub const SLOTS_PER_PERSON_MAX: &str = "slots_per_person_max";
pub const PERSONS_PER_SLOT_MIN: &str = "persons_per_slot_min";
pub const PERSONS_PER_SLOT_MAX: &str = "persons_per_slot_max";
pub const EXPERIENCE_MONTHS: &str = "experience_months";
pub const MIN_EXPERIENCED_PERSONS: &str = "min_experienced_persons";
pub const NORMALIZATION: &str = "normalization";

/// How each person's preference column is rescaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Columns sum to the number of slots; a uniform column is all ones.
    #[default]
    SlotCount,
    /// Columns sum to one.
    UnitSum,
}

impl NormalizationMode {
    /// The sum every normalized column has under this mode.
    pub fn column_total(self, slot_count: usize) -> f64 {
        match self {
            NormalizationMode::SlotCount => slot_count as f64,
            NormalizationMode::UnitSum => 1.0,
        }
    }

    fn parse(value: &Value) -> Result<Self> {
        match value.as_str() {
            Some("slot_count") => Ok(NormalizationMode::SlotCount),
            Some("unit_sum") => Ok(NormalizationMode::UnitSum),
            _ => Err(RosterError::InvalidConfigValue {
                key: NORMALIZATION.to_string(),
                value: render(value),
            }),
        }
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMode::SlotCount => write!(f, "slot_count"),
            NormalizationMode::UnitSum => write!(f, "unit_sum"),
        }
    }
}

/// Validated roster parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Config {
    slots_per_person_max: u32,
    persons_per_slot_min: u32,
    persons_per_slot_max: u32,
    experience_months: u32,
    min_experienced_persons: u32,
    normalization: NormalizationMode,
}

impl Config {
    /// Builds a config from a key/value map. Unknown keys are ignored.
    pub fn from_map(map: &BTreeMap<String, Value>) -> Result<Self> {
        let normalization = match map.get(NORMALIZATION) {
            Some(value) => NormalizationMode::parse(value)?,
            None => NormalizationMode::default(),
        };
        let config = Config {
            slots_per_person_max: required(map, SLOTS_PER_PERSON_MAX)?,
            persons_per_slot_min: required(map, PERSONS_PER_SLOT_MIN)?,
            persons_per_slot_max: required(map, PERSONS_PER_SLOT_MAX)?,
            experience_months: required(map, EXPERIENCE_MONTHS)?,
            min_experienced_persons: required(map, MIN_EXPERIENCED_PERSONS)?,
            normalization,
        };
        debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let map: BTreeMap<String, Value> = serde_yaml::from_str(yaml)?;
        Self::from_map(&map)
    }

    /// Reads a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same parameters, different normalization convention.
    pub fn with_normalization(self, normalization: NormalizationMode) -> Self {
        Config {
            normalization,
            ..self
        }
    }

    pub fn slots_per_person_max(&self) -> u32 {
        self.slots_per_person_max
    }

    pub fn persons_per_slot_min(&self) -> u32 {
        self.persons_per_slot_min
    }

    pub fn persons_per_slot_max(&self) -> u32 {
        self.persons_per_slot_max
    }

    /// Months of experience a person must strictly exceed to count as experienced.
    pub fn experience_months(&self) -> u32 {
        self.experience_months
    }

    pub fn min_experienced_persons(&self) -> u32 {
        self.min_experienced_persons
    }

    pub fn normalization(&self) -> NormalizationMode {
        self.normalization
    }
}

fn required(map: &BTreeMap<String, Value>, key: &str) -> Result<u32> {
    let value = map
        .get(key)
        .ok_or_else(|| RosterError::ConfigMissingKey(key.to_string()))?;
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| RosterError::InvalidConfigValue {
            key: key.to_string(),
            value: render(value),
        })
}

fn render(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{value:?}"))
}
