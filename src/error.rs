use thiserror::Error;

use crate::lifecycle::Lifecycle;

/// Everything that can go wrong between raw tables and an evaluated roster.
#[derive(Debug, Error)]
pub enum RosterError {
    /// A preference column is empty, negative, non-finite or otherwise unusable.
    #[error("invalid preference data: {0}")]
    InvalidPreferenceData(String),

    /// A person in the preference table has no experience entry.
    #[error("invalid experience data: {0}")]
    InvalidExperienceData(String),

    #[error("missing config key `{0}`")]
    ConfigMissingKey(String),

    #[error("config key `{key}` has invalid value `{value}`: expected a non-negative integer")]
    InvalidConfigValue { key: String, value: String },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The solver proved that no assignment satisfies every constraint.
    #[error("model is infeasible: no assignment satisfies all constraints")]
    InfeasibleModel,

    #[error("solver error: {0}")]
    SolverError(String),

    /// Results were requested from a model without a usable solution.
    #[error("model has not converged (state: {0})")]
    NotConverged(Lifecycle),

    #[error("cannot {action} a model in state {state}")]
    InvalidTransition {
        action: &'static str,
        state: Lifecycle,
    },
}

pub type Result<T> = std::result::Result<T, RosterError>;
