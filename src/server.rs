use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use log::{info, warn};

use crate::config::{self, Config};
use crate::data::{PreferenceTable, SolveRequest, SolveResponse};
use crate::error::RosterError;
use crate::solver::{BackendKind, SolveOptions};

/// Shared, read-only handler state.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    default_config: Option<Config>,
}

impl AppState {
    /// Config used by requests that carry none of their own.
    pub fn with_default_config(config: Config) -> Self {
        AppState {
            default_config: Some(config),
        }
    }
}

type ApiError = (StatusCode, String);

async fn solve_handler(
    State(state): State<AppState>,
    Json(input): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, ApiError> {
    // the solve blocks; keep it off the async workers
    tokio::task::spawn_blocking(move || solve_request(&state, input))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map(Json)
}

fn solve_request(state: &AppState, input: SolveRequest) -> Result<SolveResponse, ApiError> {
    let config = match &input.config {
        Some(map) => Config::from_map(map).map_err(reject)?,
        None => state.default_config.ok_or_else(|| {
            reject(RosterError::ConfigMissingKey(
                config::SLOTS_PER_PERSON_MAX.to_string(),
            ))
        })?,
    };
    let kind = match input.backend.as_deref() {
        Some(name) => name
            .parse::<BackendKind>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => BackendKind::default(),
    };
    let time_limit = input
        .time_limit_seconds
        .map(parse_time_limit)
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let options = SolveOptions {
        time_limit,
        ..SolveOptions::default()
    };

    let prefs =
        PreferenceTable::new(input.slots, input.persons, input.preferences).map_err(reject)?;
    let evaluation = crate::roster(
        config,
        &prefs,
        &input.experience,
        kind.backend().as_ref(),
        &options,
    )
    .map_err(reject)?;
    info!(
        "Rostered {} slots x {} persons ({})",
        prefs.slots().len(),
        prefs.persons().len(),
        evaluation.status
    );
    Ok(evaluation.to_response())
}

fn parse_time_limit(seconds: f64) -> Result<Duration, String> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(limit) if !limit.is_zero() => Ok(limit),
        Ok(_) => Err("timeLimitSeconds must be positive".to_string()),
        Err(e) => Err(format!("invalid timeLimitSeconds {seconds}: {e}")),
    }
}

fn reject(err: RosterError) -> ApiError {
    let status = match &err {
        RosterError::InvalidPreferenceData(_)
        | RosterError::InvalidExperienceData(_)
        | RosterError::ConfigMissingKey(_)
        | RosterError::InvalidConfigValue { .. }
        | RosterError::ConfigParse(_) => StatusCode::BAD_REQUEST,
        RosterError::InfeasibleModel => StatusCode::UNPROCESSABLE_ENTITY,
        RosterError::SolverError(_)
        | RosterError::Io(_)
        | RosterError::NotConverged(_)
        | RosterError::InvalidTransition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("Rejecting solve request ({}): {}", status, err);
    (status, err.to_string())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/roster/solve", post(solve_handler))
        .with_state(state)
}

pub async fn run_server(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await
}
