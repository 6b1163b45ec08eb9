//! Feature flag administration
//!
//! All routes sit behind the RLS guard with `admin` on `users`.

use crate::error::{AppError, Result};
use crate::flags::{FeatureConfig, FeatureFlag, UsageStats};
use crate::middleware::RlsContextExt;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagsResponse {
    pub config: FeatureConfig,
    pub issues: Vec<String>,
    pub usage: BTreeMap<String, UsageStats>,
}

#[derive(Debug, Deserialize)]
pub struct KillSwitchRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub flag: FeatureFlag,
    pub value: bool,
}

fn snapshot(state: &AppState) -> FlagsResponse {
    FlagsResponse {
        config: state.flags.get_config(),
        issues: state.flags.validate(),
        usage: state.flags.usage_stats(),
    }
}

/// GET /api/v1/flags
pub async fn get_flags(State(state): State<AppState>) -> Json<FlagsResponse> {
    Json(snapshot(&state))
}

/// POST /api/v1/flags/kill-switch
pub async fn set_kill_switch(
    State(state): State<AppState>,
    RlsContextExt(context): RlsContextExt,
    Json(body): Json<KillSwitchRequest>,
) -> Json<FlagsResponse> {
    tracing::warn!(
        user_id = %context.user_id,
        active = body.active,
        "Kill switch change requested"
    );
    if body.active {
        state.flags.activate_kill_switch();
    } else {
        state.flags.deactivate_kill_switch();
    }
    Json(snapshot(&state))
}

/// POST /api/v1/flags/overrides
pub async fn override_flag(
    State(state): State<AppState>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<FlagsResponse>> {
    if !state.flags.override_flag(body.flag, body.value) {
        return Err(AppError::PermissionDenied(format!(
            "Overrides are not allowed in {}",
            state.flags.environment().as_str()
        )));
    }
    Ok(Json(snapshot(&state)))
}

/// DELETE /api/v1/flags/overrides
pub async fn reset_overrides(State(state): State<AppState>) -> Result<Json<FlagsResponse>> {
    if !state.flags.reset() {
        return Err(AppError::PermissionDenied(format!(
            "Overrides cannot be reset in {}",
            state.flags.environment().as_str()
        )));
    }
    Ok(Json(snapshot(&state)))
}
