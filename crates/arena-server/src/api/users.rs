//! User API handlers

use crate::api::wallet;
use crate::db::queries;
use crate::error::{ArenaError, ArenaResult};
use crate::ledger::{self, LedgerOp};
use crate::models::*;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> ArenaResult<Json<User>> {
    if req.username.trim().is_empty() {
        return Err(ArenaError::Validation("username is required".into()));
    }

    // A referral code pointing nowhere registers the user without a referrer.
    let mut req = req;
    if let Some(referrer) = req.referred_by {
        let exists = queries::get_user_pooled(&state.db, referrer)
            .await
            .map_err(ArenaError::System)?
            .is_some();
        if !exists {
            warn!(referrer = %referrer, "referral code does not match a user, ignoring");
            req.referred_by = None;
        }
    }

    let user = queries::create_user(&state.db, &req)
        .await
        .map_err(ArenaError::System)?;
    info!(user_id = %user.id, username = %user.username, "user registered");

    if let Some(referrer) = user.referred_by {
        let settings = state.settings();
        let op = LedgerOp::new(
            referrer,
            BalanceBucket::Bonus,
            settings.referral_reward,
            TxKind::Referral {
                referred_user: user.id,
            },
        );
        match ledger::credit(&state.db, &op).await {
            Ok(_) => wallet::broadcast_balance(&state, referrer).await,
            // Registration stands even when the reward cannot be paid.
            Err(e) => warn!(referrer = %referrer, error = %e, "referral reward failed"),
        }
    }

    Ok(Json(user))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<User>> {
    let user = queries::get_user_pooled(&state.db, id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::UserNotFound)?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> ArenaResult<Json<Vec<LeaderboardEntry>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let entries = queries::get_leaderboard(&state.db, limit)
        .await
        .map_err(ArenaError::System)?;
    Ok(Json(entries))
}

pub async fn get_online_users(State(state): State<Arc<AppState>>) -> Json<Vec<Uuid>> {
    Json(state.broadcaster.online_users())
}
