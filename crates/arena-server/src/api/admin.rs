//! Admin API handlers
//!
//! Review surface for the pending deposit/withdrawal queue, manual balance
//! corrections, and the rate-limiter escape hatches. Every handler here
//! writes an audit event.

use crate::api::wallet;
use crate::db::queries;
use crate::error::{ArenaError, ArenaResult};
use crate::ledger::{self, LedgerOp};
use crate::models::*;
use crate::observability::{audit, AuditEventType};
use crate::security;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub async fn list_pending_transactions(
    State(state): State<Arc<AppState>>,
) -> ArenaResult<Json<Vec<Transaction>>> {
    let pending = queries::get_pending_transactions(&state.db)
        .await
        .map_err(ArenaError::System)?;
    Ok(Json(pending))
}

pub async fn approve_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<Transaction>> {
    let record = ledger::approve_pending(&state.db, id).await?;

    audit(
        &state.db,
        AuditEventType::TransactionApproved,
        "transaction",
        &id.to_string(),
        Some(json!({ "user_id": record.user_id, "kind": record.kind.as_str() })),
        None,
    )
    .await;
    wallet::broadcast_balance(&state, record.user_id).await;
    Ok(Json(record))
}

pub async fn reject_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<Transaction>> {
    let record = ledger::reject_pending(&state.db, id).await?;

    audit(
        &state.db,
        AuditEventType::TransactionRejected,
        "transaction",
        &id.to_string(),
        Some(json!({ "user_id": record.user_id, "kind": record.kind.as_str() })),
        None,
    )
    .await;
    wallet::broadcast_balance(&state, record.user_id).await;
    Ok(Json(record))
}

pub async fn adjust_balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdjustBalanceRequest>,
) -> ArenaResult<Json<Transaction>> {
    if req.delta == 0 {
        return Err(ArenaError::InvalidAmount);
    }
    let op = LedgerOp::new(
        user_id,
        req.bucket,
        req.delta.abs(),
        TxKind::AdminAdjustment {
            note: req.note.clone(),
        },
    );
    let record = if req.delta > 0 {
        ledger::credit(&state.db, &op.with_category(TxCategory::Income)).await?
    } else {
        ledger::debit(&state.db, &op.with_category(TxCategory::Expense)).await?
    };

    audit(
        &state.db,
        AuditEventType::BalanceAdjusted,
        "user",
        &user_id.to_string(),
        Some(json!({ "delta": req.delta, "bucket": req.bucket.as_str() })),
        None,
    )
    .await;
    wallet::broadcast_balance(&state, user_id).await;
    Ok(Json(record))
}

pub async fn get_attempt_stats(
    State(state): State<Arc<AppState>>,
    Path((user_id, difficulty)): Path<(Uuid, Difficulty)>,
) -> ArenaResult<Json<AttemptStats>> {
    let settings = state.settings();
    let stats = security::attempt_stats(&state.db, &settings.security, user_id, difficulty).await?;
    Ok(Json(stats))
}

pub async fn reset_limits(
    State(state): State<Arc<AppState>>,
    Path((user_id, difficulty)): Path<(Uuid, Difficulty)>,
) -> ArenaResult<Json<serde_json::Value>> {
    let dropped = security::reset_limits(&state.db, user_id, difficulty).await?;

    audit(
        &state.db,
        AuditEventType::LimitsReset,
        "user",
        &user_id.to_string(),
        Some(json!({ "difficulty": difficulty.as_str(), "dropped": dropped })),
        None,
    )
    .await;
    Ok(Json(json!({ "success": true, "dropped": dropped })))
}

pub async fn clear_suspicious(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> ArenaResult<Json<serde_json::Value>> {
    let cleared = security::clear_suspicious(&state.db, user_id).await?;

    if cleared {
        audit(
            &state.db,
            AuditEventType::SuspiciousFlagCleared,
            "user",
            &user_id.to_string(),
            None,
            None,
        )
        .await;
    }
    Ok(Json(json!({ "success": true, "cleared": cleared })))
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<crate::config::Settings> {
    Json(state.settings())
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<crate::config::Settings>,
) -> ArenaResult<Json<crate::config::Settings>> {
    state.update_settings(settings.clone());

    audit(
        &state.db,
        AuditEventType::SettingsUpdated,
        "settings",
        "runtime",
        serde_json::to_value(&settings).ok(),
        None,
    )
    .await;
    Ok(Json(settings))
}
