//! Wallet API handlers
//!
//! Deposits and withdrawals are asymmetric on purpose. A deposit request
//! records a pending transaction and moves no money until an admin approves
//! it. A withdrawal debits the bucket immediately as a hold, so the user
//! cannot spend funds that are on their way out.

use crate::db::queries;
use crate::error::{ArenaError, ArenaResult};
use crate::ledger::{self, LedgerOp};
use crate::models::*;
use crate::observability::{audit, AuditEventType};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub playable_balance: i64,
    pub bonus_balance: i64,
    pub balance: i64,
    pub total_earned: i64,
}

pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> ArenaResult<Json<BalanceResponse>> {
    let user = queries::get_user_pooled(&state.db, user_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::UserNotFound)?;
    Ok(Json(BalanceResponse {
        user_id: user.id,
        playable_balance: user.playable_balance,
        bonus_balance: user.bonus_balance,
        balance: user.balance(),
        total_earned: user.total_earned,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ArenaResult<Json<Vec<Transaction>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let transactions = queries::get_transactions_for_user(&state.db, user_id, limit)
        .await
        .map_err(ArenaError::System)?;
    Ok(Json(transactions))
}

pub async fn request_deposit(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<DepositRequest>,
) -> ArenaResult<Json<Transaction>> {
    let op = LedgerOp::new(
        user_id,
        BalanceBucket::Playable,
        req.amount,
        TxKind::Deposit {
            network: req.network,
            address: req.address,
        },
    );
    let record = ledger::record_pending(&state.db, &op).await?;

    audit(
        &state.db,
        AuditEventType::DepositRequested,
        "transaction",
        &record.id.to_string(),
        Some(json!({ "user_id": user_id, "amount": req.amount })),
        None,
    )
    .await;
    Ok(Json(record))
}

pub async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<WithdrawRequest>,
) -> ArenaResult<Json<Transaction>> {
    // Hold: the debit lands now, the record stays pending until review.
    let op = LedgerOp::new(
        user_id,
        BalanceBucket::Playable,
        req.amount,
        TxKind::Withdrawal {
            network: req.network,
            address: req.address,
        },
    )
    .with_status(TxStatus::Pending);
    let record = ledger::debit(&state.db, &op).await?;

    audit(
        &state.db,
        AuditEventType::WithdrawalRequested,
        "transaction",
        &record.id.to_string(),
        Some(json!({ "user_id": user_id, "amount": req.amount })),
        None,
    )
    .await;
    broadcast_balance(&state, user_id).await;
    Ok(Json(record))
}

/// Push the post-commit balance to subscribers. Read failures are dropped,
/// the money has already moved and the client can refetch.
pub async fn broadcast_balance(state: &Arc<AppState>, user_id: Uuid) {
    if let Ok(Some(user)) = queries::get_user_pooled(&state.db, user_id).await {
        state.broadcast_event(WsEvent::BalanceChanged(BalanceChangedEvent {
            user_id: user.id,
            playable_balance: user.playable_balance,
            bonus_balance: user.bonus_balance,
            balance: user.balance(),
        }));
    }
}
