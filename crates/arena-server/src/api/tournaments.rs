//! Tournament API handlers
//!
//! Handlers delegate every transition to the `tournament` module, which owns
//! the locking and the ledger writes, and broadcast the transition event only
//! after the database transaction has committed.

use crate::db::queries;
use crate::error::{ArenaError, ArenaResult};
use crate::models::*;
use crate::observability::{audit, AuditEventType};
use crate::state::AppState;
use crate::tournament;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TournamentStatus>,
    pub limit: Option<i64>,
}

pub async fn list_tournaments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ArenaResult<Json<Vec<Tournament>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let tournaments = queries::list_tournaments(&state.db, query.status, limit)
        .await
        .map_err(ArenaError::System)?;
    Ok(Json(tournaments))
}

pub async fn get_tournament(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<Tournament>> {
    let tournament = queries::get_tournament_pooled(&state.db, id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;
    Ok(Json(tournament))
}

pub async fn get_participants(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<Vec<Participant>>> {
    let client = state
        .db
        .get()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;
    queries::get_tournament(&client, id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;
    let participants = queries::get_participants(&client, id)
        .await
        .map_err(ArenaError::System)?;
    Ok(Json(participants))
}

pub async fn create_tournament(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTournamentRequest>,
) -> ArenaResult<Json<Tournament>> {
    let settings = state.settings();
    let (tournament, event) = tournament::create(&state.db, &settings, &req).await?;

    audit(
        &state.db,
        AuditEventType::TournamentCreated,
        "tournament",
        &tournament.id.to_string(),
        Some(json!({ "creator_id": req.creator_id, "entry_fee": req.entry_fee })),
        None,
    )
    .await;
    state.broadcast_event(event);
    Ok(Json(tournament))
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub user_id: Uuid,
}

pub async fn join_tournament(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinRequest>,
) -> ArenaResult<Json<Tournament>> {
    let (tournament, event) = tournament::join(&state.db, id, req.user_id).await?;
    state.broadcast_event(event);
    Ok(Json(tournament))
}

pub async fn leave_tournament(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinRequest>,
) -> ArenaResult<Json<Tournament>> {
    let (tournament, event) = tournament::leave(&state.db, id, req.user_id).await?;
    state.broadcast_event(event);
    Ok(Json(tournament))
}

pub async fn start_tournament(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<Tournament>> {
    let (tournament, event) = tournament::start(&state.db, id).await?;

    audit(
        &state.db,
        AuditEventType::TournamentStarted,
        "tournament",
        &id.to_string(),
        None,
        None,
    )
    .await;
    state.broadcast_event(event);
    Ok(Json(tournament))
}

pub async fn record_score(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordScoreRequest>,
) -> ArenaResult<Json<serde_json::Value>> {
    tournament::record_score(&state.db, id, &req).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn complete_tournament(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<Tournament>> {
    let (tournament, event) = tournament::complete(&state.db, id).await?;

    audit(
        &state.db,
        AuditEventType::TournamentCompleted,
        "tournament",
        &id.to_string(),
        Some(json!({ "winner_id": tournament.winner_id })),
        None,
    )
    .await;
    state.broadcast_event(event);
    Ok(Json(tournament))
}

pub async fn cancel_tournament(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ArenaResult<Json<Tournament>> {
    let (tournament, event) = tournament::cancel(&state.db, id).await?;

    audit(
        &state.db,
        AuditEventType::TournamentCancelled,
        "tournament",
        &id.to_string(),
        None,
        None,
    )
    .await;
    state.broadcast_event(event);
    Ok(Json(tournament))
}
