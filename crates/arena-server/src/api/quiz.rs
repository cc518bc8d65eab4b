//! Quiz API handlers
//!
//! The gate endpoint is an advisory read for clients. Submission enforces
//! the gate itself: `security::record_attempt` evaluates the caps and
//! inserts the attempt in one transaction under the per-(user, difficulty)
//! advisory lock, so two in-flight submissions cannot both slip under a
//! window cap.

use crate::db::queries;
use crate::error::{ArenaError, ArenaResult};
use crate::models::*;
use crate::security;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct GateQuery {
    pub user_id: Uuid,
    pub difficulty: Difficulty,
}

pub async fn check_gate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GateQuery>,
) -> ArenaResult<Json<QuizGate>> {
    let settings = state.settings();
    let gate =
        security::can_take_quiz(&state.db, &settings.security, query.user_id, query.difficulty)
            .await?;
    Ok(Json(gate))
}

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub difficulty: Difficulty,
    pub limit: Option<i64>,
}

pub async fn get_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionsQuery>,
) -> ArenaResult<Json<Vec<Question>>> {
    let limit = query.limit.unwrap_or(10).clamp(1, 50);
    let questions = queries::get_questions(&state.db, query.difficulty, limit)
        .await
        .map_err(ArenaError::System)?;
    Ok(Json(questions))
}

#[derive(Debug, Serialize)]
pub struct SubmitAttemptResponse {
    pub accepted: bool,
    pub xp_awarded: i64,
    pub correct_answers: i64,
}

pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitAttemptRequest>,
) -> ArenaResult<Json<SubmitAttemptResponse>> {
    let settings = state.settings();

    let outcome = security::record_attempt(
        &state.db,
        &settings.security,
        req.user_id,
        req.difficulty,
        req.score,
        req.time_spent,
        &req.answers,
    )
    .await?;

    let correct = req.answers.iter().filter(|a| a.correct).count() as i64;
    let xp_awarded = i64::from(req.score.max(0));
    queries::apply_quiz_progress(
        &state.db,
        req.user_id,
        xp_awarded,
        correct,
        settings.xp_per_level,
    )
    .await
    .map_err(ArenaError::System)?;

    for answer in &req.answers {
        queries::record_question_usage(&state.db, answer.question_id, answer.correct)
            .await
            .map_err(ArenaError::System)?;
    }

    info!(
        user_id = %req.user_id,
        difficulty = req.difficulty.as_str(),
        score = req.score,
        flags = outcome.flags,
        "quiz attempt recorded"
    );

    Ok(Json(SubmitAttemptResponse {
        accepted: true,
        xp_awarded,
        correct_answers: correct,
    }))
}
