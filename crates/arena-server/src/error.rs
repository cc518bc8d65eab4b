//! Error taxonomy and HTTP mapping
//!
//! Every rejected operation surfaces a stable machine-readable code plus a
//! human-readable reason. Internal failures are logged but never leak detail
//! to the caller.

use crate::models::GateReason;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("tournament dates are invalid")]
    InvalidDates,

    #[error("user is already a participant")]
    AlreadyParticipant,

    #[error("tournament roster is full")]
    TournamentFull,

    #[error("registration window is closed")]
    RegistrationClosed,

    #[error("tournament has already started")]
    TournamentStarted,

    #[error("not enough participants to start")]
    NotEnoughParticipants,

    #[error("user is not a participant")]
    NotAParticipant,

    #[error("tournament not found")]
    TournamentNotFound,

    #[error("tournament is not active")]
    TournamentNotActive,

    #[error("user not found")]
    UserNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("transaction is not pending")]
    TransactionNotPending,

    #[error("rate limited: {reason:?}")]
    RateLimited {
        reason: GateReason,
        reset_time: Option<i64>,
    },

    #[error("account is flagged for suspicious activity")]
    SuspiciousAccount,

    #[error("account is blocked")]
    AccountBlocked,

    #[error("invalid amount")]
    InvalidAmount,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    System(#[from] anyhow::Error),
}

impl ArenaError {
    /// Stable error code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            ArenaError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ArenaError::InvalidDates => "INVALID_DATES",
            ArenaError::AlreadyParticipant => "ALREADY_PARTICIPANT",
            ArenaError::TournamentFull => "TOURNAMENT_FULL",
            ArenaError::RegistrationClosed => "REGISTRATION_CLOSED",
            ArenaError::TournamentStarted => "TOURNAMENT_STARTED",
            ArenaError::NotEnoughParticipants => "NOT_ENOUGH_PARTICIPANTS",
            ArenaError::NotAParticipant => "NOT_A_PARTICIPANT",
            ArenaError::TournamentNotFound => "TOURNAMENT_NOT_FOUND",
            ArenaError::TournamentNotActive => "TOURNAMENT_NOT_ACTIVE",
            ArenaError::UserNotFound => "USER_NOT_FOUND",
            ArenaError::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ArenaError::TransactionNotPending => "TRANSACTION_NOT_PENDING",
            ArenaError::RateLimited { reason, .. } => reason.as_str(),
            ArenaError::SuspiciousAccount => "SUSPICIOUS_ACTIVITY",
            ArenaError::AccountBlocked => "ACCOUNT_BLOCKED",
            ArenaError::InvalidAmount => "INVALID_AMOUNT",
            ArenaError::Validation(_) => "VALIDATION_ERROR",
            ArenaError::System(_) => "SYSTEM_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ArenaError::InsufficientFunds
            | ArenaError::InvalidDates
            | ArenaError::AlreadyParticipant
            | ArenaError::TournamentFull
            | ArenaError::RegistrationClosed
            | ArenaError::TournamentStarted
            | ArenaError::NotEnoughParticipants
            | ArenaError::NotAParticipant
            | ArenaError::TournamentNotActive
            | ArenaError::TransactionNotPending
            | ArenaError::InvalidAmount
            | ArenaError::Validation(_) => StatusCode::BAD_REQUEST,
            ArenaError::TournamentNotFound
            | ArenaError::UserNotFound
            | ArenaError::TransactionNotFound => StatusCode::NOT_FOUND,
            ArenaError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ArenaError::SuspiciousAccount | ArenaError::AccountBlocked => StatusCode::FORBIDDEN,
            ArenaError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ArenaError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            // Never leak internal error chains to the caller.
            ArenaError::System(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "code": self.code(),
            "message": message,
        });
        if let ArenaError::RateLimited {
            reset_time: Some(ts),
            ..
        } = &self
        {
            body["reset_time"] = json!(ts);
        }

        (status, Json(body)).into_response()
    }
}

pub type ArenaResult<T> = Result<T, ArenaError>;
