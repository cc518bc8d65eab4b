//! Observability: Sentry integration and audit trail
//!
//! Error tracking is enabled via the SENTRY_DSN env var; money-moving and
//! privileged operations leave a row in the `events` table.

use crate::db::{queries, DbPool};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Initialize Sentry if SENTRY_DSN is set
pub fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;

    if dsn.is_empty() {
        info!("Sentry DSN is empty, error tracking disabled");
        return None;
    }

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("ENVIRONMENT").ok().map(|s| s.into()),
            traces_sample_rate: 0.1,
            ..Default::default()
        },
    ));

    info!("Sentry initialized for error tracking");
    Some(guard)
}

/// Audit event types recorded to the events table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Ledger
    DepositRequested,
    WithdrawalRequested,
    TransactionApproved,
    TransactionRejected,
    BalanceAdjusted,

    // Tournaments
    TournamentCreated,
    TournamentStarted,
    TournamentCompleted,
    TournamentCancelled,

    // Security
    UserFlaggedSuspicious,
    SuspiciousFlagCleared,
    LimitsReset,

    // Config
    SettingsUpdated,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_else(|_| "unknown".to_string());
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// Record an audit event. Failures are logged, never propagated: the audit
/// trail must not fail the operation it documents.
pub async fn audit(
    pool: &DbPool,
    event_type: AuditEventType,
    entity_type: &str,
    entity_id: &str,
    payload: Option<serde_json::Value>,
    actor: Option<&str>,
) {
    if let Err(e) = try_audit(pool, &event_type, entity_type, entity_id, payload, actor).await {
        tracing::warn!(event = %event_type, error = %e, "failed to write audit event");
    }
}

async fn try_audit(
    pool: &DbPool,
    event_type: &AuditEventType,
    entity_type: &str,
    entity_id: &str,
    payload: Option<serde_json::Value>,
    actor: Option<&str>,
) -> Result<()> {
    queries::log_event(
        pool,
        &event_type.to_string(),
        Some(entity_type),
        Some(entity_id),
        payload.as_ref(),
        actor,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_type_display() {
        assert_eq!(
            AuditEventType::TournamentCompleted.to_string(),
            "tournament_completed"
        );
        assert_eq!(
            AuditEventType::UserFlaggedSuspicious.to_string(),
            "user_flagged_suspicious"
        );
    }
}
