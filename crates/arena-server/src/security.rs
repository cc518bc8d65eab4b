//! Quiz security: rate limiting and fraud heuristics
//!
//! Decides whether a user may start or submit a quiz attempt, and flags
//! accounts whose behavior looks automated. Attempt windows live in the
//! `quiz_attempts` table keyed by (user_id, difficulty) so the caps hold
//! across restarts and across server instances; the suspicious set is the
//! `suspicious_users` table, sticky until an admin clears it.
//!
//! Read-then-write counter races are closed with a per-(user, difficulty)
//! advisory lock held for the enclosing database transaction.

use crate::config::SecurityConfig;
use crate::db::queries;
use crate::error::{ArenaError, ArenaResult};
use crate::models::{AnswerRecord, AttemptStats, Difficulty, GateReason, QuizGate};
use deadpool_postgres::Pool;
use deadpool_postgres::GenericClient;
use tracing::{info, warn};
use uuid::Uuid;

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;

/// Counter snapshot the gate decision is made from.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowSnapshot {
    pub daily_count: u32,
    pub hourly_count: u32,
    /// Oldest attempt inside the sliding hour, unix seconds.
    pub hour_window_start: Option<i64>,
    pub last_attempt: Option<i64>,
    pub suspicious: bool,
}

/// Pure gate decision. Checks run in a fixed order; the first failing check
/// determines the reason and reset time.
pub fn evaluate_gate(cfg: &SecurityConfig, now: i64, snap: &WindowSnapshot) -> QuizGate {
    if snap.daily_count >= cfg.max_daily_attempts {
        let next_midnight = (now / SECONDS_PER_DAY + 1) * SECONDS_PER_DAY;
        return QuizGate::deny(GateReason::DailyLimitExceeded, Some(next_midnight));
    }
    if snap.hourly_count >= cfg.max_hourly_attempts {
        let reset = snap
            .hour_window_start
            .map(|start| start + SECONDS_PER_HOUR)
            .unwrap_or(now + SECONDS_PER_HOUR);
        return QuizGate::deny(GateReason::HourlyLimitExceeded, Some(reset));
    }
    if let Some(last) = snap.last_attempt {
        let elapsed = now - last;
        if elapsed < cfg.cooldown_seconds {
            return QuizGate::deny(GateReason::CooldownActive, Some(last + cfg.cooldown_seconds));
        }
    }
    if snap.suspicious {
        // No reset time: suspicious accounts stay blocked until an admin
        // clears the flag.
        return QuizGate::deny(GateReason::SuspiciousActivity, None);
    }
    QuizGate::allow()
}

/// Count the heuristic flags a completed attempt trips.
///
/// `prior_scores` are the user's previous scores at this difficulty, newest
/// first, not including the attempt under evaluation.
pub fn suspicion_flags(
    cfg: &SecurityConfig,
    score: i32,
    time_spent: i64,
    answers: &[AnswerRecord],
    prior_scores: &[i32],
) -> u32 {
    let mut flags = 0u32;

    // High-score streak including this attempt.
    if score >= cfg.high_score_threshold {
        let streak = 1 + prior_scores
            .iter()
            .take_while(|s| **s >= cfg.high_score_threshold)
            .count() as u32;
        if streak >= cfg.high_score_streak {
            flags += 1;
        }
    }

    if !answers.is_empty() {
        let avg_seconds = time_spent as f64 / answers.len() as f64;
        if avg_seconds < cfg.min_avg_seconds_per_question {
            flags += 1;
        }
        if avg_seconds > cfg.max_avg_seconds_per_question {
            flags += 1;
        }
        let all_correct = answers.iter().all(|a| a.correct);
        if all_correct && avg_seconds < cfg.perfect_score_fast_seconds {
            flags += 1;
        }
    }

    // Uniform per-answer timing points at a bot.
    if answers.len() >= cfg.min_answers_for_variance {
        let times: Vec<f64> = answers.iter().map(|a| a.time_ms as f64).collect();
        let mean = times.iter().sum::<f64>() / times.len() as f64;
        let variance =
            times.iter().map(|t| (t - mean) * (t - mean)).sum::<f64>() / times.len() as f64;
        if variance < cfg.min_timing_variance_ms2 {
            flags += 1;
        }
    }

    flags
}

async fn read_snapshot(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
) -> ArenaResult<WindowSnapshot> {
    let daily_count = queries::count_attempts_today(client, user_id, difficulty)
        .await
        .map_err(ArenaError::System)?;
    let hourly_count = queries::count_attempts_last_hour(client, user_id, difficulty)
        .await
        .map_err(ArenaError::System)?;
    let hour_window_start = queries::oldest_attempt_last_hour(client, user_id, difficulty)
        .await
        .map_err(ArenaError::System)?;
    let last_attempt = queries::last_attempt_at(client, user_id, difficulty)
        .await
        .map_err(ArenaError::System)?;
    let suspicious = queries::is_suspicious(client, user_id)
        .await
        .map_err(ArenaError::System)?;
    Ok(WindowSnapshot {
        daily_count,
        hourly_count,
        hour_window_start,
        last_attempt,
        suspicious,
    })
}

/// Map a denied gate to the error surfaced to the caller.
fn denial_error(gate: &QuizGate) -> ArenaError {
    match gate.reason {
        Some(GateReason::SuspiciousActivity) | None => ArenaError::SuspiciousAccount,
        Some(reason) => ArenaError::RateLimited {
            reason,
            reset_time: gate.reset_time,
        },
    }
}

/// Advisory gate check for clients that want to know whether a submission
/// would be accepted. The binding check runs again inside `record_attempt`,
/// under the same transaction as the insert; this read releases its lock at
/// commit and its answer can go stale.
pub async fn can_take_quiz(
    pool: &Pool,
    cfg: &SecurityConfig,
    user_id: Uuid,
    difficulty: Difficulty,
) -> ArenaResult<QuizGate> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;
    queries::lock_attempt_window(&txn, user_id, difficulty)
        .await
        .map_err(ArenaError::System)?;

    let snap = read_snapshot(&txn, user_id, difficulty).await?;
    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    let now = chrono::Utc::now().timestamp();
    Ok(evaluate_gate(cfg, now, &snap))
}

#[derive(Debug, Clone, Copy)]
pub struct AttemptOutcome {
    pub flags: u32,
    pub suspicious: bool,
}

/// Record a scored attempt: enforce the gate, append to the rolling windows
/// and evaluate the fraud heuristics. A flagged user lands in the sticky
/// suspicious set.
///
/// The gate is evaluated in the same transaction as the insert, after taking
/// the per-(user, difficulty) advisory lock, so two concurrent submissions
/// serialize and the second observes the first one's attempt row. An earlier
/// `can_take_quiz` answer is not trusted here.
pub async fn record_attempt(
    pool: &Pool,
    cfg: &SecurityConfig,
    user_id: Uuid,
    difficulty: Difficulty,
    score: i32,
    time_spent: i64,
    answers: &[AnswerRecord],
) -> ArenaResult<AttemptOutcome> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;
    queries::lock_attempt_window(&txn, user_id, difficulty)
        .await
        .map_err(ArenaError::System)?;

    let snap = read_snapshot(&txn, user_id, difficulty).await?;
    let gate = evaluate_gate(cfg, chrono::Utc::now().timestamp(), &snap);
    if !gate.allowed {
        return Err(denial_error(&gate));
    }

    let prior_scores =
        queries::recent_scores(&txn, user_id, difficulty, cfg.high_score_streak as i64)
            .await
            .map_err(ArenaError::System)?;

    let flags = suspicion_flags(cfg, score, time_spent, answers, &prior_scores);
    let suspicious = flags >= cfg.suspicion_flag_threshold;

    queries::insert_attempt(
        &txn,
        user_id,
        difficulty,
        score,
        time_spent,
        answers.len() as i32,
    )
    .await
    .map_err(ArenaError::System)?;

    if suspicious {
        let reason = format!(
            "{} heuristic flags at {} (score {}, {}s, {} answers)",
            flags,
            difficulty.as_str(),
            score,
            time_spent,
            answers.len()
        );
        queries::flag_suspicious(&txn, user_id, &reason, flags as i32)
            .await
            .map_err(ArenaError::System)?;
        warn!(user_id = %user_id, flags, "user flagged as suspicious");
    }

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;
    Ok(AttemptOutcome { flags, suspicious })
}

/// Read-side statistics for the admin surface.
pub async fn attempt_stats(
    pool: &Pool,
    cfg: &SecurityConfig,
    user_id: Uuid,
    difficulty: Difficulty,
) -> ArenaResult<AttemptStats> {
    let client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let snap = read_snapshot(&client, user_id, difficulty).await?;
    let scores = queries::recent_scores(&client, user_id, difficulty, cfg.high_score_streak as i64)
        .await
        .map_err(ArenaError::System)?;
    let consecutive_high_scores = scores
        .iter()
        .take_while(|s| **s >= cfg.high_score_threshold)
        .count() as u32;

    Ok(AttemptStats {
        user_id,
        difficulty,
        attempts_today: snap.daily_count,
        attempts_this_hour: snap.hourly_count,
        last_attempt: snap.last_attempt,
        consecutive_high_scores,
        suspicious: snap.suspicious,
    })
}

/// Admin: drop a user's attempt windows for one difficulty.
pub async fn reset_limits(pool: &Pool, user_id: Uuid, difficulty: Difficulty) -> ArenaResult<u64> {
    queries::reset_attempts(pool, user_id, difficulty)
        .await
        .map_err(ArenaError::System)
}

/// Admin: remove the sticky suspicious flag.
pub async fn clear_suspicious(pool: &Pool, user_id: Uuid) -> ArenaResult<bool> {
    let cleared = queries::clear_suspicious(pool, user_id)
        .await
        .map_err(ArenaError::System)?;
    if cleared {
        info!(user_id = %user_id, "suspicious flag cleared");
    }
    Ok(cleared)
}

/// Periodic sweep dropping attempts older than the retention window.
/// Spawned hourly from main.
pub async fn sweep(pool: &Pool, cfg: &SecurityConfig) -> ArenaResult<u64> {
    let deleted = queries::sweep_attempts(pool, cfg.retention_days)
        .await
        .map_err(ArenaError::System)?;
    if deleted > 0 {
        info!(deleted, "swept expired quiz attempts");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SecurityConfig {
        SecurityConfig::default()
    }

    fn answer(correct: bool, time_ms: i64) -> AnswerRecord {
        AnswerRecord {
            question_id: Uuid::new_v4(),
            answer_index: 0,
            correct,
            time_ms,
        }
    }

    fn snapshot() -> WindowSnapshot {
        WindowSnapshot::default()
    }

    #[test]
    fn test_daily_cap_boundary() {
        let now = 1_700_000_000;
        // Exactly at the cap: denied.
        let snap = WindowSnapshot {
            daily_count: 10,
            ..snapshot()
        };
        let gate = evaluate_gate(&cfg(), now, &snap);
        assert!(!gate.allowed);
        assert_eq!(gate.reason, Some(GateReason::DailyLimitExceeded));
        assert_eq!(gate.reset_time, Some((now / 86_400 + 1) * 86_400));

        // One fewer: allowed.
        let snap = WindowSnapshot {
            daily_count: 9,
            ..snapshot()
        };
        assert!(evaluate_gate(&cfg(), now, &snap).allowed);
    }

    #[test]
    fn test_hourly_cap_boundary() {
        let now = 1_700_000_000;
        let snap = WindowSnapshot {
            hourly_count: 3,
            hour_window_start: Some(now - 600),
            ..snapshot()
        };
        let gate = evaluate_gate(&cfg(), now, &snap);
        assert!(!gate.allowed);
        assert_eq!(gate.reason, Some(GateReason::HourlyLimitExceeded));
        // The window clears when the oldest attempt ages out.
        assert_eq!(gate.reset_time, Some(now - 600 + 3_600));
    }

    #[test]
    fn test_cooldown_boundary() {
        let now = 1_700_000_000;
        // 29 seconds since the last attempt: denied.
        let snap = WindowSnapshot {
            last_attempt: Some(now - 29),
            ..snapshot()
        };
        let gate = evaluate_gate(&cfg(), now, &snap);
        assert!(!gate.allowed);
        assert_eq!(gate.reason, Some(GateReason::CooldownActive));
        assert_eq!(gate.reset_time, Some(now - 29 + 30));

        // 31 seconds: allowed.
        let snap = WindowSnapshot {
            last_attempt: Some(now - 31),
            ..snapshot()
        };
        assert!(evaluate_gate(&cfg(), now, &snap).allowed);
    }

    #[test]
    fn test_suspicious_has_no_reset_time() {
        let snap = WindowSnapshot {
            suspicious: true,
            ..snapshot()
        };
        let gate = evaluate_gate(&cfg(), 1_700_000_000, &snap);
        assert!(!gate.allowed);
        assert_eq!(gate.reason, Some(GateReason::SuspiciousActivity));
        assert_eq!(gate.reset_time, None);
    }

    #[test]
    fn test_check_order_daily_wins() {
        // Everything failing at once: the daily cap is reported.
        let now = 1_700_000_000;
        let snap = WindowSnapshot {
            daily_count: 10,
            hourly_count: 3,
            hour_window_start: Some(now - 10),
            last_attempt: Some(now - 1),
            suspicious: true,
        };
        let gate = evaluate_gate(&cfg(), now, &snap);
        assert_eq!(gate.reason, Some(GateReason::DailyLimitExceeded));
    }

    #[test]
    fn test_single_flag_is_not_suspicious() {
        let cfg = cfg();
        // Only the too-fast heuristic fires: 10 questions in 20 seconds,
        // not all correct, varied timings.
        let answers: Vec<AnswerRecord> = (0..10)
            .map(|i| answer(i % 2 == 0, 1_500 + i * 350))
            .collect();
        let flags = suspicion_flags(&cfg, 50, 20, &answers, &[]);
        assert_eq!(flags, 1);
        assert!(flags < cfg.suspicion_flag_threshold);
    }

    #[test]
    fn test_two_flags_is_suspicious() {
        let cfg = cfg();
        // All correct and fast: trips both the too-fast and the
        // perfect-score-fast heuristics.
        let answers: Vec<AnswerRecord> = (0..10).map(|i| answer(true, 300 + i * 400)).collect();
        let flags = suspicion_flags(&cfg, 100, 20, &answers, &[]);
        assert_eq!(flags, 2);
        assert!(flags >= cfg.suspicion_flag_threshold);
    }

    #[test]
    fn test_streak_flag_needs_five_consecutive() {
        let cfg = cfg();
        let answers: Vec<AnswerRecord> = (0..5)
            .map(|i| answer(i % 2 == 0, 20_000 + i * 5_000))
            .collect();

        // Four prior high scores plus this one: streak of five fires.
        let flags = suspicion_flags(&cfg, 97, 100, &answers, &[96, 98, 95, 99]);
        assert_eq!(flags, 1);

        // A broken streak does not.
        let flags = suspicion_flags(&cfg, 97, 100, &answers, &[96, 80, 95, 99]);
        assert_eq!(flags, 0);

        // Low current score never starts a streak.
        let flags = suspicion_flags(&cfg, 80, 100, &answers, &[96, 98, 95, 99]);
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_slow_play_flag() {
        let cfg = cfg();
        // 2 questions in 700 seconds: mean 350 s/question.
        let answers = vec![answer(false, 340_000), answer(true, 360_000)];
        let flags = suspicion_flags(&cfg, 50, 700, &answers, &[]);
        assert_eq!(flags, 1);
    }

    #[test]
    fn test_uniform_timing_variance_flag() {
        let cfg = cfg();
        // Bot-like uniform timing across >= 4 answers, mixed correctness and
        // a relaxed pace so only the variance heuristic fires.
        let answers: Vec<AnswerRecord> = (0..4).map(|i| answer(i == 0, 30_000 + i)).collect();
        let flags = suspicion_flags(&cfg, 25, 120, &answers, &[]);
        assert_eq!(flags, 1);

        // Three answers: the variance heuristic does not apply.
        let answers: Vec<AnswerRecord> = (0..3).map(|i| answer(i == 0, 30_000 + i)).collect();
        let flags = suspicion_flags(&cfg, 33, 90, &answers, &[]);
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_no_answers_no_timing_flags() {
        let flags = suspicion_flags(&cfg(), 0, 600, &[], &[]);
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_denied_gate_maps_to_errors() {
        let rate_limited = denial_error(&QuizGate::deny(
            GateReason::HourlyLimitExceeded,
            Some(1_700_003_600),
        ));
        assert!(matches!(
            rate_limited,
            ArenaError::RateLimited {
                reason: GateReason::HourlyLimitExceeded,
                reset_time: Some(1_700_003_600),
            }
        ));

        let suspicious = denial_error(&QuizGate::deny(GateReason::SuspiciousActivity, None));
        assert!(matches!(suspicious, ArenaError::SuspiciousAccount));
    }

    #[test]
    fn test_recheck_sees_the_racing_attempt() {
        // Two submissions race at one slot below the daily cap. The advisory
        // lock serializes them; whichever records second re-reads the window
        // and must be denied.
        let now = 1_700_000_000;
        let before_first = WindowSnapshot {
            daily_count: 9,
            ..snapshot()
        };
        assert!(evaluate_gate(&cfg(), now, &before_first).allowed);

        let after_first = WindowSnapshot {
            daily_count: 10,
            ..snapshot()
        };
        let gate = evaluate_gate(&cfg(), now, &after_first);
        assert!(!gate.allowed);
        assert!(matches!(
            denial_error(&gate),
            ArenaError::RateLimited {
                reason: GateReason::DailyLimitExceeded,
                ..
            }
        ));
    }
}
