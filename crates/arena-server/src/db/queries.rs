//! Database queries for Quiz Arena Server (PostgreSQL)
//!
//! Functions that must run inside a caller-owned transaction (the ledger and
//! the tournament transitions) take `&impl GenericClient` so they work both
//! on a pooled client and inside `client.transaction()`.

use crate::models::{
    AnswerRecord, BalanceBucket, Difficulty, LeaderboardEntry, Participant, PrizeShare, Question,
    RegisterUserRequest, Tournament, TournamentPhase, TournamentStatus, Transaction, TxCategory,
    TxKind, TxStatus, User,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use deadpool_postgres::GenericClient;
use uuid::Uuid;

// ============================================================================
// USERS
// ============================================================================

fn row_to_user(row: &tokio_postgres::Row) -> User {
    User {
        id: row.get(0),
        telegram_id: row.get(1),
        username: row.get(2),
        playable_balance: row.get(3),
        bonus_balance: row.get(4),
        total_earned: row.get(5),
        xp: row.get(6),
        level: row.get(7),
        quizzes_played: row.get(8),
        correct_answers: row.get(9),
        referred_by: row.get(10),
        is_blocked: row.get(11),
        created_at: row.get::<_, DateTime<Utc>>(12).timestamp(),
    }
}

const USER_COLUMNS: &str = "id, telegram_id, username, playable_balance, bonus_balance, \
     total_earned, xp, level, quizzes_played, correct_answers, referred_by, is_blocked, created_at";

pub async fn create_user(pool: &Pool, req: &RegisterUserRequest) -> Result<User> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            &format!(
                "INSERT INTO users (username, telegram_id, referred_by)
                 VALUES ($1, $2, $3)
                 RETURNING {USER_COLUMNS}"
            ),
            &[&req.username, &req.telegram_id, &req.referred_by],
        )
        .await?;
    Ok(row_to_user(&row))
}

pub async fn get_user(client: &impl GenericClient, id: Uuid) -> Result<Option<User>> {
    let row = client
        .query_opt(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
            &[&id],
        )
        .await?;
    Ok(row.map(|r| row_to_user(&r)))
}

pub async fn get_user_pooled(pool: &Pool, id: Uuid) -> Result<Option<User>> {
    let client = pool.get().await?;
    get_user(&client, id).await
}

/// Lock a user row for the duration of the enclosing transaction and return
/// the current balances. This is the per-user serialization point for every
/// ledger operation.
pub async fn lock_user_balances(
    client: &impl GenericClient,
    id: Uuid,
) -> Result<Option<(i64, i64, bool)>> {
    let row = client
        .query_opt(
            "SELECT playable_balance, bonus_balance, is_blocked
             FROM users WHERE id = $1 FOR UPDATE",
            &[&id],
        )
        .await?;
    Ok(row.map(|r| (r.get(0), r.get(1), r.get(2))))
}

pub async fn update_user_balances(
    client: &impl GenericClient,
    id: Uuid,
    playable: i64,
    bonus: i64,
    earned_delta: i64,
) -> Result<()> {
    client
        .execute(
            "UPDATE users SET playable_balance = $2, bonus_balance = $3,
                 total_earned = total_earned + $4
             WHERE id = $1",
            &[&id, &playable, &bonus, &earned_delta],
        )
        .await?;
    Ok(())
}

/// Quiz settlement: progression counters and level derived from XP.
pub async fn apply_quiz_progress(
    pool: &Pool,
    user_id: Uuid,
    xp_delta: i64,
    correct_delta: i64,
    xp_per_level: i64,
) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE users SET
                 xp = xp + $2,
                 quizzes_played = quizzes_played + 1,
                 correct_answers = correct_answers + $3,
                 level = (1 + (xp + $2) / $4)::INTEGER
             WHERE id = $1",
            &[&user_id, &xp_delta, &correct_delta, &xp_per_level],
        )
        .await?;
    Ok(())
}

pub async fn get_leaderboard(pool: &Pool, limit: i64) -> Result<Vec<LeaderboardEntry>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT id, username, xp, level, quizzes_played,
                    ROW_NUMBER() OVER (ORDER BY xp DESC, created_at ASC) AS rank
             FROM users WHERE is_blocked = FALSE
             ORDER BY xp DESC, created_at ASC
             LIMIT $1",
            &[&limit],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| LeaderboardEntry {
            user_id: row.get(0),
            username: row.get(1),
            xp: row.get(2),
            level: row.get(3),
            quizzes_played: row.get(4),
            rank: row.get::<_, i64>(5) as u32,
        })
        .collect())
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

fn row_to_transaction(row: &tokio_postgres::Row) -> Result<Transaction> {
    let detail: serde_json::Value = row.get(2);
    let kind: TxKind =
        serde_json::from_value(detail).map_err(|e| anyhow!("bad transaction detail: {e}"))?;
    Ok(Transaction {
        id: row.get(0),
        user_id: row.get(1),
        kind,
        category: TxCategory::from(row.get::<_, String>(3).as_str()),
        bucket: BalanceBucket::from(row.get::<_, String>(4).as_str()),
        amount: row.get(5),
        fee: row.get(6),
        net_amount: row.get(7),
        balance_before: row.get(8),
        balance_after: row.get(9),
        status: TxStatus::from(row.get::<_, String>(10).as_str()),
        created_at: row.get::<_, DateTime<Utc>>(11).timestamp(),
    })
}

const TX_COLUMNS: &str = "id, user_id, detail, category, bucket, amount, fee, net_amount, \
     balance_before, balance_after, status, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn insert_transaction(
    client: &impl GenericClient,
    user_id: Uuid,
    kind: &TxKind,
    category: TxCategory,
    bucket: BalanceBucket,
    amount: i64,
    fee: i64,
    balance_before: i64,
    balance_after: i64,
    status: TxStatus,
) -> Result<Transaction> {
    let detail = serde_json::to_value(kind)?;
    let net_amount = amount - fee;
    let row = client
        .query_one(
            "INSERT INTO transactions
                 (user_id, type, detail, category, bucket, amount, fee, net_amount,
                  balance_before, balance_after, status, tournament_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING id, created_at",
            &[
                &user_id,
                &kind.as_str(),
                &detail,
                &category.as_str(),
                &bucket.as_str(),
                &amount,
                &fee,
                &net_amount,
                &balance_before,
                &balance_after,
                &status.as_str(),
                &kind.tournament_id(),
            ],
        )
        .await?;

    Ok(Transaction {
        id: row.get(0),
        user_id,
        kind: kind.clone(),
        category,
        bucket,
        amount,
        fee,
        net_amount,
        balance_before,
        balance_after,
        status,
        created_at: row.get::<_, DateTime<Utc>>(1).timestamp(),
    })
}

pub async fn get_transaction(client: &impl GenericClient, id: Uuid) -> Result<Option<Transaction>> {
    let row = client
        .query_opt(
            &format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = $1"),
            &[&id],
        )
        .await?;
    row.map(|r| row_to_transaction(&r)).transpose()
}

/// Lock a transaction row; used by the admin approval flow so two approvals
/// of the same pending record serialize.
pub async fn lock_transaction(
    client: &impl GenericClient,
    id: Uuid,
) -> Result<Option<Transaction>> {
    let row = client
        .query_opt(
            &format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"),
            &[&id],
        )
        .await?;
    row.map(|r| row_to_transaction(&r)).transpose()
}

pub async fn get_transactions_for_user(
    pool: &Pool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Transaction>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {TX_COLUMNS} FROM transactions
                 WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
            ),
            &[&user_id, &limit],
        )
        .await?;
    rows.iter().map(row_to_transaction).collect()
}

pub async fn get_pending_transactions(pool: &Pool) -> Result<Vec<Transaction>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {TX_COLUMNS} FROM transactions
                 WHERE status = 'pending' ORDER BY created_at ASC"
            ),
            &[],
        )
        .await?;
    rows.iter().map(row_to_transaction).collect()
}

pub async fn set_transaction_status(
    client: &impl GenericClient,
    id: Uuid,
    status: TxStatus,
) -> Result<()> {
    client
        .execute(
            "UPDATE transactions SET status = $2 WHERE id = $1",
            &[&id, &status.as_str()],
        )
        .await?;
    Ok(())
}

/// Completion of a pending deposit: the credit happens at approval time, so
/// the snapshots recorded at request time are replaced with the real ones.
pub async fn finalize_transaction_snapshots(
    client: &impl GenericClient,
    id: Uuid,
    balance_before: i64,
    balance_after: i64,
    status: TxStatus,
) -> Result<()> {
    client
        .execute(
            "UPDATE transactions
             SET balance_before = $2, balance_after = $3, status = $4
             WHERE id = $1",
            &[&id, &balance_before, &balance_after, &status.as_str()],
        )
        .await?;
    Ok(())
}

// ============================================================================
// TOURNAMENTS
// ============================================================================

fn row_to_tournament(row: &tokio_postgres::Row) -> Result<Tournament> {
    let distribution: serde_json::Value = row.get(16);
    let prize_distribution: Vec<PrizeShare> = serde_json::from_value(distribution)
        .map_err(|e| anyhow!("bad prize distribution: {e}"))?;
    Ok(Tournament {
        id: row.get(0),
        title: row.get(1),
        creator_id: row.get(2),
        entry_fee: row.get(3),
        prize_pool: row.get(4),
        app_fee: row.get(5),
        max_participants: row.get(6),
        min_participants: row.get(7),
        status: TournamentStatus::from(row.get::<_, String>(8).as_str()),
        phase: TournamentPhase::from(row.get::<_, String>(9).as_str()),
        registration_start: row.get::<_, DateTime<Utc>>(10).timestamp(),
        registration_end: row.get::<_, DateTime<Utc>>(11).timestamp(),
        start_time: row.get::<_, DateTime<Utc>>(12).timestamp(),
        end_time: row.get::<_, DateTime<Utc>>(13).timestamp(),
        actual_start_time: row
            .get::<_, Option<DateTime<Utc>>>(14)
            .map(|dt| dt.timestamp()),
        actual_end_time: row
            .get::<_, Option<DateTime<Utc>>>(15)
            .map(|dt| dt.timestamp()),
        prize_distribution,
        winner_id: row.get(17),
        participant_count: row.get(18),
        created_at: row.get::<_, DateTime<Utc>>(19).timestamp(),
    })
}

const TOURNAMENT_COLUMNS: &str = "t.id, t.title, t.creator_id, t.entry_fee, t.prize_pool, t.app_fee, \
     t.max_participants, t.min_participants, t.status, t.phase, \
     t.registration_start, t.registration_end, t.start_time, t.end_time, \
     t.actual_start_time, t.actual_end_time, t.prize_distribution, t.winner_id, \
     (SELECT COUNT(*) FROM tournament_participants p WHERE p.tournament_id = t.id), \
     t.created_at";

#[allow(clippy::too_many_arguments)]
pub async fn insert_tournament(
    client: &impl GenericClient,
    title: &str,
    creator_id: Uuid,
    entry_fee: i64,
    prize_pool: i64,
    app_fee: i64,
    max_participants: i32,
    min_participants: i32,
    registration_start: DateTime<Utc>,
    registration_end: DateTime<Utc>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    prize_distribution: &[PrizeShare],
) -> Result<Uuid> {
    let distribution = serde_json::to_value(prize_distribution)?;
    let row = client
        .query_one(
            "INSERT INTO tournaments
                 (title, creator_id, entry_fee, prize_pool, app_fee,
                  max_participants, min_participants,
                  registration_start, registration_end, start_time, end_time,
                  prize_distribution)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING id",
            &[
                &title,
                &creator_id,
                &entry_fee,
                &prize_pool,
                &app_fee,
                &max_participants,
                &min_participants,
                &registration_start,
                &registration_end,
                &start_time,
                &end_time,
                &distribution,
            ],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn get_tournament(client: &impl GenericClient, id: Uuid) -> Result<Option<Tournament>> {
    let row = client
        .query_opt(
            &format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments t WHERE t.id = $1"),
            &[&id],
        )
        .await?;
    row.map(|r| row_to_tournament(&r)).transpose()
}

pub async fn get_tournament_pooled(pool: &Pool, id: Uuid) -> Result<Option<Tournament>> {
    let client = pool.get().await?;
    get_tournament(&client, id).await
}

/// Lock the tournament row for the duration of the enclosing transaction.
/// Every state transition starts here; it is the per-tournament
/// serialization point.
pub async fn lock_tournament(client: &impl GenericClient, id: Uuid) -> Result<Option<Tournament>> {
    // FOR UPDATE cannot be combined with the counting subquery, so lock
    // first and read the full row second.
    let row = client
        .query_opt("SELECT id FROM tournaments WHERE id = $1 FOR UPDATE", &[&id])
        .await?;
    if row.is_none() {
        return Ok(None);
    }
    get_tournament(client, id).await
}

pub async fn list_tournaments(
    pool: &Pool,
    status: Option<TournamentStatus>,
    limit: i64,
) -> Result<Vec<Tournament>> {
    let client = pool.get().await?;
    let rows = match status {
        Some(s) => {
            client
                .query(
                    &format!(
                        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments t
                         WHERE t.status = $1 ORDER BY t.start_time ASC LIMIT $2"
                    ),
                    &[&s.as_str(), &limit],
                )
                .await?
        }
        None => {
            client
                .query(
                    &format!(
                        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments t
                         ORDER BY t.start_time ASC LIMIT $1"
                    ),
                    &[&limit],
                )
                .await?
        }
    };
    rows.iter().map(row_to_tournament).collect()
}

pub async fn update_tournament_status(
    client: &impl GenericClient,
    id: Uuid,
    status: TournamentStatus,
    phase: TournamentPhase,
) -> Result<()> {
    client
        .execute(
            "UPDATE tournaments SET status = $2, phase = $3 WHERE id = $1",
            &[&id, &status.as_str(), &phase.as_str()],
        )
        .await?;
    Ok(())
}

pub async fn mark_tournament_started(client: &impl GenericClient, id: Uuid) -> Result<()> {
    client
        .execute(
            "UPDATE tournaments
             SET status = 'active', phase = 'quiz', actual_start_time = NOW()
             WHERE id = $1",
            &[&id],
        )
        .await?;
    Ok(())
}

pub async fn mark_tournament_completed(
    client: &impl GenericClient,
    id: Uuid,
    winner_id: Option<Uuid>,
) -> Result<()> {
    client
        .execute(
            "UPDATE tournaments
             SET status = 'completed', phase = 'results',
                 actual_end_time = NOW(), winner_id = $2
             WHERE id = $1",
            &[&id, &winner_id],
        )
        .await?;
    Ok(())
}

// ============================================================================
// PARTICIPANTS
// ============================================================================

fn row_to_participant(row: &tokio_postgres::Row) -> Result<Participant> {
    let answers: serde_json::Value = row.get(4);
    let answers: Vec<AnswerRecord> =
        serde_json::from_value(answers).map_err(|e| anyhow!("bad answers payload: {e}"))?;
    Ok(Participant {
        tournament_id: row.get(0),
        user_id: row.get(1),
        score: row.get(2),
        time_spent: row.get(3),
        answers,
        rank: row.get::<_, Option<i32>>(5).map(|r| r as u32),
        prize: row.get(6),
        joined_at: row.get::<_, DateTime<Utc>>(7).timestamp(),
    })
}

const PARTICIPANT_COLUMNS: &str =
    "tournament_id, user_id, score, time_spent, answers, rank, prize, joined_at";

pub async fn insert_participant(
    client: &impl GenericClient,
    tournament_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    client
        .execute(
            "INSERT INTO tournament_participants (tournament_id, user_id)
             VALUES ($1, $2)",
            &[&tournament_id, &user_id],
        )
        .await?;
    Ok(())
}

pub async fn delete_participant(
    client: &impl GenericClient,
    tournament_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let n = client
        .execute(
            "DELETE FROM tournament_participants
             WHERE tournament_id = $1 AND user_id = $2",
            &[&tournament_id, &user_id],
        )
        .await?;
    Ok(n > 0)
}

pub async fn participant_exists(
    client: &impl GenericClient,
    tournament_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let row = client
        .query_opt(
            "SELECT 1 FROM tournament_participants
             WHERE tournament_id = $1 AND user_id = $2",
            &[&tournament_id, &user_id],
        )
        .await?;
    Ok(row.is_some())
}

pub async fn get_participants(
    client: &impl GenericClient,
    tournament_id: Uuid,
) -> Result<Vec<Participant>> {
    let rows = client
        .query(
            &format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM tournament_participants
                 WHERE tournament_id = $1 ORDER BY joined_at ASC"
            ),
            &[&tournament_id],
        )
        .await?;
    rows.iter().map(row_to_participant).collect()
}

/// Scores only ever move up while a tournament is active.
pub async fn update_participant_score(
    client: &impl GenericClient,
    tournament_id: Uuid,
    user_id: Uuid,
    score: i32,
    time_spent: i64,
    answers: &[AnswerRecord],
) -> Result<bool> {
    let answers = serde_json::to_value(answers)?;
    let n = client
        .execute(
            "UPDATE tournament_participants
             SET score = GREATEST(score, $3), time_spent = $4, answers = $5
             WHERE tournament_id = $1 AND user_id = $2",
            &[&tournament_id, &user_id, &score, &time_spent, &answers],
        )
        .await?;
    Ok(n > 0)
}

pub async fn set_participant_result(
    client: &impl GenericClient,
    tournament_id: Uuid,
    user_id: Uuid,
    rank: u32,
    prize: i64,
) -> Result<()> {
    client
        .execute(
            "UPDATE tournament_participants
             SET rank = $3, prize = $4
             WHERE tournament_id = $1 AND user_id = $2",
            &[&tournament_id, &user_id, &(rank as i32), &prize],
        )
        .await?;
    Ok(())
}

// ============================================================================
// QUESTIONS
// ============================================================================

fn row_to_question(row: &tokio_postgres::Row) -> Result<Question> {
    let options: serde_json::Value = row.get(2);
    let options: Vec<String> =
        serde_json::from_value(options).map_err(|e| anyhow!("bad options payload: {e}"))?;
    Ok(Question {
        id: row.get(0),
        text: row.get(1),
        options,
        correct_answer: row.get(3),
        points: row.get(4),
        difficulty: Difficulty::from(row.get::<_, String>(5).as_str()),
        times_used: row.get(6),
        times_correct: row.get(7),
        times_incorrect: row.get(8),
        quality_score: row.get(9),
    })
}

const QUESTION_COLUMNS: &str = "id, text, options, correct_answer, points, difficulty, \
     times_used, times_correct, times_incorrect, quality_score";

pub async fn get_questions(pool: &Pool, difficulty: Difficulty, limit: i64) -> Result<Vec<Question>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {QUESTION_COLUMNS} FROM questions
                 WHERE difficulty = $1 ORDER BY times_used ASC LIMIT $2"
            ),
            &[&difficulty.as_str(), &limit],
        )
        .await?;
    rows.iter().map(row_to_question).collect()
}

/// Per-answer statistics update; quality score tracks the correct ratio.
pub async fn record_question_usage(pool: &Pool, question_id: Uuid, correct: bool) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE questions SET
                 times_used = times_used + 1,
                 times_correct = times_correct + CASE WHEN $2 THEN 1 ELSE 0 END,
                 times_incorrect = times_incorrect + CASE WHEN $2 THEN 0 ELSE 1 END,
                 quality_score = (times_correct + CASE WHEN $2 THEN 1 ELSE 0 END)::DOUBLE PRECISION
                     / (times_used + 1)
             WHERE id = $1",
            &[&question_id, &correct],
        )
        .await?;
    Ok(())
}

// ============================================================================
// QUIZ ATTEMPT WINDOWS
// ============================================================================

/// Attempts since UTC midnight. The truncation is pinned to UTC regardless
/// of the session timezone, matching the reset time the gate advertises.
pub async fn count_attempts_today(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
) -> Result<u32> {
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM quiz_attempts
             WHERE user_id = $1 AND difficulty = $2
               AND attempted_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'",
            &[&user_id, &difficulty.as_str()],
        )
        .await?;
    Ok(row.get::<_, i64>(0) as u32)
}

pub async fn count_attempts_last_hour(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
) -> Result<u32> {
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM quiz_attempts
             WHERE user_id = $1 AND difficulty = $2
               AND attempted_at >= NOW() - INTERVAL '1 hour'",
            &[&user_id, &difficulty.as_str()],
        )
        .await?;
    Ok(row.get::<_, i64>(0) as u32)
}

/// Serialize concurrent gate checks and submissions for one
/// (user, difficulty) pair. The advisory lock is transaction-scoped and
/// released at commit/rollback.
pub async fn lock_attempt_window(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
) -> Result<()> {
    let key = format!("quiz:{}:{}", user_id, difficulty.as_str());
    client
        .execute(
            "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))",
            &[&key],
        )
        .await?;
    Ok(())
}

/// Oldest attempt inside the sliding hour; the hourly cap clears when it
/// ages out.
pub async fn oldest_attempt_last_hour(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
) -> Result<Option<i64>> {
    let row = client
        .query_opt(
            "SELECT MIN(attempted_at) FROM quiz_attempts
             WHERE user_id = $1 AND difficulty = $2
               AND attempted_at >= NOW() - INTERVAL '1 hour'",
            &[&user_id, &difficulty.as_str()],
        )
        .await?;
    Ok(row.and_then(|r| r.get::<_, Option<DateTime<Utc>>>(0).map(|dt| dt.timestamp())))
}

pub async fn last_attempt_at(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
) -> Result<Option<i64>> {
    let row = client
        .query_opt(
            "SELECT MAX(attempted_at) FROM quiz_attempts
             WHERE user_id = $1 AND difficulty = $2",
            &[&user_id, &difficulty.as_str()],
        )
        .await?;
    Ok(row.and_then(|r| r.get::<_, Option<DateTime<Utc>>>(0).map(|dt| dt.timestamp())))
}

/// Most recent scores, newest first. Used by the streak heuristic.
pub async fn recent_scores(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
    limit: i64,
) -> Result<Vec<i32>> {
    let rows = client
        .query(
            "SELECT score FROM quiz_attempts
             WHERE user_id = $1 AND difficulty = $2
             ORDER BY attempted_at DESC LIMIT $3",
            &[&user_id, &difficulty.as_str(), &limit],
        )
        .await?;
    Ok(rows.iter().map(|r| r.get(0)).collect())
}

pub async fn insert_attempt(
    client: &impl GenericClient,
    user_id: Uuid,
    difficulty: Difficulty,
    score: i32,
    time_spent: i64,
    answer_count: i32,
) -> Result<()> {
    client
        .execute(
            "INSERT INTO quiz_attempts (user_id, difficulty, score, time_spent, answer_count)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &user_id,
                &difficulty.as_str(),
                &score,
                &time_spent,
                &answer_count,
            ],
        )
        .await?;
    Ok(())
}

pub async fn reset_attempts(pool: &Pool, user_id: Uuid, difficulty: Difficulty) -> Result<u64> {
    let client = pool.get().await?;
    let n = client
        .execute(
            "DELETE FROM quiz_attempts WHERE user_id = $1 AND difficulty = $2",
            &[&user_id, &difficulty.as_str()],
        )
        .await?;
    Ok(n)
}

/// Hourly sweep: drop attempt rows past the retention window.
pub async fn sweep_attempts(pool: &Pool, retention_days: i64) -> Result<u64> {
    let client = pool.get().await?;
    let n = client
        .execute(
            "DELETE FROM quiz_attempts
             WHERE attempted_at < NOW() - ($1 * INTERVAL '1 day')",
            &[&retention_days],
        )
        .await?;
    Ok(n)
}

// ============================================================================
// SUSPICIOUS SET
// ============================================================================

pub async fn is_suspicious(client: &impl GenericClient, user_id: Uuid) -> Result<bool> {
    let row = client
        .query_opt(
            "SELECT 1 FROM suspicious_users WHERE user_id = $1",
            &[&user_id],
        )
        .await?;
    Ok(row.is_some())
}

pub async fn flag_suspicious(
    client: &impl GenericClient,
    user_id: Uuid,
    reason: &str,
    flags: i32,
) -> Result<()> {
    client
        .execute(
            "INSERT INTO suspicious_users (user_id, reason, flags)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE SET
                 reason = EXCLUDED.reason,
                 flags = EXCLUDED.flags,
                 flagged_at = NOW()",
            &[&user_id, &reason, &flags],
        )
        .await?;
    Ok(())
}

pub async fn clear_suspicious(pool: &Pool, user_id: Uuid) -> Result<bool> {
    let client = pool.get().await?;
    let n = client
        .execute("DELETE FROM suspicious_users WHERE user_id = $1", &[&user_id])
        .await?;
    Ok(n > 0)
}

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

pub async fn log_event(
    pool: &Pool,
    event_type: &str,
    entity_type: Option<&str>,
    entity_id: Option<&str>,
    payload: Option<&serde_json::Value>,
    actor: Option<&str>,
) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "INSERT INTO events (event_type, entity_type, entity_id, payload, actor)
             VALUES ($1, $2, $3, $4, $5)",
            &[&event_type, &entity_type, &entity_id, &payload, &actor],
        )
        .await?;
    Ok(())
}
