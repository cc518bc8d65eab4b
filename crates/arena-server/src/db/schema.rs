//! Database schema and migrations

use anyhow::Result;
use deadpool_postgres::Object;
use tracing::info;

pub async fn run_migrations(client: &Object) -> Result<()> {
    client.batch_execute(SCHEMA_SQL).await?;
    info!("Database migrations applied");
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Quiz Arena Server Database Schema

-- User accounts: the aggregate root for money and progression.
-- Balances are integer minor units and may never go negative.
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    telegram_id BIGINT UNIQUE,
    username VARCHAR(255) NOT NULL,
    playable_balance BIGINT NOT NULL DEFAULT 0 CHECK (playable_balance >= 0),
    bonus_balance BIGINT NOT NULL DEFAULT 0 CHECK (bonus_balance >= 0),
    total_earned BIGINT NOT NULL DEFAULT 0,
    xp BIGINT NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    quizzes_played INTEGER NOT NULL DEFAULT 0,
    correct_answers BIGINT NOT NULL DEFAULT 0,
    referred_by UUID REFERENCES users(id),
    is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_users_xp ON users(xp DESC);
CREATE INDEX IF NOT EXISTS idx_users_referred_by ON users(referred_by);

-- Ledger: one row per balance change, written in the same database
-- transaction as the balance mutation it records.
CREATE TABLE IF NOT EXISTS transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL REFERENCES users(id),
    type VARCHAR(32) NOT NULL,
    detail JSONB NOT NULL,
    category VARCHAR(16) NOT NULL,
    bucket VARCHAR(16) NOT NULL,
    amount BIGINT NOT NULL,
    fee BIGINT NOT NULL DEFAULT 0,
    net_amount BIGINT NOT NULL,
    balance_before BIGINT NOT NULL,
    balance_after BIGINT NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'pending',
    tournament_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status);
CREATE INDEX IF NOT EXISTS idx_transactions_tournament ON transactions(tournament_id);

-- Tournaments and their frozen-once-started rosters
CREATE TABLE IF NOT EXISTS tournaments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    title VARCHAR(255) NOT NULL,
    creator_id UUID NOT NULL REFERENCES users(id),
    entry_fee BIGINT NOT NULL,
    prize_pool BIGINT NOT NULL,
    app_fee BIGINT NOT NULL,
    max_participants INTEGER NOT NULL,
    min_participants INTEGER NOT NULL DEFAULT 2 CHECK (min_participants >= 2),
    status VARCHAR(16) NOT NULL DEFAULT 'upcoming',
    phase VARCHAR(16) NOT NULL DEFAULT 'registration',
    registration_start TIMESTAMPTZ NOT NULL,
    registration_end TIMESTAMPTZ NOT NULL,
    start_time TIMESTAMPTZ NOT NULL,
    end_time TIMESTAMPTZ NOT NULL,
    actual_start_time TIMESTAMPTZ,
    actual_end_time TIMESTAMPTZ,
    prize_distribution JSONB NOT NULL DEFAULT '[]',
    winner_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_tournaments_status ON tournaments(status);
CREATE INDEX IF NOT EXISTS idx_tournaments_start ON tournaments(start_time);

CREATE TABLE IF NOT EXISTS tournament_participants (
    tournament_id UUID NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES users(id),
    score INTEGER NOT NULL DEFAULT 0,
    time_spent BIGINT NOT NULL DEFAULT 0,
    answers JSONB NOT NULL DEFAULT '[]',
    rank INTEGER,
    prize BIGINT,
    joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (tournament_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_participants_user ON tournament_participants(user_id);

-- Quiz questions with usage/quality statistics
CREATE TABLE IF NOT EXISTS questions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    text TEXT NOT NULL,
    options JSONB NOT NULL,
    correct_answer INTEGER NOT NULL,
    points INTEGER NOT NULL DEFAULT 10,
    difficulty VARCHAR(16) NOT NULL DEFAULT 'medium',
    times_used BIGINT NOT NULL DEFAULT 0,
    times_correct BIGINT NOT NULL DEFAULT 0,
    times_incorrect BIGINT NOT NULL DEFAULT 0,
    quality_score DOUBLE PRECISION NOT NULL DEFAULT 0.0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_questions_difficulty ON questions(difficulty);

-- Quiz attempt log, keyed (user_id, difficulty). Persisted so the daily and
-- hourly caps survive restarts and multiple server instances.
CREATE TABLE IF NOT EXISTS quiz_attempts (
    id BIGSERIAL PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id),
    difficulty VARCHAR(16) NOT NULL,
    score INTEGER NOT NULL,
    time_spent BIGINT NOT NULL,
    answer_count INTEGER NOT NULL,
    attempted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_quiz_attempts_window
    ON quiz_attempts(user_id, difficulty, attempted_at DESC);

-- Sticky suspicious set; rows removed only by an explicit admin clear.
CREATE TABLE IF NOT EXISTS suspicious_users (
    user_id UUID PRIMARY KEY REFERENCES users(id),
    reason TEXT NOT NULL,
    flags INTEGER NOT NULL,
    flagged_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Audit trail for privileged and money-moving operations
CREATE TABLE IF NOT EXISTS events (
    id BIGSERIAL PRIMARY KEY,
    event_type VARCHAR(64) NOT NULL,
    entity_type VARCHAR(64),
    entity_id VARCHAR(128),
    payload JSONB,
    actor VARCHAR(128),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);
"#;
