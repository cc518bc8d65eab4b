//! Data models for Quiz Arena Server

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// USER
// ============================================================================

/// User aggregate: the root for money and progression.
///
/// `playable_balance` and `bonus_balance` are integer minor units (cents) and
/// never negative; the spendable `balance` is always their sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub telegram_id: Option<i64>,
    pub username: String,
    pub playable_balance: i64,
    pub bonus_balance: i64,
    pub total_earned: i64,
    pub xp: i64,
    pub level: i32,
    pub quizzes_played: i32,
    pub correct_answers: i64,
    pub referred_by: Option<Uuid>,
    pub is_blocked: bool,
    pub created_at: i64,
}

impl User {
    pub fn balance(&self) -> i64 {
        self.playable_balance + self.bonus_balance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub telegram_id: Option<i64>,
    /// Referral code of the inviting user (their uuid, shared via bot link).
    pub referred_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub username: String,
    pub xp: i64,
    pub level: i32,
    pub quizzes_played: i32,
    pub rank: u32,
}

// ============================================================================
// BALANCE BUCKETS
// ============================================================================

/// Which of the two balance buckets a ledger operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceBucket {
    Playable,
    Bonus,
}

impl BalanceBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceBucket::Playable => "playable",
            BalanceBucket::Bonus => "bonus",
        }
    }
}

impl From<&str> for BalanceBucket {
    fn from(s: &str) -> Self {
        match s {
            "bonus" => BalanceBucket::Bonus,
            _ => BalanceBucket::Playable,
        }
    }
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Per-variant payload of a transaction. The shared core (amount, fee,
/// balance snapshots, status) lives on [`Transaction`] itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxKind {
    Deposit { network: String, address: String },
    Withdrawal { network: String, address: String },
    Quiz,
    Tournament { tournament_id: Uuid, rank: Option<u32> },
    Referral { referred_user: Uuid },
    Bonus,
    Refund { tournament_id: Option<Uuid> },
    AdminAdjustment { note: Option<String> },
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit { .. } => "deposit",
            TxKind::Withdrawal { .. } => "withdrawal",
            TxKind::Quiz => "quiz",
            TxKind::Tournament { .. } => "tournament",
            TxKind::Referral { .. } => "referral",
            TxKind::Bonus => "bonus",
            TxKind::Refund { .. } => "refund",
            TxKind::AdminAdjustment { .. } => "admin_adjustment",
        }
    }

    /// Tournament reference carried by the variant, if any.
    pub fn tournament_id(&self) -> Option<Uuid> {
        match self {
            TxKind::Tournament { tournament_id, .. } => Some(*tournament_id),
            TxKind::Refund { tournament_id } => *tournament_id,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxCategory {
    Income,
    Expense,
    Transfer,
}

impl TxCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxCategory::Income => "income",
            TxCategory::Expense => "expense",
            TxCategory::Transfer => "transfer",
        }
    }
}

impl From<&str> for TxCategory {
    fn from(s: &str) -> Self {
        match s {
            "income" => TxCategory::Income,
            "expense" => TxCategory::Expense,
            _ => TxCategory::Transfer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Processing => "processing",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
            TxStatus::Cancelled => "cancelled",
            TxStatus::Refunded => "refunded",
        }
    }
}

impl From<&str> for TxStatus {
    fn from(s: &str) -> Self {
        match s {
            "processing" => TxStatus::Processing,
            "completed" => TxStatus::Completed,
            "failed" => TxStatus::Failed,
            "cancelled" => TxStatus::Cancelled,
            "refunded" => TxStatus::Refunded,
            _ => TxStatus::Pending,
        }
    }
}

/// Immutable-once-completed record of a balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub kind: TxKind,
    pub category: TxCategory,
    pub bucket: BalanceBucket,
    pub amount: i64,
    pub fee: i64,
    pub net_amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: TxStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: i64,
    pub network: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub amount: i64,
    pub network: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustBalanceRequest {
    /// Signed delta in minor units; negative values debit.
    pub delta: i64,
    pub bucket: BalanceBucket,
    pub note: Option<String>,
}

// ============================================================================
// TOURNAMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "upcoming",
            TournamentStatus::Active => "active",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }
}

impl From<&str> for TournamentStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => TournamentStatus::Active,
            "completed" => TournamentStatus::Completed,
            "cancelled" => TournamentStatus::Cancelled,
            _ => TournamentStatus::Upcoming,
        }
    }
}

/// Finer-grained view of the tournament status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentPhase {
    Registration,
    Quiz,
    Results,
}

impl TournamentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentPhase::Registration => "registration",
            TournamentPhase::Quiz => "quiz",
            TournamentPhase::Results => "results",
        }
    }
}

impl From<&str> for TournamentPhase {
    fn from(s: &str) -> Self {
        match s {
            "quiz" => TournamentPhase::Quiz,
            "results" => TournamentPhase::Results,
            _ => TournamentPhase::Registration,
        }
    }
}

/// One rank's share of the prize pool, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeShare {
    pub rank: u32,
    pub percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    pub title: String,
    pub creator_id: Uuid,
    pub entry_fee: i64,
    pub prize_pool: i64,
    pub app_fee: i64,
    pub max_participants: i32,
    pub min_participants: i32,
    pub status: TournamentStatus,
    pub phase: TournamentPhase,
    pub registration_start: i64,
    pub registration_end: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub actual_start_time: Option<i64>,
    pub actual_end_time: Option<i64>,
    pub prize_distribution: Vec<PrizeShare>,
    pub winner_id: Option<Uuid>,
    pub participant_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
    pub time_spent: i64,
    pub answers: Vec<AnswerRecord>,
    pub rank: Option<u32>,
    pub prize: Option<i64>,
    pub joined_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTournamentRequest {
    pub title: String,
    pub creator_id: Uuid,
    pub entry_fee: i64,
    pub prize_pool: i64,
    pub max_participants: i32,
    pub min_participants: Option<i32>,
    pub registration_start: i64,
    pub registration_end: i64,
    pub start_time: i64,
    pub end_time: i64,
    /// Defaults to the configured 50/30/20 split when omitted.
    pub prize_distribution: Option<Vec<PrizeShare>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordScoreRequest {
    pub user_id: Uuid,
    pub score: i32,
    pub time_spent: i64,
    pub answers: Vec<AnswerRecord>,
}

// ============================================================================
// QUIZ
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl From<&str> for Difficulty {
    fn from(s: &str) -> Self {
        match s {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub points: i32,
    pub difficulty: Difficulty,
    pub times_used: i64,
    pub times_correct: i64,
    pub times_incorrect: i64,
    pub quality_score: f64,
}

/// A single answered question within an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: Uuid,
    pub answer_index: i32,
    pub correct: bool,
    pub time_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAttemptRequest {
    pub user_id: Uuid,
    pub difficulty: Difficulty,
    /// 0-100 percentage score for the attempt.
    pub score: i32,
    /// Total wall-clock seconds spent on the attempt.
    pub time_spent: i64,
    pub answers: Vec<AnswerRecord>,
}

/// Why `can_take_quiz` refused an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateReason {
    DailyLimitExceeded,
    HourlyLimitExceeded,
    CooldownActive,
    SuspiciousActivity,
}

impl GateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateReason::DailyLimitExceeded => "DAILY_LIMIT_EXCEEDED",
            GateReason::HourlyLimitExceeded => "HOURLY_LIMIT_EXCEEDED",
            GateReason::CooldownActive => "COOLDOWN_ACTIVE",
            GateReason::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
        }
    }
}

/// Result of the quiz-entry gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizGate {
    pub allowed: bool,
    pub reason: Option<GateReason>,
    /// Unix seconds when the blocking condition clears. Absent for the
    /// suspicious case, which requires a manual admin clear.
    pub reset_time: Option<i64>,
}

impl QuizGate {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            reset_time: None,
        }
    }

    pub fn deny(reason: GateReason, reset_time: Option<i64>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            reset_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptStats {
    pub user_id: Uuid,
    pub difficulty: Difficulty,
    pub attempts_today: u32,
    pub attempts_this_hour: u32,
    pub last_attempt: Option<i64>,
    pub consecutive_high_scores: u32,
    pub suspicious: bool,
}

// ============================================================================
// WEBSOCKET EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    #[serde(rename = "participant_joined")]
    ParticipantJoined(ParticipantEvent),

    #[serde(rename = "participant_left")]
    ParticipantLeft(ParticipantEvent),

    #[serde(rename = "tournament_started")]
    TournamentStarted(TournamentStartedEvent),

    #[serde(rename = "tournament_completed")]
    TournamentCompleted(TournamentCompletedEvent),

    #[serde(rename = "tournament_cancelled")]
    TournamentCancelled(TournamentCancelledEvent),

    #[serde(rename = "balance_changed")]
    BalanceChanged(BalanceChangedEvent),

    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "pong")]
    Pong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantEvent {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub participant_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentStartedEvent {
    pub tournament_id: Uuid,
    pub participant_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentCompletedEvent {
    pub tournament_id: Uuid,
    pub winner_id: Option<Uuid>,
    pub total_paid: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentCancelledEvent {
    pub tournament_id: Uuid,
    pub refunded_participants: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChangedEvent {
    pub user_id: Uuid,
    pub playable_balance: i64,
    pub bonus_balance: i64,
    pub balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_status_round_trip() {
        for status in [
            TxStatus::Pending,
            TxStatus::Processing,
            TxStatus::Completed,
            TxStatus::Failed,
            TxStatus::Cancelled,
            TxStatus::Refunded,
        ] {
            assert_eq!(TxStatus::from(status.as_str()), status);
        }
        // Unknown strings fall back to pending
        assert_eq!(TxStatus::from("bogus"), TxStatus::Pending);
    }

    #[test]
    fn test_tournament_status_round_trip() {
        for status in [
            TournamentStatus::Upcoming,
            TournamentStatus::Active,
            TournamentStatus::Completed,
            TournamentStatus::Cancelled,
        ] {
            assert_eq!(TournamentStatus::from(status.as_str()), status);
        }
    }

    #[test]
    fn test_phase_round_trip() {
        for phase in [
            TournamentPhase::Registration,
            TournamentPhase::Quiz,
            TournamentPhase::Results,
        ] {
            assert_eq!(TournamentPhase::from(phase.as_str()), phase);
        }
    }

    #[test]
    fn test_difficulty_round_trip() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(Difficulty::from(d.as_str()), d);
        }
        assert_eq!(Difficulty::from("unknown"), Difficulty::Medium);
    }

    #[test]
    fn test_tx_kind_tagged_serialization() {
        let kind = TxKind::Deposit {
            network: "TON".to_string(),
            address: "EQabc".to_string(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"deposit\""));
        assert!(json.contains("TON"));

        let back: TxKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn test_tx_kind_tournament_reference() {
        let id = Uuid::new_v4();
        let kind = TxKind::Tournament {
            tournament_id: id,
            rank: Some(1),
        };
        assert_eq!(kind.tournament_id(), Some(id));
        assert_eq!(kind.as_str(), "tournament");

        assert_eq!(TxKind::Quiz.tournament_id(), None);
        assert_eq!(
            TxKind::Refund {
                tournament_id: Some(id)
            }
            .tournament_id(),
            Some(id)
        );
    }

    #[test]
    fn test_user_balance_is_sum_of_buckets() {
        let user = User {
            id: Uuid::new_v4(),
            telegram_id: Some(42),
            username: "alice".to_string(),
            playable_balance: 700,
            bonus_balance: 300,
            total_earned: 0,
            xp: 0,
            level: 1,
            quizzes_played: 0,
            correct_answers: 0,
            referred_by: None,
            is_blocked: false,
            created_at: 0,
        };
        assert_eq!(user.balance(), 1000);
    }

    #[test]
    fn test_gate_reason_codes() {
        assert_eq!(
            GateReason::DailyLimitExceeded.as_str(),
            "DAILY_LIMIT_EXCEEDED"
        );
        assert_eq!(
            GateReason::HourlyLimitExceeded.as_str(),
            "HOURLY_LIMIT_EXCEEDED"
        );
        assert_eq!(GateReason::CooldownActive.as_str(), "COOLDOWN_ACTIVE");
        assert_eq!(
            GateReason::SuspiciousActivity.as_str(),
            "SUSPICIOUS_ACTIVITY"
        );
    }

    #[test]
    fn test_ws_event_serialization() {
        let event = WsEvent::ParticipantJoined(ParticipantEvent {
            tournament_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            participant_count: 3,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("participant_joined"));

        let event = WsEvent::Ping;
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ping"));
    }

    #[test]
    fn test_quiz_gate_constructors() {
        let ok = QuizGate::allow();
        assert!(ok.allowed);
        assert!(ok.reason.is_none());

        let denied = QuizGate::deny(GateReason::CooldownActive, Some(1_700_000_000));
        assert!(!denied.allowed);
        assert_eq!(denied.reason, Some(GateReason::CooldownActive));
        assert_eq!(denied.reset_time, Some(1_700_000_000));
    }
}
