//! Runtime settings
//!
//! Tunables that admins may change while the server runs. Components receive
//! a snapshot per operation instead of reading ambient globals, so the core
//! stays testable with injected configs.

use crate::models::PrizeShare;
use serde::{Deserialize, Serialize};

/// Quiz security thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Attempts allowed per calendar day (UTC), per difficulty.
    pub max_daily_attempts: u32,
    /// Attempts allowed per sliding 60-minute window, per difficulty.
    pub max_hourly_attempts: u32,
    /// Minimum seconds between attempts.
    pub cooldown_seconds: i64,
    /// Score at or above which an attempt counts as a "high score".
    pub high_score_threshold: i32,
    /// Consecutive high scores before the streak heuristic flags.
    pub high_score_streak: u32,
    /// Mean seconds per question below which answering is implausibly fast.
    pub min_avg_seconds_per_question: f64,
    /// Mean seconds per question above which the session looks abandoned.
    pub max_avg_seconds_per_question: f64,
    /// Mean seconds per question under which a 100% score flags.
    pub perfect_score_fast_seconds: f64,
    /// Per-answer timing variance (ms^2) below which timing looks scripted.
    pub min_timing_variance_ms2: f64,
    /// Minimum answers present before the variance heuristic applies.
    pub min_answers_for_variance: usize,
    /// Number of heuristic flags that makes an attempt suspicious.
    /// Policy threshold, not a law of nature.
    pub suspicion_flag_threshold: u32,
    /// Attempt rows older than this are swept hourly.
    pub retention_days: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_daily_attempts: 10,
            max_hourly_attempts: 3,
            cooldown_seconds: 30,
            high_score_threshold: 95,
            high_score_streak: 5,
            min_avg_seconds_per_question: 5.0,
            max_avg_seconds_per_question: 300.0,
            perfect_score_fast_seconds: 10.0,
            min_timing_variance_ms2: 1000.0,
            min_answers_for_variance: 4,
            suspicion_flag_threshold: 2,
            retention_days: 7,
        }
    }
}

/// Server-wide tunables, reloadable at runtime through the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Platform cut of each entry fee, in whole percent.
    pub app_fee_percent: u32,
    /// Prize split applied when a tournament does not override it.
    pub default_prize_split: Vec<PrizeShare>,
    /// Reward credited to the referrer when a referred user registers,
    /// in minor units.
    pub referral_reward: i64,
    /// XP needed per level step.
    pub xp_per_level: i64,
    pub security: SecurityConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_fee_percent: 20,
            default_prize_split: vec![
                PrizeShare {
                    rank: 1,
                    percent: 50,
                },
                PrizeShare {
                    rank: 2,
                    percent: 30,
                },
                PrizeShare {
                    rank: 3,
                    percent: 20,
                },
            ],
            referral_reward: 500,
            xp_per_level: 1000,
            security: SecurityConfig::default(),
        }
    }
}
