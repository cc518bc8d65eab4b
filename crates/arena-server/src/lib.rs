//! Quiz Arena Server - Backend for the quiz tournament platform
//!
//! Architecture:
//! - Ledger: two-bucket user balances with a single commit path per operation
//! - Tournaments: lifecycle state machine with entry fees and prize payouts
//! - Security: quiz-attempt rate limiting and fraud heuristics
//! - WebSocket: real-time tournament and balance events
//!
//! Key invariants:
//! - Every balance change commits together with its transaction record
//! - Tournament transitions serialize on the tournament row lock
//! - Attempt windows serialize on a per-(user, difficulty) advisory lock

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod observability;
pub mod security;
pub mod state;
pub mod tournament;
pub mod websocket;

pub use config::Settings;
pub use db::DbPool;
pub use error::{ArenaError, ArenaResult};
pub use observability::{init_sentry, AuditEventType};
pub use state::AppState;
