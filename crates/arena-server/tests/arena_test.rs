//! Integration tests over the library surface
//!
//! These exercise the pure cores end to end: ranking into prize splits into
//! ledger bucket math, and the rate-limit gate against a simulated attempt
//! history. Database-backed paths are covered by the module tests' pure
//! extractions; nothing here needs a live PostgreSQL.

use arena_server::config::{SecurityConfig, Settings};
use arena_server::ledger::Balances;
use arena_server::models::{
    AnswerRecord, BalanceBucket, GateReason, Participant, PrizeShare, WsEvent,
};
use arena_server::security::{evaluate_gate, suspicion_flags, WindowSnapshot};
use arena_server::tournament::{rank_participants, split_prizes, validate_schedule};
use arena_server::ArenaError;
use uuid::Uuid;

fn participant(user_id: Uuid, score: i32, time_spent: i64) -> Participant {
    Participant {
        tournament_id: Uuid::new_v4(),
        user_id,
        score,
        time_spent,
        answers: Vec::new(),
        rank: None,
        prize: None,
        joined_at: 0,
    }
}

/// A full payout round: rank three players, split a pool that does not
/// divide evenly, and credit the winners' buckets.
#[test]
fn test_payout_round() {
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let participants = vec![
        participant(a, 90, 20),
        participant(b, 90, 15),
        participant(c, 70, 30),
    ];

    let ranked = rank_participants(&participants);
    // Equal scores break on time: b was faster.
    assert_eq!(ranked[0].user_id, b);
    assert_eq!(ranked[1].user_id, a);
    assert_eq!(ranked[2].user_id, c);

    let split = Settings::default().default_prize_split;
    let prizes = split_prizes(10_001, &split);
    // Floored shares, with the leftover cent going to rank 1.
    assert_eq!(prizes, vec![(1, 5_001), (2, 3_000), (3, 2_000)]);
    assert_eq!(prizes.iter().map(|(_, p)| p).sum::<i64>(), 10_001);

    let mut winner = Balances::new(1_000, 0);
    winner.credit(BalanceBucket::Playable, prizes[0].1).unwrap();
    assert_eq!(winner.total(), 6_001);
}

/// The join-then-leave scenario: entry fee out, refund back, snapshots
/// chaining exactly through both movements.
#[test]
fn test_join_then_leave_restores_balance() {
    let entry_fee = 20;
    let mut balances = Balances::new(100, 0);

    let join_before = balances.total();
    balances.debit(BalanceBucket::Playable, entry_fee).unwrap();
    let join_after = balances.total();
    assert_eq!((join_before, join_after), (100, 80));

    let leave_before = balances.total();
    balances.credit(BalanceBucket::Playable, entry_fee).unwrap();
    let leave_after = balances.total();
    assert_eq!((leave_before, leave_after), (80, 100));

    // The refund picks up where the debit left off.
    assert_eq!(leave_before, join_after);
    assert_eq!(balances.total(), 100);
}

/// Transaction/balance agreement by replay: walking the recorded
/// before/after snapshots reproduces the final balance, and each snapshot
/// delta equals its operation's signed amount.
#[test]
fn test_snapshot_replay_reproduces_balance() {
    let mut balances = Balances::new(500, 100);
    let initial = balances.total();

    // (bucket, amount, is_credit)
    let ops = [
        (BalanceBucket::Playable, 250, true),
        (BalanceBucket::Playable, 120, false),
        (BalanceBucket::Bonus, 40, true),
        (BalanceBucket::Playable, 300, false),
        (BalanceBucket::Bonus, 90, false),
    ];

    let mut snapshots = Vec::new();
    let mut signed_sum = 0i64;
    for (bucket, amount, is_credit) in ops {
        let before = balances.total();
        if is_credit {
            balances.credit(bucket, amount).unwrap();
            signed_sum += amount;
        } else {
            balances.debit(bucket, amount).unwrap();
            signed_sum -= amount;
        }
        snapshots.push((before, balances.total(), if is_credit { amount } else { -amount }));
    }

    // Each record's delta is its signed amount, and the chain is unbroken.
    let mut replayed = initial;
    for (before, after, signed) in &snapshots {
        assert_eq!(*before, replayed);
        assert_eq!(after - before, *signed);
        replayed = *after;
    }
    assert_eq!(replayed, balances.total());
    assert_eq!(replayed, initial + signed_sum);
}

#[test]
fn test_entry_fee_is_all_or_nothing() {
    let mut balances = Balances::new(500, 200);
    let err = balances.debit(BalanceBucket::Playable, 600).unwrap_err();
    assert!(matches!(err, ArenaError::InsufficientFunds));
    // Bonus funds never cover a playable debit.
    assert_eq!(balances.playable, 500);
    assert_eq!(balances.bonus, 200);
}

#[test]
fn test_schedule_must_be_ordered_and_future() {
    let now = 1_000_000;
    assert!(validate_schedule(now, now + 100, now + 200, now + 300, now + 400).is_ok());
    // Start inside the registration window.
    assert!(validate_schedule(now, now + 100, now + 300, now + 200, now + 400).is_err());
    // Start in the past.
    assert!(validate_schedule(now, now - 500, now - 400, now - 300, now - 200).is_err());
}

/// Walk a user through a fresh day up to the hourly cap.
#[test]
fn test_gate_tightens_over_an_hour() {
    let cfg = SecurityConfig::default();
    let now = 1_700_000_000;

    let fresh = WindowSnapshot {
        daily_count: 0,
        hourly_count: 0,
        hour_window_start: None,
        last_attempt: None,
        suspicious: false,
    };
    assert!(evaluate_gate(&cfg, now, &fresh).allowed);

    let at_hourly_cap = WindowSnapshot {
        daily_count: 3,
        hourly_count: 3,
        hour_window_start: Some(now - 1800),
        last_attempt: Some(now - 120),
        suspicious: false,
    };
    let gate = evaluate_gate(&cfg, now, &at_hourly_cap);
    assert!(!gate.allowed);
    assert_eq!(gate.reason, Some(GateReason::HourlyLimitExceeded));
    // The window reopens an hour after its oldest attempt.
    assert_eq!(gate.reset_time, Some(now - 1800 + 3600));
}

#[test]
fn test_suspicious_user_has_no_reset_time() {
    let cfg = SecurityConfig::default();
    let now = 1_700_000_000;
    let snap = WindowSnapshot {
        daily_count: 1,
        hourly_count: 1,
        hour_window_start: Some(now - 600),
        last_attempt: Some(now - 600),
        suspicious: true,
    };
    let gate = evaluate_gate(&cfg, now, &snap);
    assert!(!gate.allowed);
    assert_eq!(gate.reason, Some(GateReason::SuspiciousActivity));
    assert_eq!(gate.reset_time, None);
}

fn answers(times_ms: &[i64], correct: bool) -> Vec<AnswerRecord> {
    times_ms
        .iter()
        .map(|&time_ms| AnswerRecord {
            question_id: Uuid::new_v4(),
            answer_index: 0,
            correct,
            time_ms,
        })
        .collect()
}

/// A bot profile trips multiple heuristics at once; a quick human trips at
/// most one and stays under the flag threshold.
#[test]
fn test_heuristics_separate_bots_from_humans() {
    let cfg = SecurityConfig::default();

    // Perfect score, 2s per question, metronome timing.
    let bot_answers = answers(&[2_000, 2_000, 2_000, 2_000, 2_000], true);
    let bot_flags = suspicion_flags(&cfg, 100, 10, &bot_answers, &[98, 97, 99, 96]);
    assert!(bot_flags >= cfg.suspicion_flag_threshold);

    // Fast but uneven, with an ordinary history.
    let human_answers = answers(&[3_000, 9_000, 5_500, 12_000, 4_200], true);
    let human_flags = suspicion_flags(&cfg, 80, 34, &human_answers, &[60, 75, 82]);
    assert!(human_flags < cfg.suspicion_flag_threshold);
}

#[test]
fn test_event_wire_format() {
    let event = WsEvent::Ping;
    let json = serde_json::to_string(&event).unwrap();
    assert_eq!(json, r#"{"type":"ping"}"#);

    let parsed: WsEvent = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
    assert!(matches!(parsed, WsEvent::Pong));
}
