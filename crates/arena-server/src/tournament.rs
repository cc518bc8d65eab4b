//! Tournament state machine
//!
//! upcoming -> active -> completed, with upcoming -> cancelled as the
//! alternate terminal. Transitions never regress. Every transition runs in a
//! single database transaction that locks the tournament row first and user
//! rows second (ascending user id when several), re-checking the current
//! status under the lock so a duplicate or concurrent call fails with a state
//! error instead of repeating effects.
//!
//! All money movement goes through the ledger primitives; this module never
//! touches `users.playable_balance` directly.

use crate::config::Settings;
use crate::db::queries;
use crate::error::{ArenaError, ArenaResult};
use crate::ledger::{self, LedgerOp};
use crate::models::{
    BalanceBucket, CreateTournamentRequest, Participant, ParticipantEvent, PrizeShare,
    RecordScoreRequest, Tournament, TournamentCancelledEvent, TournamentCompletedEvent,
    TournamentStartedEvent, TournamentStatus, TxCategory, TxKind, WsEvent,
};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tracing::info;
use uuid::Uuid;

/// Schedule precondition for `create`:
/// registration_start < registration_end < start_time < end_time, with
/// start_time strictly in the future.
pub fn validate_schedule(
    now: i64,
    registration_start: i64,
    registration_end: i64,
    start_time: i64,
    end_time: i64,
) -> ArenaResult<()> {
    let ordered = registration_start < registration_end
        && registration_end < start_time
        && start_time < end_time;
    if !ordered || start_time <= now {
        return Err(ArenaError::InvalidDates);
    }
    Ok(())
}

/// Join preconditions, checked under the tournament row lock: upcoming
/// status, open registration window, no duplicate entry, roster below the
/// cap.
pub fn validate_join(tournament: &Tournament, already_joined: bool, now: i64) -> ArenaResult<()> {
    if tournament.status != TournamentStatus::Upcoming {
        return Err(ArenaError::RegistrationClosed);
    }
    if now < tournament.registration_start || now > tournament.registration_end {
        return Err(ArenaError::RegistrationClosed);
    }
    if already_joined {
        return Err(ArenaError::AlreadyParticipant);
    }
    if tournament.participant_count >= tournament.max_participants as i64 {
        return Err(ArenaError::TournamentFull);
    }
    Ok(())
}

/// A participant's final standing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub user_id: Uuid,
    pub score: i32,
    pub time_spent: i64,
    pub rank: u32,
}

/// Rank participants: score descending, ties by time_spent ascending
/// (faster is better), then user id for a deterministic total order.
/// Ranks come out as a contiguous 1..N.
pub fn rank_participants(participants: &[Participant]) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = participants
        .iter()
        .map(|p| RankedEntry {
            user_id: p.user_id,
            score: p.score,
            time_spent: p.time_spent,
            rank: 0,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.time_spent.cmp(&b.time_spent))
            .then(a.user_id.cmp(&b.user_id))
    });

    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = (i + 1) as u32;
    }
    entries
}

/// Percentage-based prize split over the pool. Each share rounds down; the
/// sub-cent remainder of the intended total goes to rank 1. An empty
/// distribution pays nothing.
pub fn split_prizes(prize_pool: i64, distribution: &[PrizeShare]) -> Vec<(u32, i64)> {
    if distribution.is_empty() || prize_pool <= 0 {
        return Vec::new();
    }

    let mut shares: Vec<PrizeShare> = distribution.to_vec();
    shares.sort_by_key(|s| s.rank);

    let total_percent: i64 = shares.iter().map(|s| s.percent as i64).sum();
    let intended_total = prize_pool * total_percent / 100;

    let mut prizes: Vec<(u32, i64)> = shares
        .iter()
        .map(|s| (s.rank, prize_pool * s.percent as i64 / 100))
        .collect();

    let allocated: i64 = prizes.iter().map(|(_, amount)| amount).sum();
    let remainder = intended_total - allocated;
    if remainder > 0 {
        if let Some(first) = prizes.iter_mut().find(|(rank, _)| *rank == 1) {
            first.1 += remainder;
        }
    }
    prizes
}

/// Create a tournament. The creator pays the entry fee immediately, as if
/// joining their own tournament.
pub async fn create(
    pool: &Pool,
    settings: &Settings,
    req: &CreateTournamentRequest,
) -> ArenaResult<(Tournament, WsEvent)> {
    let now = Utc::now().timestamp();
    validate_schedule(
        now,
        req.registration_start,
        req.registration_end,
        req.start_time,
        req.end_time,
    )?;

    if req.entry_fee < 0 || req.prize_pool < 0 || req.max_participants < 1 {
        return Err(ArenaError::InvalidAmount);
    }
    // min_participants can never be set below 2.
    let min_participants = req.min_participants.unwrap_or(2).max(2);

    let app_fee = req.entry_fee * settings.app_fee_percent as i64 / 100;
    let distribution = req
        .prize_distribution
        .clone()
        .unwrap_or_else(|| settings.default_prize_split.clone());

    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let id = queries::insert_tournament(
        &txn,
        &req.title,
        req.creator_id,
        req.entry_fee,
        req.prize_pool,
        app_fee,
        req.max_participants,
        min_participants,
        to_datetime(req.registration_start)?,
        to_datetime(req.registration_end)?,
        to_datetime(req.start_time)?,
        to_datetime(req.end_time)?,
        &distribution,
    )
    .await
    .map_err(ArenaError::System)?;

    if req.entry_fee > 0 {
        ledger::debit_in_tx(
            &txn,
            &LedgerOp::new(
                req.creator_id,
                BalanceBucket::Playable,
                req.entry_fee,
                TxKind::Tournament {
                    tournament_id: id,
                    rank: None,
                },
            )
            .with_category(TxCategory::Expense),
        )
        .await?;
    }
    queries::insert_participant(&txn, id, req.creator_id)
        .await
        .map_err(ArenaError::System)?;

    let tournament = queries::get_tournament(&txn, id)
        .await
        .map_err(ArenaError::System)?
        .ok_or_else(|| ArenaError::System(anyhow!("tournament vanished during create")))?;

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(tournament_id = %id, creator = %req.creator_id, "tournament created");

    let event = WsEvent::ParticipantJoined(ParticipantEvent {
        tournament_id: id,
        user_id: req.creator_id,
        participant_count: tournament.participant_count,
    });
    Ok((tournament, event))
}

/// Join: only while upcoming, inside the registration window and below the
/// roster cap. Debits the entry fee from the playable bucket.
pub async fn join(pool: &Pool, tournament_id: Uuid, user_id: Uuid) -> ArenaResult<(Tournament, WsEvent)> {
    let now = Utc::now().timestamp();
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let tournament = queries::lock_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    let already_joined = queries::participant_exists(&txn, tournament_id, user_id)
        .await
        .map_err(ArenaError::System)?;
    validate_join(&tournament, already_joined, now)?;

    if tournament.entry_fee > 0 {
        ledger::debit_in_tx(
            &txn,
            &LedgerOp::new(
                user_id,
                BalanceBucket::Playable,
                tournament.entry_fee,
                TxKind::Tournament {
                    tournament_id,
                    rank: None,
                },
            )
            .with_category(TxCategory::Expense),
        )
        .await?;
    }
    queries::insert_participant(&txn, tournament_id, user_id)
        .await
        .map_err(ArenaError::System)?;

    let updated = queries::get_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(tournament_id = %tournament_id, user_id = %user_id, "participant joined");

    let event = WsEvent::ParticipantJoined(ParticipantEvent {
        tournament_id,
        user_id,
        participant_count: updated.participant_count,
    });
    Ok((updated, event))
}

/// Leave before start, refunding the entry fee.
pub async fn leave(pool: &Pool, tournament_id: Uuid, user_id: Uuid) -> ArenaResult<(Tournament, WsEvent)> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let tournament = queries::lock_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    if tournament.status != TournamentStatus::Upcoming {
        return Err(ArenaError::TournamentStarted);
    }
    if !queries::delete_participant(&txn, tournament_id, user_id)
        .await
        .map_err(ArenaError::System)?
    {
        return Err(ArenaError::NotAParticipant);
    }

    if tournament.entry_fee > 0 {
        ledger::credit_in_tx(
            &txn,
            &LedgerOp::new(
                user_id,
                BalanceBucket::Playable,
                tournament.entry_fee,
                TxKind::Refund {
                    tournament_id: Some(tournament_id),
                },
            ),
        )
        .await?;
    }

    let updated = queries::get_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(tournament_id = %tournament_id, user_id = %user_id, "participant left, fee refunded");

    let event = WsEvent::ParticipantLeft(ParticipantEvent {
        tournament_id,
        user_id,
        participant_count: updated.participant_count,
    });
    Ok((updated, event))
}

/// Start: freezes the roster and enters the quiz phase.
pub async fn start(pool: &Pool, tournament_id: Uuid) -> ArenaResult<(Tournament, WsEvent)> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let tournament = queries::lock_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    if tournament.status != TournamentStatus::Upcoming {
        return Err(ArenaError::TournamentStarted);
    }
    if tournament.participant_count < tournament.min_participants as i64 {
        return Err(ArenaError::NotEnoughParticipants);
    }

    queries::mark_tournament_started(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?;

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(
        tournament_id = %tournament_id,
        participants = tournament.participant_count,
        "tournament started"
    );

    let event = WsEvent::TournamentStarted(TournamentStartedEvent {
        tournament_id,
        participant_count: tournament.participant_count,
    });
    let updated = queries::get_tournament_pooled(pool, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;
    Ok((updated, event))
}

/// Score update during the active phase. Scores only move up.
pub async fn record_score(
    pool: &Pool,
    tournament_id: Uuid,
    req: &RecordScoreRequest,
) -> ArenaResult<()> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let tournament = queries::lock_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    if tournament.status != TournamentStatus::Active {
        return Err(ArenaError::TournamentNotActive);
    }
    if !queries::update_participant_score(
        &txn,
        tournament_id,
        req.user_id,
        req.score,
        req.time_spent,
        &req.answers,
    )
    .await
    .map_err(ArenaError::System)?
    {
        return Err(ArenaError::NotAParticipant);
    }

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;
    Ok(())
}

/// Complete: compute final rankings, pay prizes exactly once, seal the
/// tournament. A second call observes `completed` under the row lock and
/// fails with `TournamentNotActive` — there is no re-pay path.
pub async fn complete(pool: &Pool, tournament_id: Uuid) -> ArenaResult<(Tournament, WsEvent)> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let tournament = queries::lock_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    if tournament.status != TournamentStatus::Active {
        return Err(ArenaError::TournamentNotActive);
    }

    let participants = queries::get_participants(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?;
    let ranked = rank_participants(&participants);
    let prizes = split_prizes(tournament.prize_pool, &tournament.prize_distribution);

    // Pair every settled participant with their prize (0 when their rank has
    // no distribution entry), then pay in ascending user id order so
    // concurrent completions of different tournaments cannot deadlock on
    // user rows.
    let mut results: Vec<(RankedEntry, i64)> = ranked
        .into_iter()
        .map(|entry| {
            let prize = prizes
                .iter()
                .find(|(rank, _)| *rank == entry.rank)
                .map(|(_, amount)| *amount)
                .unwrap_or(0);
            (entry, prize)
        })
        .collect();
    results.sort_by_key(|(entry, _)| entry.user_id);

    let mut total_paid = 0i64;
    let mut winner_id = None;
    for (entry, prize) in &results {
        if entry.rank == 1 {
            winner_id = Some(entry.user_id);
        }
        queries::set_participant_result(&txn, tournament_id, entry.user_id, entry.rank, *prize)
            .await
            .map_err(ArenaError::System)?;

        if *prize > 0 {
            ledger::credit_in_tx(
                &txn,
                &LedgerOp::new(
                    entry.user_id,
                    BalanceBucket::Playable,
                    *prize,
                    TxKind::Tournament {
                        tournament_id,
                        rank: Some(entry.rank),
                    },
                )
                .with_category(TxCategory::Income),
            )
            .await?;
            total_paid += prize;
        }
    }

    queries::mark_tournament_completed(&txn, tournament_id, winner_id)
        .await
        .map_err(ArenaError::System)?;

    let updated = queries::get_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(
        tournament_id = %tournament_id,
        winner = ?winner_id,
        total_paid,
        "tournament completed"
    );

    let event = WsEvent::TournamentCompleted(TournamentCompletedEvent {
        tournament_id,
        winner_id,
        total_paid,
    });
    Ok((updated, event))
}

/// Cancel an upcoming tournament, refunding every participant atomically.
pub async fn cancel(pool: &Pool, tournament_id: Uuid) -> ArenaResult<(Tournament, WsEvent)> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let tournament = queries::lock_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    if tournament.status != TournamentStatus::Upcoming {
        return Err(ArenaError::TournamentStarted);
    }

    let mut participants = queries::get_participants(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?;
    participants.sort_by_key(|p| p.user_id);

    if tournament.entry_fee > 0 {
        for participant in &participants {
            ledger::credit_in_tx(
                &txn,
                &LedgerOp::new(
                    participant.user_id,
                    BalanceBucket::Playable,
                    tournament.entry_fee,
                    TxKind::Refund {
                        tournament_id: Some(tournament_id),
                    },
                ),
            )
            .await?;
        }
    }

    queries::update_tournament_status(
        &txn,
        tournament_id,
        TournamentStatus::Cancelled,
        tournament.phase,
    )
    .await
    .map_err(ArenaError::System)?;

    let updated = queries::get_tournament(&txn, tournament_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TournamentNotFound)?;

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(
        tournament_id = %tournament_id,
        refunded = participants.len(),
        "tournament cancelled"
    );

    let event = WsEvent::TournamentCancelled(TournamentCancelledEvent {
        tournament_id,
        refunded_participants: participants.len() as i64,
    });
    Ok((updated, event))
}

fn to_datetime(secs: i64) -> ArenaResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(ArenaError::InvalidDates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(user_id: Uuid, score: i32, time_spent: i64) -> Participant {
        Participant {
            tournament_id: Uuid::nil(),
            user_id,
            score,
            time_spent,
            answers: Vec::new(),
            rank: None,
            prize: None,
            joined_at: 0,
        }
    }

    #[test]
    fn test_schedule_validation() {
        // reg_start < reg_end < start < end, start in the future
        assert!(validate_schedule(0, 10, 20, 30, 40).is_ok());

        // start not in the future
        assert!(validate_schedule(30, 10, 20, 30, 40).is_err());
        // out of order
        assert!(validate_schedule(0, 20, 10, 30, 40).is_err());
        assert!(validate_schedule(0, 10, 30, 20, 40).is_err());
        assert!(validate_schedule(0, 10, 20, 40, 30).is_err());
    }

    #[test]
    fn test_ranking_tie_broken_by_time() {
        // Scores [90, 90, 70], time_spent [20, 15, 30]: the faster of the
        // tied 90s ranks first.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let participants = vec![
            participant(a, 90, 20),
            participant(b, 90, 15),
            participant(c, 70, 30),
        ];

        let ranked = rank_participants(&participants);
        assert_eq!(ranked[0].user_id, b);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].user_id, a);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].user_id, c);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_ranking_contiguous_no_gaps() {
        let participants: Vec<Participant> = (0..10)
            .map(|i| participant(Uuid::new_v4(), 50, i as i64))
            .collect();
        let ranked = rank_participants(&participants);

        let mut ranks: Vec<u32> = ranked.iter().map(|e| e.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=10).collect::<Vec<u32>>());
    }

    #[test]
    fn test_ranking_higher_score_always_better_rank() {
        let participants = vec![
            participant(Uuid::new_v4(), 10, 1),
            participant(Uuid::new_v4(), 95, 500),
            participant(Uuid::new_v4(), 40, 2),
        ];
        let ranked = rank_participants(&participants);
        for a in &ranked {
            for b in &ranked {
                if a.score > b.score {
                    assert!(a.rank < b.rank);
                }
            }
        }
    }

    #[test]
    fn test_prize_split_default_distribution() {
        let distribution = vec![
            PrizeShare { rank: 1, percent: 50 },
            PrizeShare { rank: 2, percent: 30 },
            PrizeShare { rank: 3, percent: 20 },
        ];
        let prizes = split_prizes(100, &distribution);
        assert_eq!(prizes, vec![(1, 50), (2, 30), (3, 20)]);
    }

    #[test]
    fn test_prize_split_rounds_down_remainder_to_rank_one() {
        let distribution = vec![
            PrizeShare { rank: 1, percent: 50 },
            PrizeShare { rank: 2, percent: 30 },
            PrizeShare { rank: 3, percent: 20 },
        ];
        // 101 * 50% = 50.5 -> 50, 101 * 30% = 30.3 -> 30, 101 * 20% = 20.2 -> 20
        // intended total 101, allocated 100, remainder 1 goes to rank 1.
        let prizes = split_prizes(101, &distribution);
        assert_eq!(prizes, vec![(1, 51), (2, 30), (3, 20)]);

        let total: i64 = prizes.iter().map(|(_, p)| p).sum();
        assert_eq!(total, 101);
    }

    #[test]
    fn test_prize_split_empty_distribution_pays_nothing() {
        assert!(split_prizes(1_000, &[]).is_empty());
    }

    #[test]
    fn test_prize_split_partial_percentages() {
        // Distribution that does not sum to 100 only pays what it names.
        let distribution = vec![PrizeShare { rank: 1, percent: 60 }];
        let prizes = split_prizes(200, &distribution);
        assert_eq!(prizes, vec![(1, 120)]);
    }

    fn upcoming_tournament(participant_count: i64, max_participants: i32) -> Tournament {
        Tournament {
            id: Uuid::new_v4(),
            title: "weekly".to_string(),
            creator_id: Uuid::new_v4(),
            entry_fee: 20,
            prize_pool: 1_000,
            app_fee: 4,
            max_participants,
            min_participants: 2,
            status: TournamentStatus::Upcoming,
            phase: crate::models::TournamentPhase::Registration,
            registration_start: 1_000,
            registration_end: 2_000,
            start_time: 3_000,
            end_time: 4_000,
            actual_start_time: None,
            actual_end_time: None,
            prize_distribution: Vec::new(),
            winner_id: None,
            participant_count,
            created_at: 0,
        }
    }

    #[test]
    fn test_join_rejected_when_roster_full() {
        let tournament = upcoming_tournament(8, 8);
        let err = validate_join(&tournament, false, 1_500).unwrap_err();
        assert!(matches!(err, ArenaError::TournamentFull));

        // One seat left: allowed.
        let tournament = upcoming_tournament(7, 8);
        assert!(validate_join(&tournament, false, 1_500).is_ok());
    }

    #[test]
    fn test_join_rejected_outside_registration_window() {
        let tournament = upcoming_tournament(0, 8);
        assert!(matches!(
            validate_join(&tournament, false, 999).unwrap_err(),
            ArenaError::RegistrationClosed
        ));
        assert!(matches!(
            validate_join(&tournament, false, 2_001).unwrap_err(),
            ArenaError::RegistrationClosed
        ));
    }

    #[test]
    fn test_join_rejected_for_duplicate_or_started() {
        let tournament = upcoming_tournament(3, 8);
        assert!(matches!(
            validate_join(&tournament, true, 1_500).unwrap_err(),
            ArenaError::AlreadyParticipant
        ));

        let mut started = upcoming_tournament(3, 8);
        started.status = TournamentStatus::Active;
        assert!(matches!(
            validate_join(&started, false, 1_500).unwrap_err(),
            ArenaError::RegistrationClosed
        ));
    }

    #[test]
    fn test_prize_conservation_with_fewer_participants_than_shares() {
        // Two participants, three distribution entries: rank 3's share is
        // simply unmatched and unpaid.
        let distribution = vec![
            PrizeShare { rank: 1, percent: 50 },
            PrizeShare { rank: 2, percent: 30 },
            PrizeShare { rank: 3, percent: 20 },
        ];
        let prizes = split_prizes(100, &distribution);
        let participants = vec![
            participant(Uuid::new_v4(), 80, 10),
            participant(Uuid::new_v4(), 60, 10),
        ];
        let ranked = rank_participants(&participants);

        let paid: i64 = ranked
            .iter()
            .filter_map(|e| prizes.iter().find(|(r, _)| *r == e.rank))
            .map(|(_, amount)| *amount)
            .sum();
        let matched: i64 = prizes
            .iter()
            .filter(|(rank, _)| *rank as usize <= ranked.len())
            .map(|(_, amount)| *amount)
            .sum();
        assert_eq!(paid, matched);
        assert_eq!(paid, 80); // rank 3 share (20) stays unpaid
    }
}
