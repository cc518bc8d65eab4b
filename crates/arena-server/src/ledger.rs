//! Ledger primitives
//!
//! Every piece of money movement in the system goes through `credit` /
//! `debit`: one balance-bucket mutation plus one transaction record, written
//! inside a single database transaction. There is exactly one commit path —
//! either both writes land or neither does, so the balance and the
//! transaction history can never diverge.
//!
//! Serialization is per user: the user row is taken `FOR UPDATE` before the
//! read-validate-write sequence. Callers that need the ledger inside a wider
//! transition (tournament join/leave/complete) pass their own transaction via
//! the `*_in_tx` variants and keep the lock ordering tournament-then-user.

use crate::error::{ArenaError, ArenaResult};
use crate::models::{BalanceBucket, Transaction, TxCategory, TxKind, TxStatus};
use deadpool_postgres::Pool;
use deadpool_postgres::GenericClient;
use tracing::info;
use uuid::Uuid;

use crate::db::queries;

/// A user's two balance buckets, as pure values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balances {
    pub playable: i64,
    pub bonus: i64,
}

impl Balances {
    pub fn new(playable: i64, bonus: i64) -> Self {
        Self { playable, bonus }
    }

    pub fn total(&self) -> i64 {
        self.playable + self.bonus
    }

    pub fn bucket(&self, bucket: BalanceBucket) -> i64 {
        match bucket {
            BalanceBucket::Playable => self.playable,
            BalanceBucket::Bonus => self.bonus,
        }
    }

    /// Increase one bucket. Never fails for a positive amount.
    pub fn credit(&mut self, bucket: BalanceBucket, amount: i64) -> ArenaResult<()> {
        if amount <= 0 {
            return Err(ArenaError::InvalidAmount);
        }
        match bucket {
            BalanceBucket::Playable => self.playable += amount,
            BalanceBucket::Bonus => self.bonus += amount,
        }
        Ok(())
    }

    /// All-or-nothing decrease of one bucket.
    pub fn debit(&mut self, bucket: BalanceBucket, amount: i64) -> ArenaResult<()> {
        if amount <= 0 {
            return Err(ArenaError::InvalidAmount);
        }
        if self.bucket(bucket) < amount {
            return Err(ArenaError::InsufficientFunds);
        }
        match bucket {
            BalanceBucket::Playable => self.playable -= amount,
            BalanceBucket::Bonus => self.bonus -= amount,
        }
        Ok(())
    }
}

/// One ledger operation: the bucket delta plus the fields of the transaction
/// record that will document it.
#[derive(Debug, Clone)]
pub struct LedgerOp {
    pub user_id: Uuid,
    pub bucket: BalanceBucket,
    pub amount: i64,
    pub fee: i64,
    pub kind: TxKind,
    pub category: TxCategory,
    pub status: TxStatus,
}

impl LedgerOp {
    pub fn new(user_id: Uuid, bucket: BalanceBucket, amount: i64, kind: TxKind) -> Self {
        let category = match &kind {
            TxKind::Deposit { .. }
            | TxKind::Referral { .. }
            | TxKind::Bonus
            | TxKind::Refund { .. } => TxCategory::Income,
            TxKind::Withdrawal { .. } => TxCategory::Expense,
            // Quiz rewards, tournament entries/prizes and admin adjustments
            // go both ways; the caller sets the category explicitly.
            TxKind::Quiz | TxKind::Tournament { .. } | TxKind::AdminAdjustment { .. } => {
                TxCategory::Transfer
            }
        };
        Self {
            user_id,
            bucket,
            amount,
            fee: 0,
            kind,
            category,
            status: TxStatus::Completed,
        }
    }

    pub fn with_category(mut self, category: TxCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_status(mut self, status: TxStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_fee(mut self, fee: i64) -> Self {
        self.fee = fee;
        self
    }

    /// Refunds return money the user already paid in, so they are applied
    /// even when the account is blocked. Without this a tournament cancel
    /// would abort on one blocked participant, and a blocked user's rejected
    /// withdrawal could never release its hold.
    pub fn bypasses_block(&self) -> bool {
        matches!(self.kind, TxKind::Refund { .. })
    }
}

/// Credit inside a caller-owned database transaction.
pub async fn credit_in_tx(
    client: &impl GenericClient,
    op: &LedgerOp,
) -> ArenaResult<Transaction> {
    apply_in_tx(client, op, true).await
}

/// Debit inside a caller-owned database transaction.
pub async fn debit_in_tx(client: &impl GenericClient, op: &LedgerOp) -> ArenaResult<Transaction> {
    apply_in_tx(client, op, false).await
}

async fn apply_in_tx(
    client: &impl GenericClient,
    op: &LedgerOp,
    is_credit: bool,
) -> ArenaResult<Transaction> {
    let (playable, bonus, blocked) = queries::lock_user_balances(client, op.user_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::UserNotFound)?;
    if blocked && !(is_credit && op.bypasses_block()) {
        return Err(ArenaError::AccountBlocked);
    }

    let mut balances = Balances::new(playable, bonus);
    let balance_before = balances.total();

    if is_credit {
        balances.credit(op.bucket, op.amount)?;
    } else {
        balances.debit(op.bucket, op.amount)?;
    }
    let balance_after = balances.total();

    // Winnings and other income count toward lifetime earnings. A refund
    // returns the user's own money and earns nothing.
    let earned_delta = if is_credit
        && op.category == TxCategory::Income
        && !matches!(op.kind, TxKind::Refund { .. })
    {
        op.amount - op.fee
    } else {
        0
    };

    queries::update_user_balances(
        client,
        op.user_id,
        balances.playable,
        balances.bonus,
        earned_delta,
    )
    .await
    .map_err(ArenaError::System)?;

    let record = queries::insert_transaction(
        client,
        op.user_id,
        &op.kind,
        op.category,
        op.bucket,
        op.amount,
        op.fee,
        balance_before,
        balance_after,
        op.status,
    )
    .await
    .map_err(ArenaError::System)?;

    info!(
        user_id = %op.user_id,
        kind = op.kind.as_str(),
        amount = op.amount,
        balance_after,
        credit = is_credit,
        "ledger entry"
    );

    Ok(record)
}

/// Standalone credit: owns its database transaction.
pub async fn credit(pool: &Pool, op: &LedgerOp) -> ArenaResult<Transaction> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;
    let record = credit_in_tx(&txn, op).await?;
    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;
    Ok(record)
}

/// Standalone debit: owns its database transaction.
pub async fn debit(pool: &Pool, op: &LedgerOp) -> ArenaResult<Transaction> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;
    let record = debit_in_tx(&txn, op).await?;
    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;
    Ok(record)
}

/// Record a pending transaction without touching balances. Used for deposit
/// requests, where the credit happens at admin approval time.
pub async fn record_pending(pool: &Pool, op: &LedgerOp) -> ArenaResult<Transaction> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let (playable, bonus, blocked) = queries::lock_user_balances(&txn, op.user_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::UserNotFound)?;
    if blocked {
        return Err(ArenaError::AccountBlocked);
    }
    if op.amount <= 0 {
        return Err(ArenaError::InvalidAmount);
    }

    let balance = playable + bonus;
    let record = queries::insert_transaction(
        &txn,
        op.user_id,
        &op.kind,
        op.category,
        op.bucket,
        op.amount,
        op.fee,
        balance,
        balance,
        TxStatus::Pending,
    )
    .await
    .map_err(ArenaError::System)?;

    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;
    Ok(record)
}

/// Admin approval of a pending external-flow transaction.
///
/// Deposits credit the bucket now, at approval time, and the pending record
/// is completed with the real balance snapshots. Withdrawals held the funds
/// at request time, so approval only completes the record.
pub async fn approve_pending(pool: &Pool, transaction_id: Uuid) -> ArenaResult<Transaction> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let record = queries::lock_transaction(&txn, transaction_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TransactionNotFound)?;
    if record.status != TxStatus::Pending {
        return Err(ArenaError::TransactionNotPending);
    }

    match &record.kind {
        TxKind::Deposit { .. } => {
            let (playable, bonus, _) = queries::lock_user_balances(&txn, record.user_id)
                .await
                .map_err(ArenaError::System)?
                .ok_or(ArenaError::UserNotFound)?;
            let mut balances = Balances::new(playable, bonus);
            let before = balances.total();
            balances.credit(record.bucket, record.net_amount)?;
            queries::update_user_balances(
                &txn,
                record.user_id,
                balances.playable,
                balances.bonus,
                record.net_amount,
            )
            .await
            .map_err(ArenaError::System)?;
            queries::finalize_transaction_snapshots(
                &txn,
                transaction_id,
                before,
                balances.total(),
                TxStatus::Completed,
            )
            .await
            .map_err(ArenaError::System)?;
        }
        TxKind::Withdrawal { .. } => {
            queries::set_transaction_status(&txn, transaction_id, TxStatus::Completed)
                .await
                .map_err(ArenaError::System)?;
        }
        _ => return Err(ArenaError::TransactionNotPending),
    }

    let updated = queries::get_transaction(&txn, transaction_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TransactionNotFound)?;
    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(transaction_id = %transaction_id, kind = updated.kind.as_str(), "pending transaction approved");
    Ok(updated)
}

/// Admin rejection of a pending external-flow transaction. A rejected
/// withdrawal refunds the amount held at request time.
pub async fn reject_pending(pool: &Pool, transaction_id: Uuid) -> ArenaResult<Transaction> {
    let mut client = pool.get().await.map_err(|e| ArenaError::System(e.into()))?;
    let txn = client
        .transaction()
        .await
        .map_err(|e| ArenaError::System(e.into()))?;

    let record = queries::lock_transaction(&txn, transaction_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TransactionNotFound)?;
    if record.status != TxStatus::Pending {
        return Err(ArenaError::TransactionNotPending);
    }

    match &record.kind {
        TxKind::Deposit { .. } => {
            queries::set_transaction_status(&txn, transaction_id, TxStatus::Failed)
                .await
                .map_err(ArenaError::System)?;
        }
        TxKind::Withdrawal { .. } => {
            credit_in_tx(
                &txn,
                &LedgerOp::new(
                    record.user_id,
                    record.bucket,
                    record.amount,
                    TxKind::Refund {
                        tournament_id: None,
                    },
                ),
            )
            .await?;
            queries::set_transaction_status(&txn, transaction_id, TxStatus::Refunded)
                .await
                .map_err(ArenaError::System)?;
        }
        _ => return Err(ArenaError::TransactionNotPending),
    }

    let updated = queries::get_transaction(&txn, transaction_id)
        .await
        .map_err(ArenaError::System)?
        .ok_or(ArenaError::TransactionNotFound)?;
    txn.commit().await.map_err(|e| ArenaError::System(e.into()))?;

    info!(transaction_id = %transaction_id, kind = updated.kind.as_str(), "pending transaction rejected");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_is_sum_of_buckets() {
        let mut b = Balances::new(100, 50);
        assert_eq!(b.total(), 150);

        b.credit(BalanceBucket::Playable, 25).unwrap();
        assert_eq!(b.playable, 125);
        assert_eq!(b.total(), 175);

        b.debit(BalanceBucket::Bonus, 50).unwrap();
        assert_eq!(b.bonus, 0);
        assert_eq!(b.total(), 125);
    }

    #[test]
    fn test_debit_is_all_or_nothing() {
        let mut b = Balances::new(30, 0);
        let err = b.debit(BalanceBucket::Playable, 31).unwrap_err();
        assert!(matches!(err, ArenaError::InsufficientFunds));
        // Nothing changed
        assert_eq!(b.playable, 30);

        b.debit(BalanceBucket::Playable, 30).unwrap();
        assert_eq!(b.playable, 0);
    }

    #[test]
    fn test_debit_checks_the_right_bucket() {
        // A fat bonus bucket cannot cover a playable debit.
        let mut b = Balances::new(10, 1_000_000);
        assert!(matches!(
            b.debit(BalanceBucket::Playable, 11),
            Err(ArenaError::InsufficientFunds)
        ));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut b = Balances::new(100, 0);
        assert!(matches!(
            b.credit(BalanceBucket::Playable, 0),
            Err(ArenaError::InvalidAmount)
        ));
        assert!(matches!(
            b.debit(BalanceBucket::Playable, -5),
            Err(ArenaError::InvalidAmount)
        ));
    }

    #[test]
    fn test_balance_never_negative_over_random_walk() {
        // Balance conservation: total == playable + bonus after every op,
        // and no op may drive a bucket negative.
        let mut b = Balances::new(0, 0);
        let ops: [(bool, BalanceBucket, i64); 8] = [
            (true, BalanceBucket::Playable, 100),
            (false, BalanceBucket::Playable, 40),
            (true, BalanceBucket::Bonus, 10),
            (false, BalanceBucket::Bonus, 20), // fails
            (false, BalanceBucket::Playable, 60),
            (false, BalanceBucket::Playable, 1), // fails
            (true, BalanceBucket::Playable, 7),
            (false, BalanceBucket::Bonus, 10),
        ];
        for (is_credit, bucket, amount) in ops {
            let _ = if is_credit {
                b.credit(bucket, amount)
            } else {
                b.debit(bucket, amount)
            };
            assert!(b.playable >= 0);
            assert!(b.bonus >= 0);
            assert_eq!(b.total(), b.playable + b.bonus);
        }
        assert_eq!(b.total(), 7);
    }

    #[test]
    fn test_ledger_op_default_categories() {
        let user = Uuid::new_v4();
        let op = LedgerOp::new(
            user,
            BalanceBucket::Playable,
            100,
            TxKind::Deposit {
                network: "TON".into(),
                address: "EQx".into(),
            },
        );
        assert_eq!(op.category, TxCategory::Income);
        assert_eq!(op.status, TxStatus::Completed);

        let op = LedgerOp::new(
            user,
            BalanceBucket::Playable,
            100,
            TxKind::Withdrawal {
                network: "TON".into(),
                address: "EQx".into(),
            },
        );
        assert_eq!(op.category, TxCategory::Expense);

        let op = LedgerOp::new(user, BalanceBucket::Playable, 100, TxKind::Quiz)
            .with_category(TxCategory::Income)
            .with_status(TxStatus::Pending)
            .with_fee(5);
        assert_eq!(op.category, TxCategory::Income);
        assert_eq!(op.status, TxStatus::Pending);
        assert_eq!(op.fee, 5);
    }

    #[test]
    fn test_only_refunds_bypass_the_account_block() {
        let user = Uuid::new_v4();
        let refund = LedgerOp::new(
            user,
            BalanceBucket::Playable,
            20,
            TxKind::Refund {
                tournament_id: Some(Uuid::new_v4()),
            },
        );
        assert!(refund.bypasses_block());

        let deposit = LedgerOp::new(
            user,
            BalanceBucket::Playable,
            20,
            TxKind::Deposit {
                network: "TON".into(),
                address: "EQx".into(),
            },
        );
        let withdrawal = LedgerOp::new(
            user,
            BalanceBucket::Playable,
            20,
            TxKind::Withdrawal {
                network: "TON".into(),
                address: "EQx".into(),
            },
        );
        let prize = LedgerOp::new(
            user,
            BalanceBucket::Playable,
            20,
            TxKind::Tournament {
                tournament_id: Uuid::new_v4(),
                rank: Some(1),
            },
        );
        for op in [deposit, withdrawal, prize] {
            assert!(!op.bypasses_block());
        }
    }
}
