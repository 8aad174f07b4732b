//! Wallet ledger: balance accounting with escrow semantics.
//!
//! Every mutation locks the wallet's handle for its whole
//! read-modify-write, so concurrent freezes on one user are serialized and
//! the available-balance check cannot be raced.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::{
    SettlementRecord, TaskId, TransactionType, WalletAccount, WalletBalance, WalletRepository,
    WalletTransaction,
};
use crate::error::GatewayError;

/// Authoritative owner of wallets and their transaction logs.
#[derive(Debug, Clone)]
pub struct WalletLedger {
    wallets: Arc<dyn WalletRepository>,
}

impl WalletLedger {
    /// Creates a ledger over the given wallet store.
    #[must_use]
    pub fn new(wallets: Arc<dyn WalletRepository>) -> Self {
        Self { wallets }
    }

    /// Returns the balance read model.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccountNotFound`] when the store does not
    /// provision unknown users.
    pub async fn get_balance(&self, user_id: &str) -> Result<WalletBalance, GatewayError> {
        let handle = self.wallets.account(user_id).await?;
        let account = handle.lock().await;
        Ok(account.snapshot())
    }

    /// Returns the transaction log, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccountNotFound`] when the store does not
    /// provision unknown users.
    pub async fn transactions(&self, user_id: &str) -> Result<Vec<WalletTransaction>, GatewayError> {
        let handle = self.wallets.account(user_id).await?;
        let account = handle.lock().await;
        Ok(account.transactions.clone())
    }

    /// Escrows `amount` against the available balance.
    ///
    /// Calling twice with the same task id freezes twice; callers own
    /// deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InsufficientFunds`] when `amount` exceeds the
    /// available balance, and [`GatewayError::InvalidRequest`] for a
    /// non-positive amount.
    pub async fn freeze(
        &self,
        user_id: &str,
        amount: Decimal,
        task_id: Option<TaskId>,
        description: &str,
    ) -> Result<WalletTransaction, GatewayError> {
        ensure_positive(amount)?;
        let handle = self.wallets.account(user_id).await?;
        let mut account = handle.lock().await;

        let available = account.available();
        if amount > available {
            tracing::info!(user_id, %amount, %available, "freeze rejected");
            return Err(GatewayError::InsufficientFunds { available });
        }

        account.frozen += amount;
        let tx = account.record(
            task_id,
            TransactionType::Freeze,
            -amount,
            description.to_string(),
        );
        tracing::info!(user_id, %amount, frozen = %account.frozen, "funds frozen");
        Ok(tx)
    }

    /// Converts an escrow into a deduction of `actual_amount`, refunding the
    /// surplus.
    ///
    /// Releases `frozen_amount` from escrow, deducts `actual_amount` from the
    /// balance and awards `floor(actual_amount)` points. A `refund` entry is
    /// written only when `frozen_amount > actual_amount`. The caller vouches
    /// that `frozen_amount` matches an earlier freeze; the ledger only checks
    /// that the wallet holds at least that much in escrow.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccountNotFound`] when the store does not
    /// provision unknown users, and [`GatewayError::InvalidRequest`] when
    /// `frozen_amount` exceeds the wallet's current escrow.
    pub async fn settle(
        &self,
        user_id: &str,
        frozen_amount: Decimal,
        actual_amount: Decimal,
        task_id: Option<TaskId>,
        description: &str,
    ) -> Result<SettlementRecord, GatewayError> {
        let handle = self.wallets.account(user_id).await?;
        let mut account = handle.lock().await;
        if frozen_amount > account.frozen {
            tracing::warn!(user_id, %frozen_amount, frozen = %account.frozen, "settle rejected");
            return Err(GatewayError::InvalidRequest(format!(
                "cannot settle {frozen_amount}: only {} is frozen",
                account.frozen
            )));
        }
        Ok(settle_account(
            &mut account,
            frozen_amount,
            actual_amount,
            task_id,
            description,
        ))
    }

    /// Returns an escrow to the available balance without charging.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccountNotFound`] when the store does not
    /// provision unknown users.
    pub async fn release(
        &self,
        user_id: &str,
        amount: Decimal,
        task_id: Option<TaskId>,
        description: &str,
    ) -> Result<WalletBalance, GatewayError> {
        let handle = self.wallets.account(user_id).await?;
        let mut account = handle.lock().await;

        let released = amount.min(account.frozen);
        account.frozen -= released;
        account.record(
            task_id,
            TransactionType::Refund,
            released,
            format!("Released · {description}"),
        );
        tracing::info!(user_id, amount = %released, "escrow released");
        Ok(account.snapshot())
    }

    /// Adds funds to the balance.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a non-positive amount.
    pub async fn top_up(&self, user_id: &str, amount: Decimal) -> Result<Decimal, GatewayError> {
        ensure_positive(amount)?;
        let handle = self.wallets.account(user_id).await?;
        let mut account = handle.lock().await;

        account.balance += amount;
        account.record(
            None,
            TransactionType::Topup,
            amount,
            "Wallet top-up".to_string(),
        );
        tracing::info!(user_id, %amount, balance = %account.balance, "wallet topped up");
        Ok(account.balance)
    }
}

fn settle_account(
    account: &mut WalletAccount,
    frozen_amount: Decimal,
    actual_amount: Decimal,
    task_id: Option<TaskId>,
    description: &str,
) -> SettlementRecord {
    let surplus = frozen_amount - actual_amount;

    account.frozen -= frozen_amount;
    account.balance -= actual_amount;

    account.record(
        task_id,
        TransactionType::Deduct,
        -actual_amount,
        format!("Charge · {description}"),
    );
    let refunded = if surplus > Decimal::ZERO {
        account.record(
            task_id,
            TransactionType::Refund,
            surplus,
            format!("Refund · {description} (surplus)"),
        );
        surplus
    } else {
        Decimal::ZERO
    };

    let earned = actual_amount.floor().to_u64().unwrap_or(0);
    account.points = account.points.saturating_add(earned);

    tracing::info!(
        user_id = %account.user_id,
        deducted = %actual_amount,
        %refunded,
        balance = %account.balance,
        "escrow settled"
    );

    SettlementRecord {
        deducted: actual_amount,
        refunded,
        new_balance: account.balance,
        settled_at: Utc::now(),
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), GatewayError> {
    if amount <= Decimal::ZERO {
        return Err(GatewayError::InvalidRequest(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::WalletSeed;
    use crate::domain::money::cents;
    use crate::persistence::InMemoryWalletStore;

    fn ledger() -> WalletLedger {
        let seed = WalletSeed {
            with_history: false,
            ..WalletSeed::default()
        };
        WalletLedger::new(Arc::new(InMemoryWalletStore::new(Some(seed))))
    }

    #[tokio::test]
    async fn unknown_user_gets_seed_balance() {
        let ledger = ledger();
        let Ok(balance) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(balance.balance, cents(2450));
        assert_eq!(balance.available_balance, cents(2450));
        assert_eq!(balance.points, 580);
        assert_eq!(balance.currency, "SGD");
    }

    #[tokio::test]
    async fn freeze_rejection_boundary() {
        let ledger = ledger();
        let result = ledger.freeze("u1", cents(2500), None, "too much").await;
        let Err(GatewayError::InsufficientFunds { available }) = result else {
            panic!("expected InsufficientFunds, got {result:?}");
        };
        assert_eq!(available, cents(2450));

        let Ok(tx) = ledger.freeze("u1", cents(2450), None, "exact").await else {
            panic!("exact freeze should succeed");
        };
        assert_eq!(tx.amount, cents(-2450));
        assert_eq!(tx.kind, TransactionType::Freeze);

        let Ok(balance) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(balance.available_balance, Decimal::ZERO);
        assert_eq!(balance.frozen_amount, cents(2450));
        assert_eq!(balance.balance, cents(2450));
    }

    #[tokio::test]
    async fn settle_deducts_and_refunds_surplus() {
        let ledger = ledger();
        let task_id = TaskId::new();
        let _ = ledger.freeze("u1", cents(2375), Some(task_id), "order").await;

        let Ok(record) = ledger
            .settle("u1", cents(2375), cents(2000), Some(task_id), "order")
            .await
        else {
            panic!("settle failed");
        };
        assert_eq!(record.deducted, cents(2000));
        assert_eq!(record.refunded, cents(375));
        assert_eq!(record.new_balance, cents(450));

        let Ok(balance) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(balance.frozen_amount, Decimal::ZERO);
        assert_eq!(balance.points, 600);

        let Ok(txs) = ledger.transactions("u1").await else {
            panic!("expected transactions");
        };
        let kinds: Vec<(TransactionType, Decimal)> = txs.iter().map(|t| (t.kind, t.amount)).collect();
        assert_eq!(
            kinds,
            vec![
                (TransactionType::Refund, cents(375)),
                (TransactionType::Deduct, cents(-2000)),
                (TransactionType::Freeze, cents(-2375)),
            ]
        );
    }

    #[tokio::test]
    async fn settle_beyond_escrow_is_rejected() {
        let ledger = ledger();
        let result = ledger.settle("u1", cents(10000), Decimal::ZERO, None, "forged").await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));

        let Ok(balance) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(balance.frozen_amount, Decimal::ZERO);
        assert_eq!(balance.available_balance, cents(2450));

        let over = ledger.freeze("u1", cents(10000), None, "too much").await;
        assert!(matches!(over, Err(GatewayError::InsufficientFunds { .. })));

        let _ = ledger.freeze("u1", cents(1000), None, "order").await;
        let partial = ledger.settle("u1", cents(1001), cents(1000), None, "order").await;
        assert!(partial.is_err());
        let Ok(txs) = ledger.transactions("u1").await else {
            panic!("expected transactions");
        };
        assert!(txs.iter().all(|t| t.kind != TransactionType::Deduct));
    }

    #[tokio::test]
    async fn settle_without_surplus_writes_no_refund() {
        let ledger = ledger();
        let _ = ledger.freeze("u1", cents(1000), None, "order").await;
        let Ok(record) = ledger.settle("u1", cents(1000), cents(1000), None, "order").await else {
            panic!("settle failed");
        };
        assert_eq!(record.refunded, Decimal::ZERO);

        let Ok(txs) = ledger.transactions("u1").await else {
            panic!("expected transactions");
        };
        assert!(txs.iter().all(|t| t.kind != TransactionType::Refund));
    }

    #[tokio::test]
    async fn escrow_conservation_over_sequence() {
        let ledger = ledger();
        let _ = ledger.top_up("u1", cents(10000)).await;
        let Ok(before) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };

        let _ = ledger.freeze("u1", cents(3000), None, "a").await;
        let _ = ledger.freeze("u1", cents(1250), None, "b").await;
        let _ = ledger.settle("u1", cents(3000), cents(2899), None, "a").await;

        let Ok(after) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(after.balance, before.balance - cents(2899));
        assert_eq!(after.frozen_amount, cents(1250));
        assert_eq!(after.available_balance, after.balance - after.frozen_amount);
    }

    #[tokio::test]
    async fn double_freeze_with_same_task_id_freezes_twice() {
        // Current behaviour: the ledger does not deduplicate by task id.
        let ledger = ledger();
        let task_id = TaskId::new();
        assert!(ledger.freeze("u1", cents(1000), Some(task_id), "x").await.is_ok());
        assert!(ledger.freeze("u1", cents(1000), Some(task_id), "x").await.is_ok());

        let Ok(balance) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(balance.frozen_amount, cents(2000));
    }

    #[tokio::test]
    async fn concurrent_freezes_never_overdraw() {
        let ledger = ledger();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.freeze("u1", cents(500), None, "race").await.is_ok()
            }));
        }
        let mut succeeded = 0;
        for handle in handles {
            if matches!(handle.await, Ok(true)) {
                succeeded += 1;
            }
        }
        // 24.50 fits four freezes of 5.00.
        assert_eq!(succeeded, 4);

        let Ok(balance) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(balance.frozen_amount, cents(2000));
        assert!(balance.available_balance >= Decimal::ZERO);
    }

    #[tokio::test]
    async fn release_returns_escrow() {
        let ledger = ledger();
        let _ = ledger.freeze("u1", cents(1000), None, "x").await;
        let Ok(balance) = ledger.release("u1", cents(1000), None, "dispatch failed").await else {
            panic!("release failed");
        };
        assert_eq!(balance.frozen_amount, Decimal::ZERO);
        assert_eq!(balance.balance, cents(2450));
    }

    #[tokio::test]
    async fn top_up_rejects_non_positive() {
        let ledger = ledger();
        assert!(matches!(
            ledger.top_up("u1", Decimal::ZERO).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        tokio_test::assert_ok!(ledger.top_up("u1", cents(550)).await);
        let Ok(balance) = ledger.get_balance("u1").await else {
            panic!("expected balance");
        };
        assert_eq!(balance.balance, cents(3000));
    }
}
