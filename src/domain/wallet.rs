//! Wallet account and its append-only transaction log.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::TaskId;
use super::TransactionId;
use super::money::{CURRENCY, cents};

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Funds reserved against an in-flight task.
    Freeze,
    /// Funds taken from the balance.
    Deduct,
    /// Escrowed surplus returned.
    Refund,
    /// Funds added to the balance.
    Topup,
}

/// One immutable ledger entry.
///
/// `amount` is signed: negative for funds leaving availability (freeze,
/// deduct), positive for refunds and top-ups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    /// Transaction identifier.
    pub id: TransactionId,
    /// Owner of the wallet.
    pub user_id: String,
    /// Task the movement belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Movement kind.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Signed amount.
    pub amount: Decimal,
    /// Display text.
    pub description: String,
    /// Wallet balance (not available balance) after the movement.
    pub balance_after: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Read model returned by balance queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    /// Owner of the wallet.
    pub user_id: String,
    /// Total funds.
    pub balance: Decimal,
    /// Funds escrowed against in-flight tasks.
    pub frozen_amount: Decimal,
    /// `balance - frozen_amount`.
    pub available_balance: Decimal,
    /// Loyalty points.
    pub points: u64,
    /// Always `SGD`.
    pub currency: String,
}

/// Mutable wallet state plus its transaction log, newest first.
///
/// Only the wallet ledger mutates an account, always while holding the
/// account's lock.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletAccount {
    /// Owner of the wallet.
    pub user_id: String,
    /// Total funds.
    pub balance: Decimal,
    /// Escrowed funds; never negative.
    pub frozen: Decimal,
    /// Loyalty points.
    pub points: u64,
    /// Transactions, newest first.
    pub transactions: Vec<WalletTransaction>,
}

impl WalletAccount {
    /// Creates an empty account.
    #[must_use]
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance: Decimal::ZERO,
            frozen: Decimal::ZERO,
            points: 0,
            transactions: Vec::new(),
        }
    }

    /// Returns `balance - frozen`.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.balance - self.frozen
    }

    /// Builds the balance read model.
    #[must_use]
    pub fn snapshot(&self) -> WalletBalance {
        WalletBalance {
            user_id: self.user_id.clone(),
            balance: self.balance,
            frozen_amount: self.frozen,
            available_balance: self.available(),
            points: self.points,
            currency: CURRENCY.to_string(),
        }
    }

    /// Prepends a transaction stamped with the current balance.
    pub fn record(
        &mut self,
        task_id: Option<TaskId>,
        kind: TransactionType,
        amount: Decimal,
        description: String,
    ) -> WalletTransaction {
        let tx = WalletTransaction {
            id: TransactionId::new(),
            user_id: self.user_id.clone(),
            task_id,
            kind,
            amount,
            description,
            balance_after: self.balance,
            created_at: Utc::now(),
        };
        self.transactions.insert(0, tx.clone());
        tx
    }
}

/// Opening state for lazily provisioned demo wallets.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSeed {
    /// Starting balance.
    pub balance: Decimal,
    /// Starting loyalty points.
    pub points: u64,
    /// Whether to include the sample transaction history.
    pub with_history: bool,
}

impl Default for WalletSeed {
    fn default() -> Self {
        Self {
            balance: cents(2450),
            points: 580,
            with_history: true,
        }
    }
}

impl WalletSeed {
    /// Builds a freshly provisioned account for `user_id`.
    #[must_use]
    pub fn provision(&self, user_id: &str) -> WalletAccount {
        let mut account = WalletAccount::new(user_id);
        account.balance = self.balance;
        account.points = self.points;
        if self.with_history {
            account.transactions = sample_history(user_id);
        }
        account
    }
}

fn sample_history(user_id: &str) -> Vec<WalletTransaction> {
    let now = Utc::now();
    let entry = |hours: i64, kind, amount, description: &str, balance_after| WalletTransaction {
        id: TransactionId::new(),
        user_id: user_id.to_string(),
        task_id: None,
        kind,
        amount,
        description: description.to_string(),
        balance_after,
        created_at: now - Duration::hours(hours),
    };
    vec![
        entry(
            2,
            TransactionType::Deduct,
            cents(-850),
            "Bubble tea purchase",
            cents(2450),
        ),
        entry(
            26,
            TransactionType::Deduct,
            cents(-800),
            "Office to home delivery",
            cents(3300),
        ),
        entry(50, TransactionType::Topup, cents(5000), "Wallet top-up", cents(4100)),
        entry(
            74,
            TransactionType::Deduct,
            cents(-6000),
            "Home cleaning, 3-room flat",
            cents(-900),
        ),
        entry(
            74,
            TransactionType::Refund,
            cents(350),
            "Refund, shopping surplus",
            cents(5100),
        ),
    ]
}
