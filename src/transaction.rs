use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::AccountId;

pub type TransactionId = u64;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Transfer,
    BillPayment,
    QrTransfer,
    SavingsDeposit,
    SavingsWithdraw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
    pub status: TransactionStatus,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a transaction before the log assigns its id and timestamp.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub kind: TransactionKind,
    pub qr_code: Option<String>,
}

/// Transaction row joined with the display names of both parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: TransactionId,
    pub amount: Decimal,
    pub status: TransactionStatus,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
    pub sender_id: AccountId,
    pub sender_name: String,
    pub receiver_id: AccountId,
    pub receiver_name: String,
}

/// Append-only log of money movements.
///
/// Rows are stored in commit order and the position in the log is the id,
/// so reading the log backwards yields newest-first history.
#[derive(Debug, Default)]
pub struct TransactionLog {
    inner: RwLock<LogInner>,
}

#[derive(Debug, Default)]
struct LogInner {
    entries: Vec<Transaction>,
    pending_claims: HashMap<String, usize>,
}

impl TransactionLog {
    pub fn append(&self, new_tx: NewTransaction) -> Transaction {
        let mut inner = self.inner.write();
        let index = inner.entries.len();
        let tx = Transaction {
            id: index as TransactionId + 1,
            sender_id: new_tx.sender_id,
            receiver_id: new_tx.receiver_id,
            amount: new_tx.amount,
            status: new_tx.status,
            kind: new_tx.kind,
            qr_code: new_tx.qr_code,
            created_at: Utc::now(),
        };
        if tx.status == TransactionStatus::Pending {
            if let Some(code) = &tx.qr_code {
                inner.pending_claims.insert(code.clone(), index);
            }
        }
        inner.entries.push(tx.clone());
        tx
    }

    /// Pending transaction bound to `qr_code`, if it has not been redeemed yet.
    pub fn pending_claim(&self, qr_code: &str) -> Option<Transaction> {
        let inner = self.inner.read();
        inner
            .pending_claims
            .get(qr_code)
            .map(|index| inner.entries[*index].clone())
    }

    /// Moves the claim from pending to completed. Returns `None` when the
    /// claim is unknown or was already completed.
    pub fn complete_claim(&self, qr_code: &str) -> Option<Transaction> {
        let mut inner = self.inner.write();
        let index = inner.pending_claims.remove(qr_code)?;
        let tx = &mut inner.entries[index];
        tx.status = TransactionStatus::Completed;
        Some(tx.clone())
    }

    /// Transactions where `account` is sender or receiver, newest first.
    pub fn for_account(&self, account: AccountId) -> Vec<Transaction> {
        self.inner
            .read()
            .entries
            .iter()
            .rev()
            .filter(|tx| tx.sender_id == account || tx.receiver_id == account)
            .cloned()
            .collect()
    }

    /// Every transaction, newest first.
    pub fn all(&self) -> Vec<Transaction> {
        self.inner.read().entries.iter().rev().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Sum of completed amounts, saturating at [`Decimal::MAX`].
    pub fn completed_volume(&self) -> Decimal {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .fold(Decimal::ZERO, |total, tx| total.saturating_add(tx.amount))
    }
}
