use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    account::AccountId,
    command::{CommandError, NewBill},
};

pub type BillId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bill {
    pub id: BillId,
    pub user_id: AccountId,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Bills issued to users. `is_paid` only ever moves from `false` to `true`.
#[derive(Debug, Default)]
pub struct BillBook {
    bills: RwLock<BTreeMap<BillId, Bill>>,
}

impl BillBook {
    pub fn insert(&self, new_bill: NewBill) -> Result<Bill, CommandError> {
        if new_bill.amount <= Decimal::ZERO {
            return Err(CommandError::NonPositiveBillAmount);
        }
        let mut bills = self.bills.write();
        let id = bills.last_key_value().map_or(1, |(id, _)| id + 1);
        let bill = Bill {
            id,
            user_id: new_bill.user_id,
            title: new_bill.title,
            description: new_bill.description,
            amount: new_bill.amount,
            is_paid: false,
            created_at: Utc::now(),
        };
        bills.insert(id, bill.clone());
        Ok(bill)
    }

    /// Amount due for an unpaid bill owned by `user_id`.
    pub fn amount_due(&self, bill_id: BillId, user_id: AccountId) -> Option<Decimal> {
        self.bills
            .read()
            .get(&bill_id)
            .filter(|bill| bill.user_id == user_id && !bill.is_paid)
            .map(|bill| bill.amount)
    }

    /// Flips `is_paid`, returns `false` if the bill was already paid or missing.
    pub fn mark_paid(&self, bill_id: BillId) -> bool {
        match self.bills.write().get_mut(&bill_id) {
            Some(bill) if !bill.is_paid => {
                bill.is_paid = true;
                true
            }
            _ => false,
        }
    }

    pub fn for_user(&self, user_id: AccountId) -> Vec<Bill> {
        self.filtered(|bill| bill.user_id == user_id)
    }

    pub fn unpaid_for_user(&self, user_id: AccountId) -> Vec<Bill> {
        self.filtered(|bill| bill.user_id == user_id && !bill.is_paid)
    }

    /// All bills, newest first.
    pub fn all(&self) -> Vec<Bill> {
        self.bills.read().values().rev().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.bills.read().len()
    }

    pub fn unpaid_count(&self) -> usize {
        self.bills.read().values().filter(|bill| !bill.is_paid).count()
    }

    fn filtered(&self, predicate: impl Fn(&Bill) -> bool) -> Vec<Bill> {
        self.bills
            .read()
            .values()
            .filter(|bill| predicate(bill))
            .cloned()
            .collect()
    }
}
