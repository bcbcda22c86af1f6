use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    account::AccountId,
    bill::{Bill, BillBook},
    command::{
        IssueQrCommand, NewAccount, NewBill, PayBillCommand, RedeemQrCommand, SavingsCommand,
        TransferCommand,
    },
    config::LedgerConfig,
    store::{AccountProfile, AccountStore, AccountSummary},
    transaction::{
        HistoryEntry, NewTransaction, Transaction, TransactionKind, TransactionLog,
        TransactionStatus,
    },
};

use super::{LedgerError, LedgerProcessor, QrClaim, log_rejection};

/// Aggregate figures for the administrative dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub users: usize,
    pub transactions: usize,
    pub total_amount: Decimal,
    pub bills: usize,
    pub unpaid_bills: usize,
}

/// Ledger engine keeping every table in process memory.
///
/// The type is `Sync`; share it behind an `Arc` (or a scoped borrow) and
/// call operations from as many threads as needed.
#[derive(Debug)]
pub struct InMemoryLedger {
    pub(super) accounts: AccountStore,
    pub(super) bills: BillBook,
    pub(super) log: TransactionLog,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

impl InMemoryLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            accounts: AccountStore::new(config.lock_timeout),
            bills: BillBook::default(),
            log: TransactionLog::default(),
        }
    }

    #[instrument(skip(self, new_account), fields(phone = %new_account.phone))]
    pub fn register(&self, new_account: NewAccount) -> Result<AccountProfile, LedgerError> {
        let profile = self.accounts.open_account(new_account)?;
        info!(account = profile.id, "account registered");
        Ok(profile)
    }

    #[instrument(skip(self, new_bill), fields(user = new_bill.user_id))]
    pub fn create_bill(&self, new_bill: NewBill) -> Result<Bill, LedgerError> {
        if !self.accounts.exists(new_bill.user_id) {
            return Err(LedgerError::AccountNotFound {
                id: new_bill.user_id,
            });
        }
        let bill = self.bills.insert(new_bill)?;
        info!(bill = bill.id, amount = %bill.amount, "bill created");
        Ok(bill)
    }

    pub fn profile(&self, user: AccountId) -> Result<AccountSummary, LedgerError> {
        self.accounts.summary(user)
    }

    /// Savings balance, zero while no savings account exists.
    pub fn savings_balance(&self, user: AccountId) -> Result<Decimal, LedgerError> {
        Ok(self.accounts.balances(user)?.savings())
    }

    pub fn bills(&self, user: AccountId) -> Vec<Bill> {
        self.bills.for_user(user)
    }

    pub fn unpaid_bills(&self, user: AccountId) -> Vec<Bill> {
        self.bills.unpaid_for_user(user)
    }

    pub fn all_bills(&self) -> Vec<Bill> {
        self.bills.all()
    }

    pub fn all_transactions(&self) -> Vec<HistoryEntry> {
        self.log
            .all()
            .into_iter()
            .map(|tx| self.history_entry(tx))
            .collect()
    }

    pub fn accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        self.accounts.summaries()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            users: self.accounts.count(),
            transactions: self.log.count(),
            total_amount: self.log.completed_volume(),
            bills: self.bills.count(),
            unpaid_bills: self.bills.unpaid_count(),
        }
    }

    fn history_entry(&self, tx: Transaction) -> HistoryEntry {
        let name = |id| {
            self.accounts
                .profile(id)
                .map(|profile| profile.full_name)
                .unwrap_or_default()
        };
        HistoryEntry {
            id: tx.id,
            amount: tx.amount,
            status: tx.status,
            kind: tx.kind,
            created_at: tx.created_at,
            sender_id: tx.sender_id,
            sender_name: name(tx.sender_id),
            receiver_id: tx.receiver_id,
            receiver_name: name(tx.receiver_id),
        }
    }
}

impl LedgerProcessor for InMemoryLedger {
    #[instrument(skip(self, command), fields(amount = %command.amount))]
    fn transfer(
        &self,
        caller: AccountId,
        command: TransferCommand,
    ) -> Result<Transaction, LedgerError> {
        let amount = command.amount;
        let receiver = self.accounts.find_by_phone(&command.receiver_phone);
        let lock_ids = match &receiver {
            Some(receiver) => vec![caller, receiver.id],
            None => vec![caller],
        };

        let result = self.accounts.transact_then(
            &lock_ids,
            |scope| {
                // balance is checked before the receiver is resolved
                let debit = scope.account(caller)?.handle_debit(amount)?;
                let receiver_id = receiver
                    .as_ref()
                    .ok_or(LedgerError::ReceiverNotFound)?
                    .id;
                scope.apply(caller, &debit)?;
                let credit = scope.account(receiver_id)?.handle_credit(amount)?;
                scope.apply(receiver_id, &credit)?;
                Ok(NewTransaction {
                    sender_id: caller,
                    receiver_id,
                    amount,
                    status: TransactionStatus::Completed,
                    kind: TransactionKind::Transfer,
                    qr_code: None,
                })
            },
            |new_tx| self.log.append(new_tx),
        );

        match &result {
            Ok(tx) => info!(tx = tx.id, receiver = tx.receiver_id, "transfer completed"),
            Err(err) => log_rejection("transfer", err),
        }
        result
    }

    #[instrument(skip(self))]
    fn pay_bill(
        &self,
        caller: AccountId,
        command: PayBillCommand,
    ) -> Result<Transaction, LedgerError> {
        let bill_id = command.bill_id;
        // a bill has one owner, so holding the owner's lock serialises payments of it
        let result = self.accounts.transact_then(
            &[caller],
            |scope| {
                let amount = self
                    .bills
                    .amount_due(bill_id, caller)
                    .ok_or(LedgerError::BillNotFoundOrPaid)?;
                let debit = scope.account(caller)?.handle_debit(amount)?;
                scope.apply(caller, &debit)?;
                Ok(NewTransaction {
                    sender_id: caller,
                    receiver_id: caller,
                    amount,
                    status: TransactionStatus::Completed,
                    kind: TransactionKind::BillPayment,
                    qr_code: None,
                })
            },
            |new_tx| {
                let paid = self.bills.mark_paid(bill_id);
                debug_assert!(paid, "bill {bill_id} was paid without its owner's lock");
                self.log.append(new_tx)
            },
        );

        match &result {
            Ok(tx) => info!(tx = tx.id, amount = %tx.amount, "bill paid"),
            Err(err) => log_rejection("bill_payment", err),
        }
        result
    }

    #[instrument(skip(self), fields(amount = %command.amount))]
    fn deposit_savings(
        &self,
        caller: AccountId,
        command: SavingsCommand,
    ) -> Result<(), LedgerError> {
        let result = self.accounts.transact(&[caller], |scope| {
            let event = scope.account(caller)?.handle_savings_deposit(command.amount)?;
            scope.apply(caller, &event)
        });

        match &result {
            Ok(()) => info!("savings deposit completed"),
            Err(err) => log_rejection("savings_deposit", err),
        }
        result
    }

    #[instrument(skip(self), fields(amount = %command.amount))]
    fn withdraw_savings(
        &self,
        caller: AccountId,
        command: SavingsCommand,
    ) -> Result<(), LedgerError> {
        let result = self.accounts.transact(&[caller], |scope| {
            let event = scope
                .account(caller)?
                .handle_savings_withdraw(command.amount)?;
            scope.apply(caller, &event)
        });

        match &result {
            Ok(()) => info!("savings withdrawal completed"),
            Err(err) => log_rejection("savings_withdrawal", err),
        }
        result
    }

    fn issue_qr(&self, caller: AccountId, command: IssueQrCommand) -> Result<QrClaim, LedgerError> {
        self.issue_claim(caller, command)
    }

    fn redeem_qr(
        &self,
        caller: AccountId,
        command: RedeemQrCommand,
    ) -> Result<Transaction, LedgerError> {
        self.redeem_claim(caller, command)
    }

    fn history(&self, caller: AccountId) -> Result<Vec<HistoryEntry>, LedgerError> {
        if !self.accounts.exists(caller) {
            return Err(LedgerError::AccountNotFound { id: caller });
        }
        Ok(self
            .log
            .for_account(caller)
            .into_iter()
            .map(|tx| self.history_entry(tx))
            .collect())
    }
}
