use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::{
    account::{AccountError, AccountId},
    command::{
        CommandError, IssueQrCommand, LedgerCommand, PayBillCommand, RedeemQrCommand,
        SavingsCommand, TransferCommand,
    },
    transaction::{HistoryEntry, Transaction},
};

pub mod in_memory_processor;
pub mod qr_payment;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    CommandErr(#[from] CommandError),
    #[error(transparent)]
    AccountErr(#[from] AccountError),
    #[error("Account {id} not found")]
    AccountNotFound { id: AccountId },
    #[error("Receiver not found")]
    ReceiverNotFound,
    #[error("Bill not found or already paid")]
    BillNotFoundOrPaid,
    #[error("QR code is invalid or already used")]
    InvalidOrUsedCode,
    #[error("QR code is not addressed to you")]
    NotYourCode,
    #[error("The {field} is already registered")]
    AlreadyRegistered { field: &'static str },
    #[error("Account {account} is busy, try again")]
    LockTimeout { account: AccountId },
    #[error("Internal ledger failure: {0}")]
    Internal(String),
}

/// Stable classification of [`LedgerError`] reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    InsufficientSavings,
    NotFound,
    Forbidden,
    Conflict,
    TransientFailure,
    InternalFailure,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::CommandErr(_)
            | LedgerError::AccountErr(
                AccountError::NonPositiveAmount { .. } | AccountError::BalanceOverflow,
            ) => ErrorKind::Validation,
            LedgerError::AccountErr(AccountError::InsufficientFunds { .. }) => {
                ErrorKind::InsufficientFunds
            }
            LedgerError::AccountErr(AccountError::InsufficientSavings { .. }) => {
                ErrorKind::InsufficientSavings
            }
            LedgerError::AccountNotFound { .. }
            | LedgerError::ReceiverNotFound
            | LedgerError::BillNotFoundOrPaid
            | LedgerError::InvalidOrUsedCode => ErrorKind::NotFound,
            LedgerError::NotYourCode => ErrorKind::Forbidden,
            LedgerError::AlreadyRegistered { .. } => ErrorKind::Conflict,
            LedgerError::LockTimeout { .. } => ErrorKind::TransientFailure,
            LedgerError::Internal(_) => ErrorKind::InternalFailure,
        }
    }

    /// Only transient failures may be resubmitted verbatim.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientFailure
    }

    /// Message safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::Internal(_) => "The operation could not be completed".to_owned(),
            LedgerError::AccountErr(AccountError::InsufficientFunds { .. }) => {
                "Insufficient funds".to_owned()
            }
            LedgerError::AccountErr(AccountError::InsufficientSavings { .. }) => {
                "Insufficient savings balance".to_owned()
            }
            LedgerError::LockTimeout { .. } => "The account is busy, please retry".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Logs a rejected operation; internal failures carry detail that is only
/// ever written to the log.
pub(crate) fn log_rejection(operation: &str, err: &LedgerError) {
    match err.kind() {
        ErrorKind::InternalFailure => tracing::error!(operation, %err, "operation failed"),
        kind => tracing::warn!(operation, ?kind, %err, "operation rejected"),
    }
}

/// Success payload of a caller-scoped operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Confirmation {
        message: String,
    },
    QrIssued {
        message: String,
        qr_code: String,
        amount: Decimal,
        receiver_phone: String,
    },
}

impl Outcome {
    fn confirmation(message: &str) -> Self {
        Outcome::Confirmation {
            message: message.to_owned(),
        }
    }
}

/// A claim token handed back to the sender after a QR transfer is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrClaim {
    pub qr_code: String,
    pub amount: Decimal,
    pub receiver_phone: String,
}

/// Engine operations. `caller` is always the verified identity supplied by
/// the identity provider, never a client-provided id.
pub trait LedgerProcessor {
    fn transfer(
        &self,
        caller: AccountId,
        command: TransferCommand,
    ) -> Result<Transaction, LedgerError>;

    fn pay_bill(&self, caller: AccountId, command: PayBillCommand)
    -> Result<Transaction, LedgerError>;

    fn deposit_savings(&self, caller: AccountId, command: SavingsCommand)
    -> Result<(), LedgerError>;

    fn withdraw_savings(
        &self,
        caller: AccountId,
        command: SavingsCommand,
    ) -> Result<(), LedgerError>;

    fn issue_qr(&self, caller: AccountId, command: IssueQrCommand)
    -> Result<QrClaim, LedgerError>;

    fn redeem_qr(
        &self,
        caller: AccountId,
        command: RedeemQrCommand,
    ) -> Result<Transaction, LedgerError>;

    fn history(&self, caller: AccountId) -> Result<Vec<HistoryEntry>, LedgerError>;

    fn process(&self, caller: AccountId, command: LedgerCommand) -> Result<Outcome, LedgerError> {
        match command {
            LedgerCommand::Transfer(command) => {
                self.transfer(caller, command)?;
                Ok(Outcome::confirmation("Transfer completed"))
            }
            LedgerCommand::PayBill(command) => {
                self.pay_bill(caller, command)?;
                Ok(Outcome::confirmation("Bill paid"))
            }
            LedgerCommand::SavingsDeposit(command) => {
                self.deposit_savings(caller, command)?;
                Ok(Outcome::confirmation("Savings deposit completed"))
            }
            LedgerCommand::SavingsWithdraw(command) => {
                self.withdraw_savings(caller, command)?;
                Ok(Outcome::confirmation("Savings withdrawal completed"))
            }
            LedgerCommand::IssueQr(command) => {
                let claim = self.issue_qr(caller, command)?;
                Ok(Outcome::QrIssued {
                    message: "QR code generated".to_owned(),
                    qr_code: claim.qr_code,
                    amount: claim.amount,
                    receiver_phone: claim.receiver_phone,
                })
            }
            LedgerCommand::RedeemQr(command) => {
                self.redeem_qr(caller, command)?;
                Ok(Outcome::confirmation("QR payment completed"))
            }
        }
    }
}
