//! Two-phase QR transfer: issuing records a pending transaction bound to a
//! single receiver, redeeming settles it exactly once.
//!
//! Funds are checked when a code is issued but not held; the sender balance
//! is checked again when the code is redeemed. Pending codes do not expire.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    account::AccountId,
    command::{IssueQrCommand, RedeemQrCommand},
    transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus},
};

use super::{LedgerError, QrClaim, in_memory_processor::InMemoryLedger, log_rejection};

impl InMemoryLedger {
    #[instrument(skip(self, command), fields(amount = %command.amount))]
    pub(super) fn issue_claim(
        &self,
        caller: AccountId,
        command: IssueQrCommand,
    ) -> Result<QrClaim, LedgerError> {
        let receiver = self.accounts.find_by_phone(&command.receiver_phone);

        let result = self.accounts.transact_then(
            &[caller],
            |scope| {
                // checked, not reserved
                scope.account(caller)?.ensure_primary(command.amount)?;
                receiver.ok_or(LedgerError::ReceiverNotFound)
            },
            |receiver| {
                let qr_code = Uuid::new_v4().to_string();
                self.log.append(NewTransaction {
                    sender_id: caller,
                    receiver_id: receiver.id,
                    amount: command.amount,
                    status: TransactionStatus::Pending,
                    kind: TransactionKind::QrTransfer,
                    qr_code: Some(qr_code.clone()),
                });
                QrClaim {
                    qr_code,
                    amount: command.amount,
                    receiver_phone: receiver.phone,
                }
            },
        );

        match &result {
            Ok(claim) => info!(qr_code = %claim.qr_code, "qr code issued"),
            Err(err) => log_rejection("qr_issue", err),
        }
        result
    }

    #[instrument(skip(self, command), fields(qr_code = %command.qr_code))]
    pub(super) fn redeem_claim(
        &self,
        caller: AccountId,
        command: RedeemQrCommand,
    ) -> Result<Transaction, LedgerError> {
        let result = self.settle_claim(caller, &command.qr_code);
        match &result {
            Ok(tx) => info!(tx = tx.id, sender = tx.sender_id, "qr payment completed"),
            Err(err) => log_rejection("qr_redeem", err),
        }
        result
    }

    fn settle_claim(&self, caller: AccountId, qr_code: &str) -> Result<Transaction, LedgerError> {
        let claim = self
            .log
            .pending_claim(qr_code)
            .ok_or(LedgerError::InvalidOrUsedCode)?;
        if claim.receiver_id != caller {
            return Err(LedgerError::NotYourCode);
        }

        self.accounts.transact_then(
            &[claim.sender_id, claim.receiver_id],
            |scope| {
                // a concurrent redeem may have settled the claim while we waited for the locks
                let claim = self
                    .log
                    .pending_claim(qr_code)
                    .ok_or(LedgerError::InvalidOrUsedCode)?;

                let debit = scope.account(claim.sender_id)?.handle_debit(claim.amount)?;
                scope.apply(claim.sender_id, &debit)?;
                let credit = scope
                    .account(claim.receiver_id)?
                    .handle_credit(claim.amount)?;
                scope.apply(claim.receiver_id, &credit)?;
                Ok(claim)
            },
            |claim| {
                // every redeem of this code takes the same two locks
                let completed = self.log.complete_claim(qr_code);
                debug_assert!(completed.is_some(), "claim {qr_code} settled twice");
                completed.unwrap_or(Transaction {
                    status: TransactionStatus::Completed,
                    ..claim
                })
            },
        )
    }
}
