//! Bootstraps [`crate::processor::in_memory_processor::InMemoryLedger`] from an
//! operation script, for the binary and for integration tests.
//!
//! The `user` column plays the identity provider: it is taken as the
//! verified caller. A `code` of `@N` stands for the claim token issued by
//! the `issue_qr` row on line `N`.

use std::{
    collections::HashMap,
    io::{Read, Write},
};

use crate::{
    command::{CommandError, LedgerCommand, NewAccount, NewBill, RawRequest, RequestKind},
    config::LedgerConfig,
    processor::{
        LedgerError, LedgerProcessor, Outcome, in_memory_processor::InMemoryLedger,
    },
};
use anyhow::Result;
use csv_parser::{CsvOperationParser, Operation, OperationRow};
use csv_printer::{AccountReport, print_accounts};
use tracing::info;
pub mod csv_parser;
pub mod csv_printer;

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: LedgerConfig,
    pub error_printer: Box<dyn FnMut(u64, LedgerError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input)?;
        let ledger = InMemoryLedger::new(&self.config);
        let mut issued_codes: HashMap<u64, String> = HashMap::new();

        for (line, row) in parser {
            match execute(&ledger, &issued_codes, line, row?) {
                Ok(Some(qr_code)) => {
                    issued_codes.insert(line, qr_code);
                }
                Ok(None) => {}
                Err(err) => (self.error_printer)(line, err),
            }
        }

        print_accounts(
            self.output,
            ledger.accounts()?.into_iter().map(AccountReport::from),
        )
    }
}

/// Runs one script row, returning the claim token when a QR code was issued.
fn execute(
    ledger: &InMemoryLedger,
    issued_codes: &HashMap<u64, String>,
    line: u64,
    row: OperationRow,
) -> Result<Option<String>, LedgerError> {
    let kind = match row.op {
        Operation::Register => {
            let new_account = NewAccount::parse(row.name, row.email, row.phone, row.amount)?;
            ledger.register(new_account)?;
            return Ok(None);
        }
        Operation::CreateBill => {
            let new_bill = NewBill::parse(row.user, row.title, row.description, row.amount)?;
            ledger.create_bill(new_bill)?;
            return Ok(None);
        }
        Operation::Transfer => RequestKind::Transfer,
        Operation::PayBill => RequestKind::PayBill,
        Operation::SavingsDeposit => RequestKind::SavingsDeposit,
        Operation::SavingsWithdraw => RequestKind::SavingsWithdraw,
        Operation::IssueQr => RequestKind::IssueQr,
        Operation::RedeemQr => RequestKind::RedeemQr,
    };

    let caller = row
        .user
        .ok_or(CommandError::FieldRequired { field: "user" })?;
    let qr_code = row.code.map(|code| resolve_code(issued_codes, code));
    let command = LedgerCommand::parse_command(
        kind,
        RawRequest {
            receiver_phone: row.phone,
            amount: row.amount,
            bill_id: row.bill,
            qr_code,
        },
    )?;

    let outcome = ledger.process(caller, command)?;
    info!(line, ?outcome, "request served");
    match outcome {
        Outcome::QrIssued { qr_code, .. } => Ok(Some(qr_code)),
        Outcome::Confirmation { .. } => Ok(None),
    }
}

/// Unknown references are passed through and fail as unknown codes.
fn resolve_code(issued_codes: &HashMap<u64, String>, code: String) -> String {
    code.strip_prefix('@')
        .and_then(|line| line.parse::<u64>().ok())
        .and_then(|line| issued_codes.get(&line))
        .cloned()
        .unwrap_or(code)
}
