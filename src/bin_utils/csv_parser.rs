use std::io::Read;

use anyhow::Context;
use csv::{Reader, StringRecord, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{account::AccountId, bill::BillId};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Register,
    CreateBill,
    Transfer,
    PayBill,
    SavingsDeposit,
    SavingsWithdraw,
    IssueQr,
    RedeemQr,
}

#[derive(Debug, Deserialize)]
pub struct OperationRow {
    pub op: Operation,
    pub user: Option<AccountId>,
    pub phone: Option<String>,
    pub amount: Option<Decimal>,
    pub bill: Option<BillId>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Parses an operation script in CSV format, yielding each row with the
/// line it starts on.
pub struct CsvOperationParser<R> {
    reader: Reader<R>,
    headers: StringRecord,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> anyhow::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);
        let headers = reader
            .headers()
            .context("Failed to read CSV header")?
            .clone();

        Ok(Self { reader, headers })
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, anyhow::Result<OperationRow>);

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(false) => None,
            Ok(true) => {
                let line = record.position().map_or(0, |pos| pos.line());
                let row = record
                    .deserialize(Some(&self.headers))
                    .with_context(|| format!("Malformed row at line {line}"));
                Some((line, row))
            }
            Err(err) => {
                let line = err.position().map_or(0, |pos| pos.line());
                Some((line, Err(anyhow::Error::new(err).context("Failed to read CSV row"))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_rows_with_lines() {
        let input = "op,user,phone,amount,bill,code\n\
                     transfer, 1 ,0700000002,300,,\n\
                     redeem_qr,2,,,,@2\n\
                     pay_bill,3,,,7,\n";
        let rows: Vec<(u64, OperationRow)> = CsvOperationParser::new(input.as_bytes())
            .unwrap()
            .map(|(line, row)| (line, row.unwrap()))
            .collect();

        assert_eq!(rows.len(), 3);
        let (line, transfer) = &rows[0];
        assert_eq!(*line, 2);
        assert_eq!(transfer.op, Operation::Transfer);
        assert_eq!(transfer.user, Some(1));
        assert_eq!(transfer.phone.as_deref(), Some("0700000002"));
        assert_eq!(transfer.amount, Some(dec!(300)));
        assert_eq!(transfer.code, None);

        assert_eq!(rows[1].0, 3);
        assert_eq!(rows[1].1.code.as_deref(), Some("@2"));
        assert_eq!(rows[1].1.amount, None);
        assert_eq!(rows[2].1.bill, Some(7));
    }

    #[test]
    fn report_malformed_rows() {
        let input = "op,user\nteleport,1\n";
        let (line, row) = CsvOperationParser::new(input.as_bytes())
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(line, 2);
        assert!(row.is_err());
    }
}
