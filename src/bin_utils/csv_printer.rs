use std::io::Write;

use anyhow::Context;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{account::AccountId, store::AccountSummary};

#[derive(Debug, Serialize)]
pub struct AccountReport {
    pub id: AccountId,
    pub name: String,
    pub phone: String,
    pub balance: Decimal,
    pub savings: Decimal,
}

impl From<AccountSummary> for AccountReport {
    fn from(summary: AccountSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.full_name,
            phone: summary.phone,
            balance: summary.balance,
            savings: summary.savings,
        }
    }
}

pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl Iterator<Item = AccountReport>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for acc in accounts {
        writer.serialize(acc).context("Failed to write to CSV")?;
    }
    // Ensure all data is flushed to the output
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}
