use rust_decimal::{Decimal, prelude::Zero};
use serde::Deserialize;
use thiserror::Error;

use crate::{account::AccountId, bill::BillId};

/// Caller-scoped operations exposed by the engine.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Transfer,
    PayBill,
    SavingsDeposit,
    SavingsWithdraw,
    IssueQr,
    RedeemQr,
}

/// Request fields as received from the gateway, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRequest {
    pub receiver_phone: Option<String>,
    pub amount: Option<Decimal>,
    pub bill_id: Option<BillId>,
    pub qr_code: Option<String>,
}

/// Validated engine requests. Fields are only reachable inside the crate;
/// callers build commands through the checked constructors below or
/// [`LedgerCommand::parse_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub(crate) receiver_phone: String,
    pub(crate) amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayBillCommand {
    pub(crate) bill_id: BillId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavingsCommand {
    pub(crate) amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQrCommand {
    pub(crate) receiver_phone: String,
    pub(crate) amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemQrCommand {
    pub(crate) qr_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    Transfer(TransferCommand),
    PayBill(PayBillCommand),
    SavingsDeposit(SavingsCommand),
    SavingsWithdraw(SavingsCommand),
    IssueQr(IssueQrCommand),
    RedeemQr(RedeemQrCommand),
}

/// Account registration input, supplied by the identity collaborator.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) phone: String,
    pub(crate) opening_balance: Decimal,
}

/// Bill creation input, supplied by the administrative collaborator.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub(crate) user_id: AccountId,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) amount: Decimal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: RequestKind },
    #[error("Amount must be positive for {kind:?}")]
    NonPositiveAmount { kind: RequestKind },
    #[error("Receiver phone is required for {kind:?}")]
    ReceiverPhoneRequired { kind: RequestKind },
    #[error("Bill id is required")]
    BillIdRequired,
    #[error("QR code is required")]
    QrCodeRequired,
    #[error("Field `{field}` is required")]
    FieldRequired { field: &'static str },
    #[error("Amount must be positive")]
    NonPositiveBillAmount,
    #[error("Opening balance must not be negative")]
    NegativeOpeningBalance,
}

impl LedgerCommand {
    pub fn parse_command(kind: RequestKind, raw: RawRequest) -> Result<Self, CommandError> {
        match kind {
            RequestKind::Transfer => Ok(Self::Transfer(TransferCommand {
                amount: parse_amount(kind, raw.amount)?,
                receiver_phone: parse_phone(kind, raw.receiver_phone)?,
            })),
            RequestKind::PayBill => Ok(Self::PayBill(PayBillCommand {
                bill_id: raw.bill_id.ok_or(CommandError::BillIdRequired)?,
            })),
            RequestKind::SavingsDeposit => Ok(Self::SavingsDeposit(SavingsCommand {
                amount: parse_amount(kind, raw.amount)?,
            })),
            RequestKind::SavingsWithdraw => Ok(Self::SavingsWithdraw(SavingsCommand {
                amount: parse_amount(kind, raw.amount)?,
            })),
            RequestKind::IssueQr => Ok(Self::IssueQr(IssueQrCommand {
                amount: parse_amount(kind, raw.amount)?,
                receiver_phone: parse_phone(kind, raw.receiver_phone)?,
            })),
            RequestKind::RedeemQr => Ok(Self::RedeemQr(RedeemQrCommand {
                qr_code: non_blank(raw.qr_code).ok_or(CommandError::QrCodeRequired)?,
            })),
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Transfer(_) => RequestKind::Transfer,
            Self::PayBill(_) => RequestKind::PayBill,
            Self::SavingsDeposit(_) => RequestKind::SavingsDeposit,
            Self::SavingsWithdraw(_) => RequestKind::SavingsWithdraw,
            Self::IssueQr(_) => RequestKind::IssueQr,
            Self::RedeemQr(_) => RequestKind::RedeemQr,
        }
    }
}

impl TransferCommand {
    pub fn new(receiver_phone: impl Into<String>, amount: Decimal) -> Result<Self, CommandError> {
        let kind = RequestKind::Transfer;
        Ok(Self {
            amount: parse_amount(kind, Some(amount))?,
            receiver_phone: parse_phone(kind, Some(receiver_phone.into()))?,
        })
    }

    pub fn receiver_phone(&self) -> &str {
        &self.receiver_phone
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

impl PayBillCommand {
    pub fn new(bill_id: BillId) -> Self {
        Self { bill_id }
    }

    pub fn bill_id(&self) -> BillId {
        self.bill_id
    }
}

impl SavingsCommand {
    pub fn deposit(amount: Decimal) -> Result<Self, CommandError> {
        Ok(Self {
            amount: parse_amount(RequestKind::SavingsDeposit, Some(amount))?,
        })
    }

    pub fn withdraw(amount: Decimal) -> Result<Self, CommandError> {
        Ok(Self {
            amount: parse_amount(RequestKind::SavingsWithdraw, Some(amount))?,
        })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

impl IssueQrCommand {
    pub fn new(receiver_phone: impl Into<String>, amount: Decimal) -> Result<Self, CommandError> {
        let kind = RequestKind::IssueQr;
        Ok(Self {
            amount: parse_amount(kind, Some(amount))?,
            receiver_phone: parse_phone(kind, Some(receiver_phone.into()))?,
        })
    }

    pub fn receiver_phone(&self) -> &str {
        &self.receiver_phone
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

impl RedeemQrCommand {
    pub fn new(qr_code: impl Into<String>) -> Result<Self, CommandError> {
        Ok(Self {
            qr_code: non_blank(Some(qr_code.into())).ok_or(CommandError::QrCodeRequired)?,
        })
    }

    pub fn qr_code(&self) -> &str {
        &self.qr_code
    }
}

impl NewAccount {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        opening_balance: Decimal,
    ) -> Result<Self, CommandError> {
        Self::parse(
            Some(full_name.into()),
            Some(email.into()),
            Some(phone.into()),
            Some(opening_balance),
        )
    }

    pub fn parse(
        full_name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        opening_balance: Option<Decimal>,
    ) -> Result<Self, CommandError> {
        let opening_balance = opening_balance.unwrap_or_else(Decimal::zero);
        if opening_balance < Decimal::zero() {
            return Err(CommandError::NegativeOpeningBalance);
        }
        Ok(Self {
            full_name: required("full_name", full_name)?,
            email: required("email", email)?,
            phone: required("phone", phone)?,
            opening_balance,
        })
    }
}

impl NewBill {
    pub fn new(
        user_id: AccountId,
        title: impl Into<String>,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Result<Self, CommandError> {
        Self::parse(
            Some(user_id),
            Some(title.into()),
            Some(description.into()),
            Some(amount),
        )
    }

    pub fn parse(
        user_id: Option<AccountId>,
        title: Option<String>,
        description: Option<String>,
        amount: Option<Decimal>,
    ) -> Result<Self, CommandError> {
        let user_id = user_id.ok_or(CommandError::FieldRequired { field: "user_id" })?;
        let title = required("title", title)?;
        let amount = amount.ok_or(CommandError::FieldRequired { field: "amount" })?;
        if amount <= Decimal::zero() {
            return Err(CommandError::NonPositiveBillAmount);
        }
        Ok(Self {
            user_id,
            title,
            description: description.unwrap_or_default(),
            amount,
        })
    }
}

fn parse_amount(kind: RequestKind, amount: Option<Decimal>) -> Result<Decimal, CommandError> {
    let Some(amount) = amount else {
        return Err(CommandError::AmountRequired { kind });
    };
    if amount > Decimal::zero() {
        Ok(amount)
    } else {
        Err(CommandError::NonPositiveAmount { kind })
    }
}

fn parse_phone(kind: RequestKind, phone: Option<String>) -> Result<String, CommandError> {
    non_blank(phone).ok_or(CommandError::ReceiverPhoneRequired { kind })
}

fn required(field: &'static str, value: Option<String>) -> Result<String, CommandError> {
    non_blank(value).ok_or(CommandError::FieldRequired { field })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn raw(amount: Option<Decimal>, phone: Option<&str>) -> RawRequest {
        RawRequest {
            receiver_phone: phone.map(ToOwned::to_owned),
            amount,
            ..Default::default()
        }
    }

    #[test]
    fn parse_transfer() {
        let cmd = LedgerCommand::parse_command(
            RequestKind::Transfer,
            raw(Some(dec!(300)), Some(" 0700000002 ")),
        )
        .unwrap();
        assert_eq!(
            cmd,
            LedgerCommand::Transfer(TransferCommand {
                receiver_phone: "0700000002".to_owned(),
                amount: dec!(300),
            })
        );
        assert_eq!(cmd.kind(), RequestKind::Transfer);
    }

    #[test]
    fn reject_missing_or_non_positive_amount() {
        for kind in [
            RequestKind::Transfer,
            RequestKind::SavingsDeposit,
            RequestKind::SavingsWithdraw,
            RequestKind::IssueQr,
        ] {
            let err = LedgerCommand::parse_command(kind, raw(None, Some("1"))).unwrap_err();
            assert_eq!(err, CommandError::AmountRequired { kind });

            let err =
                LedgerCommand::parse_command(kind, raw(Some(dec!(0)), Some("1"))).unwrap_err();
            assert_eq!(err, CommandError::NonPositiveAmount { kind });

            let err =
                LedgerCommand::parse_command(kind, raw(Some(dec!(-5)), Some("1"))).unwrap_err();
            assert_eq!(err, CommandError::NonPositiveAmount { kind });
        }
    }

    #[test]
    fn reject_missing_receiver() {
        let err = LedgerCommand::parse_command(RequestKind::IssueQr, raw(Some(dec!(1)), Some("  ")))
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::ReceiverPhoneRequired {
                kind: RequestKind::IssueQr
            }
        );
        assert_eq!(err.to_string(), "Receiver phone is required for IssueQr");
    }

    #[test]
    fn reject_missing_bill_and_code() {
        let err =
            LedgerCommand::parse_command(RequestKind::PayBill, RawRequest::default()).unwrap_err();
        assert_eq!(err, CommandError::BillIdRequired);

        let err =
            LedgerCommand::parse_command(RequestKind::RedeemQr, RawRequest::default()).unwrap_err();
        assert_eq!(err, CommandError::QrCodeRequired);

        let cmd = LedgerCommand::parse_command(
            RequestKind::RedeemQr,
            RawRequest {
                qr_code: Some("abc".to_owned()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            cmd,
            LedgerCommand::RedeemQr(RedeemQrCommand {
                qr_code: "abc".to_owned()
            })
        );
    }

    #[test]
    fn parse_registration() {
        let acc = NewAccount::parse(
            Some("Awa".to_owned()),
            Some("awa@example.com".to_owned()),
            Some("0700000001".to_owned()),
            None,
        )
        .unwrap();
        assert_eq!(acc.opening_balance, Decimal::zero());

        let err = NewAccount::parse(Some("Awa".to_owned()), None, Some("1".to_owned()), None)
            .unwrap_err();
        assert_eq!(err, CommandError::FieldRequired { field: "email" });

        let err = NewAccount::parse(
            Some("Awa".to_owned()),
            Some("a@b".to_owned()),
            Some("1".to_owned()),
            Some(dec!(-1)),
        )
        .unwrap_err();
        assert_eq!(err, CommandError::NegativeOpeningBalance);
    }

    #[test]
    fn parse_bill() {
        let err = NewBill::parse(Some(1), Some("Water".to_owned()), None, Some(dec!(0)))
            .unwrap_err();
        assert_eq!(err, CommandError::NonPositiveBillAmount);

        let bill = NewBill::parse(Some(1), Some("Water".to_owned()), None, Some(dec!(12.5)))
            .unwrap();
        assert_eq!(bill.description, "");
        assert_eq!(bill.amount, dec!(12.5));
    }

    #[test]
    fn constructors_reject_non_positive_amounts() {
        for amount in [dec!(0), dec!(-50)] {
            assert_eq!(
                TransferCommand::new("0700000002", amount).unwrap_err(),
                CommandError::NonPositiveAmount {
                    kind: RequestKind::Transfer
                }
            );
            assert_eq!(
                IssueQrCommand::new("0700000002", amount).unwrap_err(),
                CommandError::NonPositiveAmount {
                    kind: RequestKind::IssueQr
                }
            );
            assert_eq!(
                SavingsCommand::deposit(amount).unwrap_err(),
                CommandError::NonPositiveAmount {
                    kind: RequestKind::SavingsDeposit
                }
            );
            assert_eq!(
                SavingsCommand::withdraw(amount).unwrap_err(),
                CommandError::NonPositiveAmount {
                    kind: RequestKind::SavingsWithdraw
                }
            );
            assert_eq!(
                NewBill::new(1, "Water", "", amount).unwrap_err(),
                CommandError::NonPositiveBillAmount
            );
        }
        assert_eq!(
            NewAccount::new("Awa", "awa@example.com", "0700000001", dec!(-1)).unwrap_err(),
            CommandError::NegativeOpeningBalance
        );
        assert_eq!(
            RedeemQrCommand::new(" ").unwrap_err(),
            CommandError::QrCodeRequired
        );

        let cmd = TransferCommand::new(" 0700000002 ", dec!(5)).unwrap();
        assert_eq!(cmd.receiver_phone(), "0700000002");
        assert_eq!(cmd.amount(), dec!(5));
    }
}
