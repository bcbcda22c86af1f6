use rust_decimal::{Decimal, prelude::Zero};
use thiserror::Error;

pub type AccountId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEventKind {
    Debited,
    Credited,
    SavingsDeposited,
    SavingsWithdrawn,
}

#[derive(Debug, Clone)]
pub struct AccountEvent {
    amount: Decimal,
    kind: AccountEventKind,
}

impl AccountEvent {
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> AccountEventKind {
        self.kind
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },
    #[error("Insufficient savings: available {available}, required {required}")]
    InsufficientSavings {
        available: Decimal,
        required: Decimal,
    },
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },
    #[error("Balance would exceed the representable range")]
    BalanceOverflow,
}

/// Balance row of a single user.
///
/// `savings` is `None` until the first savings deposit creates the savings
/// sub-ledger; it then stays `Some` forever, even at zero.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Account {
    primary: Decimal,
    savings: Option<Decimal>,
}

impl Account {
    pub fn with_balance(primary: Decimal) -> Self {
        Self {
            primary,
            savings: None,
        }
    }

    pub fn primary(&self) -> Decimal {
        self.primary
    }

    pub fn savings(&self) -> Decimal {
        self.savings.unwrap_or_else(Decimal::zero)
    }

    pub fn has_savings_account(&self) -> bool {
        self.savings.is_some()
    }

    pub fn total_amount(&self) -> Decimal {
        self.primary + self.savings()
    }

    /// Applies an event produced by a `handle_*` call on this same state;
    /// the handler has already ruled out overflow.
    pub fn apply(&mut self, event: &AccountEvent) {
        match event.kind {
            AccountEventKind::Debited => {
                self.primary -= event.amount;
            }
            AccountEventKind::Credited => {
                self.primary += event.amount;
            }
            AccountEventKind::SavingsDeposited => {
                self.primary -= event.amount;
                match &mut self.savings {
                    Some(savings) => *savings += event.amount,
                    None => self.savings = Some(event.amount),
                }
            }
            AccountEventKind::SavingsWithdrawn => {
                self.primary += event.amount;
                if let Some(savings) = &mut self.savings {
                    *savings -= event.amount;
                }
            }
        }
    }

    pub fn handle_debit(&self, amount: Decimal) -> Result<AccountEvent, AccountError> {
        self.ensure_primary(amount)?;
        Ok(AccountEvent {
            amount,
            kind: AccountEventKind::Debited,
        })
    }

    pub fn handle_credit(&self, amount: Decimal) -> Result<AccountEvent, AccountError> {
        ensure_positive(amount)?;
        checked_add(self.primary, amount)?;
        Ok(AccountEvent {
            amount,
            kind: AccountEventKind::Credited,
        })
    }

    pub fn handle_savings_deposit(&self, amount: Decimal) -> Result<AccountEvent, AccountError> {
        self.ensure_primary(amount)?;
        checked_add(self.savings(), amount)?;
        Ok(AccountEvent {
            amount,
            kind: AccountEventKind::SavingsDeposited,
        })
    }

    pub fn handle_savings_withdraw(&self, amount: Decimal) -> Result<AccountEvent, AccountError> {
        ensure_positive(amount)?;
        // a missing savings row behaves like an empty one
        match self.savings {
            Some(savings) if savings >= amount => {
                checked_add(self.primary, amount)?;
                Ok(AccountEvent {
                    amount,
                    kind: AccountEventKind::SavingsWithdrawn,
                })
            }
            _ => Err(AccountError::InsufficientSavings {
                available: self.savings(),
                required: amount,
            }),
        }
    }

    /// Checks that `amount` is positive and the primary balance covers it.
    pub fn ensure_primary(&self, amount: Decimal) -> Result<(), AccountError> {
        ensure_positive(amount)?;
        if self.primary >= amount {
            Ok(())
        } else {
            Err(AccountError::InsufficientFunds {
                available: self.primary,
                required: amount,
            })
        }
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), AccountError> {
    if amount > Decimal::zero() {
        Ok(())
    } else {
        Err(AccountError::NonPositiveAmount { amount })
    }
}

fn checked_add(balance: Decimal, amount: Decimal) -> Result<Decimal, AccountError> {
    balance
        .checked_add(amount)
        .ok_or(AccountError::BalanceOverflow)
}
