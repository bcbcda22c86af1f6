use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    account::{Account, AccountEvent, AccountId},
    command::NewAccount,
    processor::LedgerError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountProfile {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// Profile joined with the balances observed under the account lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub balance: Decimal,
    pub savings: Decimal,
}

#[derive(Debug)]
struct AccountRow {
    profile: AccountProfile,
    state: Mutex<Account>,
}

#[derive(Debug, Default)]
struct Directory {
    rows: HashMap<AccountId, Arc<AccountRow>>,
    by_phone: HashMap<String, AccountId>,
    by_email: HashMap<String, AccountId>,
    last_id: AccountId,
}

/// Per-user balance rows, each behind its own lock.
///
/// The directory lock is only held to look rows up, never while waiting on a
/// row lock, so operations on disjoint accounts never contend.
#[derive(Debug)]
pub struct AccountStore {
    directory: RwLock<Directory>,
    lock_timeout: Duration,
}

/// Staged balances of the rows locked by [`AccountStore::transact`].
///
/// Events applied here become visible only if the enclosing closure
/// returns `Ok`.
#[derive(Debug)]
pub struct AtomicScope {
    staged: Vec<(AccountId, Account)>,
}

impl AtomicScope {
    pub fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.staged
            .iter()
            .find(|(staged_id, _)| *staged_id == id)
            .map(|(_, acc)| acc)
            .ok_or_else(|| LedgerError::Internal(format!("account {id} is not locked in scope")))
    }

    pub fn apply(&mut self, id: AccountId, event: &AccountEvent) -> Result<(), LedgerError> {
        let (_, acc) = self
            .staged
            .iter_mut()
            .find(|(staged_id, _)| *staged_id == id)
            .ok_or_else(|| LedgerError::Internal(format!("account {id} is not locked in scope")))?;
        acc.apply(event);
        Ok(())
    }
}

impl AccountStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            directory: RwLock::new(Directory::default()),
            lock_timeout,
        }
    }

    pub fn open_account(&self, new_account: NewAccount) -> Result<AccountProfile, LedgerError> {
        let mut dir = self.directory.write();
        if dir.by_phone.contains_key(&new_account.phone) {
            return Err(LedgerError::AlreadyRegistered { field: "phone" });
        }
        if dir.by_email.contains_key(&new_account.email) {
            return Err(LedgerError::AlreadyRegistered { field: "email" });
        }
        dir.last_id += 1;
        let profile = AccountProfile {
            id: dir.last_id,
            full_name: new_account.full_name,
            email: new_account.email,
            phone: new_account.phone,
        };
        dir.by_phone.insert(profile.phone.clone(), profile.id);
        dir.by_email.insert(profile.email.clone(), profile.id);
        dir.rows.insert(
            profile.id,
            Arc::new(AccountRow {
                profile: profile.clone(),
                state: Mutex::new(Account::with_balance(new_account.opening_balance)),
            }),
        );
        Ok(profile)
    }

    pub fn find_by_phone(&self, phone: &str) -> Option<AccountProfile> {
        let dir = self.directory.read();
        dir.by_phone
            .get(phone.trim())
            .and_then(|id| dir.rows.get(id))
            .map(|row| row.profile.clone())
    }

    pub fn profile(&self, id: AccountId) -> Option<AccountProfile> {
        self.directory
            .read()
            .rows
            .get(&id)
            .map(|row| row.profile.clone())
    }

    pub fn exists(&self, id: AccountId) -> bool {
        self.directory.read().rows.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.directory.read().rows.len()
    }

    /// Runs `f` with exclusive access to every account in `ids`.
    ///
    /// Locks are taken in ascending id order against one shared deadline.
    /// Balance changes staged through the [`AtomicScope`] are written back
    /// only when `f` succeeds; on error every row keeps its prior state.
    pub fn transact<T, F>(&self, ids: &[AccountId], f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut AtomicScope) -> Result<T, LedgerError>,
    {
        self.transact_then(ids, f, |value| value)
    }

    /// Same as [`AccountStore::transact`], then hands the value of `f` to
    /// `commit` once the staged balances are written back. Every row stays
    /// locked until `commit` returns, and `commit` never runs when `f` fails.
    pub fn transact_then<T, U, F, C>(
        &self,
        ids: &[AccountId],
        f: F,
        commit: C,
    ) -> Result<U, LedgerError>
    where
        F: FnOnce(&mut AtomicScope) -> Result<T, LedgerError>,
        C: FnOnce(T) -> U,
    {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let rows = {
            let dir = self.directory.read();
            ids.iter()
                .map(|id| {
                    dir.rows
                        .get(id)
                        .cloned()
                        .ok_or(LedgerError::AccountNotFound { id: *id })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let deadline = Instant::now() + self.lock_timeout;
        let mut guards = Vec::with_capacity(rows.len());
        for row in &rows {
            let guard = row
                .state
                .try_lock_until(deadline)
                .ok_or(LedgerError::LockTimeout {
                    account: row.profile.id,
                })?;
            guards.push(guard);
        }

        let mut scope = AtomicScope {
            staged: rows
                .iter()
                .zip(&guards)
                .map(|(row, guard)| (row.profile.id, (**guard).clone()))
                .collect(),
        };
        let value = f(&mut scope)?;

        for (guard, (_, staged)) in guards.iter_mut().zip(scope.staged) {
            **guard = staged;
        }
        Ok(commit(value))
    }

    /// Committed balances of one account.
    pub fn balances(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.transact(&[id], |scope| scope.account(id).cloned())
    }

    /// Every account with its committed balances, ordered by id.
    pub fn summaries(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        let mut rows: Vec<Arc<AccountRow>> =
            self.directory.read().rows.values().cloned().collect();
        rows.sort_unstable_by_key(|row| row.profile.id);

        rows.iter()
            .map(|row| {
                let acc = row
                    .state
                    .try_lock_for(self.lock_timeout)
                    .ok_or(LedgerError::LockTimeout {
                        account: row.profile.id,
                    })?
                    .clone();
                Ok(summary(&row.profile, &acc))
            })
            .collect()
    }

    pub fn summary(&self, id: AccountId) -> Result<AccountSummary, LedgerError> {
        let profile = self
            .profile(id)
            .ok_or(LedgerError::AccountNotFound { id })?;
        let acc = self.balances(id)?;
        Ok(summary(&profile, &acc))
    }
}

fn summary(profile: &AccountProfile, acc: &Account) -> AccountSummary {
    AccountSummary {
        id: profile.id,
        full_name: profile.full_name.clone(),
        email: profile.email.clone(),
        phone: profile.phone.clone(),
        balance: acc.primary(),
        savings: acc.savings(),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, thread};

    use rust_decimal_macros::dec;

    use super::*;
    use crate::account::AccountError;

    fn new_account(name: &str, phone: &str, balance: Decimal) -> NewAccount {
        NewAccount {
            full_name: name.to_owned(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: phone.to_owned(),
            opening_balance: balance,
        }
    }

    fn store() -> AccountStore {
        AccountStore::new(Duration::from_millis(50))
    }

    #[test]
    fn open_accounts() {
        let store = store();
        let a = store.open_account(new_account("Awa", "0701", dec!(10))).unwrap();
        let b = store.open_account(new_account("Boubacar", "0702", dec!(0))).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.count(), 2);
        assert_eq!(store.find_by_phone("0702"), Some(b.clone()));
        assert_eq!(store.find_by_phone("0799"), None);
        assert_eq!(store.balances(a.id).unwrap().primary(), dec!(10));

        let err = store
            .open_account(new_account("Other", "0701", dec!(0)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyRegistered { field: "phone" }));

        let err = store
            .open_account(new_account("Awa", "0703", dec!(0)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyRegistered { field: "email" }));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn commit_staged_changes() {
        let store = store();
        let a = store.open_account(new_account("Awa", "0701", dec!(10))).unwrap().id;
        let b = store.open_account(new_account("Binta", "0702", dec!(5))).unwrap().id;

        store
            .transact(&[b, a], |scope| {
                let debit = scope.account(a)?.handle_debit(dec!(4))?;
                let credit = scope.account(b)?.handle_credit(dec!(4))?;
                scope.apply(a, &debit)?;
                scope.apply(b, &credit)
            })
            .unwrap();

        assert_eq!(store.balances(a).unwrap().primary(), dec!(6));
        assert_eq!(store.balances(b).unwrap().primary(), dec!(9));
    }

    #[test]
    fn rollback_on_error() {
        let store = store();
        let a = store.open_account(new_account("Awa", "0701", dec!(10))).unwrap().id;
        let b = store.open_account(new_account("Binta", "0702", dec!(5))).unwrap().id;

        let err = store
            .transact(&[a, b], |scope| {
                let credit = scope.account(b)?.handle_credit(dec!(50))?;
                scope.apply(b, &credit)?;
                // fails after a staged write
                let debit = scope.account(a)?.handle_debit(dec!(50))?;
                scope.apply(a, &debit)
            })
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::AccountErr(AccountError::InsufficientFunds { .. })
        ));
        assert_eq!(store.balances(a).unwrap().primary(), dec!(10));
        assert_eq!(store.balances(b).unwrap().primary(), dec!(5));
    }

    #[test]
    fn commit_runs_after_write_back_with_rows_locked() {
        let store = store();
        let a = store.open_account(new_account("Awa", "0701", dec!(10))).unwrap().id;

        let busy = store
            .transact_then(
                &[a],
                |scope| {
                    let debit = scope.account(a)?.handle_debit(dec!(3))?;
                    scope.apply(a, &debit)
                },
                // the row is still held by this operation
                |()| store.balances(a).unwrap_err(),
            )
            .unwrap();
        assert!(matches!(busy, LedgerError::LockTimeout { account } if account == a));
        assert_eq!(store.balances(a).unwrap().primary(), dec!(7));

        let mut committed = false;
        let err = store
            .transact_then(
                &[a],
                |scope| {
                    scope.account(a)?.handle_debit(dec!(50))?;
                    Ok(())
                },
                |()| committed = true,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountErr(_)));
        assert!(!committed);
    }

    #[test]
    fn reject_unknown_accounts() {
        let store = store();
        let err = store.transact(&[7], |_| Ok(())).unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound { id: 7 }));

        let a = store.open_account(new_account("Awa", "0701", dec!(1))).unwrap().id;
        let err = store
            .transact(&[a], |scope| scope.account(a + 1).map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Internal(_)));
    }

    #[test]
    fn time_out_on_busy_account() {
        let store = store();
        let a = store.open_account(new_account("Awa", "0701", dec!(10))).unwrap().id;
        let b = store.open_account(new_account("Binta", "0702", dec!(10))).unwrap().id;

        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let store = &store;
        thread::scope(|s| {
            s.spawn(move || {
                store
                    .transact(&[a], |_| {
                        locked_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(())
                    })
                    .unwrap();
            });

            locked_rx.recv().unwrap();
            // the holder blocks until released, so this attempt can only time out
            let err = store.transact(&[a, b], |_| Ok(())).unwrap_err();
            assert!(matches!(err, LedgerError::LockTimeout { account } if account == a));
            assert!(err.is_retryable());

            // disjoint account is not blocked
            assert_eq!(store.balances(b).unwrap().primary(), dec!(10));
            release_tx.send(()).unwrap();
        });

        assert_eq!(store.balances(a).unwrap().primary(), dec!(10));
    }

    #[test]
    fn summaries_are_ordered() {
        let store = store();
        store.open_account(new_account("Awa", "0701", dec!(10))).unwrap();
        store.open_account(new_account("Binta", "0702", dec!(3))).unwrap();
        let summaries = store.summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].full_name, "Awa");
        assert_eq!(summaries[1].balance, dec!(3));
        assert_eq!(store.summary(2).unwrap(), summaries[1]);
    }
}
