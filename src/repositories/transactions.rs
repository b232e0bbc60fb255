use chrono::Utc;

use super::users::UserRepository;
use super::StoreError;
use crate::models::transactions::{Currency, NewTransaction, Reconciliation, Transaction};

#[derive(Clone)]
pub struct TransactionRepository {
    users: UserRepository,
}

impl TransactionRepository {
    pub fn new(users: UserRepository) -> Self {
        TransactionRepository { users }
    }

    /// Prepends the transaction to the current account's ledger and moves the
    /// running balance by its signed amount. Overdrafts are allowed.
    pub fn add_transaction(
        &self,
        currency: Currency,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, StoreError> {
        if !new_transaction.amount.is_finite() || new_transaction.amount <= 0.0 {
            return Err(StoreError::ValidationFailed(format!(
                "Amount must be a positive number, got {}",
                new_transaction.amount
            )));
        }

        let transaction = Transaction {
            kind: new_transaction.kind,
            currency,
            amount: new_transaction.amount,
            metadata: new_transaction.metadata,
            created_at: Utc::now(),
        };

        self.users.modify_current(|account| {
            account
                .transactions
                .entry(currency)
                .or_default()
                .insert(0, transaction.clone());
            *account.balances.entry(currency).or_insert(0.0) += transaction.signed_amount();
            Ok(())
        })?;

        log::info!(
            "Recorded {:?} of {} {}",
            transaction.kind,
            transaction.amount,
            currency
        );
        Ok(transaction)
    }

    /// Zero when nobody is logged in.
    pub fn get_balance(&self, currency: Currency) -> Result<f64, StoreError> {
        Ok(self
            .users
            .current_user()?
            .map(|account| account.balance(currency))
            .unwrap_or(0.0))
    }

    pub fn get_transactions(&self, currency: Currency) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .users
            .current_user()?
            .map(|account| account.transactions(currency).to_vec())
            .unwrap_or_default())
    }

    /// Recomputes opening balance plus ledger and compares it with the cached
    /// running balance.
    pub fn reconcile(&self, currency: Currency) -> Result<Reconciliation, StoreError> {
        let account = self
            .users
            .current_user()?
            .ok_or_else(|| StoreError::Unauthorized("Not logged in".to_string()))?;

        let opening = account
            .opening_balances
            .get(&currency)
            .copied()
            .unwrap_or(0.0);
        let recomputed = account
            .transactions(currency)
            .iter()
            .fold(opening, |sum, tx| sum + tx.signed_amount());

        let reconciliation = Reconciliation {
            currency,
            cached: account.balance(currency),
            recomputed,
        };
        if !reconciliation.is_consistent() {
            log::warn!(
                "Balance drift on {} {}: cached {} vs ledger {}",
                account.id,
                currency,
                reconciliation.cached,
                reconciliation.recomputed
            );
        }

        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transactions::TransactionKind;
    use crate::repositories::test_support::{create_test_store, logged_in};

    fn tx(kind: TransactionKind, amount: f64) -> NewTransaction {
        NewTransaction {
            kind,
            amount,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_receive_and_send_adjust_only_named_currency() {
        let (store, _temp) = create_test_store();
        let users = UserRepository::new(store);
        let repository = TransactionRepository::new(users.clone());
        logged_in(&users, "a@x.com");

        let btc_before = repository.get_balance(Currency::Btc).unwrap();
        let eth_before = repository.get_balance(Currency::Eth).unwrap();

        repository
            .add_transaction(Currency::Btc, tx(TransactionKind::Receive, 0.001))
            .unwrap();
        let after_receive = repository.get_balance(Currency::Btc).unwrap();
        assert!((after_receive - btc_before - 0.001).abs() < 1e-12);

        repository
            .add_transaction(Currency::Btc, tx(TransactionKind::Send, 0.0005))
            .unwrap();
        let after_send = repository.get_balance(Currency::Btc).unwrap();
        assert!((after_receive - after_send - 0.0005).abs() < 1e-12);

        assert_eq!(repository.get_balance(Currency::Eth).unwrap(), eth_before);
        assert!(repository.get_transactions(Currency::Eth).unwrap().is_empty());
    }

    #[test]
    fn test_newest_transaction_first() {
        let (store, _temp) = create_test_store();
        let users = UserRepository::new(store);
        let repository = TransactionRepository::new(users.clone());
        logged_in(&users, "a@x.com");

        repository
            .add_transaction(Currency::Usdt, tx(TransactionKind::Receive, 10.0))
            .unwrap();
        let latest = repository
            .add_transaction(Currency::Usdt, tx(TransactionKind::Send, 3.0))
            .unwrap();

        let ledger = repository.get_transactions(Currency::Usdt).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0], latest);
    }

    #[test]
    fn test_invalid_amount_rejected() {
        let (store, _temp) = create_test_store();
        let users = UserRepository::new(store);
        let repository = TransactionRepository::new(users.clone());
        logged_in(&users, "a@x.com");

        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = repository.add_transaction(Currency::Btc, tx(TransactionKind::Receive, amount));
            assert!(matches!(result, Err(StoreError::ValidationFailed(_))));
        }
        assert!(repository.get_transactions(Currency::Btc).unwrap().is_empty());
    }

    #[test]
    fn test_reads_default_without_session() {
        let (store, _temp) = create_test_store();
        let users = UserRepository::new(store);
        let repository = TransactionRepository::new(users);

        assert_eq!(repository.get_balance(Currency::Btc).unwrap(), 0.0);
        assert!(repository.get_transactions(Currency::Btc).unwrap().is_empty());
        assert!(matches!(
            repository.add_transaction(Currency::Btc, tx(TransactionKind::Receive, 1.0)),
            Err(StoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_reconcile_matches_ledger() {
        let (store, _temp) = create_test_store();
        let users = UserRepository::new(store);
        let repository = TransactionRepository::new(users.clone());
        logged_in(&users, "a@x.com");

        repository
            .add_transaction(Currency::Eth, tx(TransactionKind::Receive, 1.5))
            .unwrap();
        repository
            .add_transaction(Currency::Eth, tx(TransactionKind::Send, 0.25))
            .unwrap();

        let reconciliation = repository.reconcile(Currency::Eth).unwrap();
        assert!(reconciliation.is_consistent());
        assert!((reconciliation.recomputed - (0.3456 + 1.5 - 0.25)).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() {
        let (store, _temp) = create_test_store();
        let users = UserRepository::new(store);
        let repository = TransactionRepository::new(users.clone());
        logged_in(&users, "a@x.com");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repository = repository.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        repository
                            .add_transaction(Currency::Usdt, tx(TransactionKind::Receive, 1.0))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(repository.get_transactions(Currency::Usdt).unwrap().len(), 80);
        assert!((repository.get_balance(Currency::Usdt).unwrap() - 203.45).abs() < 1e-9);
        assert!(repository.reconcile(Currency::Usdt).unwrap().is_consistent());
    }
}
