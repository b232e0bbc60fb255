use std::collections::BTreeMap;

use chrono::Utc;

use super::notifications::NotificationRepository;
use super::{decode, encode, read, read_log, Store, StoreError};
use crate::models::transactions::Currency;
use crate::models::users::{
    Account, Credentials, NewAccount, PasswordChange, ProfileUpdate, Verification,
    VerificationSubmission,
};
use crate::utils;

const SESSION_KEY: &str = "current";

#[derive(Clone)]
pub struct UserRepository {
    store: Store,
    notifications: NotificationRepository,
}

impl UserRepository {
    pub fn new(store: Store) -> Self {
        let notifications = NotificationRepository::new(store.clone());

        Self {
            store,
            notifications,
        }
    }

    pub fn register(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        let email = utils::normalize_email(&new_account.email);
        if !email.contains('@') {
            return Err(StoreError::ValidationFailed(format!(
                "Invalid email: {}",
                new_account.email
            )));
        }
        if new_account.password.is_empty() {
            return Err(StoreError::ValidationFailed(
                "Password must not be empty".to_string(),
            ));
        }

        let id = utils::timestamp_id("O_X");

        let opening_balances: BTreeMap<Currency, f64> = Currency::ALL
            .iter()
            .map(|c| (*c, c.starter_balance()))
            .collect();

        let account = Account {
            id: id.clone(),
            name: new_account.name,
            email: email.clone(),
            credential: utils::new_credential(&new_account.password),
            phone: new_account.phone,
            country: new_account.country,
            verified: false,
            verification_pending: false,
            verification: None,
            wallet: Currency::ALL
                .iter()
                .map(|c| (*c, c.mock_wallet_address().to_string()))
                .collect(),
            balances: opening_balances.clone(),
            opening_balances,
            transactions: Currency::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            deposit_requests: Vec::new(),
            withdrawal_requests: Vec::new(),
            created_at: Utc::now(),
        };

        let encoded = encode(&account)?;

        // Claiming the email first makes concurrent registrations race on one key.
        let claim = self.store.account_emails.compare_and_swap(
            email.as_bytes(),
            None as Option<&[u8]>,
            Some(id.as_bytes()),
        )?;
        if claim.is_err() {
            return Err(StoreError::Conflict(format!("Account exists: {}", email)));
        }

        if let Err(e) = self.store.accounts.insert(id.as_bytes(), encoded) {
            if let Err(rollback) = self.store.account_emails.remove(email.as_bytes()) {
                log::warn!("Could not release email {} after failed insert: {}", email, rollback);
            }
            return Err(e.into());
        }

        log::info!("Registered account {} for {}", id, email);
        Ok(account)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        read(&self.store.accounts, id)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let email = utils::normalize_email(email);

        match self.store.account_emails.get(email.as_bytes())? {
            Some(id) => self.get_by_id(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        read_log(&self.store.accounts)
    }

    pub fn login(&self, credentials: Credentials) -> Result<Account, StoreError> {
        let account = self
            .find_by_email(&credentials.email)?
            .filter(|account| utils::verify_password(&account.credential, &credentials.password))
            .ok_or_else(|| StoreError::Unauthorized("Invalid email or password".to_string()))?;

        self.store
            .session
            .insert(SESSION_KEY, account.id.as_bytes())?;
        log::info!("Account {} logged in", account.id);

        Ok(account)
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.session.remove(SESSION_KEY)?;
        Ok(())
    }

    pub fn current_user_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .store
            .session
            .get(SESSION_KEY)?
            .map(|id| String::from_utf8_lossy(&id).into_owned()))
    }

    /// A session pointing at an account that no longer exists resolves to `None`.
    pub fn current_user(&self) -> Result<Option<Account>, StoreError> {
        match self.current_user_id()? {
            Some(id) => self.get_by_id(&id),
            None => Ok(None),
        }
    }

    pub(crate) fn require_session(&self) -> Result<String, StoreError> {
        self.current_user_id()?
            .ok_or_else(|| StoreError::Unauthorized("Not logged in".to_string()))
    }

    /// Read-modify-write of one account record. The write is a compare-and-swap
    /// against the bytes that were read, so a concurrent writer forces a retry
    /// instead of being overwritten.
    pub(crate) fn modify_account<T, F>(&self, id: &str, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut Account) -> Result<T, StoreError>,
    {
        loop {
            let current = self
                .store
                .accounts
                .get(id.as_bytes())?
                .ok_or_else(|| StoreError::NotFound(format!("Account {}", id)))?;

            let mut account: Account = decode(id.as_bytes(), &current)?;
            let output = f(&mut account)?;

            let swapped = self.store.accounts.compare_and_swap(
                id.as_bytes(),
                Some(&current),
                Some(encode(&account)?),
            )?;

            match swapped {
                Ok(()) => return Ok(output),
                Err(_) => log::debug!("Concurrent update on account {}, retrying", id),
            }
        }
    }

    pub(crate) fn modify_current<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut Account) -> Result<T, StoreError>,
    {
        let id = self.require_session()?;
        self.modify_account(&id, f)
    }

    pub fn update_profile(&self, update: ProfileUpdate) -> Result<Account, StoreError> {
        self.modify_current(|account| {
            if let Some(name) = &update.name {
                account.name = name.clone();
            }
            if let Some(phone) = &update.phone {
                account.phone = phone.clone();
            }
            if let Some(country) = &update.country {
                account.country = country.clone();
            }
            Ok(account.clone())
        })
    }

    pub fn change_password(&self, change: PasswordChange) -> Result<(), StoreError> {
        if change.new_password.is_empty() {
            return Err(StoreError::ValidationFailed(
                "Password must not be empty".to_string(),
            ));
        }

        let id = self.modify_current(|account| {
            if !utils::verify_password(&account.credential, &change.old_password) {
                return Err(StoreError::Unauthorized("Wrong password".to_string()));
            }
            account.credential = utils::new_credential(&change.new_password);
            Ok(account.id.clone())
        })?;

        if let Err(e) = self.notifications.send(
            &id,
            "Password changed",
            "Your account password was changed. If this wasn't you, contact support.",
        ) {
            log::warn!("Could not notify {} of password change: {}", id, e);
        }

        Ok(())
    }

    pub fn submit_verification(
        &self,
        submission: VerificationSubmission,
    ) -> Result<Account, StoreError> {
        self.modify_current(|account| {
            account.verification_pending = true;
            account.verification = Some(Verification {
                ssn: submission.ssn.clone(),
                file_name: submission.file_name.clone(),
                submitted_at: Utc::now(),
            });
            Ok(account.clone())
        })
    }

    /// Admin decision on a pending verification.
    pub fn set_verified(&self, id: &str, verified: bool) -> Result<Account, StoreError> {
        let account = self.modify_account(id, |account| {
            account.verified = verified;
            account.verification_pending = false;
            Ok(account.clone())
        })?;

        let body = if verified {
            "Your identity verification was approved."
        } else {
            "Your identity verification was rejected. Please submit it again."
        };
        if let Err(e) = self.notifications.send(id, "Verification update", body) {
            log::warn!("Could not notify {} of verification update: {}", id, e);
        }

        Ok(account)
    }

    /// Simulated password reset: reports whether an account exists.
    pub fn send_reset(&self, email: &str) -> Result<bool, StoreError> {
        let exists = self.find_by_email(email)?.is_some();
        if exists {
            log::info!("Password reset requested for {}", utils::normalize_email(email));
        }
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{create_test_store, credentials, new_account};

    #[test]
    fn test_duplicate_email_conflicts() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        repository.register(new_account("a@x.com", "p1")).unwrap();
        let second = repository.register(new_account("a@x.com", "p2"));

        assert!(matches!(second, Err(StoreError::Conflict(_))));
        let stored = repository.find_by_email("a@x.com").unwrap().unwrap();
        assert!(utils::verify_password(&stored.credential, "p1"));
    }

    #[test]
    fn test_distinct_emails_are_independent() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        let a = repository.register(new_account("a@x.com", "p1")).unwrap();
        let b = repository.register(new_account("b@x.com", "p2")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(repository.find_by_email("a@x.com").unwrap().unwrap().id, a.id);
        assert_eq!(repository.find_by_email("b@x.com").unwrap().unwrap().id, b.id);
        assert_eq!(repository.all_accounts().unwrap().len(), 2);
    }

    #[test]
    fn test_register_sets_starter_values() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        let account = repository.register(new_account("a@x.com", "p1")).unwrap();

        assert!(account.id.starts_with("O_X"));
        for currency in Currency::ALL {
            assert_eq!(account.balance(currency), currency.starter_balance());
            assert!(account.transactions(currency).is_empty());
            assert_eq!(account.wallet[&currency], currency.mock_wallet_address());
        }
        assert!(!account.verified);
    }

    #[test]
    fn test_register_round_trips() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        let account = repository.register(new_account("a@x.com", "p1")).unwrap();
        let stored = repository.get_by_id(&account.id).unwrap().unwrap();

        assert_eq!(stored, account);
    }

    #[test]
    fn test_login_and_logout() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        repository.register(new_account("a@x.com", "p1")).unwrap();
        repository.register(new_account("b@x.com", "p2")).unwrap();

        assert!(matches!(
            repository.login(credentials("a@x.com", "wrong")),
            Err(StoreError::Unauthorized(_))
        ));
        assert!(repository.current_user().unwrap().is_none());

        repository.login(credentials("a@x.com", "p1")).unwrap();
        assert_eq!(repository.current_user().unwrap().unwrap().email, "a@x.com");

        repository.logout().unwrap();
        assert!(repository.current_user().unwrap().is_none());
    }

    #[test]
    fn test_session_operations_require_login() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        repository.register(new_account("a@x.com", "p1")).unwrap();

        let result = repository.update_profile(ProfileUpdate {
            name: Some("Grace".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    }

    #[test]
    fn test_update_profile_only_touches_given_fields() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        repository.register(new_account("a@x.com", "p1")).unwrap();
        repository.login(credentials("a@x.com", "p1")).unwrap();

        let updated = repository
            .update_profile(ProfileUpdate {
                country: Some("PT".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.country, "PT");
        assert_eq!(updated.name, "Ada");
        assert_eq!(repository.current_user().unwrap().unwrap(), updated);
    }

    #[test]
    fn test_change_password_notifies() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store.clone());
        let notifications = NotificationRepository::new(store);

        let account = repository.register(new_account("a@x.com", "p1")).unwrap();
        repository.login(credentials("a@x.com", "p1")).unwrap();

        let wrong = repository.change_password(PasswordChange {
            old_password: "nope".to_string(),
            new_password: "p2".to_string(),
        });
        assert!(matches!(wrong, Err(StoreError::Unauthorized(_))));
        assert!(notifications.for_user(&account.id).unwrap().is_empty());

        repository
            .change_password(PasswordChange {
                old_password: "p1".to_string(),
                new_password: "p2".to_string(),
            })
            .unwrap();

        repository.logout().unwrap();
        assert!(repository.login(credentials("a@x.com", "p1")).is_err());
        assert!(repository.login(credentials("a@x.com", "p2")).is_ok());

        let sent = notifications.for_user(&account.id).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Password changed");
    }

    #[test]
    fn test_verification_flow() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        let account = repository.register(new_account("a@x.com", "p1")).unwrap();
        repository.login(credentials("a@x.com", "p1")).unwrap();

        let pending = repository
            .submit_verification(VerificationSubmission {
                ssn: "123-45-6789".to_string(),
                file_name: "passport.png".to_string(),
            })
            .unwrap();
        assert!(pending.verification_pending);
        assert_eq!(pending.verification.unwrap().file_name, "passport.png");

        let verified = repository.set_verified(&account.id, true).unwrap();
        assert!(verified.verified);
        assert!(!verified.verification_pending);
    }

    #[test]
    fn test_send_reset() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store);

        repository.register(new_account("a@x.com", "p1")).unwrap();

        assert!(repository.send_reset(" A@X.com ").unwrap());
        assert!(!repository.send_reset("nobody@x.com").unwrap());
    }

    #[test]
    fn test_concurrent_registrations_claim_email_once() {
        let (store, _temp) = create_test_store();
        let repository = UserRepository::new(store.clone());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repository = repository.clone();
                std::thread::spawn(move || {
                    repository.register(new_account("race@x.com", &format!("p{}", i)))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(StoreError::Conflict(_)))));

        let claimed = store.account_emails.get("race@x.com").unwrap().unwrap();
        assert_eq!(&claimed[..], winners[0].id.as_bytes());
        assert_eq!(repository.all_accounts().unwrap().len(), 1);
    }
}
