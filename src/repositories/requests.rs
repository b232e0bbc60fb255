use chrono::Utc;

use super::chat::ChatRepository;
use super::notifications::NotificationRepository;
use super::users::UserRepository;
use super::{Store, StoreError};
use crate::models::chat::{NewChatMessage, Sender};
use crate::models::requests::{
    DepositRequest, NewDeposit, NewWithdrawal, OwnedRequest, RequestStatus, WithdrawalRequest,
};
use crate::models::users::Account;
use crate::utils;

/// Common shape of deposit and withdrawal requests, so status updates share
/// one code path.
trait QueuedRequest: Clone {
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn status(&self) -> RequestStatus;
    fn set_status(&mut self, status: RequestStatus);
    fn queue(account: &mut Account) -> &mut Vec<Self>;
    fn notification(&self) -> (&'static str, String);
}

impl QueuedRequest for DepositRequest {
    const KIND: &'static str = "deposit";

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> RequestStatus {
        self.status
    }

    fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
    }

    fn queue(account: &mut Account) -> &mut Vec<Self> {
        &mut account.deposit_requests
    }

    fn notification(&self) -> (&'static str, String) {
        (
            "Deposit request update",
            format!("Your deposit request {} is now {}", self.id, self.status),
        )
    }
}

impl QueuedRequest for WithdrawalRequest {
    const KIND: &'static str = "withdrawal";

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> RequestStatus {
        self.status
    }

    fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
    }

    fn queue(account: &mut Account) -> &mut Vec<Self> {
        &mut account.withdrawal_requests
    }

    fn notification(&self) -> (&'static str, String) {
        (
            "Withdrawal request update",
            format!("Your withdrawal {} is now {}", self.id, self.status),
        )
    }
}

#[derive(Clone)]
pub struct RequestRepository {
    store: Store,
    users: UserRepository,
    chat: ChatRepository,
    notifications: NotificationRepository,
}

impl RequestRepository {
    pub fn new(store: Store, users: UserRepository) -> Self {
        Self {
            chat: ChatRepository::new(store.clone()),
            notifications: NotificationRepository::new(store.clone()),
            store,
            users,
        }
    }

    pub fn add_deposit_request(&self, new_deposit: NewDeposit) -> Result<DepositRequest, StoreError> {
        validate_amount(new_deposit.amount)?;

        let request = DepositRequest {
            id: utils::timestamp_id("r_"),
            method: new_deposit.method,
            amount: new_deposit.amount,
            details: new_deposit.details,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };

        let owner = self.append(&request)?;
        log::info!("Deposit request {} opened by {}", request.id, owner);

        Ok(request)
    }

    /// Queues the withdrawal and posts a summary into the owner's chat so an
    /// admin sees it.
    pub fn add_withdrawal_request(
        &self,
        new_withdrawal: NewWithdrawal,
    ) -> Result<WithdrawalRequest, StoreError> {
        validate_amount(new_withdrawal.amount)?;

        let request = WithdrawalRequest {
            id: utils::timestamp_id("w_"),
            amount: new_withdrawal.amount,
            currency: new_withdrawal.currency,
            method: new_withdrawal.method,
            reference: new_withdrawal.reference,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };

        let owner = self.append(&request)?;
        log::info!("Withdrawal request {} opened by {}", request.id, owner);

        let summary = NewChatMessage {
            user_id: Some(owner.clone()),
            sender: Sender::User,
            text: request.summary(),
            attachment: None,
        };
        if let Err(e) = self.chat.send(summary) {
            log::warn!("Could not post withdrawal {} to chat: {}", request.id, e);
        }

        Ok(request)
    }

    /// `Ok(None)` when no request has this id; nothing is changed and nobody
    /// is notified.
    pub fn update_deposit_status(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<Option<DepositRequest>, StoreError> {
        self.update_status(request_id, status)
    }

    pub fn update_withdrawal_status(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<Option<WithdrawalRequest>, StoreError> {
        self.update_status(request_id, status)
    }

    pub fn all_deposit_requests(&self) -> Result<Vec<OwnedRequest<DepositRequest>>, StoreError> {
        self.all_requests()
    }

    pub fn all_withdrawal_requests(
        &self,
    ) -> Result<Vec<OwnedRequest<WithdrawalRequest>>, StoreError> {
        self.all_requests()
    }

    /// Indexes the request before queueing it, so a queued request can always
    /// be found by id.
    fn append<R: QueuedRequest>(&self, request: &R) -> Result<String, StoreError> {
        let owner = self.users.require_session()?;

        self.store
            .request_owners
            .insert(request.id().as_bytes(), owner.as_bytes())?;

        let queued = self.users.modify_account(&owner, |account| {
            R::queue(account).push(request.clone());
            Ok(())
        });
        if let Err(e) = queued {
            if let Err(cleanup) = self.store.request_owners.remove(request.id().as_bytes()) {
                log::warn!("Could not drop index entry for {}: {}", request.id(), cleanup);
            }
            return Err(e);
        }

        Ok(owner)
    }

    fn update_status<R: QueuedRequest>(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<Option<R>, StoreError> {
        if status == RequestStatus::Pending {
            return Err(StoreError::ValidationFailed(
                "A request can only be approved or rejected".to_string(),
            ));
        }

        let owner = match self.store.request_owners.get(request_id.as_bytes())? {
            Some(owner) => String::from_utf8_lossy(&owner).into_owned(),
            None => {
                log::debug!("No {} request {}", R::KIND, request_id);
                return Ok(None);
            }
        };

        let updated = self.users.modify_account(&owner, |account| {
            let request = match R::queue(account).iter_mut().find(|r| r.id() == request_id) {
                Some(request) => request,
                None => return Ok(None),
            };

            if request.status() != RequestStatus::Pending {
                return Err(StoreError::ValidationFailed(format!(
                    "Request {} is already {}",
                    request_id,
                    request.status()
                )));
            }

            request.set_status(status);
            Ok(Some(request.clone()))
        })?;

        if let Some(request) = &updated {
            log::info!("{} request {} is now {}", R::KIND, request_id, status);

            let (subject, body) = request.notification();
            if let Err(e) = self.notifications.send(&owner, subject, &body) {
                log::warn!("Could not notify {} about {}: {}", owner, request_id, e);
            }
        }

        Ok(updated)
    }

    fn all_requests<R: QueuedRequest>(&self) -> Result<Vec<OwnedRequest<R>>, StoreError> {
        let mut all = Vec::new();

        for mut account in self.users.all_accounts()? {
            let requests = std::mem::take(R::queue(&mut account));
            all.extend(requests.into_iter().map(|request| OwnedRequest {
                request,
                user_id: account.id.clone(),
                user_name: account.name.clone(),
                user_email: account.email.clone(),
            }));
        }

        Ok(all)
    }
}

fn validate_amount(amount: f64) -> Result<(), StoreError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(StoreError::ValidationFailed(format!(
            "Amount must be a positive number, got {}",
            amount
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::requests::{BankDetails, WithdrawalMethod};
    use crate::models::transactions::Currency;
    use crate::repositories::test_support::{create_test_store, logged_in};

    fn setup() -> (RequestRepository, UserRepository, Store, tempfile::TempDir) {
        let (store, temp) = create_test_store();
        let users = UserRepository::new(store.clone());
        let repository = RequestRepository::new(store.clone(), users.clone());
        (repository, users, store, temp)
    }

    fn deposit(amount: f64) -> NewDeposit {
        NewDeposit {
            method: "card".to_string(),
            amount,
            details: Default::default(),
        }
    }

    fn bank_withdrawal(amount: f64) -> NewWithdrawal {
        NewWithdrawal {
            amount,
            currency: Currency::Usdt,
            method: WithdrawalMethod::Bank {
                account_details: BankDetails {
                    account_name: "Ada Lovelace".to_string(),
                    bank_name: "First Bank".to_string(),
                    account_number: "0001".to_string(),
                },
            },
            reference: Some("rent".to_string()),
        }
    }

    #[test]
    fn test_deposit_request_is_pending_and_listed() {
        let (repository, users, _store, _temp) = setup();
        let account = logged_in(&users, "a@x.com");

        let request = repository.add_deposit_request(deposit(50.0)).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.id.starts_with("r_"));

        let stored = users.current_user().unwrap().unwrap();
        assert_eq!(stored.deposit_requests, vec![request.clone()]);

        let all = repository.all_deposit_requests().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].request, request);
        assert_eq!(all[0].user_id, account.id);
        assert_eq!(all[0].user_email, "a@x.com");
    }

    #[test]
    fn test_request_is_indexed_only_when_queued() {
        let (repository, users, store, _temp) = setup();

        let anonymous = repository.add_deposit_request(deposit(5.0));
        assert!(matches!(anonymous, Err(StoreError::Unauthorized(_))));
        assert!(store.request_owners.is_empty());

        let account = logged_in(&users, "a@x.com");
        let request = repository.add_deposit_request(deposit(5.0)).unwrap();
        let owner = store.request_owners.get(request.id.as_bytes()).unwrap();
        assert_eq!(owner.as_deref(), Some(account.id.as_bytes()));
    }

    #[test]
    fn test_withdrawal_posts_chat_summary() {
        let (repository, users, store, _temp) = setup();
        let account = logged_in(&users, "a@x.com");

        let request = repository.add_withdrawal_request(bank_withdrawal(100.0)).unwrap();
        assert!(request.id.starts_with("w_"));

        let messages = ChatRepository::new(store).messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].user_id.as_deref(), Some(account.id.as_str()));
        assert_eq!(
            messages[0].text,
            "Withdrawal request: $100 via bank to Ada Lovelace (First Bank) (Note: rent)"
        );
    }

    #[test]
    fn test_status_update_notifies_owner() {
        let (repository, users, store, _temp) = setup();
        let account = logged_in(&users, "a@x.com");
        let request = repository.add_deposit_request(deposit(50.0)).unwrap();

        // The admin acts without the owner's session.
        users.logout().unwrap();
        let updated = repository
            .update_deposit_status(&request.id, RequestStatus::Approved)
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Approved);

        let stored = users.get_by_id(&account.id).unwrap().unwrap();
        assert_eq!(stored.deposit_requests[0].status, RequestStatus::Approved);

        let notifications = NotificationRepository::new(store).for_user(&account.id).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].subject, "Deposit request update");
        assert_eq!(
            notifications[0].body,
            format!("Your deposit request {} is now approved", request.id)
        );
    }

    #[test]
    fn test_unknown_request_is_noop() {
        let (repository, users, store, _temp) = setup();
        let account = logged_in(&users, "a@x.com");
        repository.add_withdrawal_request(bank_withdrawal(10.0)).unwrap();

        assert!(repository
            .update_withdrawal_status("w_missing", RequestStatus::Rejected)
            .unwrap()
            .is_none());
        assert!(repository
            .update_deposit_status("r_missing", RequestStatus::Approved)
            .unwrap()
            .is_none());

        let notifications = NotificationRepository::new(store).for_user(&account.id).unwrap();
        assert!(notifications.is_empty());
    }

    #[test]
    fn test_deposit_id_does_not_match_withdrawal_queue() {
        let (repository, users, _store, _temp) = setup();
        logged_in(&users, "a@x.com");
        let request = repository.add_deposit_request(deposit(5.0)).unwrap();

        assert!(repository
            .update_withdrawal_status(&request.id, RequestStatus::Approved)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_resolved_request_cannot_change() {
        let (repository, users, _store, _temp) = setup();
        logged_in(&users, "a@x.com");
        let request = repository.add_withdrawal_request(bank_withdrawal(10.0)).unwrap();

        repository
            .update_withdrawal_status(&request.id, RequestStatus::Rejected)
            .unwrap();
        let again = repository.update_withdrawal_status(&request.id, RequestStatus::Approved);
        assert!(matches!(again, Err(StoreError::ValidationFailed(_))));

        let back_to_pending = repository.update_withdrawal_status(&request.id, RequestStatus::Pending);
        assert!(matches!(back_to_pending, Err(StoreError::ValidationFailed(_))));
    }

    #[test]
    fn test_requests_need_session_and_positive_amount() {
        let (repository, users, _store, _temp) = setup();

        assert!(matches!(
            repository.add_deposit_request(deposit(5.0)),
            Err(StoreError::Unauthorized(_))
        ));

        logged_in(&users, "a@x.com");
        assert!(matches!(
            repository.add_deposit_request(deposit(-5.0)),
            Err(StoreError::ValidationFailed(_))
        ));
    }
}
