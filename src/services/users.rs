use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::chat::Notification;
use crate::models::users::{
    AccountView, Credentials, NewAccount, PasswordChange, ProfileUpdate, VerificationSubmission,
};
use crate::repositories::notifications::NotificationRepository;
use crate::repositories::users::UserRepository;
use crate::repositories::{Store, StoreError};

type Response<T> = oneshot::Sender<Result<T, ServiceError>>;

pub enum UserRequest {
    Register {
        account: NewAccount,
        response: Response<AccountView>,
    },
    Login {
        credentials: Credentials,
        response: Response<AccountView>,
    },
    Logout {
        response: Response<()>,
    },
    CurrentUser {
        response: Response<Option<AccountView>>,
    },
    AllAccounts {
        response: Response<Vec<AccountView>>,
    },
    UpdateProfile {
        update: ProfileUpdate,
        response: Response<AccountView>,
    },
    ChangePassword {
        change: PasswordChange,
        response: Response<()>,
    },
    SubmitVerification {
        submission: VerificationSubmission,
        response: Response<AccountView>,
    },
    SetVerified {
        id: String,
        verified: bool,
        response: Response<AccountView>,
    },
    SendReset {
        email: String,
        response: Response<bool>,
    },
    GetNotifications {
        user_id: String,
        response: Response<Vec<Notification>>,
    },
    MarkNotificationRead {
        id: String,
        response: Response<()>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
    notifications: NotificationRepository,
}

impl UserRequestHandler {
    pub fn new(store: Store) -> Self {
        let repository = UserRepository::new(store.clone());
        let notifications = NotificationRepository::new(store);

        UserRequestHandler {
            repository,
            notifications,
        }
    }

    fn map_err(e: StoreError) -> ServiceError {
        ServiceError::from_store("Users", e)
    }

    fn mark_notification_read(&self, id: &str) -> Result<(), ServiceError> {
        match self.notifications.mark_read(id).map_err(Self::map_err)? {
            true => Ok(()),
            false => Err(ServiceError::NotFound(format!("Notification {}", id))),
        }
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register { account, response } => {
                let result = self.repository.register(account);
                let _ = response.send(result.map(AccountView::from).map_err(Self::map_err));
            }
            UserRequest::Login {
                credentials,
                response,
            } => {
                let result = self.repository.login(credentials);
                let _ = response.send(result.map(AccountView::from).map_err(Self::map_err));
            }
            UserRequest::Logout { response } => {
                let _ = response.send(self.repository.logout().map_err(Self::map_err));
            }
            UserRequest::CurrentUser { response } => {
                let result = self.repository.current_user();
                let _ = response.send(
                    result
                        .map(|account| account.map(AccountView::from))
                        .map_err(Self::map_err),
                );
            }
            UserRequest::AllAccounts { response } => {
                let result = self.repository.all_accounts();
                let _ = response.send(
                    result
                        .map(|accounts| accounts.into_iter().map(AccountView::from).collect())
                        .map_err(Self::map_err),
                );
            }
            UserRequest::UpdateProfile { update, response } => {
                let result = self.repository.update_profile(update);
                let _ = response.send(result.map(AccountView::from).map_err(Self::map_err));
            }
            UserRequest::ChangePassword { change, response } => {
                let _ = response.send(self.repository.change_password(change).map_err(Self::map_err));
            }
            UserRequest::SubmitVerification {
                submission,
                response,
            } => {
                let result = self.repository.submit_verification(submission);
                let _ = response.send(result.map(AccountView::from).map_err(Self::map_err));
            }
            UserRequest::SetVerified {
                id,
                verified,
                response,
            } => {
                let result = self.repository.set_verified(&id, verified);
                let _ = response.send(result.map(AccountView::from).map_err(Self::map_err));
            }
            UserRequest::SendReset { email, response } => {
                let _ = response.send(self.repository.send_reset(&email).map_err(Self::map_err));
            }
            UserRequest::GetNotifications { user_id, response } => {
                let result = self.notifications.for_user(&user_id);
                let _ = response.send(result.map_err(Self::map_err));
            }
            UserRequest::MarkNotificationRead { id, response } => {
                let _ = response.send(self.mark_notification_read(&id));
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
