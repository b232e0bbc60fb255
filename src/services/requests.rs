use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::requests::{
    DepositRequest, NewDeposit, NewWithdrawal, OwnedRequest, RequestStatus, WithdrawalRequest,
};
use crate::repositories::requests::RequestRepository;
use crate::repositories::users::UserRepository;
use crate::repositories::{Store, StoreError};

pub enum QueueRequest {
    Deposit {
        deposit: NewDeposit,
        response: oneshot::Sender<Result<DepositRequest, ServiceError>>,
    },
    Withdrawal {
        withdrawal: NewWithdrawal,
        response: oneshot::Sender<Result<WithdrawalRequest, ServiceError>>,
    },
    UpdateDepositStatus {
        request_id: String,
        status: RequestStatus,
        response: oneshot::Sender<Result<Option<DepositRequest>, ServiceError>>,
    },
    UpdateWithdrawalStatus {
        request_id: String,
        status: RequestStatus,
        response: oneshot::Sender<Result<Option<WithdrawalRequest>, ServiceError>>,
    },
    AllDeposits {
        response: oneshot::Sender<Result<Vec<OwnedRequest<DepositRequest>>, ServiceError>>,
    },
    AllWithdrawals {
        response: oneshot::Sender<Result<Vec<OwnedRequest<WithdrawalRequest>>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct QueueRequestHandler {
    repository: RequestRepository,
}

impl QueueRequestHandler {
    pub fn new(store: Store) -> Self {
        let users = UserRepository::new(store.clone());
        let repository = RequestRepository::new(store, users);

        QueueRequestHandler { repository }
    }
}

#[async_trait]
impl RequestHandler<QueueRequest> for QueueRequestHandler {
    async fn handle_request(&self, request: QueueRequest) {
        let map_err = |e: StoreError| ServiceError::from_store("RequestQueue", e);

        match request {
            QueueRequest::Deposit { deposit, response } => {
                let result = self.repository.add_deposit_request(deposit).map_err(map_err);
                let _ = response.send(result);
            }
            QueueRequest::Withdrawal {
                withdrawal,
                response,
            } => {
                let result = self
                    .repository
                    .add_withdrawal_request(withdrawal)
                    .map_err(map_err);
                let _ = response.send(result);
            }
            QueueRequest::UpdateDepositStatus {
                request_id,
                status,
                response,
            } => {
                let result = self
                    .repository
                    .update_deposit_status(&request_id, status)
                    .map_err(map_err);
                let _ = response.send(result);
            }
            QueueRequest::UpdateWithdrawalStatus {
                request_id,
                status,
                response,
            } => {
                let result = self
                    .repository
                    .update_withdrawal_status(&request_id, status)
                    .map_err(map_err);
                let _ = response.send(result);
            }
            QueueRequest::AllDeposits { response } => {
                let _ = response.send(self.repository.all_deposit_requests().map_err(map_err));
            }
            QueueRequest::AllWithdrawals { response } => {
                let _ = response.send(self.repository.all_withdrawal_requests().map_err(map_err));
            }
        }
    }
}

pub struct RequestService;

impl RequestService {
    pub fn new() -> Self {
        RequestService {}
    }
}

#[async_trait]
impl Service<QueueRequest, QueueRequestHandler> for RequestService {}
