use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::transactions::{Currency, NewTransaction, Reconciliation, Transaction};
use crate::repositories::transactions::TransactionRepository;
use crate::repositories::users::UserRepository;
use crate::repositories::Store;

pub enum TransactionServiceRequest {
    AddTransaction {
        currency: Currency,
        transaction: NewTransaction,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    GetBalance {
        currency: Currency,
        response: oneshot::Sender<Result<f64, ServiceError>>,
    },
    GetTransactions {
        currency: Currency,
        response: oneshot::Sender<Result<Vec<Transaction>, ServiceError>>,
    },
    Reconcile {
        currency: Currency,
        response: oneshot::Sender<Result<Reconciliation, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct TransactionRequestHandler {
    repository: TransactionRepository,
}

impl TransactionRequestHandler {
    pub fn new(store: Store) -> Self {
        let repository = TransactionRepository::new(UserRepository::new(store));

        TransactionRequestHandler { repository }
    }
}

#[async_trait]
impl RequestHandler<TransactionServiceRequest> for TransactionRequestHandler {
    async fn handle_request(&self, request: TransactionServiceRequest) {
        match request {
            TransactionServiceRequest::AddTransaction {
                currency,
                transaction,
                response,
            } => {
                let result = self
                    .repository
                    .add_transaction(currency, transaction)
                    .map_err(|e| ServiceError::from_store("TransactionService", e));
                let _ = response.send(result);
            }
            TransactionServiceRequest::GetBalance { currency, response } => {
                let result = self
                    .repository
                    .get_balance(currency)
                    .map_err(|e| ServiceError::from_store("TransactionService", e));
                let _ = response.send(result);
            }
            TransactionServiceRequest::GetTransactions { currency, response } => {
                let result = self
                    .repository
                    .get_transactions(currency)
                    .map_err(|e| ServiceError::from_store("TransactionService", e));
                let _ = response.send(result);
            }
            TransactionServiceRequest::Reconcile { currency, response } => {
                let result = self
                    .repository
                    .reconcile(currency)
                    .map_err(|e| ServiceError::from_store("TransactionService", e));
                let _ = response.send(result);
            }
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    pub fn new() -> Self {
        TransactionService {}
    }
}

#[async_trait]
impl Service<TransactionServiceRequest, TransactionRequestHandler> for TransactionService {}
