use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::repositories::{price::PriceRepository, Store, StoreError};
use crate::settings::Settings;

mod branding;
mod chat;
mod http;
mod price;
mod requests;
mod transactions;
mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("External service error: {0} => {1}")]
    ExternalService(String, String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl ServiceError {
    /// Keeps the caller-facing kinds and folds storage failures into
    /// `Repository`, tagged with the service that hit them.
    pub fn from_store(service: &str, error: StoreError) -> Self {
        match error {
            StoreError::NotFound(m) => ServiceError::NotFound(m),
            StoreError::Conflict(m) => ServiceError::Conflict(m),
            StoreError::Unauthorized(m) => ServiceError::Unauthorized(m),
            StoreError::ValidationFailed(m) => ServiceError::ValidationFailed(m),
            StoreError::ExternalUnavailable(m) => ServiceError::ExternalService(service.to_string(), m),
            other => ServiceError::Repository(service.to_string(), other.to_string()),
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(store: Store, settings: Settings) -> Result<(), anyhow::Error> {
    let capacity = settings.service.channel_capacity;
    let (user_tx, mut user_rx) = mpsc::channel(capacity);
    let (transaction_tx, mut transaction_rx) = mpsc::channel(capacity);
    let (request_tx, mut request_rx) = mpsc::channel(capacity);
    let (chat_tx, mut chat_rx) = mpsc::channel(capacity);
    let (price_tx, mut price_rx) = mpsc::channel(capacity);
    let (branding_tx, mut branding_rx) = mpsc::channel(capacity);

    let mut user_service = users::UserService::new();
    let mut transaction_service = transactions::TransactionService::new();
    let mut request_service = requests::RequestService::new();
    let mut chat_service = chat::ChatService::new();
    let mut price_service = price::PriceService::new();
    let mut branding_service = branding::BrandingService::new();

    let cancel = CancellationToken::new();

    log::info!("Starting user service.");
    let user_store = store.clone();
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(user_store), &mut user_rx)
            .await;
    });

    log::info!("Starting transaction service.");
    let transaction_store = store.clone();
    tokio::spawn(async move {
        transaction_service
            .run(
                transactions::TransactionRequestHandler::new(transaction_store),
                &mut transaction_rx,
            )
            .await;
    });

    log::info!("Starting request queue service.");
    let request_store = store.clone();
    tokio::spawn(async move {
        request_service
            .run(
                requests::QueueRequestHandler::new(request_store),
                &mut request_rx,
            )
            .await;
    });

    log::info!("Starting chat service.");
    let chat_store = store.clone();
    tokio::spawn(async move {
        chat_service
            .run(chat::ChatRequestHandler::new(chat_store), &mut chat_rx)
            .await;
    });

    log::info!("Starting branding service.");
    let branding_store = store.clone();
    tokio::spawn(async move {
        branding_service
            .run(
                branding::BrandingRequestHandler::new(branding_store),
                &mut branding_rx,
            )
            .await;
    });

    log::info!("Starting price service.");
    let price_repository = PriceRepository::new(settings.rates.coingecko_url.clone(), store.clone())?;
    let max_rate_age = settings.rates.max_backoff() + settings.rates.interval();
    let price_task = price_repository.start_price_fetch_task(
        settings.rates.interval(),
        settings.rates.max_backoff(),
        cancel.clone(),
    );
    tokio::spawn(async move {
        price_service
            .run(
                price::PriceRequestHandler::new(price_repository, max_rate_age),
                &mut price_rx,
            )
            .await;
    });

    log::info!("Starting HTTP server.");
    let channels = http::Channels {
        users: user_tx,
        transactions: transaction_tx,
        requests: request_tx,
        chat: chat_tx,
        price: price_tx,
        branding: branding_tx,
    };
    let shutdown = cancel.clone();
    let server = http::start_http_server(&settings.listen_address(), channels, async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => log::info!("Shutdown requested."),
            _ = shutdown.cancelled() => {}
        }
    })
    .await;

    cancel.cancel();
    let _ = price_task.await;
    store.flush().await?;
    log::info!("Services stopped.");

    server
}
