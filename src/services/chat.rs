use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::chat::{ChatMessage, NewChatMessage};
use crate::repositories::chat::ChatRepository;
use crate::repositories::{Store, StoreError};

type Response<T> = oneshot::Sender<Result<T, ServiceError>>;

pub enum ChatRequest {
    Messages {
        response: Response<Vec<ChatMessage>>,
    },
    Send {
        message: NewChatMessage,
        response: Response<ChatMessage>,
    },
    Clear {
        response: Response<()>,
    },
    MarkRead {
        user_id: Option<String>,
        response: Response<usize>,
    },
    GetMeta {
        conversation: String,
        response: Response<Map<String, Value>>,
    },
    SetMeta {
        conversation: String,
        meta: Map<String, Value>,
        response: Response<Map<String, Value>>,
    },
}

#[derive(Clone)]
pub struct ChatRequestHandler {
    repository: ChatRepository,
}

impl ChatRequestHandler {
    pub fn new(store: Store) -> Self {
        ChatRequestHandler {
            repository: ChatRepository::new(store),
        }
    }

    fn map_err(e: StoreError) -> ServiceError {
        ServiceError::from_store("Chat", e)
    }
}

#[async_trait]
impl RequestHandler<ChatRequest> for ChatRequestHandler {
    async fn handle_request(&self, request: ChatRequest) {
        match request {
            ChatRequest::Messages { response } => {
                let _ = response.send(self.repository.messages().map_err(Self::map_err));
            }
            ChatRequest::Send { message, response } => {
                let _ = response.send(self.repository.send(message).map_err(Self::map_err));
            }
            ChatRequest::Clear { response } => {
                let _ = response.send(self.repository.clear().map_err(Self::map_err));
            }
            ChatRequest::MarkRead { user_id, response } => {
                let result = self.repository.mark_read(user_id.as_deref());
                let _ = response.send(result.map_err(Self::map_err));
            }
            ChatRequest::GetMeta {
                conversation,
                response,
            } => {
                let result = self.repository.conversation_meta(&conversation);
                let _ = response.send(result.map_err(Self::map_err));
            }
            ChatRequest::SetMeta {
                conversation,
                meta,
                response,
            } => {
                let result = self.repository.set_conversation_meta(&conversation, meta);
                let _ = response.send(result.map_err(Self::map_err));
            }
        }
    }
}

pub struct ChatService;

impl ChatService {
    pub fn new() -> Self {
        ChatService {}
    }
}

#[async_trait]
impl Service<ChatRequest, ChatRequestHandler> for ChatService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Sender;
    use crate::repositories::test_support::create_test_store;

    #[tokio::test]
    async fn test_service_loop_answers_requests() {
        let (store, _temp) = create_test_store();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);

        tokio::spawn(async move {
            ChatService::new()
                .run(ChatRequestHandler::new(store), &mut rx)
                .await;
        });

        let (response, reply) = oneshot::channel();
        tx.send(ChatRequest::Send {
            message: NewChatMessage {
                user_id: Some("u_1".to_string()),
                sender: Sender::User,
                text: "hello".to_string(),
                attachment: None,
            },
            response,
        })
        .await
        .unwrap();
        reply.await.unwrap().unwrap();

        let (response, reply) = oneshot::channel();
        tx.send(ChatRequest::MarkRead {
            user_id: Some("u_1".to_string()),
            response,
        })
        .await
        .unwrap();
        assert_eq!(reply.await.unwrap().unwrap(), 1);

        let (response, reply) = oneshot::channel();
        tx.send(ChatRequest::Send {
            message: NewChatMessage {
                user_id: None,
                sender: Sender::User,
                text: "  ".to_string(),
                attachment: None,
            },
            response,
        })
        .await
        .unwrap();
        assert!(matches!(
            reply.await.unwrap(),
            Err(ServiceError::ValidationFailed(_))
        ));
    }
}
