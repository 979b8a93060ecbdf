use std::sync::Arc;

use futures::StreamExt;
use murmur_llm::{ChatClient, ChatOptions, ChatRequest, DecodeError, StreamEvent, DEFAULT_MODEL};
use murmur_persist::{Conversation, DBMessage, PersistenceClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::accumulator::TurnAccumulator;
use crate::context::build_context;
use crate::error::{ChatError, Result};
use crate::title::TitleGenerator;

/// Progress of a turn, for front-ends that render the reply as it streams
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Started { message_id: String },
    Delta { content: String },
    /// Always sent once a turn has started, `error` set when the reply or its
    /// storage failed
    Completed { message_id: String, error: Option<String> },
}

pub type EventSender = mpsc::Sender<TurnEvent>;

#[derive(Debug)]
pub struct TurnOutcome {
    pub user_message_id: String,
    pub assistant_message_id: String,
    /// Reply text as persisted; partial if the stream failed
    pub text: String,
    pub fragments: usize,
    pub finish_reason: Option<String>,
    pub error: Option<DecodeError>,
    /// Background title generation, present after a conversation's first turn
    pub title_task: Option<JoinHandle<()>>,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One open conversation and the turns sent into it
pub struct ChatSession {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn PersistenceClient>,
    conversation_id: String,
    model: String,
    options: ChatOptions,
    events: Option<EventSender>,
}

impl ChatSession {
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn PersistenceClient>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            conversation_id: conversation_id.into(),
            model: DEFAULT_MODEL.to_string(),
            options: ChatOptions::default(),
            events: None,
        }
    }

    /// Create a fresh conversation and open a session on it
    pub async fn start(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn PersistenceClient>,
    ) -> Result<Self> {
        let conversation = store.create_conversation().await?;
        tracing::info!(conversation_id = %conversation.id, "Started conversation");
        Ok(Self::new(client, store, conversation.id))
    }

    /// Open a session on an existing conversation
    pub async fn open(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn PersistenceClient>,
        conversation_id: &str,
    ) -> Result<Self> {
        match store.get_conversation(conversation_id).await? {
            Some(conversation) => Ok(Self::new(client, store, conversation.id)),
            None => Err(ChatError::ConversationNotFound(conversation_id.to_string())),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether any session on this store is running a turn in this conversation
    pub fn is_busy(&self) -> bool {
        self.store.turn_in_progress(&self.conversation_id)
    }

    pub async fn conversation(&self) -> Result<Conversation> {
        self.store
            .get_conversation(&self.conversation_id)
            .await?
            .ok_or_else(|| ChatError::ConversationNotFound(self.conversation_id.clone()))
    }

    pub async fn history(&self) -> Result<Vec<DBMessage>> {
        Ok(self.store.get_messages(&self.conversation_id).await?)
    }

    /// Send a user message and stream the assistant reply into the store.
    ///
    /// Stream failures do not fail the turn: the partial reply stays persisted
    /// and the outcome carries the error. Storage failures abort the turn.
    pub async fn send_message(&self, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let _guard = TurnGuard::acquire(self.store.clone(), &self.conversation_id)?;

        let history = self.store.get_messages(&self.conversation_id).await?;
        let is_first_turn = history.is_empty();
        let context = build_context(history, text);

        let user_message = DBMessage::user(&self.conversation_id, text);
        let user_message_id = user_message.id.clone();
        self.store.save_message(user_message).await?;

        let assistant_message = DBMessage::assistant(&self.conversation_id, "");
        let assistant_message_id = assistant_message.id.clone();
        self.store.save_message(assistant_message).await?;

        tracing::info!(
            conversation_id = %self.conversation_id,
            model = %self.model,
            context_len = context.len(),
            "Sending turn"
        );
        self.emit(TurnEvent::Started {
            message_id: assistant_message_id.clone(),
        })
        .await;

        let request = ChatRequest::new(self.model.clone(), context).with_options(self.options.clone());
        let mut acc = TurnAccumulator::new();
        let mut finish_reason = None;
        let mut error = None;

        match self.client.chat_stream(request).await {
            Ok(mut stream) => {
                while let Some(event) = stream.next().await {
                    match event {
                        Ok(StreamEvent::Message { content }) => {
                            acc.push(&content);
                            if let Err(e) = self
                                .store
                                .append_to_message(&self.conversation_id, &assistant_message_id, &content)
                                .await
                            {
                                tracing::error!(
                                    conversation_id = %self.conversation_id,
                                    message_id = %assistant_message_id,
                                    error = %e,
                                    "Failed to store reply fragment"
                                );
                                self.emit(TurnEvent::Completed {
                                    message_id: assistant_message_id.clone(),
                                    error: Some(e.to_string()),
                                })
                                .await;
                                return Err(e.into());
                            }
                            self.emit(TurnEvent::Delta { content }).await;
                        }
                        Ok(StreamEvent::Done { finish_reason: reason }) => {
                            finish_reason = reason;
                            break;
                        }
                        Err(e) => {
                            error = Some(to_decode_error(e));
                            break;
                        }
                    }
                }
            }
            Err(e) => error = Some(to_decode_error(e)),
        }

        if let Some(e) = &error {
            tracing::warn!(
                conversation_id = %self.conversation_id,
                fragments = acc.fragments(),
                error = %e,
                "Reply stream failed; keeping partial text"
            );
        } else {
            tracing::info!(
                conversation_id = %self.conversation_id,
                fragments = acc.fragments(),
                elapsed_ms = acc.elapsed().as_millis() as u64,
                first_fragment_ms = acc.first_fragment_latency().map(|d| d.as_millis() as u64),
                "Turn completed"
            );
        }

        self.emit(TurnEvent::Completed {
            message_id: assistant_message_id.clone(),
            error: error.as_ref().map(ToString::to_string),
        })
        .await;

        let fragments = acc.fragments();
        let reply = acc.into_text();

        let title_task = if is_first_turn && !reply.is_empty() {
            Some(self.spawn_title(text.to_string(), reply.clone()))
        } else {
            None
        };

        Ok(TurnOutcome {
            user_message_id,
            assistant_message_id,
            text: reply,
            fragments,
            finish_reason,
            error,
            title_task,
        })
    }

    fn spawn_title(&self, user_text: String, reply: String) -> JoinHandle<()> {
        let generator = TitleGenerator::new(self.client.clone(), self.store.clone(), self.model.clone());
        let conversation_id = self.conversation_id.clone();
        tokio::spawn(async move {
            generator.apply(&conversation_id, &user_text, &reply).await;
        })
    }

    async fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).await.is_err() {
                tracing::trace!("Turn event receiver dropped");
            }
        }
    }
}

/// Holds the store's running-turn mark on a conversation for one turn
struct TurnGuard {
    store: Arc<dyn PersistenceClient>,
    conversation_id: String,
}

impl TurnGuard {
    fn acquire(store: Arc<dyn PersistenceClient>, conversation_id: &str) -> Result<Self> {
        if !store.try_begin_turn(conversation_id)? {
            return Err(ChatError::TurnInProgress);
        }
        Ok(Self {
            store,
            conversation_id: conversation_id.to_string(),
        })
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.store.end_turn(&self.conversation_id);
    }
}

fn to_decode_error(e: anyhow::Error) -> DecodeError {
    match e.downcast::<DecodeError>() {
        Ok(decode) => decode,
        Err(other) => DecodeError::Transport(format!("{:#}", other)),
    }
}
