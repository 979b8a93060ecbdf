use murmur_persist::PersistError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("A turn is already in progress for this conversation")]
    TurnInProgress,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Storage error: {0}")]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
