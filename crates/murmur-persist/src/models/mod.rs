mod db_message;
mod conversation;

// Export storage-agnostic models
pub use db_message::{DBMessage, MessageRole};
pub use conversation::{Conversation, UNTITLED};
