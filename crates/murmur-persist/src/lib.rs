pub mod models;
pub mod error;
pub mod trait_client;
pub mod memory;

pub use models::{Conversation, DBMessage, MessageRole, UNTITLED};
pub use error::{PersistError, Result};
pub use trait_client::PersistenceClient;
pub use memory::InMemoryPersistenceClient;
