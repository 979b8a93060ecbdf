use murmur_llm::Message;
use murmur_persist::DBMessage;

use crate::templates::TITLE_PROMPT;

/// Build the model context for a new turn: the stored thread, oldest first,
/// followed by the new user message.
///
/// Assistant placeholders left empty by a failed turn carry nothing the model
/// can use, so they are dropped.
pub fn build_context(history: Vec<DBMessage>, user_text: &str) -> Vec<Message> {
    history
        .into_iter()
        .filter(|msg| msg.is_user() || !msg.content.is_empty())
        .map(Message::from)
        .chain(std::iter::once(Message::human(user_text)))
        .collect()
}

/// Messages for the title request: the first exchange, then the title prompt.
pub fn title_context(user_text: &str, reply: &str) -> Vec<Message> {
    vec![
        Message::human(user_text),
        Message::ai(reply),
        Message::human(TITLE_PROMPT),
    ]
}
