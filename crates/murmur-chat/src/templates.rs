/// Appended after the first exchange to ask the model for a conversation title
pub const TITLE_PROMPT: &str = "Based on the messages, give me a 3 word title for this chat and do not add quotes around the title. Just the title";
