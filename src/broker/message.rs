//! Message definitions for the broker
//!
//! `Message` is the immutable record created by the broker on every publish.
//! It is shared by reference (`Arc<Message>`) between a topic's history and
//! the mailboxes of its subscribers, so a publish never copies the content
//! more than once.
//!
//! Notes on fields:
//! - `id`: process-wide sequence number, strictly increasing across all
//!   topics, starting at 1
//! - `content`: the published body, treated as text
//! - `topic`: name of the topic the message was published to

/// Message ID as assigned by the broker's global sequence.
pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub topic: String,
}

impl Message {
    pub fn new(id: MessageId, topic: &str, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            topic: topic.to_string(),
        }
    }
}
