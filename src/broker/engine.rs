//! Broker engine
//!
//! This module contains the in-memory broker implementation responsible for:
//! - owning the topic registry and creating topics lazily
//! - assigning process-wide, strictly increasing message IDs
//! - appending messages to topic history and fanning them out to subscribers
//! - collecting topics as soon as their last subscriber leaves
//!
//! Concurrency and usage notes:
//! - The public API is synchronous and takes `&self`; share the broker as an
//!   `Arc<Broker>`. No call ever waits on a subscriber.
//! - The registry sits behind a readers-writer lock. Lookups take the read
//!   lock; creation re-checks under the write lock so concurrent first use of
//!   a name yields exactly one `Topic`.
//! - ID allocation, history append and fan-out for one topic happen in a
//!   single critical section on that topic's own lock, so history order,
//!   ID order and per-subscriber delivery order agree.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::broker::message::{Message, MessageId};
use crate::broker::subscription::Subscription;
use crate::broker::topic::{SubscriberId, Topic};

#[derive(Debug)]
pub struct Broker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    sequence: AtomicI64,
    mailbox_capacity: usize,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// Number of messages a subscriber may have pending before new ones are
    /// dropped for it.
    pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

    /// Create a broker with the default mailbox capacity.
    pub fn new() -> Self {
        Self::with_mailbox_capacity(Self::DEFAULT_MAILBOX_CAPACITY)
    }

    /// Create a broker whose subscriber mailboxes hold `mailbox_capacity`
    /// messages (at least one).
    pub fn with_mailbox_capacity(mailbox_capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            sequence: AtomicI64::new(0),
            // tokio refuses zero-capacity channels
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    /// Capacity of each subscriber mailbox.
    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    /// Return the topic registered under `name`, creating it if needed.
    pub fn get_or_create_topic(&self, name: &str) -> Arc<Topic> {
        {
            let topics = self.topics.read();
            if let Some(topic) = topics.get(name) {
                return Arc::clone(topic);
            }
        }

        let mut topics = self.topics.write();
        // Another caller may have created it between the two locks.
        if let Some(topic) = topics.get(name) {
            return Arc::clone(topic);
        }

        let topic = Arc::new(Topic::new(name));
        topics.insert(name.to_string(), Arc::clone(&topic));
        debug!(topic = name, "created topic");
        topic
    }

    /// Publish `content` to `topic_name`.
    ///
    /// The topic is created if it does not exist. The message is stored in
    /// the topic history whether or not anybody is subscribed, then offered
    /// to every mailbox. A full mailbox loses the message; the publisher is
    /// never delayed.
    pub fn add_message(&self, topic_name: &str, content: impl Into<String>) -> Arc<Message> {
        let content = content.into();
        loop {
            let topic = self.get_or_create_topic(topic_name);
            let mut state = topic.write();
            if state.retired {
                // Lost a race with cleanup; the registry holds a fresh topic now.
                continue;
            }

            let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let message = Arc::new(Message::new(id, topic_name, content));
            state.messages.push(Arc::clone(&message));
            let dropped = state.broadcast(&message);

            debug!(
                topic = topic_name,
                message_id = id,
                subscribers = state.subscribers.len(),
                dropped,
                "published message"
            );
            return message;
        }
    }

    /// Open a bounded mailbox on `topic_name`.
    ///
    /// The returned `Subscription` receives every message published after
    /// this call returns, minus any dropped because the mailbox was full.
    /// Dropping it (or calling `unsubscribe`) releases the mailbox and
    /// collects the topic if nobody else is subscribed.
    pub fn subscribe(self: &Arc<Self>, topic_name: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.mailbox_capacity);
        let id = Uuid::new_v4();
        loop {
            let topic = self.get_or_create_topic(topic_name);
            let mut state = topic.write();
            if state.retired {
                continue;
            }
            state.subscribe(id, sender);
            debug!(topic = topic_name, subscriber = %id, "subscribed");
            drop(state);
            return Subscription::new(id, topic, Arc::clone(self), receiver);
        }
    }

    /// Snapshot of the history of `topic_name`, in publish order.
    pub fn get_topic_messages(&self, topic_name: &str) -> Vec<Arc<Message>> {
        self.get_or_create_topic(topic_name).messages()
    }

    /// Last ID handed out, or 0 before the first publish.
    pub fn current_sequence(&self) -> MessageId {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Whether a topic named `name` is currently registered.
    pub fn contains_topic(&self, name: &str) -> bool {
        self.topics.read().contains_key(name)
    }

    /// Number of registered topics.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Close every mailbox on every topic. Sessions reading from them see
    /// the mailbox end and wind down on their own. Returns how many
    /// mailboxes were closed.
    pub fn close_all_subscribers(&self) -> usize {
        let topics: Vec<Arc<Topic>> = self.topics.read().values().cloned().collect();
        let mut closed = 0;
        for topic in topics {
            closed += topic.write().subscribers.drain().count();
        }
        debug!(closed, "closed all subscriber mailboxes");
        closed
    }

    pub(crate) fn release(&self, topic: &Arc<Topic>, id: &SubscriberId) {
        let removed = topic.write().unsubscribe(id);
        if let Some(subscriber) = removed {
            let lifetime = Utc::now() - subscriber.joined_at;
            debug!(
                topic = %topic.name,
                subscriber = %id,
                lifetime_ms = lifetime.num_milliseconds(),
                "unsubscribed"
            );
        }
        self.cleanup_topic(topic);
    }

    /// Remove `topic` from the registry if it has no subscribers left.
    fn cleanup_topic(&self, topic: &Arc<Topic>) {
        let mut topics = self.topics.write();
        match topics.get(&topic.name) {
            // The name may already point at a newer topic; leave that one alone.
            Some(registered) if Arc::ptr_eq(registered, topic) => {}
            _ => return,
        }

        let mut state = topic.write();
        if !state.subscribers.is_empty() {
            return;
        }
        state.retired = true;
        drop(state);

        topics.remove(&topic.name);
        debug!(topic = %topic.name, "removed topic without subscribers");
    }
}
