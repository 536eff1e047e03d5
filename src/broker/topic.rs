//! Topic management
//!
//! A `Topic` holds the subscriber mailboxes and the retained message history
//! for one topic name. Each topic carries its own readers-writer lock, so
//! traffic on different topics never contends.
//!
//! Concurrency note: the engine only nests locks in one order, registry
//! first and topic second. Code holding a topic lock must never try to take
//! the registry lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use crate::broker::message::Message;

pub type SubscriberId = Uuid;

/// Sending half of a subscriber's bounded mailbox, plus when it joined.
#[derive(Debug)]
pub struct Subscriber {
    pub sender: mpsc::Sender<Arc<Message>>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TopicState {
    pub subscribers: HashMap<SubscriberId, Subscriber>,
    pub messages: Vec<Arc<Message>>,
    /// Set once the topic has been removed from the registry. A retired
    /// topic must not accept messages or subscribers.
    pub(crate) retired: bool,
}

impl TopicState {
    /// Register a mailbox under `id`.
    pub fn subscribe(&mut self, id: SubscriberId, sender: mpsc::Sender<Arc<Message>>) {
        self.subscribers.insert(
            id,
            Subscriber {
                sender,
                joined_at: Utc::now(),
            },
        );
    }

    /// Remove a mailbox. Dropping the returned entry closes the mailbox.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> Option<Subscriber> {
        self.subscribers.remove(id)
    }

    /// Offer `msg` to every mailbox without waiting. Returns how many
    /// subscribers missed it because their mailbox was full.
    pub fn broadcast(&self, msg: &Arc<Message>) -> usize {
        let mut dropped = 0;
        for (id, subscriber) in &self.subscribers {
            match subscriber.sender.try_send(Arc::clone(msg)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    debug!(subscriber = %id, message_id = msg.id, "mailbox full, dropping message");
                }
                // The reader already went away; its unsubscribe is on the way.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        dropped
    }
}

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    state: RwLock<TopicState>,
}

impl Topic {
    /// Create a new, empty topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(TopicState::default()),
        }
    }

    /// Number of open mailboxes on this topic.
    pub fn subscriber_count(&self) -> usize {
        self.state.read().subscribers.len()
    }

    /// Snapshot of the retained history, in publish order.
    pub fn messages(&self) -> Vec<Arc<Message>> {
        self.state.read().messages.clone()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TopicState> {
        self.state.write()
    }
}
