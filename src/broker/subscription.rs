//! Subscriber handle
//!
//! A `Subscription` owns the receiving half of one mailbox. It is released
//! exactly once, either through `unsubscribe` or when it is dropped, so the
//! broker's bookkeeping is restored on every exit path of its owner,
//! including task cancellation.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::broker::engine::Broker;
use crate::broker::message::Message;
use crate::broker::topic::{SubscriberId, Topic};

#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    topic: Arc<Topic>,
    broker: Arc<Broker>,
    receiver: mpsc::Receiver<Arc<Message>>,
    released: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        topic: Arc<Topic>,
        broker: Arc<Broker>,
        receiver: mpsc::Receiver<Arc<Message>>,
    ) -> Self {
        Self {
            id,
            topic,
            broker,
            receiver,
            released: false,
        }
    }

    /// Identifier of this mailbox within its topic.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Name of the topic this mailbox is attached to.
    pub fn topic(&self) -> &str {
        &self.topic.name
    }

    /// Snapshot of the retained history of the topic this mailbox is
    /// attached to. Reading through the held topic never recreates a
    /// topic that has since been collected.
    pub fn history(&self) -> Vec<Arc<Message>> {
        self.topic.messages()
    }

    /// Wait for the next message. `None` means the mailbox was closed.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }

    /// Take the next message without waiting.
    pub fn try_recv(&mut self) -> Result<Arc<Message>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Release the mailbox now instead of on drop.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.receiver.close();
        self.broker.release(&self.topic, &self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
