//! Streaming session
//!
//! One `Session` serves one open event stream. It moves through three
//! phases:
//! - replaying: history newer than the client's resume marker is sent
//! - live: new messages are forwarded as they arrive, and the stream is
//!   closed once no message has been delivered for `max_idle`
//! - closed: the subscription is released, whichever way the session ended
//!
//! The mailbox is opened before the history snapshot is taken. Anything
//! published in between shows up in both; live messages whose ID is not
//! past the end of the snapshot are skipped, so nothing is lost or repeated
//! at the boundary.
//!
//! Frames are handed to a bounded `mpsc` sink owned by the transport. The
//! receiving side going away is how a client disconnect is observed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::broker::{Broker, MessageId, Subscription};
use crate::config::BrokerSettings;
use crate::stream::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Longest time a stream stays open without delivering a live message.
    pub max_idle: Duration,
    /// How often the idle timeout is checked.
    pub tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(30),
            tick: Duration::from_secs(1),
        }
    }
}

impl From<&BrokerSettings> for SessionConfig {
    fn from(settings: &BrokerSettings) -> Self {
        Self {
            max_idle: settings.max_connection_duration(),
            tick: settings.tick_interval(),
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client went away.
    Disconnected,
    /// No live message for `max_idle`; a timeout frame was sent.
    TimedOut,
    /// The broker closed the mailbox.
    MailboxClosed,
}

#[derive(Debug)]
pub struct Session {
    broker: Arc<Broker>,
    subscription: Subscription,
    resume_from: Option<MessageId>,
    config: SessionConfig,
}

impl Session {
    /// Subscribe to `topic` and prepare a session that resumes after
    /// `resume_from`, or from the start of the retained history.
    pub fn open(
        broker: Arc<Broker>,
        topic: &str,
        resume_from: Option<MessageId>,
        config: SessionConfig,
    ) -> Self {
        let subscription = broker.subscribe(topic);
        Self {
            broker,
            subscription,
            resume_from,
            config,
        }
    }

    /// Name of the topic this session streams.
    pub fn topic(&self) -> &str {
        self.subscription.topic()
    }

    /// Drive the session to completion, writing frames to `sink`.
    ///
    /// The subscription is released when this returns or when the future is
    /// dropped.
    pub async fn run(mut self, sink: mpsc::Sender<Frame>) -> SessionEnd {
        let covered = match self.replay(&sink).await {
            Some(covered) => covered,
            None => return SessionEnd::Disconnected,
        };
        let end = self.live(&sink, covered).await;
        debug!(topic = self.topic(), subscriber = %self.subscription.id(), ?end, "session closed");
        end
    }

    /// Send retained history past the resume marker. Returns the highest ID
    /// in the snapshot, or `None` if the client disconnected.
    async fn replay(&self, sink: &mpsc::Sender<Frame>) -> Option<MessageId> {
        let history = self.subscription.history();
        let covered = history.last().map_or(0, |message| message.id);

        let pending = history
            .into_iter()
            .filter(|message| self.resume_from.is_none_or(|marker| message.id > marker));

        let mut replayed = 0usize;
        for message in pending {
            sink.send(Frame::Delivery(message)).await.ok()?;
            replayed += 1;
        }

        debug!(
            topic = self.topic(),
            resume_from = ?self.resume_from,
            replayed,
            "replayed history"
        );
        Some(covered)
    }

    async fn live(&mut self, sink: &mpsc::Sender<Frame>, covered: MessageId) -> SessionEnd {
        let tick = self.config.tick;
        let mut ticker = time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                biased;

                _ = sink.closed() => return SessionEnd::Disconnected,

                received = self.subscription.recv() => {
                    let Some(message) = received else {
                        return SessionEnd::MailboxClosed;
                    };
                    if message.id <= covered {
                        // already part of the replayed snapshot
                        continue;
                    }
                    if sink.send(Frame::Delivery(message)).await.is_err() {
                        return SessionEnd::Disconnected;
                    }
                    last_activity = Instant::now();
                }

                _ = ticker.tick() => {
                    if last_activity.elapsed() >= self.config.max_idle {
                        let frame = Frame::Timeout {
                            id: self.broker.current_sequence(),
                            after: self.config.max_idle,
                        };
                        if sink.send(frame).await.is_err() {
                            return SessionEnd::Disconnected;
                        }
                        return SessionEnd::TimedOut;
                    }
                }
            }
        }
    }
}
