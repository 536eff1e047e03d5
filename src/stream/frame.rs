//! Event-stream frames
//!
//! A session emits two kinds of frames: one per delivered message and a
//! single timeout notice before it gives up on an idle stream.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::broker::{Message, MessageId};

pub const DELIVERY_EVENT: &str = "msg";
pub const TIMEOUT_EVENT: &str = "timeout";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Delivery(Arc<Message>),
    /// `id` is the broker's sequence value when the timeout fired, not the
    /// ID of any real message.
    Timeout { id: MessageId, after: Duration },
}

impl Frame {
    pub fn id(&self) -> MessageId {
        match self {
            Frame::Delivery(message) => message.id,
            Frame::Timeout { id, .. } => *id,
        }
    }

    pub fn event(&self) -> &'static str {
        match self {
            Frame::Delivery(_) => DELIVERY_EVENT,
            Frame::Timeout { .. } => TIMEOUT_EVENT,
        }
    }

    pub fn encode(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id: {}", self.id())?;
        writeln!(f, "event: {}", self.event())?;
        match self {
            Frame::Delivery(message) => write_data(f, &message.content)?,
            Frame::Timeout { after, .. } => writeln!(f, "data: {}s", after.as_secs())?,
        }
        // blank line ends the event
        writeln!(f)
    }
}

/// Each line of `data` gets its own `data:` field so embedded line breaks
/// cannot end the event early.
fn write_data(f: &mut fmt::Formatter<'_>, data: &str) -> fmt::Result {
    let mut rest = data;
    loop {
        match rest.find(['\r', '\n']) {
            Some(pos) => {
                writeln!(f, "data: {}", &rest[..pos])?;
                let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[pos + skip..];
            }
            None => return writeln!(f, "data: {rest}"),
        }
    }
}
