pub mod engine;
pub mod message;
pub mod subscription;
pub mod topic;

pub use engine::Broker;
pub use message::{Message, MessageId};
pub use subscription::Subscription;

#[cfg(test)]
mod tests;
