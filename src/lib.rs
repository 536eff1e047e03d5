//! # Infocenter
//!
//! `infocenter` is a minimal, in-memory publish/subscribe service exposed over
//! HTTP. Publishers `POST` text to a named topic; subscribers `GET` the same
//! path and receive messages as a live event stream, optionally resuming
//! after the last message ID they have seen.
//!
//! ## Core Modules
//!
//! - `broker`: topic registry, message sequencing and fan-out to bounded mailboxes.
//! - `stream`: the per-connection session that replays history, forwards
//!   live messages and closes idle streams.
//! - `transport`: HTTP routes and middleware.
//! - `config`: loading and merging server configuration.
//! - `utils`: the crate error type and logging setup.

pub mod broker;
pub mod config;
pub mod stream;
pub mod transport;
pub mod utils;
