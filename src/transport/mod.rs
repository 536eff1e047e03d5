//! The `transport` module is responsible for handling network communication
//! with clients over HTTP.
//!
//! It defines the routes and middleware, turns stream requests into
//! sessions and publish requests into broker calls.

pub mod http;
pub mod layers;

pub use http::{AppState, router, serve};
pub use layers::Cors;
