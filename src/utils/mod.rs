//! The `utils` module provides the pieces shared across the `infocenter`
//! application: the crate error type and logging setup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
