#![forbid(unsafe_code)]

//! Interactive client for the Agent Client Protocol (ACP).
//!
//! The protocol layer (`acp`, `stream`, `tools`, `session`) depends only on
//! capability traits; `config`, `transcript` and the binary provide the
//! concrete glue.

pub mod acp;
pub mod config;
pub mod errors;
pub mod session;
pub mod stream;
pub mod tools;
pub mod transcript;

pub use config::ClientConfig;
pub use errors::{AppError, Result};
