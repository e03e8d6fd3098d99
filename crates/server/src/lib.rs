//! # Authgate Server
//!
//! The runnable surfaces around [`authgate_authn`]: the HTTP auth-request
//! endpoint a reverse proxy delegates to, its command line, and the token
//! issuance tool.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cli;
pub mod issue;
pub mod server;
pub mod telemetry;

pub use api::{AppState, create_router};
pub use server::{ServerError, run};
