//! Avatar API Library
//!
//! HTTP transport for the avatar pipeline: multipart upload, delete and
//! resolve endpoints plus static serving of the generated files.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod utils;
