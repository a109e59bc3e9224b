//! REST client for the visibility backend.
//!
//! [`BackendClient`] implements [`aivis_engine::VisibilityBackend`] over JSON
//! HTTP with an optional bearer token. It never retries; failures are
//! classified into [`aivis_engine::PortError`] and left to the engine's
//! caller.

pub mod client;
pub mod error;

pub use client::BackendClient;
pub use error::ClientError;
