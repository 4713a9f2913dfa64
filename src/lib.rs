//! Portcullis - authorization decisions for HTTP resources
//!
//! Policies declare, per resource type and HTTP method, which roles or
//! authorities a caller's bearer token must carry. The `authz` module holds
//! the engine and the axum guard; `web` serves the decision API.

pub mod authz;
pub mod settings;
pub mod web;
