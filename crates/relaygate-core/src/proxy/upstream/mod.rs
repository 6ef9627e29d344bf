//! Upstream module - reqwest transport shared by chat and session calls

pub mod client;

pub use client::{build_http_client, UpstreamClient};
