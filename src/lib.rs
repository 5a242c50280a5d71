//! Client-side data synchronization for the security scanning dashboard.
//!
//! Reads go through a keyed [`cache::QueryCache`] that coalesces concurrent
//! requests, mutations invalidate the keys they affect, and a
//! [`poller::LivePoller`] keeps an in-progress scan fresh until it finishes.
//! [`ScanboardClient`] wires the pieces together.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod logging;
pub mod models;
pub mod mutations;
pub mod notify;
pub mod poller;
pub mod summary;

pub use dashboard::ScanboardClient;
pub use errors::{ClientError, ErrorClassification};
