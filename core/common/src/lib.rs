//! Common utilities and types shared across the FinTech Pro offline pipeline.
//!
//! This module provides the error taxonomy and the request/response snapshots
//! exchanged between the transport, the cache manager and the worker
//! dispatcher.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FetchRequest, FetchResponse, HttpMethod, RequestDestination, RequestKey};
