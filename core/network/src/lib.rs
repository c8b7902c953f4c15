//! Network access and connectivity signals.
//!
//! This module provides:
//! - A `Transport` trait for outbound requests, with a reqwest-backed HTTP
//!   transport and an in-memory transport for tests and simulations
//! - A connectivity monitor publishing the offline flag and a best-effort
//!   network quality class
//! - Device profiling used to adapt asset quality to the connection

pub mod connectivity;
pub mod device;
pub mod http;
pub mod memory;
pub mod transport;

pub use connectivity::{
    classify, format_speed, ConnectivityMonitor, ConnectivityState, EffectiveType,
    LatencyClass, NetworkInfo, NetworkQuality, RestoredEvents,
};
pub use device::{DeviceClass, DeviceProfile, Orientation};
pub use http::HttpTransport;
pub use memory::{MemoryTransport, Reply};
pub use transport::{resolve_url, Transport};
