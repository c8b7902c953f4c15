//! Interception-layer context.
//!
//! Lifecycle and functional events (install, activate, fetch, sync,
//! periodicsync, push, notificationclick) are delivered to named handlers
//! registered on a single dispatcher. Host capabilities such as showing
//! notifications or focusing windows sit behind the `WorkerPlatform` trait.

pub mod dispatcher;
pub mod events;
pub mod handlers;
pub mod platform;
pub mod push;
pub mod worker;

pub use dispatcher::{Dispatcher, EventHandler};
pub use events::{EventKind, HandlerOutcome, WorkerEvent};
pub use platform::{HeadlessPlatform, PlatformAction, WindowClient, WorkerPlatform};
pub use push::{parse_push, Notification, NotificationData, NotificationOptions, PushPayload};
pub use worker::ServiceWorker;
