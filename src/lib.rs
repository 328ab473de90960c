// certstream - Real-time Certificate Transparency firehose over WebSocket

//! certstream follows the public Certificate Transparency log ecosystem in
//! near-real time and fans a unified stream of newly-logged X.509
//! certificates out to WebSocket subscribers. One follower task tracks each
//! usable CT log; a lock-light broadcaster with bounded per-subscriber
//! queues carries the serialized envelopes to the distribution server.

pub mod app;
pub mod broadcast;
pub mod config;
pub mod ct;
pub mod error;
pub mod follower;
pub mod message;
pub mod server;

// Re-export commonly used types
pub use crate::app::CertStream;
pub use crate::broadcast::{Broadcaster, Subscription};
pub use crate::config::Config;
pub use crate::error::CertStreamError;
pub use crate::message::CertMessage;

/// Result type for certstream operations
pub type Result<T> = std::result::Result<T, CertStreamError>;
