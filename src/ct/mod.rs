// Certificate Transparency wire support
//
// Client for the standard CT v1 HTTP API, the RFC 6962 Merkle tree leaf
// codec, and the log catalog schema with its eligibility rules.

pub mod client;
pub mod leaf;
pub mod log_list;

pub use client::{CtClient, LeafEntry, SignedTreeHead};
pub use leaf::ParsedLeaf;
pub use log_list::{EligibleLog, LogList};
