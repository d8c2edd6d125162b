//! snatchd - IRC announce watcher and release grabber.
//!
//! Watches private-tracker announce channels over IRC, parses each
//! announcement against declarative indexer definitions, matches the
//! resulting release against operator filters, and pushes matches to a
//! download client. The binary in `main.rs` wires these modules together.

pub mod announce;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod http;
pub mod indexer;
pub mod irc;
pub mod metrics;
pub mod pipeline;
