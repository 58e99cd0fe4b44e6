//! devboard - project activity dashboard backend for coding agents.
//!
//! Two cores over a SQLite persistence gateway: the execution tracker
//! (which task is being worked on, by which session, with cross-session
//! exclusivity) and the git importer (sessions, commit events, file
//! changes, tag milestones, and daily aggregates reconstructed from a
//! repository log). Both return domain events for an injected broadcast
//! registry instead of talking to a transport themselves.

pub mod broadcast;
pub mod config;
pub mod domain;
pub mod error;
pub mod importer;
pub mod store;
pub mod tracker;

pub use broadcast::Broadcaster;
pub use error::{Error, Result};
pub use importer::{GitImporter, ImportRequest, ImportSummary};
pub use store::Store;
pub use tracker::{StopOutcome, Tracker};
