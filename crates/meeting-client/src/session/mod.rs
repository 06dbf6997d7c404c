//! Per-meeting session actor and the views it publishes.

pub mod actor;
pub mod messages;
pub mod stats;

pub use actor::{SessionActor, SessionHandle, SessionSettings, SessionViews};
pub use messages::{SessionMessage, SessionNotification};
pub use stats::{BandwidthReport, StatsCollector};
