//! HTTP request handlers.

pub mod health;
pub mod meetings;
pub mod metrics;

pub use health::{health_check, server_status};
pub use meetings::{end_meeting, join_meeting};
pub use metrics::metrics_handler;
