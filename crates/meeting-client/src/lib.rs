//! Meeting client orchestration core.
//!
//! Keeps a bounded, consistent view of a multi-party meeting while the
//! external audio/video facade delivers presence, volume, speaker, tile and
//! lifecycle callbacks:
//!
//! - `tiles`: fixed display slots for remote video tiles
//! - `roster`: per-attendee presence, volume and speaker state
//! - `audio_meter`: local microphone level
//! - `diagnostics`: session event filtering before forwarding
//! - `session`: the actor that owns the per-meeting state
//! - `lifecycle`: authenticate, join, leave and end

pub mod audio_meter;
pub mod config;
pub mod devices;
pub mod diagnostics;
pub mod errors;
pub mod facade;
pub mod lifecycle;
pub mod observability;
pub mod provisioning;
pub mod roster;
pub mod session;
pub mod tiles;

pub use config::ClientConfig;
pub use errors::ClientError;
pub use lifecycle::MeetingController;
