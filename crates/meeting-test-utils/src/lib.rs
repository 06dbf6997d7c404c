//! # Meeting Client Test Utilities
//!
//! Mocks and fixtures for exercising the meeting client without a media
//! engine or a provisioning service.
//!
//! ## Modules
//!
//! - `mock_facade` - scriptable audio/video facade that records every call
//! - `mock_provisioning` - in-memory provisioning client with call counters
//! - `mock_sink` - diagnostic sink that keeps forwarded events
//! - `waveform` - scripted waveform source for the audio meter
//! - `fixtures` - join responses, identifiers and client configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meeting_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let facade = MockFacade::new();
//!     let provisioning = MockProvisioning::new();
//!     let controller = MeetingController::new(
//!         test_config(),
//!         Arc::new(provisioning.clone()),
//!         Arc::new(facade.clone()),
//!         Arc::new(RecordingSink::new()),
//!     );
//!
//!     controller.authenticate("standup", "Alice").await.unwrap();
//!     facade.emit_presence(&attendee("a1"), true, "0a1b2c3d#Bob", false);
//! }
//! ```

pub mod fixtures;
pub mod mock_facade;
pub mod mock_provisioning;
pub mod mock_sink;
pub mod waveform;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_facade::*;
pub use mock_provisioning::*;
pub use mock_sink::*;
pub use waveform::*;
