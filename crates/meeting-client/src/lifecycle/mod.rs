//! Meeting lifecycle: states, controls, fault supervision and the controller
//! that drives authenticate, join, leave and end.

pub mod controller;
pub mod controls;
pub mod faults;
pub mod state;

pub use controller::{MeetingController, END_CONFIRMATION_PROMPT};
pub use controls::{ButtonStates, ControlButton, ControlPanel, ControlState, TransitionOutcome};
pub use faults::AsyncFaultMonitor;
pub use state::{Lifecycle, LifecycleState};
