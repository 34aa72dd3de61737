//! Session state tracking.

mod state_machine;

pub use state_machine::SessionStateMachine;
