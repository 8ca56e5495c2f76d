//! Dispatch module: the single owner of session state
//!
//! Recognition events and control requests arrive on bounded channels and
//! are handled one at a time, so the presentation session is never
//! touched concurrently.

mod dispatcher;

pub use dispatcher::{Action, ControlMessage, ControlReply, ControlRequest, Dispatcher, StatusSnapshot};
