//! Presentation controller adapter
//!
//! Provides the session state machine over an external presentation
//! application:
//! - Unattached: no presentation known
//! - Attached: active presentation and its slide count recorded
//! - ShowRunning: a slideshow view is live
//!
//! The application itself is reached through the [`Automation`] trait.

mod automation;
mod controller;
mod osascript;

pub use automation::{Automation, PresentationInfo};
pub use controller::{ControlError, Controller, Outcome, SessionSnapshot};
pub use osascript::OsaScriptAutomation;

#[cfg(test)]
pub(crate) mod testing;
