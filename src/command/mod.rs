//! Voice command interpretation
//!
//! Turns a recognized utterance into one navigation command:
//! - Keyword commands: start, next, back, end (substring match)
//! - Slide-index commands: the whole utterance is an integer
//! - Anything else is reported back unrecognized

mod interpreter;

pub use interpreter::{interpret, normalize, Command, Interpretation};
