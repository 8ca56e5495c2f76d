//! Feedback module for the display surface
//!
//! Provides structured feedback values for recognized phrases, action
//! outcomes and recognition session changes. The `Display` form is the
//! text shown to the user.

use serde::{Deserialize, Serialize};

use crate::speech::CancellationReason;

/// Feedback published by the dispatcher after each handled message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feedback {
    /// A normalized phrase was recognized
    Phrase { text: String },

    /// The phrase matched neither a keyword nor a slide number
    Unrecognized { text: String },

    /// The service heard audio but no speech
    NoSpeech,

    /// An action completed
    Completed { message: String },

    /// An action did not happen
    Failed { message: String },

    /// The service ended recognition with an error
    RecognitionCanceled {
        reason: CancellationReason,
        details: Option<String>,
    },

    ListeningStarted,

    ListeningStopped,
}

impl Feedback {
    /// Whether this feedback reports a problem
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Feedback::Failed { .. } | Feedback::RecognitionCanceled { .. }
        )
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feedback::Phrase { text } => write!(f, "{}", text),
            Feedback::Unrecognized { text } => write!(
                f,
                "Recognized phrase: `{}` doesn't match any predefined patterns",
                text
            ),
            Feedback::NoSpeech => write!(f, "No speech recognized."),
            Feedback::Completed { message } => write!(f, "{}", message),
            Feedback::Failed { message } => write!(f, "Error: {}", message),
            Feedback::RecognitionCanceled { reason, details } => write!(
                f,
                "Recognition canceled. Reason: {}\nError Details: {}",
                reason,
                details.as_deref().unwrap_or("none")
            ),
            Feedback::ListeningStarted => write!(f, "Listening..."),
            Feedback::ListeningStopped => write!(f, "Stopped listening."),
        }
    }
}
