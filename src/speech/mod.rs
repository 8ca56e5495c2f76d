//! Speech recognition module
//!
//! Streams microphone audio to a cloud recognizer and reports results as
//! [`RecognitionEvent`]s on a channel. Capture runs on a dedicated thread;
//! requests to the service run on the async runtime.

mod client;
mod microphone;
mod recognizer;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

pub use client::SpeechClient;
pub use recognizer::CloudRecognizer;

/// Why the service ended a recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    Error,
    EndOfStream,
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Error => write!(f, "Error"),
            CancellationReason::EndOfStream => write!(f, "EndOfStream"),
        }
    }
}

/// Events delivered by a recognizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// A final transcript for one phrase
    Recognized { text: String },

    /// Audio was received but no speech could be recognized
    NoMatch,

    /// The session ended; no further events follow
    Canceled {
        reason: CancellationReason,
        error_details: Option<String>,
    },
}

/// Errors that can occur while starting or stopping recognition
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech recognition is not configured")]
    NotConfigured,

    #[error("recognition is already running")]
    AlreadyListening,

    #[error("recognition is not running")]
    NotListening,

    #[error("no microphone input device available")]
    NoInputDevice,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("failed to encode audio: {0}")]
    Encode(#[from] hound::Error),

    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(String),

    #[error("speech service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("speech service returned {status}: {message}")]
    Service { status: u16, message: String },
}

/// Continuous recognition session control
pub trait Recognizer: Send {
    /// Begin streaming audio; results arrive on the recognizer's channel
    fn start_continuous(&mut self) -> Result<(), SpeechError>;

    /// Stop streaming; results still in flight are dropped
    fn stop_continuous(&mut self) -> Result<(), SpeechError>;

    /// Check if a session is currently active
    fn is_listening(&self) -> bool;
}

/// Stand-in used when no speech credentials are configured
#[derive(Debug, Default)]
pub struct Unconfigured;

impl Recognizer for Unconfigured {
    fn start_continuous(&mut self) -> Result<(), SpeechError> {
        Err(SpeechError::NotConfigured)
    }

    fn stop_continuous(&mut self) -> Result<(), SpeechError> {
        Err(SpeechError::NotListening)
    }

    fn is_listening(&self) -> bool {
        false
    }
}
