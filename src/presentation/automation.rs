//! Automation interface of the presentation application

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The presentation the application reports as active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationInfo {
    /// Document name as shown by the application
    pub name: String,
    /// Number of slides, used for bounds checking
    pub slide_count: u32,
}

/// Failures reported by the automation backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    #[error("application is not running")]
    NotRunning,

    #[error("application has no active presentation")]
    NoPresentation,

    #[error("{0}")]
    Call(String),
}

/// Operations the controller needs from the presentation application
///
/// Slide indices are 1-based. Every call goes to the live application;
/// implementations hold no session state of their own.
#[async_trait]
pub trait Automation: Send {
    /// Find the running application and read its active presentation
    async fn active_presentation(&mut self) -> Result<PresentationInfo, AutomationError>;

    /// Start slideshow playback of the active presentation
    async fn run_slide_show(&mut self) -> Result<(), AutomationError>;

    /// Whether a slideshow window is currently open
    async fn slide_show_running(&mut self) -> Result<bool, AutomationError>;

    /// End playback of the running slideshow
    async fn exit_slide_show(&mut self) -> Result<(), AutomationError>;

    /// Jump the running slideshow to an absolute slide
    async fn go_to_slide(&mut self, index: u32) -> Result<(), AutomationError>;

    async fn next_slide(&mut self) -> Result<(), AutomationError>;

    async fn previous_slide(&mut self) -> Result<(), AutomationError>;
}
