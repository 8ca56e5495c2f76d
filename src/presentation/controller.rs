//! Session state machine and navigation operations
//!
//! Handles transitions between Unattached, Attached and ShowRunning based
//! on explicit user actions and on what the application reports back.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::automation::{Automation, AutomationError, PresentationInfo};

/// The three possible states of a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No presentation attached
    #[default]
    Unattached,
    /// Presentation known, no slideshow running
    Attached(PresentationInfo),
    /// Slideshow view is live
    ShowRunning(PresentationInfo),
}

impl SessionState {
    /// The attached presentation, if any
    pub fn presentation(&self) -> Option<&PresentationInfo> {
        match self {
            SessionState::Unattached => None,
            SessionState::Attached(info) | SessionState::ShowRunning(info) => Some(info),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unattached => write!(f, "Unattached"),
            SessionState::Attached(_) => write!(f, "Attached"),
            SessionState::ShowRunning(_) => write!(f, "ShowRunning"),
        }
    }
}

/// Read-only view of the session handed out to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Name of the attached presentation
    pub presentation: Option<String>,
    /// Slide count of the attached presentation, 0 when unattached
    pub slide_count: u32,
    /// Whether a slideshow view is recorded as live
    pub show_running: bool,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            presentation: state.presentation().map(|p| p.name.clone()),
            slide_count: state.presentation().map(|p| p.slide_count).unwrap_or(0),
            show_running: matches!(state, SessionState::ShowRunning(_)),
        }
    }
}

/// What a successful operation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Attached(PresentationInfo),
    ShowStarted,
    ShowEnded,
    /// `stop` was called without a running slideshow
    NoShowToEnd,
    MovedTo(u32),
    MovedNext,
    MovedPrevious,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Attached(info) => write!(
                f,
                "Attached to \"{}\" ({} slides)",
                info.name, info.slide_count
            ),
            Outcome::ShowStarted => write!(f, "Slide show started"),
            Outcome::ShowEnded => write!(f, "Slide show ended"),
            Outcome::NoShowToEnd => write!(f, "No slide show to end"),
            Outcome::MovedTo(slide) => write!(f, "Moved to slide {}", slide),
            Outcome::MovedNext => write!(f, "Next slide"),
            Outcome::MovedPrevious => write!(f, "Previous slide"),
        }
    }
}

/// Why an operation did not happen
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("presentation application was not detected")]
    NotDetected,

    #[error("no active presentation detected")]
    NoPresentation,

    #[error("no slide show detected")]
    NoSlideShow,

    #[error("slide number {slide} is out of range")]
    SlideOutOfRange { slide: i64, slide_count: u32 },

    #[error("{0}")]
    Automation(String),
}

/// Adapter issuing navigation calls to the presentation application
pub struct Controller<A> {
    automation: A,
    state: SessionState,
}

impl<A: Automation> Controller<A> {
    /// Create an unattached controller
    pub fn new(automation: A) -> Self {
        Self {
            automation,
            state: SessionState::Unattached,
        }
    }

    /// Get the current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Immutable copy of the session for display and interpretation
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&self.state)
    }

    /// Locate the running application and record its active presentation
    pub async fn attach(&mut self) -> Result<Outcome, ControlError> {
        let info = match self.automation.active_presentation().await {
            Ok(info) => info,
            Err(e) => return Err(self.fail(e)),
        };

        let show_running = match self.automation.slide_show_running().await {
            Ok(running) => running,
            Err(e) => return Err(self.fail(e)),
        };

        info!(
            name = %info.name,
            slide_count = info.slide_count,
            show_running,
            "attached to presentation"
        );

        self.transition_to(if show_running {
            SessionState::ShowRunning(info.clone())
        } else {
            SessionState::Attached(info.clone())
        });

        Ok(Outcome::Attached(info))
    }

    /// Start slideshow playback, attaching first when nothing is attached
    pub async fn start(&mut self) -> Result<Outcome, ControlError> {
        if self.state == SessionState::Unattached {
            self.attach().await?;
        }

        let info = self
            .state
            .presentation()
            .cloned()
            .ok_or(ControlError::NoPresentation)?;

        if let Err(e) = self.automation.run_slide_show().await {
            return Err(self.fail(e));
        }

        self.transition_to(SessionState::ShowRunning(info));
        Ok(Outcome::ShowStarted)
    }

    /// End playback if a slideshow is recorded as running
    pub async fn stop(&mut self) -> Result<Outcome, ControlError> {
        let info = match &self.state {
            SessionState::ShowRunning(info) => info.clone(),
            _ => {
                debug!("stop requested without a running slide show");
                return Ok(Outcome::NoShowToEnd);
            }
        };

        if let Err(e) = self.automation.exit_slide_show().await {
            return Err(self.fail(e));
        }

        self.transition_to(SessionState::Attached(info));
        Ok(Outcome::ShowEnded)
    }

    /// Jump to an absolute, 1-based slide
    pub async fn go_to_slide(&mut self, slide: i64) -> Result<Outcome, ControlError> {
        let slide_count = self
            .state
            .presentation()
            .map(|p| p.slide_count)
            .ok_or(ControlError::NoPresentation)?;

        if slide < 1 || slide > i64::from(slide_count) {
            return Err(ControlError::SlideOutOfRange { slide, slide_count });
        }
        // Bounded by slide_count above.
        let index = slide as u32;

        self.require_show().await?;

        if let Err(e) = self.automation.go_to_slide(index).await {
            return Err(self.fail(e));
        }
        Ok(Outcome::MovedTo(index))
    }

    /// Advance the running slideshow by one slide
    pub async fn next(&mut self) -> Result<Outcome, ControlError> {
        self.require_show().await?;

        if let Err(e) = self.automation.next_slide().await {
            return Err(self.fail(e));
        }
        Ok(Outcome::MovedNext)
    }

    /// Step the running slideshow back by one slide
    pub async fn previous(&mut self) -> Result<Outcome, ControlError> {
        self.require_show().await?;

        if let Err(e) = self.automation.previous_slide().await {
            return Err(self.fail(e));
        }
        Ok(Outcome::MovedPrevious)
    }

    /// Check with the application that a slideshow is live
    ///
    /// Fails without any external call when nothing is attached.
    async fn require_show(&mut self) -> Result<(), ControlError> {
        let info = self
            .state
            .presentation()
            .cloned()
            .ok_or(ControlError::NoPresentation)?;

        match self.automation.slide_show_running().await {
            Ok(true) => {
                self.transition_to(SessionState::ShowRunning(info));
                Ok(())
            }
            Ok(false) => {
                self.transition_to(SessionState::Attached(info));
                Err(ControlError::NoSlideShow)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Map an automation failure, dropping session state it invalidates
    fn fail(&mut self, error: AutomationError) -> ControlError {
        warn!(%error, state = %self.state, "automation call failed");

        match error {
            AutomationError::NotRunning => {
                self.transition_to(SessionState::Unattached);
                ControlError::NotDetected
            }
            AutomationError::NoPresentation => {
                self.transition_to(SessionState::Unattached);
                ControlError::NoPresentation
            }
            AutomationError::Call(message) => ControlError::Automation(message),
        }
    }

    fn transition_to(&mut self, new_state: SessionState) {
        if self.state != new_state {
            info!(from = %self.state, to = %new_state, "session transition");
        }
        self.state = new_state;
    }
}
