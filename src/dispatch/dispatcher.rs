//! Dispatcher loop
//!
//! Normalizes and interprets recognized phrases, runs user actions and
//! publishes feedback for every message it handles.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::command::{interpret, normalize, Command, Interpretation};
use crate::events::Feedback;
use crate::presentation::{Automation, ControlError, Controller, Outcome, SessionSnapshot};
use crate::speech::{CancellationReason, RecognitionEvent, Recognizer};

/// The seven actions offered on the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Attach,
    Start,
    Stop,
    Next,
    Previous,
    StartListening,
    StopListening,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Attach => write!(f, "attach"),
            Action::Start => write!(f, "start"),
            Action::Stop => write!(f, "stop"),
            Action::Next => write!(f, "next"),
            Action::Previous => write!(f, "previous"),
            Action::StartListening => write!(f, "start_listening"),
            Action::StopListening => write!(f, "stop_listening"),
        }
    }
}

/// What a control client asks the dispatcher to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Action(Action),
    /// Handle text as if the recognizer had produced it
    Say(String),
    Status,
}

/// Session and listening state reported to control clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session: SessionSnapshot,
    pub listening: bool,
}

/// Answer to a [`ControlRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    Feedback(Feedback),
    Status(StatusSnapshot),
}

/// A control message paired with its reply channel
#[derive(Debug)]
pub struct ControlRequest {
    pub message: ControlMessage,
    pub reply: oneshot::Sender<ControlReply>,
}

impl ControlRequest {
    pub fn new(message: ControlMessage) -> (Self, oneshot::Receiver<ControlReply>) {
        let (reply, rx) = oneshot::channel();
        (Self { message, reply }, rx)
    }
}

/// Single consumer of recognition events and control requests
pub struct Dispatcher<A> {
    controller: Controller<A>,
    recognizer: Box<dyn Recognizer>,
    feedback_tx: broadcast::Sender<Feedback>,
}

impl<A: Automation> Dispatcher<A> {
    /// Create a new dispatcher
    pub fn new(
        controller: Controller<A>,
        recognizer: Box<dyn Recognizer>,
        feedback_tx: broadcast::Sender<Feedback>,
    ) -> Self {
        Self {
            controller,
            recognizer,
            feedback_tx,
        }
    }

    /// Current session and listening state
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            session: self.controller.snapshot(),
            listening: self.recognizer.is_listening(),
        }
    }

    /// Run the dispatcher until both channels close
    pub async fn run(
        &mut self,
        mut control_rx: mpsc::Receiver<ControlRequest>,
        mut recognition_rx: mpsc::Receiver<RecognitionEvent>,
    ) {
        info!("dispatcher started");

        loop {
            tokio::select! {
                Some(request) = control_rx.recv() => {
                    let reply = self.handle_control(request.message).await;
                    if request.reply.send(reply).is_err() {
                        debug!("control client went away before the reply");
                    }
                }
                Some(event) = recognition_rx.recv() => {
                    self.handle_recognition(event).await;
                }
                else => break,
            }
        }

        self.shutdown();
        info!("dispatcher stopped");
    }

    /// Stop an active recognition session
    pub fn shutdown(&mut self) {
        if self.recognizer.is_listening() {
            if let Err(e) = self.recognizer.stop_continuous() {
                warn!(%e, "failed to stop recognition");
            }
        }
    }

    /// Handle one control message
    pub async fn handle_control(&mut self, message: ControlMessage) -> ControlReply {
        match message {
            ControlMessage::Action(action) => ControlReply::Feedback(self.handle_action(action).await),
            ControlMessage::Say(text) => ControlReply::Feedback(self.handle_utterance(&text).await),
            ControlMessage::Status => ControlReply::Status(self.status()),
        }
    }

    /// Handle one event from the recognizer
    pub async fn handle_recognition(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Recognized { text } => {
                self.handle_utterance(&text).await;
            }
            RecognitionEvent::NoMatch => {
                self.publish(Feedback::NoSpeech);
            }
            RecognitionEvent::Canceled {
                reason: CancellationReason::Error,
                error_details,
            } => {
                warn!(?error_details, "recognition canceled by service");
                // No automatic restart: the user starts listening again.
                self.shutdown();
                self.publish(Feedback::RecognitionCanceled {
                    reason: CancellationReason::Error,
                    details: error_details,
                });
            }
            RecognitionEvent::Canceled { reason, .. } => {
                info!(%reason, "recognition session ended");
                self.shutdown();
            }
        }
    }

    async fn handle_action(&mut self, action: Action) -> Feedback {
        info!(%action, state = %self.controller.state(), "user action");

        match action {
            Action::Attach => {
                let result = self.controller.attach().await;
                self.report(result)
            }
            Action::Start => {
                let result = self.controller.start().await;
                self.report(result)
            }
            Action::Stop => {
                let result = self.controller.stop().await;
                self.report(result)
            }
            Action::Next => {
                let result = self.controller.next().await;
                self.report(result)
            }
            Action::Previous => {
                let result = self.controller.previous().await;
                self.report(result)
            }
            Action::StartListening => match self.recognizer.start_continuous() {
                Ok(()) => self.publish(Feedback::ListeningStarted),
                Err(e) => {
                    warn!(%e, "failed to start recognition");
                    self.publish(Feedback::Failed {
                        message: e.to_string(),
                    })
                }
            },
            Action::StopListening => match self.recognizer.stop_continuous() {
                Ok(()) => self.publish(Feedback::ListeningStopped),
                Err(e) => self.publish(Feedback::Failed {
                    message: e.to_string(),
                }),
            },
        }
    }

    /// Normalize, interpret and execute one utterance
    async fn handle_utterance(&mut self, raw: &str) -> Feedback {
        let utterance = normalize(raw);
        self.publish(Feedback::Phrase {
            text: utterance.clone(),
        });

        let slide_count = self.controller.snapshot().slide_count;
        match interpret(&utterance, slide_count) {
            Interpretation::Command(command) => {
                info!(%command, %utterance, "voice command");
                let result = self.execute(command).await;
                self.report(result)
            }
            Interpretation::SlideOutOfRange { slide, slide_count } => {
                self.report(Err(ControlError::SlideOutOfRange { slide, slide_count }))
            }
            Interpretation::Unrecognized(text) => {
                debug!(%text, "phrase matched no command");
                self.publish(Feedback::Unrecognized { text })
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Outcome, ControlError> {
        match command {
            Command::Start => self.controller.start().await,
            Command::Next => self.controller.next().await,
            Command::Back => self.controller.previous().await,
            Command::End => self.controller.stop().await,
            Command::GoToSlide(slide) => self.controller.go_to_slide(i64::from(slide)).await,
        }
    }

    fn report(&self, result: Result<Outcome, ControlError>) -> Feedback {
        match result {
            Ok(outcome) => self.publish(Feedback::Completed {
                message: outcome.to_string(),
            }),
            Err(e) => {
                warn!(%e, "operation did not happen");
                self.publish(Feedback::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    fn publish(&self, feedback: Feedback) -> Feedback {
        debug!(%feedback, "publishing feedback");
        // No subscribers is fine
        let _ = self.feedback_tx.send(feedback.clone());
        feedback
    }
}
