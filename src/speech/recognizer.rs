//! Continuous recognition against the cloud service
//!
//! A capture thread cuts microphone audio into phrase windows; an async
//! task posts each window to the service and forwards the result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::client::SpeechClient;
use super::microphone;
use super::{CancellationReason, RecognitionEvent, Recognizer, SpeechError};

/// Phrase windows buffered between capture and upload
const PHRASE_QUEUE: usize = 4;

/// Recognizer streaming the default microphone to [`SpeechClient`]
pub struct CloudRecognizer {
    client: Arc<SpeechClient>,
    phrase_window: Duration,
    event_tx: mpsc::Sender<RecognitionEvent>,
    /// Flag of the current session; each start gets a fresh one
    session: Option<Arc<AtomicBool>>,
}

impl CloudRecognizer {
    /// Create a new recognizer delivering events on `event_tx`
    pub fn new(
        client: SpeechClient,
        phrase_window: Duration,
        event_tx: mpsc::Sender<RecognitionEvent>,
    ) -> Self {
        Self {
            client: Arc::new(client),
            phrase_window,
            event_tx,
            session: None,
        }
    }
}

impl Recognizer for CloudRecognizer {
    fn start_continuous(&mut self) -> Result<(), SpeechError> {
        if self.is_listening() {
            return Err(SpeechError::AlreadyListening);
        }
        if !microphone::input_available() {
            return Err(SpeechError::NoInputDevice);
        }

        let running = Arc::new(AtomicBool::new(true));
        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(PHRASE_QUEUE);

        let capture_running = Arc::clone(&running);
        let capture_events = self.event_tx.clone();
        let window = self.phrase_window;
        thread::Builder::new()
            .name("speech-capture".to_string())
            .spawn(move || {
                if let Err(e) = microphone::capture(window, &capture_running, chunk_tx) {
                    error!(?e, "microphone capture failed");
                    capture_running.store(false, Ordering::SeqCst);
                    let _ = capture_events.blocking_send(RecognitionEvent::Canceled {
                        reason: CancellationReason::Error,
                        error_details: Some(e.to_string()),
                    });
                }
            })
            .map_err(|e| SpeechError::ThreadSpawn(e.to_string()))?;

        let client = Arc::clone(&self.client);
        tokio::spawn(forward_results(
            chunk_rx,
            Arc::clone(&running),
            self.event_tx.clone(),
            move |wav| {
                let client = Arc::clone(&client);
                async move { client.recognize(wav).await }
            },
        ));

        self.session = Some(running);
        info!(window_ms = self.phrase_window.as_millis() as u64, "continuous recognition started");
        Ok(())
    }

    fn stop_continuous(&mut self) -> Result<(), SpeechError> {
        match self.session.take() {
            Some(running) if running.swap(false, Ordering::SeqCst) => {
                info!("continuous recognition stopped");
                Ok(())
            }
            _ => Err(SpeechError::NotListening),
        }
    }

    fn is_listening(&self) -> bool {
        self.session
            .as_ref()
            .map(|running| running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// Send each phrase window through `recognize` and forward the results
///
/// Ends on the first cancellation, clearing `running`. Results that
/// arrive after the session was stopped are dropped.
async fn forward_results<F, Fut>(
    mut chunk_rx: mpsc::Receiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    event_tx: mpsc::Sender<RecognitionEvent>,
    mut recognize: F,
) where
    F: FnMut(Vec<u8>) -> Fut,
    Fut: Future<Output = Result<RecognitionEvent, SpeechError>>,
{
    while let Some(wav) = chunk_rx.recv().await {
        let event = match recognize(wav).await {
            Ok(event) => event,
            Err(e) => RecognitionEvent::Canceled {
                reason: CancellationReason::Error,
                error_details: Some(e.to_string()),
            },
        };

        if !running.load(Ordering::SeqCst) {
            debug!("dropping result of a stopped session");
            break;
        }

        let canceled = matches!(event, RecognitionEvent::Canceled { .. });
        if canceled {
            running.store(false, Ordering::SeqCst);
        }
        if event_tx.send(event).await.is_err() || canceled {
            break;
        }
    }
    debug!("recognition upload task stopped");
}
