//! Cloud speech service client
//!
//! Uses the short-audio REST endpoint: one WAV request per phrase window,
//! answered with a single JSON result.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SpeechConfig;

use super::{CancellationReason, RecognitionEvent, SpeechError};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const WAV_CONTENT_TYPE: &str = "audio/wav; codecs=audio/pcm; samplerate=16000";

/// Time allowed for a request on top of the audio it carries
const REQUEST_MARGIN: Duration = Duration::from_secs(5);

/// Body of a short-audio recognition response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

/// REST client for the recognition service
pub struct SpeechClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_key: String,
}

impl SpeechClient {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        Self::with_endpoint(
            endpoint(&config.region, &config.language),
            config.subscription_key.clone(),
            config.phrase_window + REQUEST_MARGIN,
        )
    }

    fn with_endpoint(
        endpoint: String,
        subscription_key: String,
        timeout: Duration,
    ) -> Result<Self, SpeechError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            subscription_key,
        })
    }

    /// Send one WAV-encoded phrase for recognition
    pub async fn recognize(&self, wav: Vec<u8>) -> Result<RecognitionEvent, SpeechError> {
        debug!(bytes = wav.len(), "sending phrase to speech service");

        let response = self
            .http
            .post(&self.endpoint)
            .header(KEY_HEADER, &self.subscription_key)
            .header(reqwest::header::CONTENT_TYPE, WAV_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, "application/json")
            .body(wav)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, "speech service rejected request");
            return Err(SpeechError::Service {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        Ok(parse_response(&body))
    }
}

/// Regional endpoint of the short-audio API
fn endpoint(region: &str, language: &str) -> String {
    format!(
        "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language={language}&format=simple"
    )
}

/// Map a response body onto a recognition event
fn parse_response(body: &str) -> RecognitionEvent {
    let response: RecognitionResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            return RecognitionEvent::Canceled {
                reason: CancellationReason::Error,
                error_details: Some(format!("malformed service response: {e}")),
            }
        }
    };

    match response.recognition_status.as_str() {
        "Success" => match response.display_text {
            Some(text) if !text.trim().is_empty() => RecognitionEvent::Recognized { text },
            _ => RecognitionEvent::NoMatch,
        },
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => RecognitionEvent::NoMatch,
        "EndOfDictation" => RecognitionEvent::Canceled {
            reason: CancellationReason::EndOfStream,
            error_details: None,
        },
        other => RecognitionEvent::Canceled {
            reason: CancellationReason::Error,
            error_details: Some(format!("recognition status {other}")),
        },
    }
}
