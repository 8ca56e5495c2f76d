//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application driven by the default automation backend
pub const DEFAULT_APP_NAME: &str = "Microsoft PowerPoint";

const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_PHRASE_SECS: u64 = 3;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Name of the presentation application to automate
    pub app_name: String,

    /// Cloud speech settings, absent when no subscription key is set
    pub speech: Option<SpeechConfig>,
}

/// Cloud speech recognition settings
#[derive(Clone)]
pub struct SpeechConfig {
    pub subscription_key: String,
    pub region: String,
    pub language: String,
    /// Length of audio sent per recognition request
    pub phrase_window: Duration,
}

// Keep the subscription key out of logs.
impl std::fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("subscription_key", &"<redacted>")
            .field("region", &self.region)
            .field("language", &self.language)
            .field("phrase_window", &self.phrase_window)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("voice-deck");

        let socket_path = lookup("VOICE_DECK_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let app_name = lookup("VOICE_DECK_APP").unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

        let speech = match lookup("VOICE_DECK_SPEECH_KEY").filter(|k| !k.is_empty()) {
            Some(subscription_key) => {
                let region = lookup("VOICE_DECK_SPEECH_REGION")
                    .filter(|r| !r.is_empty())
                    .context("VOICE_DECK_SPEECH_REGION must be set with VOICE_DECK_SPEECH_KEY")?;
                let language =
                    lookup("VOICE_DECK_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
                let phrase_secs = match lookup("VOICE_DECK_PHRASE_SECS") {
                    Some(raw) => raw
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .with_context(|| format!("invalid VOICE_DECK_PHRASE_SECS: {raw}"))?,
                    None => DEFAULT_PHRASE_SECS,
                };

                Some(SpeechConfig {
                    subscription_key,
                    region,
                    language,
                    phrase_window: Duration::from_secs(phrase_secs),
                })
            }
            None => None,
        };

        Ok(Self {
            socket_path,
            data_dir,
            app_name,
            speech,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&[("HOME", "/home/deck")])).unwrap();
        assert_eq!(
            config.socket_path,
            PathBuf::from("/home/deck/.local/share/voice-deck/daemon.sock")
        );
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert!(config.speech.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOME", "/home/deck"),
            ("VOICE_DECK_SOCKET", "/tmp/deck.sock"),
            ("VOICE_DECK_APP", "Keynote"),
            ("VOICE_DECK_SPEECH_KEY", "secret"),
            ("VOICE_DECK_SPEECH_REGION", "westeurope"),
            ("VOICE_DECK_PHRASE_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.socket_path, PathBuf::from("/tmp/deck.sock"));
        assert_eq!(config.app_name, "Keynote");
        let speech = config.speech.unwrap();
        assert_eq!(speech.region, "westeurope");
        assert_eq!(speech.language, "en-US");
        assert_eq!(speech.phrase_window, Duration::from_secs(5));
        assert!(!format!("{speech:?}").contains("secret"));
    }

    #[test]
    fn test_speech_key_requires_region() {
        let result = Config::from_lookup(lookup_from(&[
            ("HOME", "/home/deck"),
            ("VOICE_DECK_SPEECH_KEY", "secret"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_phrase_window() {
        let result = Config::from_lookup(lookup_from(&[
            ("HOME", "/home/deck"),
            ("VOICE_DECK_SPEECH_KEY", "secret"),
            ("VOICE_DECK_SPEECH_REGION", "eastus"),
            ("VOICE_DECK_PHRASE_SECS", "0"),
        ]));
        assert!(result.is_err());
    }
}
