//! Scriptable recognizer for tests

use std::sync::{Arc, Mutex};

use super::{Recognizer, SpeechError};

#[derive(Debug, Default)]
struct FakeState {
    listening: bool,
    fail_start: Option<String>,
    starts: usize,
    stops: usize,
}

/// Cloneable fake; every clone shares the same session state
#[derive(Debug, Clone, Default)]
pub struct FakeRecognizer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRecognizer {
    pub fn failing_start(message: &str) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().fail_start = Some(message.to_string());
        fake
    }

    /// Simulate the service ending the session on its own
    pub fn end_session(&self) {
        self.state.lock().unwrap().listening = false;
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }
}

impl Recognizer for FakeRecognizer {
    fn start_continuous(&mut self) -> Result<(), SpeechError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_start {
            return Err(SpeechError::Device(message.clone()));
        }
        if state.listening {
            return Err(SpeechError::AlreadyListening);
        }
        state.listening = true;
        state.starts += 1;
        Ok(())
    }

    fn stop_continuous(&mut self) -> Result<(), SpeechError> {
        let mut state = self.state.lock().unwrap();
        if !state.listening {
            return Err(SpeechError::NotListening);
        }
        state.listening = false;
        state.stops += 1;
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.state.lock().unwrap().listening
    }
}
