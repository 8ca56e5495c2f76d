//! In-memory automation backend for tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::automation::{Automation, AutomationError, PresentationInfo};

/// A call issued to the automation backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ActivePresentation,
    RunShow,
    ShowRunning,
    ExitShow,
    GoTo(u32),
    Next,
    Previous,
}

#[derive(Debug, Default)]
struct FakeState {
    application_running: bool,
    presentation: Option<PresentationInfo>,
    show_running: bool,
    navigation_error: Option<String>,
    calls: Vec<Call>,
}

/// Cloneable fake; every clone shares the same application state
#[derive(Debug, Clone, Default)]
pub struct FakeAutomation {
    state: Arc<Mutex<FakeState>>,
}

impl FakeAutomation {
    pub fn with_presentation(info: PresentationInfo) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.application_running = true;
            state.presentation = Some(info);
        }
        fake
    }

    pub fn not_running() -> Self {
        Self::default()
    }

    pub fn set_show_running(&self, running: bool) {
        self.state.lock().unwrap().show_running = running;
    }

    pub fn set_application_running(&self, running: bool) {
        self.state.lock().unwrap().application_running = running;
    }

    pub fn fail_navigation(&self, message: &str) {
        self.state.lock().unwrap().navigation_error = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) -> Result<(), AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if !state.application_running {
            return Err(AutomationError::NotRunning);
        }
        Ok(())
    }

    fn navigate(&self, call: Call) -> Result<(), AutomationError> {
        self.record(call)?;
        let state = self.state.lock().unwrap();
        if !state.show_running {
            return Err(AutomationError::Call("no slide show window".to_string()));
        }
        match &state.navigation_error {
            Some(message) => Err(AutomationError::Call(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Automation for FakeAutomation {
    async fn active_presentation(&mut self) -> Result<PresentationInfo, AutomationError> {
        self.record(Call::ActivePresentation)?;
        self.state
            .lock()
            .unwrap()
            .presentation
            .clone()
            .ok_or(AutomationError::NoPresentation)
    }

    async fn run_slide_show(&mut self) -> Result<(), AutomationError> {
        self.record(Call::RunShow)?;
        self.state.lock().unwrap().show_running = true;
        Ok(())
    }

    async fn slide_show_running(&mut self) -> Result<bool, AutomationError> {
        self.record(Call::ShowRunning)?;
        Ok(self.state.lock().unwrap().show_running)
    }

    async fn exit_slide_show(&mut self) -> Result<(), AutomationError> {
        self.navigate(Call::ExitShow)?;
        self.state.lock().unwrap().show_running = false;
        Ok(())
    }

    async fn go_to_slide(&mut self, index: u32) -> Result<(), AutomationError> {
        self.navigate(Call::GoTo(index))
    }

    async fn next_slide(&mut self) -> Result<(), AutomationError> {
        self.navigate(Call::Next)
    }

    async fn previous_slide(&mut self) -> Result<(), AutomationError> {
        self.navigate(Call::Previous)
    }
}
