//! Automation backend driving the application through `osascript`
//!
//! Each operation runs one AppleScript snippet against the configured
//! application. Scripts never launch the application: they report
//! `not-running` when it is closed.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::automation::{Automation, AutomationError, PresentationInfo};

const NOT_RUNNING: &str = "not-running";
const NO_PRESENTATION: &str = "no-presentation";
const OK: &str = "ok";

/// Upper bound for a single scripting call
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

const SHOW_VIEW: &str = "slide show view of slide show window 1";

/// Scripting bridge to a presentation application
#[derive(Debug, Clone)]
pub struct OsaScriptAutomation {
    app_name: String,
    program: String,
}

impl OsaScriptAutomation {
    /// Create a backend for the named application
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            program: "osascript".to_string(),
        }
    }

    /// Wrap a `tell` body so a closed application is reported, not launched
    fn script(&self, body: &str) -> String {
        let app = self.app_name.replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            "if application \"{app}\" is not running then return \"{NOT_RUNNING}\"\n\
             tell application \"{app}\"\n\
             if (count of presentations) is 0 then return \"{NO_PRESENTATION}\"\n\
             {body}\n\
             end tell"
        )
    }

    async fn run(&self, body: &str) -> Result<String, AutomationError> {
        let script = self.script(body);
        debug!(app = %self.app_name, %body, "running automation script");

        let output = tokio::time::timeout(
            CALL_TIMEOUT,
            Command::new(&self.program)
                .arg("-e")
                .arg(&script)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AutomationError::Call(format!("{} did not respond", self.app_name)))?
        .map_err(|e| AutomationError::Call(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AutomationError::Call(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        match stdout.as_str() {
            NOT_RUNNING => Err(AutomationError::NotRunning),
            NO_PRESENTATION => Err(AutomationError::NoPresentation),
            _ => Ok(stdout),
        }
    }

    async fn run_ok(&self, body: &str) -> Result<(), AutomationError> {
        self.run(&format!("{body}\nreturn \"{OK}\"")).await.map(|_| ())
    }
}

/// Parse the `name` / `slide count` pair printed by the presentation script
fn parse_presentation(output: &str) -> Result<PresentationInfo, AutomationError> {
    let mut lines = output.lines();
    let name = lines.next().unwrap_or_default().trim().to_string();
    let slide_count = lines
        .next()
        .and_then(|count| count.trim().parse::<u32>().ok())
        .ok_or_else(|| AutomationError::Call(format!("unexpected presentation info: {output}")))?;

    Ok(PresentationInfo { name, slide_count })
}

#[async_trait]
impl Automation for OsaScriptAutomation {
    async fn active_presentation(&mut self) -> Result<PresentationInfo, AutomationError> {
        let output = self
            .run("set p to active presentation\nreturn (name of p) & linefeed & (count of slides of p)")
            .await?;
        parse_presentation(&output)
    }

    async fn run_slide_show(&mut self) -> Result<(), AutomationError> {
        self.run_ok("run slide show (slide show settings of active presentation)")
            .await
    }

    async fn slide_show_running(&mut self) -> Result<bool, AutomationError> {
        let output = self
            .run("return ((count of slide show windows) > 0) as text")
            .await?;
        Ok(output == "true")
    }

    async fn exit_slide_show(&mut self) -> Result<(), AutomationError> {
        self.run_ok(&format!("exit slide show ({SHOW_VIEW})")).await
    }

    async fn go_to_slide(&mut self, index: u32) -> Result<(), AutomationError> {
        self.run_ok(&format!("go to slide ({SHOW_VIEW}) number {index}"))
            .await
    }

    async fn next_slide(&mut self) -> Result<(), AutomationError> {
        self.run_ok(&format!("go to next slide ({SHOW_VIEW})")).await
    }

    async fn previous_slide(&mut self) -> Result<(), AutomationError> {
        self.run_ok(&format!("go to previous slide ({SHOW_VIEW})"))
            .await
    }
}
