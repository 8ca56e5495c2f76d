//! voice-deck: Background daemon for voice-controlled slideshows
//!
//! The daemon provides:
//! - Continuous speech recognition of microphone audio via a cloud service
//! - Interpretation of phrases as slideshow commands (start, next, back,
//!   end, or a slide number)
//! - Navigation of the running presentation application
//! - IPC server for the control surface and feedback display
//!
//! Without a subcommand the daemon runs in the foreground; the other
//! subcommands talk to a running daemon.

mod client;
mod command;
mod config;
mod dispatch;
mod events;
mod ipc;
mod lifecycle;
mod presentation;
mod speech;

use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::client::Client;
use crate::config::Config;
use crate::dispatch::{Action, Dispatcher};
use crate::events::Feedback;
use crate::ipc::{Notification, Request, Response, Server};
use crate::lifecycle::shutdown_requested;
use crate::presentation::{Controller, OsaScriptAutomation};
use crate::speech::{CloudRecognizer, Recognizer, SpeechClient, Unconfigured};

/// Capacity of the recognition and control channels
const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Parser)]
#[command(name = "voice-deck", version, about = "Voice control for slideshow presentations")]
struct Cli {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run the daemon in the foreground
    Run,
    /// Attach to the running presentation application
    Attach,
    /// Start the slideshow, attaching first if needed
    Start,
    /// End the slideshow
    Stop,
    /// Advance one slide
    Next,
    /// Go back one slide
    Previous,
    /// Start continuous speech recognition
    Listen,
    /// Stop continuous speech recognition
    Mute,
    /// Handle text as if it had been spoken
    Say {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Show session and listening state
    Status,
    /// Print feedback as the daemon publishes it
    Watch,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let request = match cli.command.unwrap_or(CliCommand::Run) {
        CliCommand::Run => {
            run_daemon(config).await?;
            return Ok(ExitCode::SUCCESS);
        }
        CliCommand::Watch => {
            watch(&config).await?;
            return Ok(ExitCode::SUCCESS);
        }
        CliCommand::Attach => Request::Action { action: Action::Attach },
        CliCommand::Start => Request::Action { action: Action::Start },
        CliCommand::Stop => Request::Action { action: Action::Stop },
        CliCommand::Next => Request::Action { action: Action::Next },
        CliCommand::Previous => Request::Action { action: Action::Previous },
        CliCommand::Listen => Request::Action {
            action: Action::StartListening,
        },
        CliCommand::Mute => Request::Action {
            action: Action::StopListening,
        },
        CliCommand::Say { words } => Request::Say {
            text: words.join(" "),
        },
        CliCommand::Status => Request::GetStatus,
    };

    let mut client = Client::connect(&config.socket_path).await?;
    let response = client.request(&request).await?;
    Ok(print_response(&response))
}

/// Print a response for the user and pick the exit code
fn print_response(response: &Response) -> ExitCode {
    match response {
        Response::Feedback { feedback } if feedback.is_error() => {
            eprintln!("{}", feedback);
            ExitCode::FAILURE
        }
        Response::Feedback { feedback } => {
            println!("{}", feedback);
            ExitCode::SUCCESS
        }
        Response::Status(status) => {
            match &status.session.presentation {
                Some(name) => println!(
                    "presentation: {} ({} slides)",
                    name, status.session.slide_count
                ),
                None => println!("presentation: none"),
            }
            println!("slide show: {}", if status.session.show_running { "running" } else { "stopped" });
            println!("listening: {}", if status.listening { "yes" } else { "no" });
            println!("uptime: {}s (v{})", status.uptime_secs, status.version);
            ExitCode::SUCCESS
        }
        Response::Error { code, message } => {
            eprintln!("Error [{}]: {}", code, message);
            ExitCode::FAILURE
        }
        Response::Pong | Response::Subscribed => ExitCode::SUCCESS,
    }
}

/// Follow the daemon's feedback until it hangs up
async fn watch(config: &Config) -> Result<()> {
    let mut client = Client::connect(&config.socket_path).await?;
    match client.request(&Request::Subscribe).await? {
        Response::Subscribed => {}
        other => bail!("unexpected subscribe response: {:?}", other),
    }

    while let Some(Notification::FeedbackPublished { feedback }) = client.next_notification().await? {
        println!("{}", feedback);
    }
    Ok(())
}

async fn run_daemon(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voice-deck daemon starting"
    );
    info!(?config, "configuration loaded");
    config.ensure_dirs()?;

    // Create channels for inter-component communication
    // Recognizer -> dispatcher
    let (recognition_tx, recognition_rx) = mpsc::channel(CHANNEL_CAPACITY);
    // IPC clients -> dispatcher
    let (control_tx, control_rx) = mpsc::channel(CHANNEL_CAPACITY);
    // Dispatcher -> subscribers
    let (feedback_tx, mut feedback_rx) = broadcast::channel::<Feedback>(64);

    let recognizer: Box<dyn Recognizer> = match &config.speech {
        Some(speech) => Box::new(CloudRecognizer::new(
            SpeechClient::new(speech)?,
            speech.phrase_window,
            recognition_tx,
        )),
        None => {
            warn!("no speech subscription key set - voice commands are disabled");
            Box::new(Unconfigured)
        }
    };

    let controller = Controller::new(OsaScriptAutomation::new(config.app_name.clone()));
    let mut dispatcher = Dispatcher::new(controller, recognizer, feedback_tx.clone());

    let server = Server::new(&config.socket_path, control_tx, feedback_tx)?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the dispatcher (processes recognition events and actions)
        _ = dispatcher.run(control_rx, recognition_rx) => {
            info!("dispatcher exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Mirror the display field into the log
        _ = async {
            loop {
                match feedback_rx.recv().await {
                    Ok(feedback) => info!(%feedback, "feedback"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "feedback receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("feedback logger exited");
        }

        // Wait for shutdown signal
        result = shutdown_requested() => {
            match result {
                Ok(signal) => info!(signal, "shutdown signal received"),
                Err(e) => error!(?e, "failed to register signal handlers"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    dispatcher.shutdown();
    server.shutdown().await;

    info!("voice-deck daemon stopped");

    Ok(())
}
