//! Unix domain socket server for IPC
//!
//! Forwards client requests to the dispatcher and pushes feedback
//! notifications to subscribed clients.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatch::{ControlMessage, ControlReply, ControlRequest};
use crate::events::Feedback;

use super::protocol::{
    read_frame, write_frame, DaemonStatus, Notification, Outgoing, ProtocolError, Request,
    Response,
};

/// Messages queued per client writer
const CLIENT_QUEUE: usize = 32;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    control_tx: mpsc::Sender<ControlRequest>,
    feedback_tx: broadcast::Sender<Feedback>,
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

/// Per-connection handles shared with client tasks
#[derive(Clone)]
struct ClientContext {
    control_tx: mpsc::Sender<ControlRequest>,
    feedback_tx: broadcast::Sender<Feedback>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        control_tx: mpsc::Sender<ControlRequest>,
        feedback_tx: broadcast::Sender<Feedback>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            control_tx,
            feedback_tx,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let context = ClientContext {
            control_tx: self.control_tx.clone(),
            feedback_tx: self.feedback_tx.clone(),
            start_time: self.start_time,
        };

        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, context: ClientContext) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::channel::<Outgoing>(CLIENT_QUEUE);

        let writer_task: JoinHandle<()> = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &msg).await {
                    debug!(%e, "client writer stopped");
                    break;
                }
            }
        });

        let mut forwarder: Option<JoinHandle<()>> = None;

        let result = loop {
            let request: Request = match read_frame(&mut reader).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("client disconnected");
                    break Ok(());
                }
                Err(ProtocolError::Json(e)) => {
                    warn!(%e, "unparseable request");
                    let response = Response::Error {
                        code: "invalid_request".to_string(),
                        message: e.to_string(),
                    };
                    if out_tx.send(Outgoing::Response(response)).await.is_err() {
                        break Ok(());
                    }
                    continue;
                }
                Err(e) => break Err(anyhow::Error::from(e).context("failed to read request")),
            };

            debug!(?request, "received request");

            let subscribe = matches!(request, Request::Subscribe);
            let response = Self::process_request(request, &context).await;

            if out_tx.send(Outgoing::Response(response)).await.is_err() {
                break Ok(());
            }

            // Start forwarding only after the confirmation is queued
            if subscribe && forwarder.is_none() {
                debug!("client subscribed to notifications");
                forwarder = Some(Self::forward_feedback(
                    context.feedback_tx.subscribe(),
                    out_tx.clone(),
                ));
            }
        };

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        drop(out_tx);
        let _ = writer_task.await;

        result
    }

    /// Push every published feedback to one subscribed client
    fn forward_feedback(
        mut feedback_rx: broadcast::Receiver<Feedback>,
        out_tx: mpsc::Sender<Outgoing>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match feedback_rx.recv().await {
                    Ok(feedback) => {
                        let notification =
                            Outgoing::Notification(Notification::FeedbackPublished { feedback });
                        if out_tx.send(notification).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged behind feedback");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Process a request and return a response
    async fn process_request(request: Request, context: &ClientContext) -> Response {
        let message = match request {
            Request::Ping => return Response::Pong,
            Request::Subscribe => return Response::Subscribed,
            Request::GetStatus => ControlMessage::Status,
            Request::Action { action } => ControlMessage::Action(action),
            Request::Say { text } => ControlMessage::Say(text),
        };

        let (control, reply_rx) = ControlRequest::new(message);
        if context.control_tx.send(control).await.is_err() {
            return Self::unavailable();
        }

        match reply_rx.await {
            Ok(ControlReply::Feedback(feedback)) => Response::Feedback { feedback },
            Ok(ControlReply::Status(snapshot)) => Response::Status(DaemonStatus::from_snapshot(
                snapshot,
                context.start_time.elapsed().as_secs(),
            )),
            Err(_) => Self::unavailable(),
        }
    }

    fn unavailable() -> Response {
        Response::Error {
            code: "unavailable".to_string(),
            message: "dispatcher is not running".to_string(),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::dispatch::Action;

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("voice-deck-{}-{}.sock", name, std::process::id()))
    }

    /// Answers every control request with a fixed feedback
    fn spawn_responder(mut control_rx: mpsc::Receiver<ControlRequest>) {
        tokio::spawn(async move {
            while let Some(request) = control_rx.recv().await {
                let reply = match request.message {
                    ControlMessage::Status => ControlReply::Status(Default::default()),
                    ControlMessage::Action(action) => ControlReply::Feedback(Feedback::Completed {
                        message: format!("did {}", action),
                    }),
                    ControlMessage::Say(text) => {
                        ControlReply::Feedback(Feedback::Unrecognized { text })
                    }
                };
                let _ = request.reply.send(reply);
            }
        });
    }

    #[tokio::test]
    async fn test_requests_reach_dispatcher() {
        let path = socket_path("requests");
        let (control_tx, control_rx) = mpsc::channel(8);
        let (feedback_tx, _) = broadcast::channel(8);
        spawn_responder(control_rx);

        let server = Server::new(&path, control_tx, feedback_tx).unwrap();
        let server_task = async {
            let _ = server.run().await;
        };

        let client_task = async {
            let mut client = Client::connect(&path).await.unwrap();
            assert_eq!(client.request(&Request::Ping).await.unwrap(), Response::Pong);
            assert_eq!(
                client
                    .request(&Request::Action {
                        action: Action::Next
                    })
                    .await
                    .unwrap(),
                Response::Feedback {
                    feedback: Feedback::Completed {
                        message: "did next".to_string()
                    }
                }
            );
            assert!(matches!(
                client.request(&Request::GetStatus).await.unwrap(),
                Response::Status(_)
            ));
        };

        tokio::select! {
            _ = server_task => panic!("server exited"),
            _ = client_task => {}
        }
        server.shutdown().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_subscriber_receives_feedback() {
        let path = socket_path("subscribe");
        let (control_tx, control_rx) = mpsc::channel(8);
        let (feedback_tx, _) = broadcast::channel(8);
        spawn_responder(control_rx);

        let server = Server::new(&path, control_tx, feedback_tx.clone()).unwrap();
        let server_task = async {
            let _ = server.run().await;
        };

        let client_task = async {
            let mut client = Client::connect(&path).await.unwrap();
            assert_eq!(
                client.request(&Request::Subscribe).await.unwrap(),
                Response::Subscribed
            );

            // The forwarder subscribes right after the confirmation
            while feedback_tx.receiver_count() == 0 {
                tokio::task::yield_now().await;
            }
            feedback_tx.send(Feedback::NoSpeech).unwrap();

            assert_eq!(
                client.next_notification().await.unwrap(),
                Some(Notification::FeedbackPublished {
                    feedback: Feedback::NoSpeech
                })
            );
        };

        tokio::select! {
            _ = server_task => panic!("server exited"),
            _ = client_task => {}
        }
        server.shutdown().await;
    }
}
