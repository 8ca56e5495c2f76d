//! Control client used by the CLI subcommands

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::net::UnixStream;

use crate::ipc::{read_frame, write_frame, Notification, Request, Response};

/// Connection to a running daemon
pub struct Client {
    stream: UnixStream,
}

impl Client {
    /// Connect to the daemon socket
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| {
                format!(
                    "failed to connect to {} - is the daemon running?",
                    socket_path.display()
                )
            })?;
        Ok(Self { stream })
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        write_frame(&mut self.stream, request)
            .await
            .context("failed to send request")?;

        match read_frame(&mut self.stream)
            .await
            .context("failed to read response")?
        {
            Some(response) => Ok(response),
            None => bail!("daemon closed the connection"),
        }
    }

    /// Wait for the next pushed notification; `None` once the daemon hangs up
    pub async fn next_notification(&mut self) -> Result<Option<Notification>> {
        read_frame(&mut self.stream)
            .await
            .context("failed to read notification")
    }
}
