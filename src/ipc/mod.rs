//! IPC module for daemon-client communication

mod protocol;
mod server;

pub use protocol::{read_frame, write_frame, Notification, Request, Response};
pub use server::Server;
