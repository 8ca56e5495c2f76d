//! Daemon lifecycle helpers

mod shutdown;

pub use shutdown::shutdown_requested;
