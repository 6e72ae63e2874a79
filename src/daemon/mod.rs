pub mod auto_start;
pub mod client;
pub mod listener;
pub mod protocol;
pub mod server;

pub use auto_start::ensure_daemon;
pub use client::DaemonClient;
pub use listener::{IpcConnection, IpcListener};
