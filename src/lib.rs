//! Parascope: supervision host for streaming malaria-detection workers,
//! one-shot frame analysis, and the lab record store behind them.
//!
//! The crate is split between a CLI (`parascope`) and a background daemon
//! (`parascoped`) that talk over a Unix domain socket:
//!
//! - [`detection`] - worker supervision, one-shot analysis, health probe
//! - [`bridge`] - event fan-out between services and subscribers
//! - [`store`] - JSON document store for tests and captured images
//! - [`daemon`] - IPC protocol, listener, client, and request dispatch
//! - [`cli`] - command implementations
//! - [`config`] - configuration and well-known paths under `~/.parascope`

pub mod bridge;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod detection;
pub mod error;
pub mod models;
pub mod output;
pub mod store;

pub use error::{ParascopeError, Result};
