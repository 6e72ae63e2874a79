use thiserror::Error;

/// CLI exit codes, grouped by error class
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const INTERNAL: i32 = 1;
}

#[derive(Error, Debug)]
pub enum ParascopeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to connect to daemon: {0}")]
    DaemonConnection(String),

    #[error("Daemon protocol error: {0}")]
    DaemonProtocol(String),

    #[error("Daemon error: {0}")]
    DaemonError(String),
}

impl ParascopeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors (bad arguments, invalid input)
            ParascopeError::InvalidArgument(_) => exit_codes::USER_ERROR,

            // Internal errors
            ParascopeError::Config(_)
            | ParascopeError::Io(_)
            | ParascopeError::Json(_)
            | ParascopeError::Toml(_)
            | ParascopeError::DaemonConnection(_)
            | ParascopeError::DaemonProtocol(_)
            | ParascopeError::DaemonError(_) => exit_codes::INTERNAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParascopeError>;
