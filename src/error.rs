use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{0}")]
    Privilege(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("device profile error: {0}")]
    Identity(String),

    #[error("device {device_id} not found in Kandji")]
    BackendNotFound { device_id: String },

    #[error("{context}: {message}")]
    BackendTransport {
        context: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{context}: invalid response body: {message}")]
    BackendDecode { context: String, message: String },

    #[error("error checking if user {username} exists: {message}")]
    AccountLookup { username: String, message: String },

    #[error("error creating user {username}: {message}")]
    AccountCreation { username: String, message: String },

    #[error("account tool '{binary}' missing on PATH; this command only runs on macOS")]
    AccountToolMissing { binary: &'static str },

    #[error("logging initialization error: {0}")]
    Telemetry(String),

    #[error("prompt error: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SetupError {
    /// HTTP status carried by a transport failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            SetupError::BackendTransport { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;
