use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the cocalc-api library
#[derive(Error, Debug)]
pub enum CocalcError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credentials that cannot be used to build a client
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Transport errors: timeout, DNS, connection refused
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found at: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Missing required config field `{0}`")]
    MissingField(&'static str),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// API-specific errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// CoCalc answered with an `{"event": "error"}` message
    #[error("CoCalc reported an error: {0}")]
    Remote(String),

    #[error("Failed to parse response: {0}")]
    ResponseParse(String),

    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("No matching {kind} for {query}")]
    NoneFound { kind: &'static str, query: String },

    #[error("More than one matching {kind} for {query}")]
    ManyFound { kind: &'static str, query: String },
}

/// Type alias for Results using CocalcError
pub type Result<T> = std::result::Result<T, CocalcError>;
