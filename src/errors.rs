//! Centralized error handling for script-sim
//!
//! Script errors raised *inside* a simulation are not errors here: they are
//! reported through `SimulationOutcome::error_string`. The types below cover
//! everything that stops a run from completing.

use thiserror::Error;

/// Main application error type that chains all domain-specific errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimulationFault),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors raised while loading script bytes from their location
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Script not found: {0}")]
    NotFound(String),

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Script I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config I/O error: {0}")]
    IO(#[from] std::io::Error),
}

/// Errors produced when a response hex string cannot be decoded
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("'{0}' is not a valid hexadecimal string")]
    InvalidHex(String),

    #[error("'{hex}' has {len} characters which is too large for {ty}")]
    TooLarge {
        hex: String,
        len: usize,
        ty: &'static str,
    },

    #[error("'{0}' contains no digits to decode")]
    Empty(String),
}

/// Failures of the simulation call itself, as opposed to script errors
#[derive(Error, Debug)]
pub enum SimulationFault {
    #[error("Failed to load script: {0}")]
    SourceFailed(#[from] FetchError),

    #[error("Invalid WASM binary: {reason}")]
    InvalidWasm { reason: String },

    #[error("WASM compilation failed: {0}")]
    CompilationFailed(String),

    #[error("WASM instantiation failed: {0}")]
    InstantiationFailed(String),

    #[error("Entry point '_start' not found")]
    EntryPointNotFound,

    #[error("WASI setup failed: {0}")]
    WasiSetupFailed(String),

    #[error("Memory limit too large: {0} MB (maximum {1} MB)")]
    MemoryLimitTooLarge(u32, u32),

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Simulator error: {0}")]
    Internal(String),
}

/// Result type aliases for common error combinations
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type SimulationResult<T> = Result<T, SimulationFault>;

impl AppError {
    /// Short name of the stage that failed, used in fault log entries
    pub fn class(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Simulation(_) => "simulation",
            AppError::Decode(_) => "decode",
        }
    }
}

impl ConfigError {
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl SimulationFault {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        SimulationFault::InvalidRequest {
            reason: reason.into(),
        }
    }
}
