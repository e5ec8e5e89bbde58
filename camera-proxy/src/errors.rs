use common::SdkError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Configuration Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse config file: {message}")]
    Parse { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

// ============================================================================
// Frame Pipe Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum PipeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to create FIFO {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    #[error("{path} exists but is not a FIFO")]
    NotAFifo { path: PathBuf },

    #[error("No reader attached to {path} after {waited:?}")]
    NoReader { path: PathBuf, waited: Duration },

    #[error("Shutdown requested while opening {path}")]
    Cancelled { path: PathBuf },
}

// ============================================================================
// Transcoder Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to start transcoder {program}: {source}")]
    SpawnFailed { program: String, source: io::Error },

    #[error("Transcoder command is empty")]
    EmptyCommand,

    #[error("Failed to terminate transcoder: {0}")]
    TerminateFailed(io::Error),
}

// ============================================================================
// Session Errors
// ============================================================================

/// Startup failures of a camera session. All of them are fatal.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("SDK initialization failed: {source} [{}]", .source.name())]
    InitFailed { source: SdkError },

    #[error("Get session ID failed: {source} [{}]", .source.name())]
    SessionIdUnavailable { source: SdkError },

    #[error("Connect by UID {uid} failed: {source} [{}]", .source.name())]
    ConnectFailed { uid: String, source: SdkError },

    #[error("AV client start failed: {source} [{}]", .source.name())]
    AuthFailed { source: SdkError },

    #[error("Camera configuration failed, '{command}' rejected: {source} [{}]", .source.name())]
    ControlRejected { command: String, source: SdkError },

    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    #[error("Transcoder error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Worker task failed: {message}")]
    TaskFailed { message: String },

    #[error("A camera session is already active")]
    AlreadyActive,

    #[error("Shutdown requested during session startup")]
    Cancelled,
}

// ============================================================================
// Application Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    #[error("Failed to install signal handlers: {0}")]
    Signal(io::Error),

    #[error("Built without vendor SDK support, rebuild with `--features tutk` or pass --simulate")]
    SdkUnavailable,
}

// ============================================================================
// Conversion Implementations
// ============================================================================

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        SessionError::TaskFailed {
            message: err.to_string(),
        }
    }
}
