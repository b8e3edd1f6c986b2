//! Error types for pre-dispatch validation, command resolution, device
//! sessions and output routing.
//!
//! Only [`ParameterError`] and [`ResolveError`] end an invocation. Session
//! and routing errors stay local to one host and are reported as part of
//! that host's result.

use std::path::PathBuf;

use thiserror::Error;

use crate::dispatch::FailureKind;

/// Malformed command-line input or an invalid argument combination.
///
/// Raised before any device is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error(
        "A commit at time must be in one of the two formats: 'hh:mm[:ss]' or \
         'yyyy-mm-dd hh:mm[:ss]' (seconds are optional), got '{0}'"
    )]
    InvalidAtTime(String),

    #[error(
        "The first argument of the -w/--write option must be one of \"s\", \
         \"single\", \"m\" or \"multiple\", got '{0}'"
    )]
    InvalidOutputMode(String),

    #[error(
        "Expecting two arguments for -w/--write: an output mode (s, single, m, \
         multiple) and a file path, got {0}"
    )]
    OutputModeArity(usize),

    #[error("--blank and the commands argument cannot both be omitted")]
    MissingCommitCommands,

    #[error("commit confirm timeout must be between 60 and 7200 seconds, got {0}")]
    ConfirmOutOfRange(u64),

    #[error("no {0} were given after removing blank and comment lines")]
    EmptyCommands(&'static str),

    #[error("unsupported xpath expression {0}")]
    InvalidXPath(String),

    #[error("push source '{}' does not exist", .0.display())]
    PushSourceMissing(PathBuf),
}

/// A typed subcommand prefix that does not name exactly one subcommand.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No such command '{0}'")]
    NotFound(String),

    #[error("Command ambiguous, could be: {}", candidates.join(", "))]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },
}

/// Failure of a single device session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unable to connect to device {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("Timed out after {secs}s connecting to device {host}")]
    ConnectTimeout { host: String, secs: u64 },

    #[error("Device rejected the operation: {0}")]
    Operation(String),

    #[error("Session lost: no output from the device for {0}s")]
    SessionTimeout(u64),

    #[error("File transfer failed: {0}")]
    Transfer(String),

    #[error("ssh error: {0}")]
    Ssh(#[from] async_ssh2_tokio::Error),

    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Classifies the error for the host's result.
    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::Connect { .. } | SessionError::ConnectTimeout { .. } => {
                FailureKind::Connection
            }
            SessionError::Operation(_)
            | SessionError::SessionTimeout(_)
            | SessionError::Transfer(_)
            | SessionError::Ssh(_)
            | SessionError::Russh(_)
            | SessionError::Io(_) => FailureKind::Operation,
        }
    }
}

/// The output destination could not be opened or written.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Could not open output file '{}' for writing: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
