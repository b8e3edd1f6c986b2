//! Routing of per-host results to the console or to files.
//!
//! The destination is chosen once per invocation. File output is always
//! appended, never truncated. A file that cannot be written is reported and
//! the payload falls back to the console, so output is never dropped.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tracing::{debug, error};

use crate::dispatch::DeviceResult;
use crate::error::RouteError;

/// Whether all hosts share one file or each gets its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Single,
    Multiple,
}

/// Where every result of an invocation goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputDestination {
    #[default]
    Console,
    File { mode: FileMode, path: PathBuf },
}

impl OutputDestination {
    /// The file a host's result is appended to, or `None` for the console.
    pub fn path_for(&self, host: &str) -> Option<PathBuf> {
        match self {
            OutputDestination::Console => None,
            OutputDestination::File {
                mode: FileMode::Single,
                path,
            } => Some(path.clone()),
            OutputDestination::File {
                mode: FileMode::Multiple,
                path,
            } => Some(host_prefixed_path(path, host)),
        }
    }
}

/// Inserts `host` and an underscore in front of the file name of `path`.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use netdispatch::router::host_prefixed_path;
///
/// assert_eq!(
///     host_prefixed_path(Path::new("/tmp/out.txt"), "10.0.0.2"),
///     PathBuf::from("/tmp/10.0.0.2_out.txt")
/// );
/// ```
pub fn host_prefixed_path(path: &Path, host: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefixed = format!("{host}_{file_name}");

    match path.parent() {
        Some(parent) => parent.join(prefixed),
        None => PathBuf::from(prefixed),
    }
}

/// Writes each result to its destination.
///
/// Console text (payloads in console mode, file confirmations, fallbacks) goes
/// to the writer `W`, standard output unless built with
/// [`ResultRouter::with_console`].
pub struct ResultRouter<W = Stdout> {
    destination: OutputDestination,
    console: W,
}

impl ResultRouter<Stdout> {
    pub fn new(destination: OutputDestination) -> Self {
        Self::with_console(destination, tokio::io::stdout())
    }
}

impl<W> ResultRouter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn with_console(destination: OutputDestination, console: W) -> Self {
        Self {
            destination,
            console,
        }
    }

    pub fn destination(&self) -> &OutputDestination {
        &self.destination
    }

    /// Returns the console writer, consuming the router.
    pub fn into_console(self) -> W {
        self.console
    }

    /// Emits one result. Failures are reported here and never returned.
    pub async fn route(&mut self, result: &DeviceResult) {
        let Some(path) = self.destination.path_for(&result.host) else {
            self.write_console(&result.payload).await;
            return;
        };

        match append_to_file(&path, &result.payload).await {
            Ok(()) => {
                debug!("Appended output of {} to {}", result.host, path.display());
                let confirmation =
                    format!("{} output appended to: {}\n", result.host, path.display());
                self.write_console(&confirmation).await;
            }
            Err(e) => {
                error!("{}", e);
                let fallback = format!("{e}. Output would have been:\n{}", result.payload);
                self.write_console(&fallback).await;
            }
        }
    }

    async fn write_console(&mut self, text: &str) {
        let written = async {
            self.console.write_all(text.as_bytes()).await?;
            self.console.flush().await
        }
        .await;

        if let Err(e) = written {
            error!("Failed to write to console: {}", e);
        }
    }
}

async fn append_to_file(path: &Path, payload: &str) -> Result<(), RouteError> {
    let write_error = |source| RouteError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(write_error)?;
    file.write_all(payload.as_bytes()).await.map_err(write_error)?;
    file.flush().await.map_err(write_error)
}
