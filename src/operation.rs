//! The closed set of operations that can be run against every device.
//!
//! Each variant carries its own validated arguments. Constructors perform the
//! pre-dispatch checks, so an [`Operation`] that exists is ready to be shared
//! read-only across all host tasks.

use std::path::PathBuf;

use clap::ValueEnum;

use crate::error::ParameterError;
use crate::validation::{validate_at_time, validate_push_source};
use crate::xpath::XPath;

/// Shortest and longest commit-confirmed timeout, in seconds.
pub const CONFIRM_RANGE: std::ops::RangeInclusive<u64> = 60..=7200;

/// Reply format requested for operational commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Xml,
}

/// How configuration differences between two devices are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiffMode {
    /// Flat `set` statements.
    #[default]
    Set,
    /// Hierarchical curly-brace stanzas.
    Stanza,
}

/// Arguments of a configuration commit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitArgs {
    /// Set commands to load. `None` means none were given.
    pub commands: Option<Vec<String>>,
    /// Commit with no configuration changes.
    pub blank: bool,
    /// Only run `commit check`, never commit.
    pub check: bool,
    /// Synchronize the commit across routing engines.
    pub sync: bool,
    pub comment: Option<String>,
    /// Commit-confirmed timeout in seconds.
    pub confirm: Option<u64>,
    /// Deferred commit time, `hh:mm[:ss]` or `yyyy-mm-dd hh:mm[:ss]`.
    pub at_time: Option<String>,
}

impl CommitArgs {
    /// Set commands to load; a blank commit loads none.
    pub fn set_commands(&self) -> &[String] {
        match (&self.commands, self.blank) {
            (Some(commands), false) => commands,
            _ => &[],
        }
    }
}

/// Copy a file from the device to the local machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullArgs {
    pub remote_source: String,
    pub local_destination: PathBuf,
    pub show_progress: bool,
}

/// Copy a local file to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushArgs {
    pub local_source: PathBuf,
    pub remote_destination: String,
    pub show_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationalArgs {
    pub commands: Vec<String>,
    pub format: OutputFormat,
    pub xpath: Option<String>,
}

/// One action executed against every host of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Commit(CommitArgs),
    Compare { commands: Vec<String> },
    Pull(PullArgs),
    Push(PushArgs),
    OperationalCommand(OperationalArgs),
    Shell { commands: Vec<String> },
    DiffConfig { second_host: String, mode: DiffMode },
    HealthCheck,
    DeviceInfo,
    InterfaceErrors,
}

impl Operation {
    /// Builds a commit, rejecting one with neither commands nor `blank`.
    pub fn commit(mut args: CommitArgs) -> Result<Self, ParameterError> {
        if !args.blank {
            match &args.commands {
                None => return Err(ParameterError::MissingCommitCommands),
                Some(commands) if commands.is_empty() => {
                    return Err(ParameterError::EmptyCommands("commit commands"))
                }
                Some(_) => {}
            }
        }

        if let Some(confirm) = args.confirm {
            if !CONFIRM_RANGE.contains(&confirm) {
                return Err(ParameterError::ConfirmOutOfRange(confirm));
            }
        }

        args.at_time = validate_at_time(args.at_time.as_deref())?;
        Ok(Operation::Commit(args))
    }

    pub fn compare(commands: Vec<String>) -> Result<Self, ParameterError> {
        Ok(Operation::Compare {
            commands: non_empty(commands, "compare commands")?,
        })
    }

    pub fn pull(args: PullArgs) -> Self {
        Operation::Pull(args)
    }

    /// Builds a push after checking that the local source exists.
    pub fn push(args: PushArgs) -> Result<Self, ParameterError> {
        validate_push_source(&args.local_source)?;
        Ok(Operation::Push(args))
    }

    /// Builds an operational command; an xpath forces the XML format and must
    /// be a supported location path.
    pub fn operational(
        commands: Vec<String>,
        format: OutputFormat,
        xpath: Option<String>,
    ) -> Result<Self, ParameterError> {
        if let Some(expression) = &xpath {
            XPath::parse(expression)?;
        }

        let format = if xpath.is_some() {
            OutputFormat::Xml
        } else {
            format
        };

        Ok(Operation::OperationalCommand(OperationalArgs {
            commands: non_empty(commands, "operational commands")?,
            format,
            xpath,
        }))
    }

    pub fn shell(commands: Vec<String>) -> Result<Self, ParameterError> {
        Ok(Operation::Shell {
            commands: non_empty(commands, "shell commands")?,
        })
    }

    pub fn diff_config(second_host: impl Into<String>, mode: DiffMode) -> Self {
        Operation::DiffConfig {
            second_host: second_host.into(),
            mode,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Commit(_) => "commit",
            Operation::Compare { .. } => "compare",
            Operation::Pull(_) => "pull",
            Operation::Push(_) => "push",
            Operation::OperationalCommand(_) => "operational",
            Operation::Shell { .. } => "shell",
            Operation::DiffConfig { .. } => "diff-config",
            Operation::HealthCheck => "health",
            Operation::DeviceInfo => "info",
            Operation::InterfaceErrors => "errors",
        }
    }

    /// Whether running the operation leaves the device unchanged.
    pub fn is_read_only(&self) -> bool {
        match self {
            Operation::Commit(args) => args.check,
            Operation::Push(_) | Operation::Shell { .. } => false,
            Operation::Compare { .. }
            | Operation::Pull(_)
            | Operation::OperationalCommand(_)
            | Operation::DiffConfig { .. }
            | Operation::HealthCheck
            | Operation::DeviceInfo
            | Operation::InterfaceErrors => true,
        }
    }
}

fn non_empty(commands: Vec<String>, what: &'static str) -> Result<Vec<String>, ParameterError> {
    if commands.is_empty() {
        Err(ParameterError::EmptyCommands(what))
    } else {
        Ok(commands)
    }
}
