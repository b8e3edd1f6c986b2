//! Command-line interface for netdispatch
//!
//! This module defines the clap surface of the tool and turns parsed
//! arguments into the three inputs of a dispatch:
//!
//! - a [`ConnectionConfig`] shared by every device session
//! - the ordered host list
//! - one validated [`Operation`]
//!
//! Subcommands may be abbreviated to any unique prefix (`hea` runs `health`);
//! [`expand_subcommand`] rewrites the argument vector before clap sees it.
//! Every validation failure surfaces here, before a device is contacted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Command, CommandFactory, Parser, Subcommand};

use crate::config::ConnectionConfig;
use crate::error::ResolveError;
use crate::hosts::clean_lines;
use crate::operation::{CommitArgs, DiffMode, Operation, OutputFormat, PullArgs, PushArgs};
use crate::resolver::resolve;
use crate::router::OutputDestination;
use crate::validation::parse_output_mode;

/// Runs one operation against many Junos devices in parallel.
///
/// Global options precede the subcommand:
///
/// ```text
/// netdispatch -i 10.0.0.1,10.0.0.2 -u admin -p secret health
/// netdispatch -i routers.txt -u admin -w m /tmp/out.txt op "show route summary"
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "netdispatch",
    about = "Run operations against many Junos devices concurrently",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Target devices: a comma separated list or a file with one host per line
    #[arg(short = 'i', long = "ip", value_name = "HOSTS")]
    pub hosts: String,

    #[arg(short = 'u', long, env = "NETDISPATCH_USER")]
    pub username: String,

    #[arg(short = 'p', long, env = "NETDISPATCH_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// SSH port on every device
    #[arg(short = 'P', long, default_value_t = 22)]
    pub port: u16,

    /// Seconds a session may run before it is abandoned
    #[arg(
        short = 't',
        long,
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(5..=7200)
    )]
    pub session_timeout: u64,

    /// Seconds allowed for connecting to a device
    #[arg(
        short = 'T',
        long,
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..=60)
    )]
    pub connect_timeout: u64,

    /// Write results to files instead of the console. MODE is s/single (one
    /// shared file) or m/multiple (one file per host, named HOST_PATH)
    #[arg(short = 'w', long = "write", num_args = 2, value_names = ["MODE", "PATH"])]
    pub write: Option<Vec<String>>,

    /// Number of devices worked on at once [default: twice the CPU count]
    #[arg(long)]
    pub max_parallel: Option<usize>,
}

/// Operations available on every device.
///
/// Arguments named `commands` take either a comma separated list or a file
/// with one command per line; blank and `#` lines are ignored.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load set commands and commit them
    Commit {
        commands: Option<String>,

        /// Commit without loading any commands
        #[arg(long)]
        blank: bool,

        /// Run commit check and discard the candidate
        #[arg(long)]
        check: bool,

        /// Synchronize the commit to both routing engines
        #[arg(long)]
        sync: bool,

        #[arg(short = 'c', long)]
        comment: Option<String>,

        /// Commit confirmed, rolled back after this many seconds
        #[arg(
            short = 'C',
            long,
            value_parser = clap::value_parser!(u64).range(60..=7200)
        )]
        confirm: Option<u64>,

        /// Commit at 'hh:mm[:ss]' or 'yyyy-mm-dd hh:mm[:ss]'
        #[arg(short = 'a', long = "at")]
        at_time: Option<String>,
    },

    /// Show the differences set commands would make, without committing
    Compare { commands: String },

    /// Copy a file from every device
    Pull {
        source: String,

        /// Local path; each device's copy is prefixed with its host
        destination: PathBuf,

        #[arg(long)]
        progress: bool,
    },

    /// Copy a local file to every device
    Push {
        source: PathBuf,

        destination: String,

        #[arg(long)]
        progress: bool,
    },

    /// Run operational mode commands
    Operational {
        commands: String,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Keep only the reply elements matching this path (implies xml)
        #[arg(short = 'x', long)]
        xpath: Option<String>,
    },

    /// Hostname, model and software version
    Info,

    /// Diff each device's configuration against a second device
    DiffConfig {
        #[arg(short = 'o', long)]
        second_host: String,

        #[arg(short = 'm', long, value_enum, default_value_t = DiffMode::Set)]
        mode: DiffMode,
    },

    /// Alarms, routing engine and storage status
    Health,

    /// Interfaces with input or output errors
    Errors,

    /// Run commands in a Unix shell on the device
    Shell { commands: String },
}

impl Cli {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.username, &self.password)
            .with_port(self.port)
            .with_session_timeout(self.session_timeout)
            .with_connect_timeout(self.connect_timeout)
    }

    pub fn hosts(&self) -> Result<Vec<String>> {
        clean_lines(&self.hosts).context("Failed to read the host list")
    }

    pub fn destination(&self) -> Result<OutputDestination> {
        Ok(parse_output_mode(self.write.as_deref())?)
    }

    /// Builds the validated operation named by the subcommand.
    pub fn operation(&self) -> Result<Operation> {
        let operation = match &self.command {
            Commands::Commit {
                commands,
                blank,
                check,
                sync,
                comment,
                confirm,
                at_time,
            } => Operation::commit(CommitArgs {
                commands: commands.as_deref().map(read_commands).transpose()?,
                blank: *blank,
                check: *check,
                sync: *sync,
                comment: comment.clone(),
                confirm: *confirm,
                at_time: at_time.clone(),
            })?,
            Commands::Compare { commands } => Operation::compare(read_commands(commands)?)?,
            Commands::Pull {
                source,
                destination,
                progress,
            } => Operation::pull(PullArgs {
                remote_source: source.clone(),
                local_destination: destination.clone(),
                show_progress: *progress,
            }),
            Commands::Push {
                source,
                destination,
                progress,
            } => Operation::push(PushArgs {
                local_source: source.clone(),
                remote_destination: destination.clone(),
                show_progress: *progress,
            })?,
            Commands::Operational {
                commands,
                format,
                xpath,
            } => Operation::operational(read_commands(commands)?, *format, xpath.clone())?,
            Commands::Info => Operation::DeviceInfo,
            Commands::DiffConfig { second_host, mode } => {
                Operation::diff_config(second_host.clone(), *mode)
            }
            Commands::Health => Operation::HealthCheck,
            Commands::Errors => Operation::InterfaceErrors,
            Commands::Shell { commands } => Operation::shell(read_commands(commands)?)?,
        };
        Ok(operation)
    }
}

fn read_commands(spec: &str) -> Result<Vec<String>> {
    clean_lines(spec).context("Failed to read commands")
}

/// Names of every subcommand, as typed on the command line.
pub fn subcommand_names() -> Vec<String> {
    Cli::command()
        .get_subcommands()
        .map(|sub| sub.get_name().to_string())
        .collect()
}

/// Replaces an abbreviated subcommand in `args` with its full name.
///
/// `args` includes the program name. Options before the subcommand are
/// skipped together with their values. A prefix that matches no subcommand is
/// left untouched for clap to report.
///
/// # Examples
///
/// ```
/// use netdispatch::cli::expand_subcommand;
///
/// let args: Vec<String> = ["netdispatch", "-i", "r1", "-w", "s", "out.txt", "hea"]
///     .iter()
///     .map(|s| s.to_string())
///     .collect();
/// let expanded = expand_subcommand(args).unwrap();
/// assert_eq!(expanded.last().map(String::as_str), Some("health"));
/// ```
pub fn expand_subcommand(mut args: Vec<String>) -> Result<Vec<String>, ResolveError> {
    let mut command = Cli::command();
    command.build();
    let names = subcommand_names();

    let mut index = 1;
    while index < args.len() {
        let token = args[index].as_str();
        if token == "--" {
            break;
        }
        if token.starts_with('-') && token.len() > 1 {
            index += 1 + values_after(&command, token);
            continue;
        }

        match resolve(token, names.iter().map(String::as_str)) {
            Ok(name) => args[index] = name,
            Err(ResolveError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        break;
    }

    Ok(args)
}

/// How many of the following tokens belong to the option `token`.
fn values_after(command: &Command, token: &str) -> usize {
    let (arg, attached) = if let Some(long) = token.strip_prefix("--") {
        match long.split_once('=') {
            Some((name, _)) => (command.get_arguments().find(|a| a.get_long() == Some(name)), true),
            None => (command.get_arguments().find(|a| a.get_long() == Some(long)), false),
        }
    } else {
        let short = token.chars().nth(1);
        let arg = command
            .get_arguments()
            .find(|a| a.get_short().is_some() && a.get_short() == short);
        (arg, token.chars().count() > 2)
    };

    let Some(arg) = arg else {
        return 0;
    };
    if !arg.get_action().takes_values() {
        return 0;
    }

    let values = arg.get_num_args().map(|range| range.min_values()).unwrap_or(1);
    if attached {
        values.saturating_sub(1)
    } else {
        values
    }
}
