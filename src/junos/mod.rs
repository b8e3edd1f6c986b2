//! Device sessions with Junos devices over SSH.
//!
//! Operational commands run on their own exec channel each. Configuration
//! and shell work is sent as a script to one CLI shell channel, so that
//! `configure private` and the statements after it share a context. Files
//! move over SFTP.

pub mod commands;
pub mod reply;

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use async_trait::async_trait;
use russh::ChannelMsg;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::diff::unified_diff;
use crate::error::SessionError;
use crate::operation::{DiffMode, Operation, OperationalArgs, PullArgs, PushArgs};
use crate::router::host_prefixed_path;
use crate::session::{DeviceSession, SessionProvider};
use crate::xpath::XPath;

use commands::{
    commit_script, compare_script, configuration_command, operational_command, shell_script,
    DEVICE_INFO_COMMAND, HEALTH_COMMANDS, INTERFACE_ERRORS_COMMAND,
};

/// Opens password-authenticated SSH sessions to Junos devices.
#[derive(Debug, Clone)]
pub struct JunosSshProvider {
    server_check: ServerCheckMethod,
}

impl JunosSshProvider {
    /// A provider that accepts any host key.
    pub fn new() -> Self {
        Self {
            server_check: ServerCheckMethod::NoCheck,
        }
    }

    /// Verifies host keys with `server_check` instead.
    pub fn with_server_check(mut self, server_check: ServerCheckMethod) -> Self {
        self.server_check = server_check;
        self
    }
}

impl Default for JunosSshProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for JunosSshProvider {
    async fn open(
        &self,
        host: &str,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        let client = connect(host, config, self.server_check.clone()).await?;
        Ok(Box::new(JunosSession {
            host: host.to_string(),
            client,
            config: config.clone(),
            server_check: self.server_check.clone(),
        }))
    }
}

async fn connect(
    host: &str,
    config: &ConnectionConfig,
    server_check: ServerCheckMethod,
) -> Result<Client, SessionError> {
    let ssh_config = Config {
        inactivity_timeout: Some(config.session_timeout()),
        ..Default::default()
    };

    debug!("Connecting to {}:{} as {}", host, config.port, config.username);
    let connecting = Client::connect_with_config(
        (host.to_string(), config.port),
        &config.username,
        AuthMethod::with_password(&config.password),
        server_check,
        ssh_config,
    );

    match timeout(config.connect_timeout(), connecting).await {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => Err(SessionError::Connect {
            host: host.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(SessionError::ConnectTimeout {
            host: host.to_string(),
            secs: config.connect_timeout,
        }),
    }
}

/// One authenticated SSH connection to a Junos device.
pub struct JunosSession {
    host: String,
    client: Client,
    config: ConnectionConfig,
    server_check: ServerCheckMethod,
}

#[async_trait]
impl DeviceSession for JunosSession {
    // The session timeout is an inactivity limit enforced by russh, so a
    // long transfer that keeps making progress is never cut off.
    async fn execute(&mut self, operation: &Operation) -> Result<String, SessionError> {
        self.run(operation).await
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Disconnect from {} reported: {}", self.host, e);
        }
    }
}

impl JunosSession {
    async fn run(&self, operation: &Operation) -> Result<String, SessionError> {
        match operation {
            Operation::Commit(args) => reject_errors(self.run_script(&commit_script(args)).await?),
            Operation::Compare { commands } => {
                reject_errors(self.run_script(&compare_script(commands)).await?)
            }
            Operation::Shell { commands } => self.run_script(&shell_script(commands)).await,
            Operation::OperationalCommand(args) => self.operational(args).await,
            Operation::DeviceInfo => {
                let json = self.exec(DEVICE_INFO_COMMAND).await?;
                Ok(reply::device_info(&json).unwrap_or_else(|e| {
                    warn!("Unexpected version reply from {}: {}", self.host, e);
                    json
                }))
            }
            Operation::HealthCheck => {
                let mut out = String::new();
                for command in HEALTH_COMMANDS {
                    out.push_str(&format!("> {command}\n"));
                    out.push_str(&self.exec(command).await?);
                    out.push('\n');
                }
                Ok(out)
            }
            Operation::InterfaceErrors => {
                let json = self.exec(INTERFACE_ERRORS_COMMAND).await?;
                Ok(reply::interface_errors(&json).unwrap_or_else(|e| {
                    warn!("Unexpected interface reply from {}: {}", self.host, e);
                    json
                }))
            }
            Operation::DiffConfig { second_host, mode } => {
                self.diff_config(second_host, *mode).await
            }
            Operation::Pull(args) => self.pull(args).await,
            Operation::Push(args) => self.push(args).await,
        }
    }

    async fn operational(&self, args: &OperationalArgs) -> Result<String, SessionError> {
        let xpath = args
            .xpath
            .as_deref()
            .map(XPath::parse)
            .transpose()
            .map_err(|e| SessionError::Operation(e.to_string()))?;

        let mut out = String::new();
        for command in &args.commands {
            let reply = self.exec(&operational_command(command, args.format)).await?;
            out.push_str(&format!("> {command}\n"));
            match &xpath {
                None => out.push_str(&reply),
                Some(xpath) => {
                    let selected = xpath
                        .select(&reply)
                        .map_err(|e| SessionError::Operation(format!("{e:#}")))?;
                    for element in selected {
                        out.push_str(&element);
                        out.push('\n');
                    }
                }
            }
        }
        Ok(out)
    }

    async fn diff_config(&self, second_host: &str, mode: DiffMode) -> Result<String, SessionError> {
        let command = configuration_command(mode);
        let (ours, theirs) = futures::try_join!(self.exec(command), async {
            let other = connect(second_host, &self.config, self.server_check.clone()).await?;
            let config = exec_on(&other, command).await;
            if let Err(e) = other.disconnect().await {
                debug!("Disconnect from {} reported: {}", second_host, e);
            }
            config
        })?;

        let diff = unified_diff(&self.host, &ours, second_host, &theirs);
        if diff.is_empty() {
            Ok(format!("No differences between {} and {}.\n", self.host, second_host))
        } else {
            Ok(diff)
        }
    }

    async fn pull(&self, args: &PullArgs) -> Result<String, SessionError> {
        let local = local_pull_path(&args.local_destination, &args.remote_source, &self.host);
        let start = Instant::now();
        let mut out = String::new();
        if args.show_progress {
            out.push_str(&format!("Retrieving {} to {}\n", args.remote_source, local.display()));
        }

        self.client
            .download_file(args.remote_source.clone(), &local)
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;

        if args.show_progress {
            out.push_str(&transfer_done(&local, start).await);
        }
        out.push_str(&format!("Retrieved {} to {}\n", args.remote_source, local.display()));
        Ok(out)
    }

    async fn push(&self, args: &PushArgs) -> Result<String, SessionError> {
        let remote = remote_push_path(&args.remote_destination, &args.local_source);
        let start = Instant::now();
        let mut out = String::new();
        if args.show_progress {
            out.push_str(&format!("Sending {} to {}\n", args.local_source.display(), remote));
        }

        self.client
            .upload_file(
                args.local_source.display().to_string(),
                remote.clone(),
                Some(self.config.session_timeout),
                None,
                args.show_progress,
            )
            .await
            .map_err(|e| SessionError::Transfer(e.to_string()))?;

        if args.show_progress {
            out.push_str(&transfer_done(&args.local_source, start).await);
        }
        out.push_str(&format!("Pushed {} to {}\n", args.local_source.display(), remote));
        Ok(out)
    }

    async fn exec(&self, command: &str) -> Result<String, SessionError> {
        exec_on(&self.client, command).await
    }

    /// Feeds `lines` to the CLI on a shell channel and collects everything it
    /// prints until the CLI exits.
    async fn run_script(&self, lines: &[String]) -> Result<String, SessionError> {
        debug!("Running {} line script on {}", lines.len(), self.host);
        let mut script = lines.join("\n");
        script.push_str("\nexit\n");

        let mut channel = self.client.get_channel().await?;
        channel.request_shell(true).await?;
        channel.data(script.as_bytes()).await?;
        channel.eof().await?;

        let mut output = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        script_outcome(
            String::from_utf8_lossy(&output).into_owned(),
            exit_status,
            self.client.is_closed(),
            self.config.session_timeout,
        )
    }
}

async fn exec_on(client: &Client, command: &str) -> Result<String, SessionError> {
    let result = client.execute(command).await?;
    if result.exit_status != 0 {
        return Err(SessionError::Operation(format!(
            "'{}' exited with status {}: {}",
            command,
            result.exit_status,
            result.stderr.trim()
        )));
    }
    Ok(result.stdout)
}

/// Checks how a script's channel ended.
///
/// A channel that ends without an exit status was cut off; if the whole
/// connection is gone, the device went quiet for longer than the session
/// timeout.
fn script_outcome(
    output: String,
    exit_status: Option<u32>,
    connection_closed: bool,
    session_timeout: u64,
) -> Result<String, SessionError> {
    match exit_status {
        Some(0) => Ok(output),
        Some(status) => Err(SessionError::Operation(format!(
            "CLI exited with status {status}:\n{output}"
        ))),
        None if connection_closed => Err(SessionError::SessionTimeout(session_timeout)),
        None => Err(SessionError::Operation(format!(
            "CLI closed the channel before exiting. Output so far:\n{output}"
        ))),
    }
}

/// Where a pulled file lands locally.
///
/// A directory destination (existing, or written with a trailing separator)
/// receives `HOST_<remote file name>`; a file destination gets the host
/// prefixed to its own name.
fn local_pull_path(destination: &Path, remote_source: &str, host: &str) -> PathBuf {
    let names_directory = destination.is_dir()
        || destination
            .to_str()
            .is_some_and(|d| d.ends_with(std::path::MAIN_SEPARATOR) || d.ends_with('/'));

    if names_directory {
        destination.join(format!("{host}_{}", remote_file_name(remote_source)))
    } else {
        host_prefixed_path(destination, host)
    }
}

/// Where a pushed file lands on the device. A destination ending in `/` is a
/// directory and receives the local file name.
fn remote_push_path(destination: &str, local_source: &Path) -> String {
    if destination.is_empty() || destination.ends_with('/') {
        let name = local_source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{destination}{name}")
    } else {
        destination.to_string()
    }
}

fn remote_file_name(remote: &str) -> &str {
    let trimmed = remote.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Turns CLI output that reports `error:` lines into an operation failure.
fn reject_errors(output: String) -> Result<String, SessionError> {
    if output.lines().any(|line| line.trim_start().starts_with("error:")) {
        Err(SessionError::Operation(output))
    } else {
        Ok(output)
    }
}

async fn transfer_done(path: &Path, start: Instant) -> String {
    let bytes = tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .unwrap_or_default();
    format!(
        "Transferred {} bytes in {:.1}s\n",
        bytes,
        start.elapsed().as_secs_f64()
    )
}
