//! Junos CLI text for each operation.

use crate::operation::{CommitArgs, DiffMode, OutputFormat};

pub const DEVICE_INFO_COMMAND: &str = "show version | display json";
pub const INTERFACE_ERRORS_COMMAND: &str = "show interfaces extensive | display json";

/// Commands whose output together describes device health.
pub const HEALTH_COMMANDS: &[&str] = &[
    "show chassis alarms",
    "show system alarms",
    "show chassis routing-engine",
    "show system storage",
];

/// Loads the set commands into a private candidate, shows the pending
/// changes and commits or checks them.
pub fn commit_script(args: &CommitArgs) -> Vec<String> {
    let mut script = vec!["configure private".to_string()];
    script.extend(args.set_commands().iter().cloned());
    script.push("show | compare".to_string());
    script.push(commit_statement(args));
    if args.check {
        script.push("rollback 0".to_string());
    }
    script.push("exit configuration-mode".to_string());
    script
}

/// The single `commit` line for `args`.
pub fn commit_statement(args: &CommitArgs) -> String {
    if args.check {
        return "commit check".to_string();
    }

    let mut statement = String::from("commit");
    if args.sync {
        statement.push_str(" synchronize");
    }
    if let Some(comment) = &args.comment {
        statement.push_str(&format!(" comment {}", quote(comment)));
    }
    if let Some(seconds) = args.confirm {
        // Junos counts confirmed commits in minutes.
        statement.push_str(&format!(" confirmed {}", seconds / 60));
    }
    if let Some(at) = &args.at_time {
        statement.push_str(&format!(" at {}", quote(at)));
    }
    statement
}

/// Loads the set commands, shows the resulting diff and discards it.
pub fn compare_script(commands: &[String]) -> Vec<String> {
    let mut script = vec!["configure private".to_string()];
    script.extend(commands.iter().cloned());
    script.push("show | compare".to_string());
    script.push("rollback 0".to_string());
    script.push("exit configuration-mode".to_string());
    script
}

/// Runs the commands in a Unix shell started from the CLI.
pub fn shell_script(commands: &[String]) -> Vec<String> {
    let mut script = vec!["start shell sh".to_string()];
    script.extend(commands.iter().cloned());
    script.push("exit".to_string());
    script
}

/// An operational command, asking for an XML reply when requested.
pub fn operational_command(command: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Xml if !command.contains("display xml") => {
            format!("{command} | display xml")
        }
        _ => command.to_string(),
    }
}

pub fn configuration_command(mode: DiffMode) -> &'static str {
    match mode {
        DiffMode::Set => "show configuration | display set",
        DiffMode::Stanza => "show configuration",
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}
