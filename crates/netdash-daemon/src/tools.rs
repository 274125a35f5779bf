//! Subprocess wrappers for the ping and nmap endpoints

use std::io;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0} command not found. Is it installed?")]
    NotFound(String),
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The command ran and exited non-zero; carries its combined output
    #[error("{output}")]
    Failed { output: String },
    #[error("invalid host '{0}'")]
    InvalidHost(String),
}

/// Reject hosts that would be parsed as command-line options
pub fn validate_host(host: &str) -> Result<&str, ToolError> {
    let host = host.trim();
    if host.is_empty() || host.starts_with('-') || host.chars().any(char::is_whitespace) {
        return Err(ToolError::InvalidHost(host.to_string()));
    }
    Ok(host)
}

/// Send `count` echo requests to `host`
pub async fn ping(host: &str, count: u32) -> Result<String, ToolError> {
    let host = validate_host(host)?;
    let count_flag = if cfg!(windows) { "-n" } else { "-c" };
    let count = count.to_string();
    run("ping", &[count_flag, count.as_str(), host]).await
}

/// Fast scan of the most common ports on `host`
pub async fn nmap(host: &str) -> Result<String, ToolError> {
    let host = validate_host(host)?;
    run("nmap", &["-F", host]).await
}

/// Run a program and return stdout followed by stderr
async fn run(program: &str, args: &[&str]) -> Result<String, ToolError> {
    debug!(program, ?args, "Running command");

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ToolError::NotFound(program.to_string()),
            _ => ToolError::Spawn {
                program: program.to_string(),
                source,
            },
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(combined)
    } else {
        debug!(program, status = ?output.status.code(), "Command failed");
        Err(ToolError::Failed { output: combined })
    }
}
