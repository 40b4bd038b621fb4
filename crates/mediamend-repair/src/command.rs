//! Builder for executing external tool commands with timeout support.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use mediamend_repair::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> mediamend_repair::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("quiet")
///     .arg("-print_format").arg("json")
///     .arg("-show_format")
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, s: impl Into<String>) -> Self {
        self.args.push(s.into());
        self
    }

    /// Append a path argument.
    pub fn arg_path(mut self, p: &Path) -> Self {
        self.args.push(p.to_string_lossy().into_owned());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolTimeout`] if the process exceeds the timeout (the child
    ///   is killed).
    /// - [`Error::ToolFailed`] if the process exits with a non-zero status
    ///   (message includes stderr).
    /// - [`Error::ToolNotFound`] if the program cannot be spawned.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        tracing::debug!(tool = %program_name, args = ?self.args, "running external tool");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        // A timed-out wait drops the child future; make sure the process
        // dies with it instead of running on unattended.
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(&program_name)
            } else {
                Error::Io(e)
            }
        })?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(Error::tool_failed(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            truncate(tool_output.stderr.trim(), 512)
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool_failed(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(Error::ToolTimeout {
                tool: program_name,
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new("nonexistent_tool_xyz_12345").execute().await;
        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }

    #[tokio::test]
    async fn execute_captures_stdout() {
        // `echo` should be universally available; skip quietly if not.
        match ToolCommand::new("echo").arg("hello").execute().await {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {}
        }
    }

    #[tokio::test]
    async fn timeout_kills_long_running_process() {
        let result = ToolCommand::new("sleep")
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        match result {
            Err(Error::ToolTimeout { tool, .. }) => assert_eq!(tool, "sleep"),
            Err(_) => {} // environments without `sleep`
            Ok(_) => panic!("sleep 10 should not complete in 100ms"),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
