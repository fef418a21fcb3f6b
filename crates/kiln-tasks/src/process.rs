//! External command execution for task actions

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

/// How much of a command's output reaches the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Capture output; show it only if the command fails
    Silent,
    /// Echo the command and stream its output
    #[default]
    All,
}

/// Runs shell command templates from a fixed working directory
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    working_dir: PathBuf,
    verbosity: Verbosity,
}

impl ProcessRunner {
    pub fn new(working_dir: impl Into<PathBuf>, verbosity: Verbosity) -> Self {
        Self {
            working_dir: working_dir.into(),
            verbosity,
        }
    }

    /// Fill in `template` and run it through `sh -c`. Returns captured stdout,
    /// which is empty when output is streamed.
    pub fn run_template(
        &self,
        template: &str,
        vars: &[(&str, String)],
    ) -> Result<String, ProcessError> {
        let command = render_template(template, vars);
        self.run_shell(&command)
    }

    /// Run a command line through `sh -c`
    pub fn run_shell(&self, command: &str) -> Result<String, ProcessError> {
        run_in(&self.working_dir, "sh", &["-c", command], command, self.verbosity)
    }

    /// Run a program with explicit arguments, bypassing the shell
    pub fn run_args(&self, program: &str, args: &[String]) -> Result<String, ProcessError> {
        let command_line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_in(&self.working_dir, program, &args, &command_line, self.verbosity)
    }
}

fn run_in(
    working_dir: &Path,
    program: &str,
    args: &[&str],
    command_line: &str,
    verbosity: Verbosity,
) -> Result<String, ProcessError> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(working_dir);

    if verbosity == Verbosity::All {
        info!(command = %command_line, "running");
        let status = cmd
            .stdin(Stdio::null())
            .status()
            .map_err(|e| ProcessError::Spawn {
                command: command_line.to_string(),
                source: e,
            })?;
        if !status.success() {
            return Err(ProcessError::CommandFailed {
                command: command_line.to_string(),
                exit_code: status.code(),
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        return Ok(String::new());
    }

    debug!(command = %command_line, "running silently");
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ProcessError::Spawn {
            command: command_line.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(ProcessError::CommandFailed {
            command: command_line.to_string(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Replace every `{name}` in `template` with its value. Unknown placeholders are
/// left as written.
pub fn render_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut rendered = template.to_string();
    for (name, value) in vars {
        rendered = rendered.replace(&format!("{{{}}}", name), value);
    }
    rendered
}

/// Process errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The program could not be started
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully
    #[error("Command '{command}' failed with exit code {}{}", exit_label(.exit_code), failure_detail(.stderr))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl ProcessError {
    /// Exit code of the failed command, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => *exit_code,
            Self::Spawn { .. } => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

fn failure_detail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{}", trimmed)
    }
}
