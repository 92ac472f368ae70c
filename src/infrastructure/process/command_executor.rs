use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, warn};

/// How long a killed process gets to exit before it is reported as a zombie.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Command executor errors
#[derive(Debug, Error)]
pub enum CommandExecutorError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Command '{command}' failed: {outcome}")]
    Unsuccessful {
        command: String,
        outcome: ProcessOutcome,
        output: String,
    },
}

/// Classification of one process run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited with status 0
    Ok,
    /// Exited with a non-zero status or was killed by a signal
    Failed,
    /// Did not finish before the timeout and was killed
    TimedOut,
    /// Still alive after being killed
    Zombie,
    /// Could not be started
    NotRun,
}

impl std::fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::TimedOut => "timed out",
            Self::Zombie => "zombie",
            Self::NotRun => "not run",
        };
        f.write_str(name)
    }
}

/// Configuration for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    /// Working directory for command execution
    pub working_directory: Option<PathBuf>,

    /// Environment variables to set for the process
    pub environment_variables: HashMap<String, String>,

    /// Kill the process after this long
    pub timeout: Option<Duration>,
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_environment_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of command execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub outcome: ProcessOutcome,

    /// Exit code, when the process exited normally
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    fn not_run(message: String) -> Self {
        Self {
            outcome: ProcessOutcome::NotRun,
            exit_code: None,
            stdout: String::new(),
            stderr: message,
            execution_time_ms: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome == ProcessOutcome::Ok
    }

    /// stdout followed by stderr, as a user would see them in a terminal.
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }

    /// Turn anything but a clean exit into an error.
    pub fn into_checked(self, command: &str) -> Result<Self, CommandExecutorError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandExecutorError::Unsuccessful {
                command: command.to_string(),
                outcome: self.outcome,
                output: self.combined_output(),
            })
        }
    }
}

/// Command executor for running external processes
pub struct CommandExecutor;

impl CommandExecutor {
    /// Run `program` with `args` and classify the outcome.
    ///
    /// Never fails: a process that cannot be started is reported as
    /// [`ProcessOutcome::NotRun`].
    pub async fn execute(program: &str, args: &[&str], config: &ExecutionConfig) -> ExecutionResult {
        let start_time = Instant::now();
        let command_line = Self::display_command(program, args);
        debug!("Running: {}", command_line);

        let mut cmd = TokioCommand::new(program);
        cmd.args(args);
        if let Some(working_dir) = &config.working_directory {
            cmd.current_dir(working_dir);
        }
        for (key, value) in &config.environment_variables {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn '{}': {}", command_line, e);
                return ExecutionResult::not_run(format!("Failed to spawn '{}': {}", command_line, e));
            }
        };

        // Drain both pipes while waiting so a chatty process never blocks.
        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let (outcome, exit_code) = match config.timeout {
            None => match child.wait().await {
                Ok(status) => (classify(status.success()), status.code()),
                Err(_) => (ProcessOutcome::Failed, None),
            },
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(Ok(status)) => (classify(status.success()), status.code()),
                Ok(Err(_)) => (ProcessOutcome::Failed, None),
                Err(_) => {
                    warn!("'{}' timed out after {:?}, killing it", command_line, limit);
                    let _ = child.start_kill();
                    match timeout(KILL_GRACE_PERIOD, child.wait()).await {
                        Ok(_) => (ProcessOutcome::TimedOut, None),
                        Err(_) => (ProcessOutcome::Zombie, None),
                    }
                }
            },
        };

        let (stdout, stderr) = if outcome == ProcessOutcome::Zombie {
            stdout_task.abort();
            stderr_task.abort();
            (String::new(), String::new())
        } else {
            (
                stdout_task.await.unwrap_or_default(),
                stderr_task.await.unwrap_or_default(),
            )
        };

        ExecutionResult {
            outcome,
            exit_code,
            stdout,
            stderr,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    /// Like [`CommandExecutor::execute`], but anything other than
    /// [`ProcessOutcome::Ok`] becomes an error.
    pub async fn execute_checked(
        program: &str,
        args: &[&str],
        config: &ExecutionConfig,
    ) -> Result<ExecutionResult, CommandExecutorError> {
        if program.trim().is_empty() {
            return Err(CommandExecutorError::InvalidCommand(
                "Command is empty".to_string(),
            ));
        }
        Self::execute(program, args, config)
            .await
            .into_checked(&Self::display_command(program, args))
    }

    pub fn display_command(program: &str, args: &[&str]) -> String {
        std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn classify(success: bool) -> ProcessOutcome {
    if success {
        ProcessOutcome::Ok
    } else {
        ProcessOutcome::Failed
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buffer).await;
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
