use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::error::ProcessError;

/// A program invocation, built with [`ProcessCommandBuilder`](super::ProcessCommandBuilder)
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ProcessCommand {
    /// Program and arguments as one line, for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }

    /// `Ok(())` on success, the matching [`ProcessError`] otherwise
    pub fn check(&self) -> Result<(), ProcessError> {
        match self {
            ExitStatus::Success => Ok(()),
            ExitStatus::Error(code) => Err(ProcessError::ExitCode(*code)),
            ExitStatus::Signal(signal) => Err(ProcessError::Signal(*signal)),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            return ExitStatus::Success;
        }
        if let Some(code) = status.code() {
            return ExitStatus::Error(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }
        ExitStatus::Error(1)
    }
}

/// Runs one command to completion and captures its output.
///
/// A non-zero exit is reported through [`ProcessOutput::status`], not as an
/// `Err`; errors mean the process could not be started or was cut off.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Grace period between forwarding an interrupt and killing the group
const INTERRUPT_GRACE: Duration = Duration::from_secs(10);

/// Runs commands as child processes of the pipeline.
///
/// On unix each command leads its own process group. A timeout SIGKILLs the
/// whole group, and SIGINT/SIGTERM received by the pipeline while a command
/// runs are forwarded to the group, so tools that fork workers (node,
/// serverless) never outlive the stage that reported their result.
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn spawn(command: &ProcessCommand) -> Result<tokio::process::Child, ProcessError> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProcessError::CommandNotFound(command.program.clone()),
            _ => ProcessError::Io(e),
        })
    }
}

/// Signals that stop the pipeline and are passed on to the running tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(unix), allow(dead_code))]
enum Interrupt {
    Int,
    Term,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Interrupt::Int => "SIGINT",
            Interrupt::Term => "SIGTERM",
        })
    }
}

enum Finished {
    Exited(std::io::Result<std::process::Output>),
    TimedOut(Duration),
    Interrupted(Interrupt),
}

/// Process group led by a spawned child; the group id is the child's pid
#[cfg_attr(not(unix), allow(dead_code))]
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn of(child: &tokio::process::Child) -> Self {
        Self(child.id())
    }

    #[cfg(unix)]
    fn send(&self, signal: nix::sys::signal::Signal) {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.0 else { return };
        match killpg(Pid::from_raw(pid as i32), signal) {
            Ok(()) => debug!("Sent {:?} to process group {}", signal, pid),
            // Every member already exited
            Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to send {:?} to process group {}: {}", signal, pid, e),
        }
    }

    fn kill(&self) {
        #[cfg(unix)]
        self.send(nix::sys::signal::Signal::SIGKILL);
    }

    fn forward(&self, interrupt: Interrupt) {
        #[cfg(unix)]
        self.send(match interrupt {
            Interrupt::Int => nix::sys::signal::Signal::SIGINT,
            Interrupt::Term => nix::sys::signal::Signal::SIGTERM,
        });
        // Without a separate group the console delivers Ctrl-C to the child itself
        #[cfg(not(unix))]
        let _ = interrupt;
    }
}

async fn expiry(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

#[cfg(unix)]
async fn shutdown_requested() -> Interrupt {
    use tokio::signal::unix::{signal, SignalKind};

    match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
        (Ok(mut sigint), Ok(mut sigterm)) => tokio::select! {
            _ = sigint.recv() => Interrupt::Int,
            _ = sigterm.recv() => Interrupt::Term,
        },
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install signal handlers: {}", e);
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_requested() -> Interrupt {
    std::future::pending().await
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        debug!("Spawning {}", command.display());
        if let Some(dir) = &command.working_dir {
            trace!("Working directory: {}", dir.display());
        }

        let start = Instant::now();
        let child = Self::spawn(&command)?;
        let group = ProcessGroup::of(&child);
        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let finished = tokio::select! {
            result = &mut wait => Finished::Exited(result),
            limit = expiry(command.timeout) => Finished::TimedOut(limit),
            interrupt = shutdown_requested() => Finished::Interrupted(interrupt),
        };

        let output = match finished {
            Finished::Exited(result) => result?,
            Finished::TimedOut(limit) => {
                warn!("{} exceeded {:?}, killing it", command.program, limit);
                group.kill();
                return Err(ProcessError::Timeout(limit));
            }
            Finished::Interrupted(interrupt) => {
                warn!("Received {}, passing it on to {}", interrupt, command.program);
                group.forward(interrupt);
                if tokio::time::timeout(INTERRUPT_GRACE, &mut wait).await.is_err() {
                    group.kill();
                }
                return Err(ProcessError::Interrupted(interrupt.to_string()));
            }
        };

        let result = ProcessOutput {
            status: output.status.into(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };

        match &result.status {
            ExitStatus::Signal(signal) => warn!(
                "{} killed by signal {} after {:?}",
                command.program, signal, result.duration
            ),
            status => debug!(
                "{} exited with {:?} after {:?}",
                command.program,
                status.code(),
                result.duration
            ),
        }
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::subprocess::ProcessCommandBuilder;

    #[tokio::test]
    async fn test_forwarded_term_reaches_the_tool() {
        let command = ProcessCommandBuilder::new("sh")
            .args(["-c", "trap 'exit 7' TERM; while :; do sleep 1; done"])
            .build();
        let child = TokioProcessRunner::spawn(&command).unwrap();
        let group = ProcessGroup::of(&child);

        // Let the shell install its trap
        tokio::time::sleep(Duration::from_millis(300)).await;
        group.forward(Interrupt::Term);

        let output = tokio::time::timeout(Duration::from_secs(5), child.wait_with_output())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(output.status.code(), Some(7));
    }

    #[tokio::test]
    async fn test_signalling_a_finished_group_is_harmless() {
        let command = ProcessCommandBuilder::new("true").build();
        let child = TokioProcessRunner::spawn(&command).unwrap();
        let group = ProcessGroup::of(&child);
        child.wait_with_output().await.unwrap();

        group.kill();
        group.forward(Interrupt::Int);
    }
}
