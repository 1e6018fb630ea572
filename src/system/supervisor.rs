// src/system/supervisor.rs

use crate::core::run_state::AbortSignal;
use crate::error::ColorizerError;
use crate::system::pipes::{ChildStdio, PipeSet};
use std::io::{self, ErrorKind};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Lifecycle of the supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Launched, not yet resumed.
    Created,
    /// Running under supervision.
    Resumed,
    /// Exited on its own.
    Exited,
    /// Killed after the grace period.
    Terminated,
}

/// How [`ProcessSupervisor::resume_and_await`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The child exited on its own, possibly after being asked to close.
    Exited,
    /// The child outlived the grace period and was killed.
    Terminated,
}

/// Outcome of the race between the child and the abort signal.
enum Race {
    Exited(io::Result<ExitStatus>),
    Aborted,
}

/// Owns the child process from launch until its exit code is read.
///
/// The child is started with its stdio bound to the child side of a [`PipeSet`]. Until
/// [`resume_and_await`](Self::resume_and_await) runs, its output simply accumulates in the pipes.
/// Dropping the supervisor kills a child that is still running.
#[derive(Debug)]
pub struct ProcessSupervisor {
    child: Child,
    state: SupervisorState,
    status: Option<ExitStatus>,
}

fn build_command(program: &str, args: &[String], stdio: ChildStdio, env: &[(String, String)]) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .envs(env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .stdin(stdio.stdin)
        .stdout(stdio.stdout)
        .stderr(stdio.stderr)
        .kill_on_drop(true);
    command
}

impl ProcessSupervisor {
    /// Starts `command` with the child side of `pipes` as its stdio and `env` added to the
    /// inherited environment. Must be called inside a Tokio runtime context.
    pub fn launch(
        command: &[String],
        pipes: &PipeSet,
        env: &[(String, String)],
    ) -> Result<Self, ColorizerError> {
        let Some((program, args)) = command.split_first() else {
            return Err(ColorizerError::launch(
                t!("error.launch.empty"),
                "spawn",
                io::Error::new(ErrorKind::InvalidInput, "empty command line"),
            ));
        };

        // The command keeps its own copies of the child-side handles until it is dropped.
        let mut primary = build_command(program, args, pipes.child_stdio()?, env);
        let spawned = primary.spawn();
        drop(primary);

        // Fallback for Windows built-ins such as `dir` or `echo`, which only exist inside cmd.
        let child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
                log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
                let mut fallback = build_command("cmd", &[], pipes.child_stdio()?, env);
                fallback.arg("/C").args(command);
                let spawned = fallback.spawn();
                drop(fallback);
                spawned.map_err(|e| ColorizerError::launch(t!("error.launch.create"), "spawn", e))?
            }
            Err(e) => return Err(ColorizerError::launch(t!("error.launch.create"), "spawn", e)),
        };

        log::debug!("Launched '{}' (PID: {:?}).", program, child.id());
        Ok(Self {
            child,
            state: SupervisorState::Created,
            status: None,
        })
    }

    /// Where the child is in its lifecycle.
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Moves a freshly launched child to `Resumed`. Any other state is a contract violation.
    pub fn resume(&mut self) -> Result<(), ColorizerError> {
        if self.state != SupervisorState::Created {
            return Err(ColorizerError::State(t!("error.state.not_created").to_string()));
        }
        self.state = SupervisorState::Resumed;
        Ok(())
    }

    /// Resumes the child and waits for whichever comes first: its exit or `abort`.
    ///
    /// On abort the child is asked to close and given `grace` to do so before it is killed.
    /// Once `abort` fires, this never waits much longer than `grace`.
    pub async fn resume_and_await(
        &mut self,
        abort: &AbortSignal,
        grace: Duration,
    ) -> Result<Completion, ColorizerError> {
        self.resume()?;

        let race = tokio::select! {
            status = self.child.wait() => Race::Exited(status),
            () = abort.raised() => Race::Aborted,
        };

        match race {
            Race::Exited(status) => {
                let status = status.map_err(|e| {
                    ColorizerError::supervisor(t!("error.supervisor.wait"), "wait", e)
                })?;
                self.finish(status, SupervisorState::Exited);
                Ok(Completion::Exited)
            }
            Race::Aborted => {
                log::debug!("Abort raised while the child was running. Asking it to close.");
                self.request_close();
                match tokio::time::timeout(grace, self.child.wait()).await {
                    Ok(status) => {
                        let status = status.map_err(|e| {
                            ColorizerError::supervisor(t!("error.supervisor.wait"), "wait", e)
                        })?;
                        self.finish(status, SupervisorState::Exited);
                        Ok(Completion::Exited)
                    }
                    Err(_) => {
                        log::debug!("Child still running after {:?}. Terminating it.", grace);
                        self.terminate().await
                    }
                }
            }
        }
    }

    /// Asks the child to close on its own: SIGTERM on Unix. Other platforms have no such
    /// request, so the caller just waits out the grace period.
    #[cfg(unix)]
    pub fn request_close(&self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(raw) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
            log::debug!("Could not send SIGTERM to PID {}: {}", raw, e);
        }
    }

    /// No close request exists here; the grace period is waited out.
    #[cfg(not(unix))]
    pub fn request_close(&self) {
        log::debug!("No graceful close request on this platform. Waiting out the grace period.");
    }

    /// Kills the child and reaps it. A child that already exited is reported as `Exited`.
    pub async fn terminate(&mut self) -> Result<Completion, ColorizerError> {
        let finished = self.child.try_wait().map_err(|e| {
            ColorizerError::supervisor(t!("error.supervisor.wait"), "try_wait", e)
        })?;
        if let Some(status) = finished {
            self.finish(status, SupervisorState::Exited);
            return Ok(Completion::Exited);
        }

        self.child.start_kill().map_err(|e| {
            ColorizerError::supervisor(t!("error.supervisor.terminate"), "kill", e)
        })?;
        let status = self.child.wait().await.map_err(|e| {
            ColorizerError::supervisor(t!("error.supervisor.wait"), "wait", e)
        })?;
        self.finish(status, SupervisorState::Terminated);
        Ok(Completion::Terminated)
    }

    /// Best-effort kill used while tearing down after another failure.
    pub fn kill_quietly(&mut self) {
        if self.status.is_some() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            log::debug!("Could not kill child process: {}", e);
        }
    }

    /// The child's exit code. Only available once it has exited or been terminated.
    pub fn exit_code(&self) -> Result<i32, ColorizerError> {
        match (self.state, self.status) {
            (SupervisorState::Exited | SupervisorState::Terminated, Some(status)) => {
                exit_code_of(status)
                    .ok_or_else(|| ColorizerError::State(t!("error.state.no_code").to_string()))
            }
            _ => Err(ColorizerError::State(t!("error.state.not_exited").to_string())),
        }
    }

    fn finish(&mut self, status: ExitStatus, state: SupervisorState) {
        log::debug!("Child finished with {} ({:?}).", status, state);
        self.status = Some(status);
        self.state = state;
    }
}

/// The exit code of a finished process. On Unix a signal death maps to `128 + signal`.
fn exit_code_of(status: ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    status.code()
}
