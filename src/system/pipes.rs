// src/system/pipes.rs

use crate::error::ColorizerError;
use std::io::{self, PipeReader, PipeWriter};
use std::process::Stdio;

/// The three anonymous pipes between `cr` and the child.
///
/// Each of the six ends lives in its own `Option` slot, so closing an end is a `take` and an end
/// can only ever be closed once. The parent ends are created non-inheritable; the child only
/// receives the duplicates handed out by [`PipeSet::child_stdio`].
#[derive(Debug)]
pub struct PipeSet {
    stdout_read: Option<PipeReader>,
    stdout_write: Option<PipeWriter>,
    stderr_read: Option<PipeReader>,
    stderr_write: Option<PipeWriter>,
    stdin_read: Option<PipeReader>,
    stdin_write: Option<PipeWriter>,
}

/// Child-side ends converted into stdio for one launch attempt.
#[derive(Debug)]
pub struct ChildStdio {
    /// Read end of the stdin pipe.
    pub stdin: Stdio,
    /// Write end of the stdout pipe.
    pub stdout: Stdio,
    /// Write end of the stderr pipe.
    pub stderr: Stdio,
}

/// Parent-side ends, each owned by the relay that serves it.
#[derive(Debug)]
pub struct ParentSide {
    /// Read end of the child's stdout.
    pub stdout: PipeReader,
    /// Read end of the child's stderr.
    pub stderr: PipeReader,
    /// Write end of the child's stdin.
    pub stdin: PipeWriter,
}

fn create_pipe() -> Result<(PipeReader, PipeWriter), ColorizerError> {
    io::pipe().map_err(|e| ColorizerError::system_resource(t!("error.pipes.create"), "pipe", e))
}

impl PipeSet {
    /// Allocates the stdout, stderr and stdin pipes. Pipes created before a failure are
    /// released when the error propagates.
    pub fn create() -> Result<Self, ColorizerError> {
        let (stdout_read, stdout_write) = create_pipe()?;
        let (stderr_read, stderr_write) = create_pipe()?;
        let (stdin_read, stdin_write) = create_pipe()?;
        log::debug!("Created stdout, stderr and stdin pipes.");

        Ok(Self {
            stdout_read: Some(stdout_read),
            stdout_write: Some(stdout_write),
            stderr_read: Some(stderr_read),
            stderr_write: Some(stderr_write),
            stdin_read: Some(stdin_read),
            stdin_write: Some(stdin_write),
        })
    }

    /// Duplicates the child-side ends as stdio for a child process.
    pub fn child_stdio(&self) -> Result<ChildStdio, ColorizerError> {
        let (Some(stdin), Some(stdout), Some(stderr)) =
            (&self.stdin_read, &self.stdout_write, &self.stderr_write)
        else {
            return Err(ColorizerError::State(t!("error.pipes.closed").to_string()));
        };

        let duplicate =
            |e| ColorizerError::system_resource(t!("error.pipes.duplicate"), "try_clone", e);
        Ok(ChildStdio {
            stdin: Stdio::from(stdin.try_clone().map_err(duplicate)?),
            stdout: Stdio::from(stdout.try_clone().map_err(duplicate)?),
            stderr: Stdio::from(stderr.try_clone().map_err(duplicate)?),
        })
    }

    /// Releases the child-side ends. Once the child holds its own copies, this is what lets the
    /// parent see end-of-pipe when the child exits. Calling it again does nothing.
    pub fn close_child_side(&mut self) {
        let closed = [
            self.stdin_read.take().is_some(),
            self.stdout_write.take().is_some(),
            self.stderr_write.take().is_some(),
        ];
        if closed.contains(&true) {
            log::debug!("Closed child-side pipe handles.");
        }
    }

    #[cfg(test)]
    fn is_child_side_open(&self) -> bool {
        self.stdin_read.is_some() || self.stdout_write.is_some() || self.stderr_write.is_some()
    }

    /// Moves the parent ends out for the relays. Fails if they were already taken.
    pub fn take_parent_side(&mut self) -> Result<ParentSide, ColorizerError> {
        if self.stdout_read.is_none() || self.stderr_read.is_none() || self.stdin_write.is_none() {
            return Err(ColorizerError::State(t!("error.pipes.taken").to_string()));
        }
        match (
            self.stdout_read.take(),
            self.stderr_read.take(),
            self.stdin_write.take(),
        ) {
            (Some(stdout), Some(stderr), Some(stdin)) => Ok(ParentSide {
                stdout,
                stderr,
                stdin,
            }),
            _ => Err(ColorizerError::State(t!("error.pipes.taken").to_string())),
        }
    }

    /// How many of the six ends this set still owns.
    pub fn open_handles(&self) -> usize {
        [
            self.stdout_read.is_some(),
            self.stdout_write.is_some(),
            self.stderr_read.is_some(),
            self.stderr_write.is_some(),
            self.stdin_read.is_some(),
            self.stdin_write.is_some(),
        ]
        .into_iter()
        .filter(|open| *open)
        .count()
    }

    /// Releases every end still owned. Safe to call any number of times.
    pub fn destroy(&mut self) {
        self.close_child_side();
        self.stdout_read = None;
        self.stderr_read = None;
        self.stdin_write = None;
    }
}

impl Drop for PipeSet {
    fn drop(&mut self) {
        self.destroy();
    }
}
