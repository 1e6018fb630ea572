// src/system/relay.rs

use crate::constants::PIPE_BUFFER_SIZE;
use crate::core::line_scanner::LineScanner;
use crate::core::options::OutputStyle;
use crate::core::run_state::{RelayKind, SharedRunState};
use crate::core::terminal::TerminalPort;
use crate::error::ColorizerError;
use std::io::{self, ErrorKind, PipeReader, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Result of one read from a relay source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadChunk {
    /// This many bytes were read into the buffer.
    Data(usize),
    /// Nothing arrived yet; the source is still open.
    Empty,
    /// The writer went away. This is how a relay is expected to end.
    Closed,
}

/// Where an output relay reads the child's output from.
pub trait OutputSource: Send {
    /// Bytes known to be waiting, or `None` when the source cannot tell.
    fn available(&mut self) -> Option<usize> {
        None
    }

    /// Reads into `buffer`. May return [`ReadChunk::Empty`] after a short wait so the caller
    /// can re-check whether to stop.
    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<ReadChunk>;
}

/// Where the input relay reads the caller's input from.
pub trait InputSource: Send {
    /// Reads into `buffer`, as [`OutputSource::read_chunk`].
    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<ReadChunk>;
}

pub(crate) fn classify_read(result: io::Result<usize>) -> io::Result<ReadChunk> {
    match result {
        Ok(0) => Ok(ReadChunk::Closed),
        Ok(n) => Ok(ReadChunk::Data(n)),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(ReadChunk::Closed),
        Err(e) if e.kind() == ErrorKind::Interrupted => Ok(ReadChunk::Empty),
        Err(e) => Err(e),
    }
}

impl OutputSource for PipeReader {
    #[cfg(unix)]
    fn available(&mut self) -> Option<usize> {
        match crate::system::readiness::wait_readable(&*self, 0) {
            Ok(false) => Some(0),
            _ => None,
        }
    }

    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<ReadChunk> {
        #[cfg(unix)]
        {
            use crate::constants::POLL_INTERVAL_MS;
            if !crate::system::readiness::wait_readable(&*self, POLL_INTERVAL_MS)? {
                return Ok(ReadChunk::Empty);
            }
        }
        classify_read(self.read(buffer))
    }
}

/// Static description of an output relay: which stream it serves and how it is colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayDescriptor {
    /// The stream served.
    pub kind: RelayKind,
    /// How its output is written.
    pub style: OutputStyle,
}

/// Copies one of the child's output pipes to the shared terminal, in the stream's color.
#[derive(Debug)]
pub struct OutputRelay<S> {
    descriptor: RelayDescriptor,
    source: S,
    state: Arc<SharedRunState>,
}

impl<S: OutputSource + 'static> OutputRelay<S> {
    /// A relay reading `source` and writing through the terminal in `state`.
    pub fn new(descriptor: RelayDescriptor, source: S, state: Arc<SharedRunState>) -> Self {
        Self {
            descriptor,
            source,
            state,
        }
    }

    /// Runs the relay until its pipe closes, or until the run flag is cleared and nothing is
    /// left to read.
    pub fn run(mut self) -> Result<(), ColorizerError> {
        let kind = self.descriptor.kind;
        let mut buffer = vec![0u8; PIPE_BUFFER_SIZE - 1];

        loop {
            if !self.state.is_running() && self.source.available() == Some(0) {
                log::debug!("{} relay drained.", kind);
                return Ok(());
            }

            let read = match self.source.read_chunk(&mut buffer) {
                Ok(ReadChunk::Data(read)) => read,
                Ok(ReadChunk::Empty) => continue,
                Ok(ReadChunk::Closed) => {
                    log::debug!("{} pipe closed.", kind);
                    return Ok(());
                }
                Err(e) => {
                    return Err(ColorizerError::io(kind, t!("error.relay.read_output"), "read", e));
                }
            };

            let data = buffer.get(..read).unwrap_or_default();
            let mut terminal = self.state.lock_terminal();
            write_lines(terminal.as_mut(), data, &self.descriptor.style).map_err(|e| {
                ColorizerError::io(kind, t!("error.relay.write_output"), "write", e)
            })?;
        }
    }

    /// Starts [`run`](Self::run) on its own thread.
    pub fn spawn(self) -> io::Result<RelayHandle> {
        let kind = self.descriptor.kind;
        let state = Arc::clone(&self.state);
        RelayHandle::spawn(kind, &state, move || self.run())
    }
}

/// Writes one buffer of output to `terminal` in `style`. The caller holds the terminal lock.
///
/// Every line's text is followed by a clear to end of line, so a line-mode color reaches the
/// right edge. The default attribute is restored and the terminal flushed on every exit path.
pub fn write_lines<T: TerminalPort + ?Sized>(
    terminal: &mut T,
    data: &[u8],
    style: &OutputStyle,
) -> io::Result<()> {
    let default = terminal.default_attribute();
    let mut terminal = scopeguard::guard(terminal, |terminal| {
        if let Err(e) = terminal.reset().and_then(|()| terminal.flush()) {
            log::debug!("Could not restore the terminal after a write: {}", e);
        }
    });

    terminal.set_attribute(style.color)?;
    for line in LineScanner::new(data) {
        if !line.text.is_empty() {
            terminal.write_text(line.text)?;
        }

        let skip = style.skip_last_eol && line.is_final() && line.text.is_empty();
        let clear = if style.line_mode && !skip {
            style.color
        } else {
            default
        };
        terminal.clear_to_eol(clear)?;

        let terminator = line.terminator.emitted();
        if !terminator.is_empty() {
            terminal.write_text(terminator)?;
        }
    }
    Ok(())
}

/// Forwards the caller's input to the child's stdin pipe.
///
/// Dropping the relay closes the pipe, which is how the child learns that input ended.
#[derive(Debug)]
pub struct InputRelay<S, W> {
    source: S,
    sink: W,
    state: Arc<SharedRunState>,
}

impl<S: InputSource + 'static, W: Write + Send + 'static> InputRelay<S, W> {
    /// A relay copying `source` into `sink`.
    pub fn new(source: S, sink: W, state: Arc<SharedRunState>) -> Self {
        Self {
            source,
            sink,
            state,
        }
    }

    /// Forwards input until it ends, the child closes its stdin, or the run flag is cleared.
    pub fn run(mut self) -> Result<(), ColorizerError> {
        let kind = RelayKind::StdIn;
        let mut buffer = vec![0u8; PIPE_BUFFER_SIZE];

        while self.state.is_running() {
            let read = match self.source.read_chunk(&mut buffer) {
                Ok(ReadChunk::Data(read)) => read,
                Ok(ReadChunk::Empty) => continue,
                Ok(ReadChunk::Closed) => {
                    log::debug!("Console input closed.");
                    break;
                }
                Err(e) => {
                    return Err(ColorizerError::io(kind, t!("error.relay.read_input"), "read", e));
                }
            };

            let data = buffer.get(..read).unwrap_or_default();
            match self.sink.write_all(data).and_then(|()| self.sink.flush()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    log::debug!("Child closed its stdin.");
                    break;
                }
                Err(e) => {
                    return Err(ColorizerError::io(kind, t!("error.relay.write_input"), "write", e));
                }
            }
        }
        Ok(())
    }

    /// Starts [`run`](Self::run) on its own thread.
    pub fn spawn(self) -> io::Result<RelayHandle> {
        let state = Arc::clone(&self.state);
        RelayHandle::spawn(RelayKind::StdIn, &state, move || self.run())
    }
}

/// A running relay thread.
#[derive(Debug)]
pub struct RelayHandle {
    kind: RelayKind,
    thread: JoinHandle<()>,
}

impl RelayHandle {
    /// Runs `body` on a thread named after the stream. An error it returns is recorded in the
    /// run state, which also raises the abort signal.
    pub fn spawn<F>(kind: RelayKind, state: &Arc<SharedRunState>, body: F) -> io::Result<Self>
    where
        F: FnOnce() -> Result<(), ColorizerError> + Send + 'static,
    {
        let state = Arc::clone(state);
        let thread = thread::Builder::new()
            .name(format!("cr-{}", kind))
            .spawn(move || {
                if let Err(e) = body() {
                    state.record_fault(kind, e);
                }
                log::debug!("{} relay finished.", kind);
            })?;
        Ok(Self { kind, thread })
    }

    /// The stream this relay serves.
    pub fn kind(&self) -> RelayKind {
        self.kind
    }

    /// Waits for the thread. A panic inside the relay becomes a `State` error.
    pub fn join(self) -> Result<(), ColorizerError> {
        let kind = self.kind;
        self.thread.join().map_err(|_| {
            ColorizerError::State(format!("{} {}", t!("error.threads.panicked"), kind))
        })
    }
}
