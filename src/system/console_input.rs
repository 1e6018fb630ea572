// src/system/console_input.rs

use crate::system::relay::{InputSource, ReadChunk};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use std::{fs::File, io::Read, os::fd::OwnedFd};

#[cfg(not(unix))]
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};

/// Closes a [`ConsoleInput`] from another thread. Once closed, a pending read on the input
/// returns within one poll interval as if input had ended.
#[derive(Debug, Clone, Default)]
pub struct InputCloser {
    closed: Arc<AtomicBool>,
}

impl InputCloser {
    /// Ends the input. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// The caller's stdin, readable in slices so the input relay can be stopped while it waits.
#[derive(Debug)]
pub struct ConsoleInput {
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    pump: Receiver<io::Result<Vec<u8>>>,
    #[cfg(not(unix))]
    pending: Vec<u8>,
    closer: InputCloser,
}

impl ConsoleInput {
    /// Opens the process stdin. On Unix this reads a duplicate of the descriptor directly,
    /// bypassing the buffered `Stdin` handle.
    #[cfg(unix)]
    pub fn stdin() -> io::Result<(Self, InputCloser)> {
        use std::os::fd::AsFd;
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::from_fd(fd))
    }

    /// Reads from `fd`, which is owned and closed by the input.
    #[cfg(unix)]
    pub fn from_fd(fd: OwnedFd) -> (Self, InputCloser) {
        let closer = InputCloser::default();
        let input = Self {
            file: File::from(fd),
            closer: closer.clone(),
        };
        (input, closer)
    }

    /// Opens the process stdin. A detached thread pumps it into a channel, since a blocking
    /// console read cannot be interrupted here.
    #[cfg(not(unix))]
    pub fn stdin() -> io::Result<(Self, InputCloser)> {
        Self::from_reader(io::stdin())
    }

    /// Pumps `reader` on a detached thread.
    #[cfg(not(unix))]
    pub fn from_reader<R: io::Read + Send + 'static>(mut reader: R) -> io::Result<(Self, InputCloser)> {
        use crate::constants::PIPE_BUFFER_SIZE;

        let (sender, pump) = mpsc::channel();
        std::thread::Builder::new()
            .name("cr-stdin-pump".to_string())
            .spawn(move || {
                let mut buffer = vec![0u8; PIPE_BUFFER_SIZE];
                loop {
                    let message = match reader.read(&mut buffer) {
                        Ok(read) => Ok(buffer.get(..read).unwrap_or_default().to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Err(e),
                    };
                    let finished = !matches!(&message, Ok(bytes) if !bytes.is_empty());
                    if sender.send(message).is_err() || finished {
                        return;
                    }
                }
            })?;

        let closer = InputCloser::default();
        let input = Self {
            pump,
            pending: Vec::new(),
            closer: closer.clone(),
        };
        Ok((input, closer))
    }
}

impl InputSource for ConsoleInput {
    #[cfg(unix)]
    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<ReadChunk> {
        use crate::constants::POLL_INTERVAL_MS;
        use crate::system::readiness::wait_readable;

        if self.closer.is_closed() {
            return Ok(ReadChunk::Closed);
        }
        if !wait_readable(&self.file, POLL_INTERVAL_MS)? {
            return Ok(ReadChunk::Empty);
        }
        crate::system::relay::classify_read(self.file.read(buffer))
    }

    #[cfg(not(unix))]
    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<ReadChunk> {
        use crate::constants::POLL_INTERVAL_MS;
        use std::time::Duration;

        if self.closer.is_closed() {
            return Ok(ReadChunk::Closed);
        }
        if self.pending.is_empty() {
            match self.pump.recv_timeout(Duration::from_millis(u64::from(POLL_INTERVAL_MS))) {
                Ok(Ok(bytes)) if bytes.is_empty() => return Ok(ReadChunk::Closed),
                Ok(Ok(bytes)) => self.pending = bytes,
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => return Ok(ReadChunk::Empty),
                Err(RecvTimeoutError::Disconnected) => return Ok(ReadChunk::Closed),
            }
        }

        let count = self.pending.len().min(buffer.len());
        let (head, _) = buffer.split_at_mut(count);
        head.copy_from_slice(self.pending.get(..count).unwrap_or_default());
        self.pending.drain(..count);
        Ok(ReadChunk::Data(count))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::run_state::{RelayKind, SharedRunState};
    use crate::core::terminal::RecordingTerminal;
    use crate::system::relay::InputRelay;
    use std::io::{Read, Write};
    use std::time::{Duration, Instant};

    fn state() -> Arc<SharedRunState> {
        Arc::new(SharedRunState::new(Box::new(RecordingTerminal::default())))
    }

    #[test]
    fn test_close_unblocks_a_waiting_relay_without_fault() {
        // --- Setup: input that never receives data, writer kept open ---
        let (reader, _writer) = io::pipe().unwrap();
        let (input, closer) = ConsoleInput::from_fd(OwnedFd::from(reader));
        let (_child_reader, child_stdin) = io::pipe().unwrap();
        let state = state();

        let handle = InputRelay::new(input, child_stdin, Arc::clone(&state))
            .spawn()
            .unwrap();
        std::thread::sleep(Duration::from_millis(120));

        // --- Close and join ---
        let started = Instant::now();
        closer.close();
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!state.has_fault(RelayKind::StdIn));
        assert!(!state.abort_signal().is_raised());
    }

    #[test]
    fn test_input_is_forwarded_and_end_of_input_closes_child_stdin() {
        let (reader, mut writer) = io::pipe().unwrap();
        let (input, _closer) = ConsoleInput::from_fd(OwnedFd::from(reader));
        let (mut child_reader, child_stdin) = io::pipe().unwrap();
        let state = state();

        writer.write_all(b"typed line\n").unwrap();
        drop(writer);
        InputRelay::new(input, child_stdin, Arc::clone(&state))
            .run()
            .unwrap();

        // The relay dropped its write end, so the child side reads to EOF.
        let mut forwarded = Vec::new();
        child_reader.read_to_end(&mut forwarded).unwrap();
        assert_eq!(forwarded, b"typed line\n");
    }

    #[test]
    fn test_child_closing_stdin_is_not_a_fault() {
        let (reader, mut writer) = io::pipe().unwrap();
        let (input, _closer) = ConsoleInput::from_fd(OwnedFd::from(reader));
        let (child_reader, child_stdin) = io::pipe().unwrap();
        drop(child_reader);
        let state = state();

        writer.write_all(b"nobody listens").unwrap();
        InputRelay::new(input, child_stdin, Arc::clone(&state))
            .run()
            .unwrap();
        assert!(!state.abort_signal().is_raised());
    }

    #[test]
    fn test_closed_input_reports_closed_immediately() {
        let (reader, _writer) = io::pipe().unwrap();
        let (mut input, closer) = ConsoleInput::from_fd(OwnedFd::from(reader));
        let mut buffer = [0u8; 8];
        assert_eq!(input.read_chunk(&mut buffer).unwrap(), ReadChunk::Empty);
        closer.close();
        assert!(closer.is_closed());
        assert_eq!(input.read_chunk(&mut buffer).unwrap(), ReadChunk::Closed);
    }
}
