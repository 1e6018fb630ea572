// src/system/session.rs

use crate::constants::ABORT_GRACE_PERIOD;
use crate::core::options::Options;
use crate::core::run_state::{RelayKind, SharedRunState};
use crate::core::terminal::AnsiTerminal;
use crate::error::ColorizerError;
use crate::system::console_input::{ConsoleInput, InputCloser};
use crate::system::pipes::{ParentSide, PipeSet};
use crate::system::relay::{
    InputRelay, InputSource, OutputRelay, OutputSource, RelayDescriptor, RelayHandle,
};
use crate::system::supervisor::ProcessSupervisor;
use std::io::PipeReader;
use std::sync::Arc;
use std::time::Duration;

/// Everything one run of `cr` needs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Colors and line flags.
    pub options: Options,
    /// Program and arguments of the child.
    pub command: Vec<String>,
    /// Variables added to the inherited environment of the child.
    pub child_env: Vec<(String, String)>,
    /// How long an aborted child gets to close before it is killed.
    pub grace_period: Duration,
}

impl SessionConfig {
    /// A configuration with no extra environment and the standard grace period.
    pub fn new(options: Options, command: Vec<String>) -> Self {
        Self {
            options,
            command,
            child_env: Vec::new(),
            grace_period: ABORT_GRACE_PERIOD,
        }
    }
}

/// Runs the configured command against the real stdin and stdout.
pub fn run(config: &SessionConfig) -> Result<i32, ColorizerError> {
    let state = Arc::new(SharedRunState::new(Box::new(AnsiTerminal::stdout())));
    let (input, closer) = ConsoleInput::stdin()
        .map_err(|e| ColorizerError::system_resource(t!("error.console.open"), "dup", e))?;
    run_with(config, state, input, closer)
}

/// Runs the configured command with the given terminal state and input.
///
/// Launches the child on fresh pipes, starts the stdout and stderr relays and then the stdin
/// relay, and waits for the child or an abort. Afterwards the input is closed, the relays are
/// stopped and joined, and the first failure is reported: a supervisor error first, then a
/// relay panic, then the first relay fault in stream order. Without any failure the child's exit
/// code is returned.
pub fn run_with<S: InputSource + 'static>(
    config: &SessionConfig,
    state: Arc<SharedRunState>,
    input: S,
    closer: InputCloser,
) -> Result<i32, ColorizerError> {
    run_with_outputs(config, state, input, closer, |_, reader| reader)
}

/// [`run_with`], with each output pipe handed to `wrap` before its relay reads from it.
pub(crate) fn run_with_outputs<S, O, F>(
    config: &SessionConfig,
    state: Arc<SharedRunState>,
    input: S,
    closer: InputCloser,
    wrap: F,
) -> Result<i32, ColorizerError>
where
    S: InputSource + 'static,
    O: OutputSource + 'static,
    F: Fn(RelayKind, PipeReader) -> O,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ColorizerError::system_resource(t!("error.runtime.create"), "runtime", e))?;

    let mut pipes = PipeSet::create()?;
    let mut supervisor = {
        let _context = runtime.enter();
        ProcessSupervisor::launch(&config.command, &pipes, &config.child_env)?
    };
    pipes.close_child_side();
    let parent = pipes.take_parent_side()?;

    let mut relays = Vec::with_capacity(RelayKind::ALL.len());
    if let Err(e) = start_relays(config, &state, parent, input, &wrap, &mut relays) {
        log::debug!("Relay startup failed. Tearing down.");
        supervisor.kill_quietly();
        if let Err(join_err) = shutdown(&state, &closer, relays) {
            log::warn!("{}", join_err);
        }
        state.restore_terminal();
        return Err(e);
    }

    let outcome =
        runtime.block_on(supervisor.resume_and_await(state.abort_signal(), config.grace_period));
    if outcome.is_err() {
        supervisor.kill_quietly();
    }

    let joined = shutdown(&state, &closer, relays);
    state.restore_terminal();

    let completion = outcome?;
    joined?;
    if let Some(fault) = state.take_first_fault() {
        return Err(fault);
    }

    log::debug!("Child completion: {:?}.", completion);
    supervisor.exit_code()
}

/// Starts the two output relays, then the input relay. Handles of relays that did start are
/// pushed to `relays` even when a later one fails.
fn start_relays<S, O, F>(
    config: &SessionConfig,
    state: &Arc<SharedRunState>,
    parent: ParentSide,
    input: S,
    wrap: &F,
    relays: &mut Vec<RelayHandle>,
) -> Result<(), ColorizerError>
where
    S: InputSource + 'static,
    O: OutputSource + 'static,
    F: Fn(RelayKind, PipeReader) -> O,
{
    let output_thread_error =
        |e| ColorizerError::system_resource(t!("error.threads.output"), "spawn", e);

    let stdout = RelayDescriptor {
        kind: RelayKind::StdOut,
        style: config.options.stdout_style(),
    };
    relays.push(
        OutputRelay::new(stdout, wrap(RelayKind::StdOut, parent.stdout), Arc::clone(state))
            .spawn()
            .map_err(output_thread_error)?,
    );

    let stderr = RelayDescriptor {
        kind: RelayKind::StdErr,
        style: config.options.stderr_style(),
    };
    relays.push(
        OutputRelay::new(stderr, wrap(RelayKind::StdErr, parent.stderr), Arc::clone(state))
            .spawn()
            .map_err(output_thread_error)?,
    );

    relays.push(
        InputRelay::new(input, parent.stdin, Arc::clone(state))
            .spawn()
            .map_err(|e| ColorizerError::system_resource(t!("error.threads.input"), "spawn", e))?,
    );
    Ok(())
}

/// Closes the input, clears the run flag and joins every relay. Returns the first join failure.
fn shutdown(
    state: &SharedRunState,
    closer: &InputCloser,
    relays: Vec<RelayHandle>,
) -> Result<(), ColorizerError> {
    closer.close();
    state.stop();
    relays
        .into_iter()
        .map(RelayHandle::join)
        .fold(Ok(()), Result::and)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::color::Attr;
    use crate::core::terminal::{RecordingTerminal, TerminalEvent};
    use crate::system::relay::ReadChunk;
    use std::io::{self, PipeWriter, Write};
    use std::os::fd::OwnedFd;
    use std::time::Instant;

    struct Harness {
        recorder: RecordingTerminal,
        state: Arc<SharedRunState>,
        input: ConsoleInput,
        closer: InputCloser,
        keyboard: PipeWriter,
    }

    fn harness() -> Harness {
        let recorder = RecordingTerminal::default();
        let state = Arc::new(SharedRunState::new(Box::new(recorder.clone())));
        let (reader, keyboard) = io::pipe().unwrap();
        let (input, closer) = ConsoleInput::from_fd(OwnedFd::from(reader));
        Harness {
            recorder,
            state,
            input,
            closer,
            keyboard,
        }
    }

    fn config(script: &str) -> SessionConfig {
        let mut options = Options::default();
        options.stdout_color = Attr::new(0x02);
        options.stderr_color = Attr::new(0x04);
        SessionConfig::new(
            options,
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        )
    }

    fn run_script(config: &SessionConfig, harness: Harness) -> (Result<i32, ColorizerError>, RecordingTerminal) {
        let Harness {
            recorder,
            state,
            input,
            closer,
            keyboard,
        } = harness;
        let result = run_with(config, state, input, closer);
        drop(keyboard);
        (result, recorder)
    }

    struct BrokenInput;

    impl InputSource for BrokenInput {
        fn read_chunk(&mut self, _buffer: &mut [u8]) -> io::Result<ReadChunk> {
            Err(io::Error::other("console detached"))
        }
    }

    /// Passes stdout through and fails the first stderr read that brings data.
    struct LossyStderr {
        reader: PipeReader,
        fail: bool,
    }

    impl OutputSource for LossyStderr {
        fn available(&mut self) -> Option<usize> {
            self.reader.available()
        }

        fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<ReadChunk> {
            match self.reader.read_chunk(buffer)? {
                ReadChunk::Data(_) if self.fail => Err(io::Error::other("stderr device lost")),
                chunk => Ok(chunk),
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn open_descriptors() -> usize {
        std::fs::read_dir("/proc/self/fd").unwrap().count()
    }

    #[test]
    fn test_exit_code_zero_and_both_streams_colored() {
        let (result, recorder) = run_script(&config("echo out; echo err >&2"), harness());

        assert_eq!(result.unwrap(), 0);
        let text = String::from_utf8(recorder.text()).unwrap();
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));

        let events = recorder.events();
        assert!(events.contains(&TerminalEvent::SetAttribute(Attr::new(0x02))));
        assert!(events.contains(&TerminalEvent::SetAttribute(Attr::new(0x04))));
        assert_eq!(events.last(), Some(&TerminalEvent::Flush));
    }

    #[test]
    fn test_exit_code_is_propagated() {
        let (result, _) = run_script(&config("exit 7"), harness());
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_console_input_reaches_child() {
        let mut harness = harness();
        harness.keyboard.write_all(b"hello\n").unwrap();

        let (result, recorder) = run_script(&config("read line; echo \"got:$line\""), harness);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(recorder.text(), b"got:hello\n");
    }

    #[test]
    fn test_all_output_is_drained() {
        let (result, recorder) = run_script(&config("seq 1 2000"), harness());
        assert_eq!(result.unwrap(), 0);

        let expected: String = (1..=2000).map(|n| format!("{}\n", n)).collect();
        assert_eq!(recorder.text(), expected.into_bytes());
    }

    #[test]
    fn test_input_failure_aborts_and_terminates_child() {
        let recorder = RecordingTerminal::default();
        let state = Arc::new(SharedRunState::new(Box::new(recorder)));
        let mut config = config("trap '' TERM; exec sleep 30");
        config.grace_period = Duration::from_millis(300);

        let started = Instant::now();
        let err = run_with(&config, state, BrokenInput, InputCloser::default()).unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(err.stream(), Some(RelayKind::StdIn));
        assert_eq!(err.code(), -2);
        assert!(err.to_string().contains("console detached"));
    }

    #[test]
    fn test_output_read_failure_terminates_child_and_names_stream() {
        let Harness {
            state,
            input,
            closer,
            keyboard,
            ..
        } = harness();
        let mut config = config("trap '' TERM; echo lost >&2; exec sleep 30");
        config.grace_period = Duration::from_millis(300);

        let started = Instant::now();
        let err = run_with_outputs(&config, state, input, closer, |kind, reader| LossyStderr {
            reader,
            fail: kind == RelayKind::StdErr,
        })
        .unwrap_err();
        drop(keyboard);

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(err.stream(), Some(RelayKind::StdErr));
        assert_eq!(err.code(), -2);
        assert!(err.to_string().contains("stderr device lost"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_runs_release_every_handle() {
        let batch = || {
            for script in ["echo hi", "echo hi; exit 7"] {
                let (result, _) = run_script(&config(script), harness());
                assert!(result.is_ok());
            }
            let mut missing = config("");
            missing.command = vec!["cr-no-such-program".to_string()];
            let (result, _) = run_script(&missing, harness());
            assert!(matches!(result, Err(ColorizerError::Launch { .. })));
        };

        // The first run sets up process-wide state, such as the child reaper.
        batch();
        // Tests on other threads open descriptors too; one balanced batch is enough.
        let balanced = (0..5).any(|_| {
            let before = open_descriptors();
            batch();
            open_descriptors() == before
        });
        assert!(balanced, "pipe or child handles outlived their run");
    }

    #[test]
    fn test_launch_failures_are_reported() {
        let mut missing = config("");
        missing.command = vec!["cr-test-no-such-program".to_string()];
        let (result, _) = run_script(&missing, harness());
        assert!(matches!(result, Err(ColorizerError::Launch { .. })));

        let mut empty = config("");
        empty.command.clear();
        let (result, _) = run_script(&empty, harness());
        assert!(matches!(result, Err(ColorizerError::Launch { .. })));
    }
}
