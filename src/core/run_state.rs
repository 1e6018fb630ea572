// src/core/run_state.rs

use crate::core::terminal::TerminalPort;
use crate::error::ColorizerError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// The three relayed streams, in the order their faults are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayKind {
    /// The child's stdout.
    StdOut,
    /// The child's stderr.
    StdErr,
    /// The caller's input, forwarded to the child's stdin.
    StdIn,
}

impl RelayKind {
    /// Every stream, in priority order.
    pub const ALL: [Self; 3] = [Self::StdOut, Self::StdErr, Self::StdIn];
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StdOut => "stdout",
            Self::StdErr => "stderr",
            Self::StdIn => "stdin",
        };
        f.write_str(name)
    }
}

/// Level-triggered abort flag. Once raised it stays raised, and every waiter wakes.
#[derive(Debug)]
pub struct AbortSignal {
    raised: watch::Sender<bool>,
}

impl AbortSignal {
    /// A signal that has not been raised.
    pub fn new() -> Self {
        Self {
            raised: watch::Sender::new(false),
        }
    }

    /// Raises the flag. Returns `true` only for the call that actually raised it.
    pub fn raise(&self) -> bool {
        self.raised.send_if_modified(|raised| {
            if *raised {
                false
            } else {
                *raised = true;
                true
            }
        })
    }

    /// Whether [`raise`](Self::raise) was called.
    pub fn is_raised(&self) -> bool {
        *self.raised.borrow()
    }

    /// Completes once the flag is raised, immediately if it already is.
    pub async fn raised(&self) {
        let mut receiver = self.raised.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|raised| *raised).await;
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by the supervisor and the three relay threads for one run.
///
/// Holds the running flag the relays poll, the abort signal that cuts the supervisor's wait
/// short, one fault slot per relay, and the terminal that both output relays write through.
/// The terminal mutex is the single lock that keeps a colored burst from one stream from
/// interleaving with the other.
pub struct SharedRunState {
    running: AtomicBool,
    abort: AbortSignal,
    stdout_fault: Mutex<Option<ColorizerError>>,
    stderr_fault: Mutex<Option<ColorizerError>>,
    stdin_fault: Mutex<Option<ColorizerError>>,
    terminal: Mutex<Box<dyn TerminalPort>>,
}

impl fmt::Debug for SharedRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRunState")
            .field("running", &self.is_running())
            .field("aborted", &self.abort.is_raised())
            .finish_non_exhaustive()
    }
}

impl SharedRunState {
    /// Fresh state for one run, writing through `terminal`.
    pub fn new(terminal: Box<dyn TerminalPort>) -> Self {
        Self {
            running: AtomicBool::new(true),
            abort: AbortSignal::new(),
            stdout_fault: Mutex::new(None),
            stderr_fault: Mutex::new(None),
            stdin_fault: Mutex::new(None),
            terminal: Mutex::new(terminal),
        }
    }

    /// True until the session asks the relays to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag. Output relays drain what is pending and return.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// The signal raised by the first relay fault.
    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    fn fault_slot(&self, kind: RelayKind) -> &Mutex<Option<ColorizerError>> {
        match kind {
            RelayKind::StdOut => &self.stdout_fault,
            RelayKind::StdErr => &self.stderr_fault,
            RelayKind::StdIn => &self.stdin_fault,
        }
    }

    /// Stores the fault that ended a relay and raises the abort signal.
    /// A relay keeps only its first fault.
    pub fn record_fault(&self, kind: RelayKind, err: ColorizerError) {
        {
            let mut slot = self
                .fault_slot(kind)
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                log::debug!("{} relay faulted: {}", kind, err);
                *slot = Some(err);
            }
        }
        self.abort.raise();
    }

    #[cfg(test)]
    pub(crate) fn has_fault(&self, kind: RelayKind) -> bool {
        self.fault_slot(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Takes the first recorded fault, checking stdout, then stderr, then stdin.
    pub fn take_first_fault(&self) -> Option<ColorizerError> {
        RelayKind::ALL.into_iter().find_map(|kind| {
            self.fault_slot(kind)
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
        })
    }

    /// Locks the terminal. A relay that panicked mid-burst does not make the terminal unusable.
    pub fn lock_terminal(&self) -> MutexGuard<'_, Box<dyn TerminalPort>> {
        self.terminal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Puts the default attribute back and flushes whatever is pending.
    pub fn restore_terminal(&self) {
        let mut terminal = self.lock_terminal();
        if let Err(e) = terminal.reset().and_then(|()| terminal.flush()) {
            log::warn!("Could not restore the terminal: {}", e);
        }
    }
}
