// src/constants.rs

use std::time::Duration;

/// Capacity of each relay buffer. A single read fills at most `PIPE_BUFFER_SIZE - 1` bytes.
pub const PIPE_BUFFER_SIZE: usize = 255;

/// Environment variable holding the default option string.
pub const OPTIONS_ENV_VAR: &str = "CR_OPTS";

/// Option string used when `CR_OPTS` is not set: stderr in red.
pub const DEFAULT_OPTIONS: &str = "-e4";

/// How long the child gets to close on its own after an abort before it is killed.
pub const ABORT_GRACE_PERIOD: Duration = Duration::from_millis(5000);

/// Slice, in milliseconds, a relay waits for input before re-checking whether it should stop.
pub const POLL_INTERVAL_MS: u16 = 50;

/// Exit code reported when `cr` itself fails. The largest DOS error level.
pub const FAULT_EXIT_CODE: i32 = 255;
