//! # System Interaction Layer
//!
//! Everything that owns an OS resource: the pipes between `cr` and the child, the child process
//! itself, the relay threads and the console input they read from.
//!
//! ## Modules
//!
//! - **`pipes`**: The three anonymous pipes and the ownership of each of their six ends.
//! - **`supervisor`**: Launches the child, races its exit against the abort signal, and closes
//!   or kills it when a relay fails.
//! - **`relay`**: The stdout/stderr relays that color the child's output line by line, and the
//!   stdin relay that forwards the caller's input.
//! - **`console_input`**: A stdin reader that can be closed from another thread.
//! - **`session`**: Wires the pieces together for one run and decides the exit code.

/// Closable console input.
pub mod console_input;
/// Pipe plumbing between `cr` and the child.
pub mod pipes;
#[cfg(unix)]
mod readiness;
/// Output and input relays.
pub mod relay;
/// One complete run of `cr`.
pub mod session;
/// Child process lifecycle.
pub mod supervisor;
