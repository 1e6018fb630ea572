//! `cr`: run a console command and relay its stdout and stderr to the terminal, each
//! stream in its own color, while forwarding the caller's stdin to it.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

/// Command-line capture and help rendering.
pub mod cli;
/// Crate-wide constants.
pub mod constants;
pub mod core;
/// The error taxonomy shared by every layer.
pub mod error;
pub mod system;
