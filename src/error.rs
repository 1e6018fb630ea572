// src/error.rs

use crate::core::run_state::RelayKind;
use std::io;
use thiserror::Error;

/// Every failure `cr` can report. Each variant maps to a numeric fault kind through
/// [`ColorizerError::code`], which prefixes the single diagnostic line printed on exit.
#[derive(Error, Debug)]
pub enum ColorizerError {
    /// A bad option or value. Never fatal: it is logged and the defaults are kept.
    #[error("{0}")]
    Config(String),

    /// Pipe or handle creation failed before any relay started.
    #[error("{context} {}", describe_os(.api, .source))]
    SystemResource {
        /// What `cr` was doing.
        context: String,
        /// The OS call that failed.
        api: &'static str,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// The child process could not be created.
    #[error("{context} {}", describe_os(.api, .source))]
    Launch {
        /// What `cr` was doing.
        context: String,
        /// The OS call that failed.
        api: &'static str,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// A relay read or write failed for a reason other than the pipe closing.
    #[error("{context} {}", describe_os(.api, .source))]
    Io {
        /// The relay that failed.
        stream: RelayKind,
        /// What `cr` was doing.
        context: String,
        /// The OS call that failed.
        api: &'static str,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// Resuming, waiting for or terminating the child failed at the OS level.
    #[error("{context} {}", describe_os(.api, .source))]
    Supervisor {
        /// What `cr` was doing.
        context: String,
        /// The OS call that failed.
        api: &'static str,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// An operation was called in a state that does not allow it.
    #[error("{0}")]
    State(String),
}

impl ColorizerError {
    /// Numeric fault kind: `-1` for contract and configuration errors, `-2` for OS failures.
    pub fn code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::State(_) => -1,
            Self::SystemResource { .. }
            | Self::Launch { .. }
            | Self::Io { .. }
            | Self::Supervisor { .. } => -2,
        }
    }

    /// The relay stream a captured I/O fault belongs to.
    pub fn stream(&self) -> Option<RelayKind> {
        match self {
            Self::Io { stream, .. } => Some(*stream),
            _ => None,
        }
    }

    pub(crate) fn system_resource(context: &str, api: &'static str, source: io::Error) -> Self {
        Self::SystemResource {
            context: context.to_string(),
            api,
            source,
        }
    }

    pub(crate) fn launch(context: &str, api: &'static str, source: io::Error) -> Self {
        Self::Launch {
            context: context.to_string(),
            api,
            source,
        }
    }

    pub(crate) fn io(stream: RelayKind, context: &str, api: &'static str, source: io::Error) -> Self {
        Self::Io {
            stream,
            context: format!("{} {}.", context, stream),
            api,
            source,
        }
    }

    pub(crate) fn supervisor(context: &str, api: &'static str, source: io::Error) -> Self {
        Self::Supervisor {
            context: context.to_string(),
            api,
            source,
        }
    }
}

/// Formats an OS failure as `[OS - <api>](<code>) <message>`.
fn describe_os(api: &str, source: &io::Error) -> String {
    match source.raw_os_error() {
        Some(code) => format!("[OS - {}]({}) {}", api, code, source),
        None => format!("[OS - {}] {}", api, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_errors_carry_api_name_and_code() {
        let err = ColorizerError::system_resource(
            "Could not create child-side pipe handles.",
            "pipe",
            io::Error::from_raw_os_error(24),
        );
        let message = err.to_string();
        assert!(message.starts_with("Could not create child-side pipe handles. [OS - pipe](24) "));
        assert_eq!(err.code(), -2);
        assert!(err.stream().is_none());
    }

    #[test]
    fn test_io_error_names_its_stream() {
        let err = ColorizerError::io(
            RelayKind::StdErr,
            "Could not read from output side of pipe:",
            "read",
            io::Error::other("device gone"),
        );
        assert_eq!(err.stream(), Some(RelayKind::StdErr));
        assert_eq!(
            err.to_string(),
            "Could not read from output side of pipe: stderr. [OS - read] device gone"
        );
    }

    #[test]
    fn test_contract_errors_use_generic_code() {
        assert_eq!(ColorizerError::State("x".into()).code(), -1);
        assert_eq!(ColorizerError::Config("x".into()).code(), -1);
    }
}
