//! Building blocks with no OS handles of their own: color attributes, the terminal port, line
//! splitting, option parsing and the state shared by one run.

/// Console color attributes.
pub mod color;
/// Line boundaries in relayed output.
pub mod line_scanner;
/// `CR_OPTS` and command-line options.
pub mod options;
/// State shared by the supervisor and the relays.
pub mod run_state;
/// The terminal the output relays write to.
pub mod terminal;
