// src/core/terminal.rs

use crate::core::color::{self, Attr};
use std::fmt;
use std::io::{self, Write};

/// A terminal whose text attribute can be read and changed.
///
/// Implementations are not synchronized; callers hold the shared terminal lock.
pub trait TerminalPort: Send {
    /// The attribute currently in effect.
    fn attribute(&self) -> Attr;

    /// The attribute the terminal started with.
    fn default_attribute(&self) -> Attr;

    /// Makes `attr` the attribute for text written from now on.
    fn set_attribute(&mut self, attr: Attr) -> io::Result<()>;

    /// Sets `attr`, keeping the bits of the current attribute selected by `keep`.
    fn set_attribute_masked(&mut self, attr: Attr, keep: u8) -> io::Result<()> {
        let merged = (self.attribute().raw() & keep) | (attr.raw() & !keep);
        self.set_attribute(Attr::new(merged))
    }

    /// Returns to the default attribute.
    fn reset(&mut self) -> io::Result<()> {
        let default = self.default_attribute();
        self.set_attribute(default)
    }

    /// Clears from the cursor to the end of the line using the background of `attr`.
    /// The current attribute is unchanged afterwards.
    fn clear_to_eol(&mut self, attr: Attr) -> io::Result<()>;

    /// Writes bytes in the current attribute.
    fn write_text(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Pushes buffered output to the device.
    fn flush(&mut self) -> io::Result<()>;
}

/// A [`TerminalPort`] that speaks ANSI SGR escape sequences.
///
/// With coloring disabled it writes only the text and terminators, so redirected output stays
/// free of escape sequences.
pub struct AnsiTerminal<W: Write + Send> {
    out: W,
    current: Attr,
    default: Attr,
    colorize: bool,
}

impl<W: Write + Send> fmt::Debug for AnsiTerminal<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnsiTerminal")
            .field("current", &self.current)
            .field("default", &self.default)
            .field("colorize", &self.colorize)
            .finish_non_exhaustive()
    }
}

impl AnsiTerminal<io::Stdout> {
    /// The process stdout. Coloring follows `NO_COLOR`, `CLICOLOR` and whether stdout is a tty.
    pub fn stdout() -> Self {
        let colorize = colored::control::SHOULD_COLORIZE.should_colorize();
        Self::new(io::stdout(), Attr::DEFAULT, colorize)
    }
}

impl<W: Write + Send> AnsiTerminal<W> {
    /// Writes to `out`, starting in `default`. With `colorize` off no escape sequence is written.
    pub fn new(out: W, default: Attr, colorize: bool) -> Self {
        Self {
            out,
            current: default,
            default,
            colorize,
        }
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Unwraps the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> TerminalPort for AnsiTerminal<W> {
    fn attribute(&self) -> Attr {
        self.current
    }

    fn default_attribute(&self) -> Attr {
        self.default
    }

    fn set_attribute(&mut self, attr: Attr) -> io::Result<()> {
        if self.colorize && attr != self.current {
            self.out
                .write_all(color::attribute_to_sgr(attr, self.default).as_bytes())?;
        }
        self.current = attr;
        Ok(())
    }

    fn clear_to_eol(&mut self, attr: Attr) -> io::Result<()> {
        if !self.colorize {
            return Ok(());
        }
        let sequence = format!(
            "{}\x1b[K{}",
            color::background_to_sgr(attr, self.default),
            color::attribute_to_sgr(self.current, self.default)
        );
        self.out.write_all(sequence.as_bytes())
    }

    fn write_text(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
pub(crate) use recording::{RecordingTerminal, TerminalEvent};
