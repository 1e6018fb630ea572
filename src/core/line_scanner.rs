// src/core/line_scanner.rs

/// The bytes that ended a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// No terminator: the fragment after the last line boundary of a buffer.
    None,
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// `\r` not followed by `\n`.
    Cr,
    /// `\r\r\n`, one boundary whose leading `\r` is a skip marker.
    CrCrLf,
}

impl Terminator {
    /// The bytes consumed from the input.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::None => b"",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
            Self::Cr => b"\r",
            Self::CrCrLf => b"\r\r\n",
        }
    }

    /// The bytes written to the terminal. The skip marker of `\r\r\n` is dropped.
    pub fn emitted(self) -> &'static [u8] {
        match self {
            Self::CrCrLf => b"\r\n",
            other => other.as_bytes(),
        }
    }
}

/// One terminal line of a relay buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Line content, without its terminator.
    pub text: &'a [u8],
    /// What ended the line.
    pub terminator: Terminator,
}

impl Line<'_> {
    /// True for the fragment after the last boundary, which may be empty.
    pub fn is_final(&self) -> bool {
        self.terminator == Terminator::None
    }
}

/// Splits a buffer into terminal lines.
///
/// A line ends at the first `\r` or `\n`. `\r\r\n` and `\r\n` are single boundaries, as are a
/// lone `\n` and a `\r` not followed by `\n`. The scanner always yields a final fragment with
/// [`Terminator::None`], empty when the buffer ends exactly at a boundary, so concatenating
/// every `text` and `terminator` reproduces the input.
#[derive(Debug, Clone)]
pub struct LineScanner<'a> {
    rest: &'a [u8],
    done: bool,
}

impl<'a> LineScanner<'a> {
    /// Scans `buffer` from its start.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            rest: buffer,
            done: false,
        }
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(boundary) = self.rest.iter().position(|&b| b == b'\r' || b == b'\n') else {
            self.done = true;
            return Some(Line {
                text: self.rest,
                terminator: Terminator::None,
            });
        };

        let (text, tail) = self.rest.split_at(boundary);
        let terminator = match tail {
            [b'\r', b'\r', b'\n', ..] => Terminator::CrCrLf,
            [b'\r', b'\n', ..] => Terminator::CrLf,
            [b'\r', ..] => Terminator::Cr,
            _ => Terminator::Lf,
        };
        self.rest = tail.get(terminator.as_bytes().len()..).unwrap_or_default();

        Some(Line { text, terminator })
    }
}
