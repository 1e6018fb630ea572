// src/core/color.rs

use crate::error::ColorizerError;
use std::fmt;

/// Bits of an attribute that hold the background nibble.
pub const BG_MASK: u8 = 0xF0;
/// Bits of an attribute that hold the foreground nibble.
pub const FG_MASK: u8 = 0x0F;

/// Color bits of a nibble: black.
pub const BLACK: u8 = 0x00;
/// Blue bit.
pub const BLUE: u8 = 0x01;
/// Green bit.
pub const GREEN: u8 = 0x02;
/// Green and blue.
pub const CYAN: u8 = GREEN | BLUE;
/// Red bit.
pub const RED: u8 = 0x04;
/// Red and blue.
pub const MAGENTA: u8 = RED | BLUE;
/// Red and green.
pub const YELLOW: u8 = RED | GREEN;
/// All three color bits; light gray on most terminals.
pub const WHITE: u8 = RED | GREEN | BLUE;
/// Bright black.
pub const GRAY: u8 = BLACK | INTENSITY;
/// Bright variant of a color.
pub const INTENSITY: u8 = 0x08;

/// An 8-bit console text attribute: foreground in the low nibble, background in the high one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attr(u8);

impl Attr {
    /// Light gray on black, the stock console attribute.
    pub const DEFAULT: Self = Self(WHITE);

    /// Wraps a raw attribute byte.
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// The raw attribute byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Foreground color, `0..=15`.
    pub const fn foreground(self) -> u8 {
        self.0 & FG_MASK
    }

    /// Background color, `0..=15`.
    pub const fn background(self) -> u8 {
        (self.0 & BG_MASK) >> 4
    }

    /// Parses an option value: decimal (`137`) or `$`-prefixed hex (`$89`).
    /// Only the low byte of the number is kept.
    pub fn parse(value: &str) -> Result<Self, ColorizerError> {
        let bad_value = || ColorizerError::Config(format!("{} '{}'", t!("config.warn.bad_value"), value));

        let low_byte = if let Some(hex) = value.strip_prefix('$') {
            let number = u64::from_str_radix(hex, 16).map_err(|_| bad_value())?;
            let [low, ..] = number.to_le_bytes();
            low
        } else {
            let number: i64 = value.trim().parse().map_err(|_| bad_value())?;
            let [low, ..] = number.to_le_bytes();
            low
        };
        Ok(Self(low_byte))
    }
}

impl Default for Attr {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:02X}", self.0)
    }
}

/// Converts a console color nibble (blue=1, green=2, red=4) into an ANSI color index
/// (red=1, green=2, blue=4), dropping the intensity bit.
fn ansi_index(nibble: u8) -> u8 {
    ((nibble & RED) >> 2) | (nibble & GREEN) | ((nibble & BLUE) << 2)
}

/// SGR parameter for a foreground nibble; `39` keeps the terminal's own foreground.
pub fn foreground_code(nibble: u8, default_nibble: u8) -> u8 {
    if nibble == default_nibble {
        39
    } else if nibble & INTENSITY != 0 {
        90 + ansi_index(nibble)
    } else {
        30 + ansi_index(nibble)
    }
}

/// SGR parameter for a background nibble; `49` keeps the terminal's own background.
pub fn background_code(nibble: u8, default_nibble: u8) -> u8 {
    if nibble == default_nibble {
        49
    } else if nibble & INTENSITY != 0 {
        100 + ansi_index(nibble)
    } else {
        40 + ansi_index(nibble)
    }
}

/// Converts an attribute into the escape sequence that selects it. The default attribute
/// maps to a plain reset so the terminal's own theme shows through.
pub fn attribute_to_sgr(attr: Attr, default: Attr) -> String {
    if attr == default {
        return "\x1b[0m".to_string();
    }
    format!(
        "\x1b[0;{};{}m",
        foreground_code(attr.foreground(), default.foreground()),
        background_code(attr.background(), default.background())
    )
}

/// Escape sequence that selects only the background of `attr`.
pub fn background_to_sgr(attr: Attr, default: Attr) -> String {
    format!(
        "\x1b[{}m",
        background_code(attr.background(), default.background())
    )
}
