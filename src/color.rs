//! Colors as handed to the renderer
//!
//! Colors are opaque 32-bit ARGB values, which is the in-register layout of
//! [`wl_shm::Format::Argb8888`](wayland_client::protocol::wl_shm::Format::Argb8888).

use std::{fmt, str::FromStr};

/// An opaque ARGB color packed into a `u32` (`0xAARRGGBB`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Argb(pub u32);

impl Argb {
    /// Opaque black, the default background
    pub const BLACK: Argb = Argb(0xFF00_0000);
    /// Opaque white, the default foreground
    pub const WHITE: Argb = Argb(0xFFFF_FFFF);

    /// Creates a fully opaque color from a `0xRRGGBB` value
    pub const fn from_rgb(rgb: u32) -> Argb {
        Argb(0xFF00_0000 | (rgb & 0x00FF_FFFF))
    }

    /// Bytes of this color as laid out in an `Argb8888` buffer
    ///
    /// The format is little-endian, so memory order is `B, G, R, A`.
    #[inline]
    pub fn to_pixel(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0x00FF_FFFF)
    }
}

/// Error returned when a color string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseColorError {
    /// The string does not have exactly six hex digits
    #[error("expected 6 hex digits, got {0}")]
    InvalidLength(usize),
    /// A character is not a hex digit
    #[error("invalid hex digit {0:?}")]
    InvalidDigit(char),
}

impl FromStr for Argb {
    type Err = ParseColorError;

    /// Parses `#rrggbb` or `rrggbb`; the result is always opaque.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if let Some(c) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ParseColorError::InvalidDigit(c));
        }
        if hex.len() != 6 {
            return Err(ParseColorError::InvalidLength(hex.len()));
        }
        let rgb = u32::from_str_radix(hex, 16).map_err(|_| ParseColorError::InvalidLength(hex.len()))?;
        Ok(Argb::from_rgb(rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::{Argb, ParseColorError};

    #[test]
    fn parse_with_and_without_hash() {
        assert_eq!("#1a1a2e".parse::<Argb>().unwrap(), Argb(0xFF1A1A2E));
        assert_eq!("E94560".parse::<Argb>().unwrap(), Argb(0xFFE94560));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!("#fff".parse::<Argb>(), Err(ParseColorError::InvalidLength(3)));
        assert_eq!("".parse::<Argb>(), Err(ParseColorError::InvalidLength(0)));
        assert_eq!("#1234567".parse::<Argb>(), Err(ParseColorError::InvalidLength(7)));
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert_eq!("#12345g".parse::<Argb>(), Err(ParseColorError::InvalidDigit('g')));
        assert_eq!("+12345".parse::<Argb>(), Err(ParseColorError::InvalidDigit('+')));
    }

    #[test]
    fn pixel_bytes_are_bgra() {
        assert_eq!(Argb(0xFF112233).to_pixel(), [0x33, 0x22, 0x11, 0xFF]);
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(Argb::from_rgb(0x282a36).to_string(), "#282a36");
    }
}
