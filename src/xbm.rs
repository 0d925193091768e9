//! X BitMap loading
//!
//! An XBM file is a fragment of C source: a handful of `#define`s giving the
//! dimensions (and optionally a hotspot) followed by a `static unsigned char`
//! array holding the pixels, one bit per pixel, rows padded to a byte boundary,
//! least significant bit first.
//!
//! ```c
//! #define gray_width 2
//! #define gray_height 2
//! static unsigned char gray_bits[] = { 0x01, 0x02 };
//! ```

use std::{fs, io, path::Path};

use scan_fmt::scan_fmt;
use tracing::{debug, warn};

/// Largest data array accepted, the same bound `wl_shm_pool` puts on pixel buffers
const MAX_DATA_LEN: usize = i32::MAX as usize;

/// Errors that can occur while loading an XBM file
#[derive(Debug, thiserror::Error)]
pub enum XbmError {
    /// The file could not be read
    #[error("failed to read bitmap file")]
    Io(#[from] io::Error),
    /// No `*_width` or `*_height` define was found
    #[error("bitmap is missing a width or height definition")]
    MissingDimensions,
    /// Width or height is zero or negative
    #[error("invalid bitmap dimensions {width}x{height}")]
    InvalidDimensions {
        /// declared width
        width: i64,
        /// declared height
        height: i64,
    },
    /// The packed rows would not fit into a `wl_shm_pool`
    #[error("bitmap of {width}x{height} is too large")]
    TooLarge {
        /// declared width
        width: u32,
        /// declared height
        height: u32,
    },
    /// No `{ ... }` data array follows the defines
    #[error("bitmap has no data array")]
    MissingData,
}

/// A 1-bit-per-pixel image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XbmImage {
    width: u32,
    height: u32,
    bits: Vec<u8>,
    hotspot: Option<(i32, i32)>,
}

impl XbmImage {
    /// Creates an image from already packed rows
    ///
    /// `bits` is truncated or zero-padded to `ceil(width / 8) * height` bytes.
    pub fn new(width: u32, height: u32, mut bits: Vec<u8>) -> Result<XbmImage, XbmError> {
        bits.resize(data_len(width, height)?, 0);
        Ok(XbmImage {
            width,
            height,
            bits,
            hotspot: None,
        })
    }

    /// Reads and parses the XBM file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<XbmImage, XbmError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let image = XbmImage::parse(&source)?;
        debug!(path = %path.display(), width = image.width, height = image.height, "Loaded bitmap");
        Ok(image)
    }

    /// Parses the text of an XBM file
    pub fn parse(source: &str) -> Result<XbmImage, XbmError> {
        let mut width = None;
        let mut height = None;
        let mut x_hot = None;
        let mut y_hot = None;

        let mut rest = source;
        loop {
            let line_start = skip_blank(rest);
            let (line, tail) = line_start.split_once('\n').unwrap_or((line_start, ""));
            let Ok((name, value)) = scan_fmt!(line, "#define {} {}", String, String) else {
                rest = line_start;
                break;
            };
            let value = parse_c_int(&value).unwrap_or(0);

            if name.ends_with("_width") {
                width = Some(value);
            } else if name.ends_with("_height") {
                height = Some(value);
            } else if name.ends_with("_x_hot") {
                x_hot = Some(value);
            } else if name.ends_with("_y_hot") {
                y_hot = Some(value);
            }
            rest = tail;
        }

        let (Some(width), Some(height)) = (width, height) else {
            return Err(XbmError::MissingDimensions);
        };
        if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
            return Err(XbmError::InvalidDimensions { width, height });
        }
        let (width, height) = (width as u32, height as u32);
        let expected = data_len(width, height)?;

        let (_, data) = rest.split_once('{').ok_or(XbmError::MissingData)?;
        let data = data.split_once('}').map_or(data, |(array, _)| array);
        let mut bits = data
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .filter_map(parse_c_int)
            .map(|value| value as u8)
            .take(expected)
            .collect::<Vec<u8>>();

        if bits.len() < expected {
            warn!(
                found = bits.len(),
                expected, "Bitmap data array is smaller than its dimensions, padding with zeroes"
            );
            bits.resize(expected, 0);
        }

        Ok(XbmImage {
            width,
            height,
            bits,
            hotspot: x_hot.zip(y_hot).map(|(x, y)| (x as i32, y as i32)),
        })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Hotspot, if the file declared one
    pub fn hotspot(&self) -> Option<(i32, i32)> {
        self.hotspot
    }

    /// Packed pixel rows
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// Returns the bit at `(x, y)`, `false` when out of range
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        packed_bit(&self.bits, self.width, x, y)
    }
}

/// Number of bytes of a packed row of `width` pixels
#[inline]
pub(crate) fn bytes_per_row(width: u32) -> usize {
    (width as usize + 7) / 8
}

/// Byte length of the packed rows of a `width` by `height` image
fn data_len(width: u32, height: u32) -> Result<usize, XbmError> {
    bytes_per_row(width)
        .checked_mul(height as usize)
        .filter(|&len| len <= MAX_DATA_LEN)
        .ok_or(XbmError::TooLarge { width, height })
}

/// Looks up a bit in rows packed LSB first, each starting on a byte boundary
#[inline]
pub(crate) fn packed_bit(bits: &[u8], width: u32, x: u32, y: u32) -> bool {
    let index = y as usize * bytes_per_row(width) + x as usize / 8;
    bits.get(index).map_or(false, |byte| (byte >> (x % 8)) & 1 == 1)
}

/// Skips whitespace and C comments
fn skip_blank(mut s: &str) -> &str {
    loop {
        let trimmed = s.trim_start();
        if let Some(comment) = trimmed.strip_prefix("/*") {
            s = comment.split_once("*/").map_or("", |(_, tail)| tail);
        } else if let Some(comment) = trimmed.strip_prefix("//") {
            s = comment.split_once('\n').map_or("", |(_, tail)| tail);
        } else {
            return trimmed;
        }
    }
}

/// Parses a C integer literal: decimal, `0x` hexadecimal or `0` octal
fn parse_c_int(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{parse_c_int, XbmError, XbmImage};

    const CHECKER: &str = "\
/* 8x8 checkerboard */
#define checker_width 8
#define checker_height 8
#define checker_x_hot 1
#define checker_y_hot 2
static unsigned char checker_bits[] = {
   0x55, 0xaa, 0x55, 0xaa, 0x55, 0xaa, 0x55, 0xaa};
";

    #[test]
    fn parses_dimensions_hotspot_and_bits() {
        let image = XbmImage::parse(CHECKER).unwrap();
        assert_eq!(image.width(), 8);
        assert_eq!(image.height(), 8);
        assert_eq!(image.hotspot(), Some((1, 2)));
        assert_eq!(image.bits(), &[0x55, 0xaa, 0x55, 0xaa, 0x55, 0xaa, 0x55, 0xaa]);
    }

    #[test]
    fn pixels_are_lsb_first() {
        let image = XbmImage::parse(CHECKER).unwrap();
        assert!(image.pixel(0, 0));
        assert!(!image.pixel(1, 0));
        assert!(!image.pixel(0, 1));
        assert!(image.pixel(1, 1));
        assert!(!image.pixel(8, 0));
        assert!(!image.pixel(0, 8));
    }

    #[test]
    fn rows_are_byte_aligned() {
        // 10 pixels wide: two bytes per row, the second one only uses two bits
        let image = XbmImage::new(10, 2, vec![0x00, 0x02, 0x01, 0x00]).unwrap();
        assert!(image.pixel(9, 0));
        assert!(!image.pixel(8, 0));
        assert!(image.pixel(0, 1));
    }

    #[test]
    fn short_data_is_zero_padded() {
        let image = XbmImage::parse(
            "#define s_width 16\n#define s_height 2\nstatic char s_bits[] = { 0xff, 255 };\n",
        )
        .unwrap();
        assert_eq!(image.bits(), &[0xff, 0xff, 0x00, 0x00]);
        assert!(!image.pixel(0, 1));
    }

    #[test]
    fn comments_between_defines_are_skipped() {
        let image = XbmImage::parse(
            "// generated\n#define a_width 2\n/* multi\n line */\n#define a_height 2\nstatic char a_bits[] = {\n0x01,0x02\n};",
        )
        .unwrap();
        assert_eq!(image.bits(), &[0x01, 0x02]);
        assert_eq!(image.hotspot(), None);
    }

    #[test]
    fn missing_dimensions() {
        assert!(matches!(
            XbmImage::parse("#define a_width 2\nstatic char a_bits[] = { 0 };"),
            Err(XbmError::MissingDimensions)
        ));
    }

    #[test]
    fn zero_dimensions() {
        assert!(matches!(
            XbmImage::parse("#define a_width 0\n#define a_height 4\nstatic char a_bits[] = { 0 };"),
            Err(XbmError::InvalidDimensions { width: 0, height: 4 })
        ));
    }

    #[test]
    fn huge_dimensions_are_rejected() {
        assert!(matches!(
            XbmImage::parse(
                "#define a_width 2000000000\n#define a_height 2000000000\nstatic char a_bits[] = { 0x01 };\n"
            ),
            Err(XbmError::TooLarge {
                width: 2_000_000_000,
                height: 2_000_000_000
            })
        ));
        assert!(matches!(
            XbmImage::new(u32::MAX, u32::MAX, vec![0xff]),
            Err(XbmError::TooLarge { .. })
        ));
    }

    #[test]
    fn new_pads_and_truncates_rows() {
        let image = XbmImage::new(3, 2, vec![0x07]).unwrap();
        assert_eq!(image.bits(), &[0x07, 0x00]);
        let image = XbmImage::new(8, 1, vec![0x01, 0x02, 0x03]).unwrap();
        assert_eq!(image.bits(), &[0x01]);
    }

    #[test]
    fn missing_data_array() {
        assert!(matches!(
            XbmImage::parse("#define a_width 1\n#define a_height 1\n"),
            Err(XbmError::MissingData)
        ));
    }

    #[test]
    fn c_integer_literals() {
        assert_eq!(parse_c_int("16"), Some(16));
        assert_eq!(parse_c_int("0x1F"), Some(31));
        assert_eq!(parse_c_int("017"), Some(15));
        assert_eq!(parse_c_int("0"), Some(0));
        assert_eq!(parse_c_int("-3"), Some(-3));
        assert_eq!(parse_c_int("zz"), None);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CHECKER.as_bytes()).unwrap();
        let image = XbmImage::load(file.path()).unwrap();
        assert_eq!(image.width(), 8);
    }

    #[test]
    fn load_missing_file() {
        assert!(matches!(
            XbmImage::load("/nonexistent/wlrsetroot.xbm"),
            Err(XbmError::Io(_))
        ));
    }
}
