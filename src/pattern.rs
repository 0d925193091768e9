//! Pattern classification
//!
//! Every device pixel of an output is classified as *marked* or *unmarked* by the
//! selected [`Pattern`], tiled over the whole buffer. Following the X bitmap
//! convention used by `xsetroot`, a set bit is a hole showing the background
//! color while a cleared bit is foreground ink.

use std::fmt;

use crate::{
    color::Argb,
    xbm::{packed_bit, XbmImage},
};

/// Packed rows of the built-in 2x2 checkerboard, the same as X11's `gray_bits`
const GRAY_BITS: [u8; 2] = [0x01, 0x02];
const GRAY_SIZE: u32 = 2;

/// Side of the square tile the grid pattern repeats over
pub const GRID_TILE: u32 = 16;

/// Pattern tiled over each output
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Flat background color
    Solid,
    /// Bitmap loaded from an XBM file
    Bitmap(XbmImage),
    /// Built-in 2x2 checkerboard
    Gray,
    /// Plaid-like grid on a 16x16 tile
    Grid {
        /// Every `mod_x`-th column of the tile is marked
        mod_x: u32,
        /// Every `mod_y`-th row of the tile is marked
        mod_y: u32,
    },
}

impl Pattern {
    /// Creates a grid pattern, clamping spacings below 1 to 1
    pub fn grid(mod_x: i32, mod_y: i32) -> Pattern {
        Pattern::Grid {
            mod_x: mod_x.max(1) as u32,
            mod_y: mod_y.max(1) as u32,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Solid => f.write_str("solid"),
            Pattern::Bitmap(image) => write!(f, "bitmap {}x{}", image.width(), image.height()),
            Pattern::Gray => f.write_str("gray"),
            Pattern::Grid { mod_x, mod_y } => write!(f, "grid {mod_x}x{mod_y}"),
        }
    }
}

/// Error returned for a pattern scale outside of [`PatternScale::MIN`]..=[`PatternScale::MAX`]
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("pattern scale must be between 0.1 and 32, got {0}")]
pub struct ScaleError(pub f32);

/// Magnification of the pattern, independent of the output scale
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PatternScale(f32);

impl PatternScale {
    /// Smallest accepted scale
    pub const MIN: f32 = 0.1;
    /// Largest accepted scale
    pub const MAX: f32 = 32.0;

    /// The scale as a float
    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for PatternScale {
    fn default() -> Self {
        PatternScale(1.0)
    }
}

impl TryFrom<f32> for PatternScale {
    type Error = ScaleError;

    fn try_from(scale: f32) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&scale) {
            Ok(PatternScale(scale))
        } else {
            Err(ScaleError(scale))
        }
    }
}

impl fmt::Display for PatternScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything needed to paint a wallpaper, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq)]
pub struct PatternConfig {
    /// Pattern to tile
    pub pattern: Pattern,
    /// Color of unmarked pixels
    pub foreground: Argb,
    /// Color of marked pixels and of the solid fill
    pub background: Argb,
    /// Swap foreground and background
    pub reverse: bool,
    /// Pattern magnification
    pub scale: PatternScale,
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig {
            pattern: Pattern::Solid,
            foreground: Argb::WHITE,
            background: Argb::BLACK,
            reverse: false,
            scale: PatternScale::default(),
        }
    }
}

impl PatternConfig {
    /// Foreground and background after applying `reverse`
    pub fn resolved_colors(&self) -> (Argb, Argb) {
        if self.reverse {
            (self.background, self.foreground)
        } else {
            (self.foreground, self.background)
        }
    }

    /// Classifies the device pixel `(x, y)`, `true` meaning marked
    ///
    /// [`Pattern::Solid`] marks nothing.
    pub fn classify(&self, x: u32, y: u32) -> bool {
        let scale = self.scale.get();
        match &self.pattern {
            Pattern::Solid => false,
            Pattern::Bitmap(image) => image.pixel(
                wrap(x, scale, image.width()),
                wrap(y, scale, image.height()),
            ),
            Pattern::Gray => packed_bit(
                &GRAY_BITS,
                GRAY_SIZE,
                wrap(x, scale, GRAY_SIZE),
                wrap(y, scale, GRAY_SIZE),
            ),
            Pattern::Grid { mod_x, mod_y } => {
                // the spacing applies to the position inside the tile, so spacings
                // above the tile size only ever mark the first row and column
                let tile_x = (x as f32 / scale) as u32 % GRID_TILE;
                let tile_y = (y as f32 / scale) as u32 % GRID_TILE;
                tile_y % mod_y == 0 || tile_x % mod_x == 0
            }
        }
    }

    /// Color of the device pixel `(x, y)`
    #[inline]
    pub fn color_at(&self, x: u32, y: u32) -> Argb {
        let (foreground, background) = self.resolved_colors();
        if self.classify(x, y) {
            background
        } else {
            foreground
        }
    }
}

/// Divides a device coordinate by the pattern scale and wraps it into `0..period`
///
/// Uses a floating point remainder so that scales not dividing the period keep
/// the pattern phase exact.
#[inline]
fn wrap(v: u32, scale: f32, period: u32) -> u32 {
    ((v as f32 / scale) % period as f32) as u32
}
