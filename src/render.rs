//! Software rendering of patterns into `Argb8888` pixel memory

use tracing::trace;

use crate::{
    pattern::{Pattern, PatternConfig},
    utils::{Physical, Size},
};

/// Bytes per `Argb8888` pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Tightly packed `Argb8888` pixel memory that can be painted into
///
/// The stride is always `width * 4`.
pub trait Canvas {
    /// Size of the canvas in device pixels
    fn size(&self) -> Size<u32, Physical>;

    /// Raw pixel bytes, `width * height * 4` long
    fn pixels_mut(&mut self) -> &mut [u8];
}

/// A canvas living in ordinary heap memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCanvas {
    size: Size<u32, Physical>,
    pixels: Vec<u8>,
}

impl MemoryCanvas {
    /// Creates a zeroed canvas
    pub fn new(size: impl Into<Size<u32, Physical>>) -> MemoryCanvas {
        let size = size.into();
        MemoryCanvas {
            size,
            pixels: vec![0; size.w as usize * size.h as usize * BYTES_PER_PIXEL],
        }
    }

    /// Reads back the pixel at `(x, y)` as a `0xAARRGGBB` value
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.size.w || y >= self.size.h {
            return None;
        }
        let offset = (y as usize * self.size.w as usize + x as usize) * BYTES_PER_PIXEL;
        let bytes = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Canvas for MemoryCanvas {
    fn size(&self) -> Size<u32, Physical> {
        self.size
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Overwrites every pixel of `canvas` with the pattern described by `config`
///
/// Coordinates handed to the pattern are device pixels; the pattern's own scale
/// is applied on top of the output scale.
pub fn render(canvas: &mut impl Canvas, config: &PatternConfig) {
    let size = canvas.size();
    let width = size.w as usize;
    let pixels = canvas.pixels_mut();
    trace!(%size, "Rendering pattern");

    if width == 0 {
        return;
    }

    if let Pattern::Solid = config.pattern {
        let (_, background) = config.resolved_colors();
        let pixel = background.to_pixel();
        pixels
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .for_each(|chunk| chunk.copy_from_slice(&pixel));
        return;
    }

    let (foreground, background) = config.resolved_colors();
    let (foreground, background) = (foreground.to_pixel(), background.to_pixel());
    pixels
        .chunks_exact_mut(width * BYTES_PER_PIXEL)
        .take(size.h as usize)
        .enumerate()
        .for_each(|(y, row)| {
            row.chunks_exact_mut(BYTES_PER_PIXEL)
                .enumerate()
                .for_each(|(x, chunk)| {
                    let color = if config.classify(x as u32, y as u32) {
                        &background
                    } else {
                        &foreground
                    };
                    chunk.copy_from_slice(color);
                });
        });
}
