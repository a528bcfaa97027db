//! Floyd-Steinberg error diffusion to a 1-bit bitmap.
//!
//! Deterministic and pure: the same pixel buffer always produces the same
//! bitmap. Buffers arrive composited against white (the rasterizer starts
//! from a solid white surface), so alpha is not consulted here.

use crate::raster::PixelBuffer;

/// 1-bit bitmap, one sample per pixel (0 = white, 1 = black), row-major,
/// unpacked. Bit-packing into device bytes happens in the protocol encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl MonoBitmap {
    pub fn new(width: u32, height: u32, samples: Vec<u8>) -> Self {
        assert_eq!(samples.len(), (width * height) as usize);
        MonoBitmap {
            width,
            height,
            samples,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.samples[(y * self.width + x) as usize]
    }

    /// One row of unpacked samples.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.width) as usize;
        &self.samples[start..start + self.width as usize]
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }
}

/// Quantize `pixels` to black and white, diffusing the quantization error
/// in raster order: 7/16 right, 3/16 below-left, 5/16 below, 1/16
/// below-right. Diffusion targets outside the buffer are dropped, including
/// at the left and right columns; errors never wrap into the neighboring
/// row's opposite edge.
pub fn dither(pixels: &PixelBuffer) -> MonoBitmap {
    let width = pixels.width();
    let height = pixels.height();

    let mut luma: Vec<f32> = pixels
        .pixels()
        .map(|p| 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
        .collect();
    let mut samples = vec![0u8; luma.len()];

    let w = width as usize;
    for y in 0..height as usize {
        for x in 0..w {
            let idx = y * w + x;
            let value = luma[idx];
            let black = value < 128.0;
            samples[idx] = black as u8;
            let error = value - if black { 0.0 } else { 255.0 };

            if x + 1 < w {
                luma[idx + 1] += error * 7.0 / 16.0;
            }
            if y + 1 < height as usize {
                if x > 0 {
                    luma[idx + w - 1] += error * 3.0 / 16.0;
                }
                luma[idx + w] += error * 5.0 / 16.0;
                if x + 1 < w {
                    luma[idx + w + 1] += error * 1.0 / 16.0;
                }
            }
        }
    }

    MonoBitmap {
        width,
        height,
        samples,
    }
}
