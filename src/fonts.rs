//! Font loading, text measurement and glyph rendering.
//!
//! The [`Typesetter`] trait is the seam between the layout stages (fitter,
//! compositor, rasterizer) and the font backend, so layout logic stays
//! testable without shipping font binaries.

use rusttype::{point, Font, Scale};
use serde::{Deserialize, Serialize};

use crate::raster::PixelBuffer;

/// Font weight of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Measures and draws single lines of text.
///
/// `line_width` must be monotonic in `size`; the fitter's binary search
/// relies on it.
pub trait Typesetter {
    /// Rendered width of `text` at `size`, in pixels.
    fn line_width(&self, text: &str, size: f32, weight: FontWeight) -> f32;

    /// Draw one line with `x` at the anchor origin and `baseline_y` at the
    /// baseline. `size_x`/`size_y` carry the rasterizer's per-axis scale.
    fn draw_line(
        &self,
        target: &mut PixelBuffer,
        text: &str,
        size_x: f32,
        size_y: f32,
        weight: FontWeight,
        x: f32,
        baseline_y: f32,
    );
}

/// Production [`Typesetter`] backed by TrueType fonts.
///
/// When no bold face is supplied, bold runs are synthesized by drawing
/// twice with a one-pixel offset.
pub struct FontLibrary {
    regular: Font<'static>,
    bold: Option<Font<'static>>,
}

impl FontLibrary {
    /// Load the regular face from raw TrueType/OpenType bytes.
    ///
    /// Returns `None` when the bytes are not a usable font.
    pub fn from_vec(regular: Vec<u8>) -> Option<Self> {
        Some(FontLibrary {
            regular: Font::try_from_vec(regular)?,
            bold: None,
        })
    }

    /// Attach a dedicated bold face.
    pub fn with_bold(self, bold: Vec<u8>) -> Option<Self> {
        Some(FontLibrary {
            bold: Some(Font::try_from_vec(bold)?),
            ..self
        })
    }

    fn face(&self, weight: FontWeight) -> &Font<'static> {
        match weight {
            FontWeight::Bold => self.bold.as_ref().unwrap_or(&self.regular),
            FontWeight::Normal => &self.regular,
        }
    }

    fn synthesized_bold(&self, weight: FontWeight) -> bool {
        weight == FontWeight::Bold && self.bold.is_none()
    }
}

impl Typesetter for FontLibrary {
    fn line_width(&self, text: &str, size: f32, weight: FontWeight) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let font = self.face(weight);
        let scale = Scale { x: size, y: size };
        let ascent = font.v_metrics(scale).ascent.ceil();
        let width = font
            .layout(text, scale, point(0.0, ascent))
            .filter_map(|g| g.pixel_bounding_box().map(|bb| bb.max.x as f32))
            .fold(0.0, f32::max);
        if width > 0.0 && self.synthesized_bold(weight) {
            width + 1.0
        } else {
            width
        }
    }

    fn draw_line(
        &self,
        target: &mut PixelBuffer,
        text: &str,
        size_x: f32,
        size_y: f32,
        weight: FontWeight,
        x: f32,
        baseline_y: f32,
    ) {
        let font = self.face(weight);
        let scale = Scale {
            x: size_x,
            y: size_y,
        };
        let passes: &[(f32, f32)] = if self.synthesized_bold(weight) {
            &[(0.0, 0.0), (1.0, 0.0)]
        } else {
            &[(0.0, 0.0)]
        };
        let (w, h) = (target.width() as i32, target.height() as i32);
        for &(dx, dy) in passes {
            for g in font.layout(text, scale, point(x + dx, baseline_y + dy)) {
                if let Some(bb) = g.pixel_bounding_box() {
                    g.draw(|gx, gy, v| {
                        let px = bb.min.x + gx as i32;
                        let py = bb.min.y + gy as i32;
                        if v > 0.0 && px >= 0 && py >= 0 && px < w && py < h {
                            let shade = (255.0 * (1.0 - v)) as u8;
                            let pixel = target.get_pixel_mut(px as u32, py as u32);
                            // coverage darkens, never lightens
                            pixel.0[0] = pixel.0[0].min(shade);
                            pixel.0[1] = pixel.0[1].min(shade);
                            pixel.0[2] = pixel.0[2].min(shade);
                            pixel.0[3] = 255;
                        }
                    });
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_deserializes_from_snake_case() {
        let w: FontWeight = serde_json::from_str("\"bold\"").unwrap();
        assert_eq!(w, FontWeight::Bold);
        let w: FontWeight = serde_json::from_str("\"normal\"").unwrap();
        assert_eq!(w, FontWeight::Normal);
    }

    #[test]
    fn garbage_bytes_are_not_a_font() {
        assert!(FontLibrary::from_vec(vec![0x00, 0x01, 0x02, 0x03]).is_none());
    }
}
