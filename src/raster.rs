//! Rasterization of a resolved document into a pixel buffer.
//!
//! The only stage allowed to produce grey: glyphs render anti-aliased and
//! embedded images keep their tones. Everything downstream of this buffer
//! is strictly monochrome.

use image::{DynamicImage, Rgba};
use log::debug;

use crate::error::RenderError;
use crate::fonts::Typesetter;
use crate::printer::Orientation;
use crate::template::{EmbeddedRaster, HorizontalAnchor, Node, ResolvedDocument};
use crate::DOTS_PER_MM;

/// Device-resolution RGBA buffer, origin top-left, row-major.
pub type PixelBuffer = image::RgbaImage;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Render `doc` at the printer's dot density into a buffer matching the
/// physical label.
///
/// The buffer is always `width_mm` x `height_mm` in dots. In landscape the
/// document is drawn onto a swapped-axis surface and rotated 90 degrees, so
/// the document's own width runs along the label's height. Scaling is
/// independent per axis; the document's aspect ratio need not match the
/// label's.
pub fn rasterize(
    doc: &ResolvedDocument,
    width_mm: f32,
    height_mm: f32,
    orientation: Orientation,
    typesetter: &dyn Typesetter,
) -> Result<PixelBuffer, RenderError> {
    if !(doc.width > 0.0 && doc.height > 0.0)
        || !doc.width.is_finite()
        || !doc.height.is_finite()
    {
        return Err(RenderError::InvalidDocument {
            width: doc.width,
            height: doc.height,
        });
    }

    let label_w = (width_mm * DOTS_PER_MM).round() as u32;
    let label_h = (height_mm * DOTS_PER_MM).round() as u32;
    if label_w == 0 || label_h == 0 {
        return Err(RenderError::EmptyTarget {
            width: label_w,
            height: label_h,
        });
    }

    let (surface_w, surface_h) = match orientation {
        Orientation::Portrait => (label_w, label_h),
        Orientation::Landscape => (label_h, label_w),
    };
    debug!(
        "rasterizing {}x{} document onto {}x{} dot surface",
        doc.width, doc.height, surface_w, surface_h
    );

    let mut surface = PixelBuffer::from_pixel(surface_w, surface_h, WHITE);
    let sx = surface_w as f32 / doc.width;
    let sy = surface_h as f32 / doc.height;

    for node in &doc.nodes {
        match node {
            Node::Rect(rect) => {
                fill_rect(
                    &mut surface,
                    rect.x * sx,
                    rect.y * sy,
                    (rect.x + rect.width) * sx,
                    (rect.y + rect.height) * sy,
                );
            }
            Node::Line(line) => {
                stroke_line(
                    &mut surface,
                    line.x1 * sx,
                    line.y1 * sy,
                    line.x2 * sx,
                    line.y2 * sy,
                    line.stroke_width * sx.min(sy),
                );
            }
            Node::Text(text) => {
                // Unresolved placeholders carry template sample content and
                // do not print.
                if text.field.is_some() {
                    continue;
                }
                let size_x = text.font_size * sx;
                let size_y = text.font_size * sy;
                let advance = text.line_advance.unwrap_or(1.25 * text.font_size);
                for (i, line) in text.lines.iter().enumerate() {
                    let baseline = (text.y + i as f32 * advance) * sy;
                    let width = typesetter.line_width(line, size_x, text.weight);
                    let x = match text.anchor {
                        HorizontalAnchor::Start => text.x * sx,
                        HorizontalAnchor::Middle => text.x * sx - width / 2.0,
                        HorizontalAnchor::End => text.x * sx - width,
                    };
                    typesetter.draw_line(
                        &mut surface,
                        line,
                        size_x,
                        size_y,
                        text.weight,
                        x,
                        baseline,
                    );
                }
            }
            Node::Raster(raster) => {
                if let Some(content) = &raster.content {
                    blit_raster(
                        &mut surface,
                        content,
                        raster.x * sx,
                        raster.y * sy,
                        raster.width * sx,
                        raster.height * sy,
                    );
                }
            }
        }
    }

    Ok(match orientation {
        Orientation::Portrait => surface,
        Orientation::Landscape => DynamicImage::ImageRgba8(surface).rotate90().to_rgba8(),
    })
}

fn fill_rect(target: &mut PixelBuffer, x0: f32, y0: f32, x1: f32, y1: f32) {
    let x0 = x0.max(0.0) as u32;
    let y0 = y0.max(0.0) as u32;
    let x1 = (x1.max(0.0).ceil() as u32).min(target.width());
    let y1 = (y1.max(0.0).ceil() as u32).min(target.height());
    for y in y0..y1 {
        for x in x0..x1 {
            target.put_pixel(x, y, BLACK);
        }
    }
}

fn stroke_line(target: &mut PixelBuffer, x0: f32, y0: f32, x1: f32, y1: f32, thickness: f32) {
    let half = (thickness / 2.0).max(0.5);
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0);
    for i in 0..=steps as u32 {
        let t = i as f32 / steps;
        let cx = x0 + (x1 - x0) * t;
        let cy = y0 + (y1 - y0) * t;
        fill_rect(target, cx - half, cy - half, cx + half, cy + half);
    }
}

/// Nearest-neighbor blit of embedded content into its box, aspect ratio
/// preserved, centered. Darkens only, so overlapping content composes the
/// way ink does.
fn blit_raster(
    target: &mut PixelBuffer,
    content: &EmbeddedRaster,
    bx: f32,
    by: f32,
    bw: f32,
    bh: f32,
) {
    if content.width == 0 || content.height == 0 || bw <= 0.0 || bh <= 0.0 {
        return;
    }
    let scale = (bw / content.width as f32).min(bh / content.height as f32);
    let dw = (content.width as f32 * scale).floor().max(1.0) as u32;
    let dh = (content.height as f32 * scale).floor().max(1.0) as u32;
    let ox = bx + (bw - dw as f32) / 2.0;
    let oy = by + (bh - dh as f32) / 2.0;

    for py in 0..dh {
        let src_y = (py as f32 / dh as f32 * content.height as f32) as u32;
        let src_y = src_y.min(content.height - 1);
        for px in 0..dw {
            let src_x = (px as f32 / dw as f32 * content.width as f32) as u32;
            let src_x = src_x.min(content.width - 1);
            let luma = content.luma[(src_y * content.width + src_x) as usize];

            let tx = ox + px as f32;
            let ty = oy + py as f32;
            if tx < 0.0 || ty < 0.0 {
                continue;
            }
            let (tx, ty) = (tx as u32, ty as u32);
            if tx < target.width() && ty < target.height() {
                let pixel = target.get_pixel_mut(tx, ty);
                pixel.0[0] = pixel.0[0].min(luma);
                pixel.0[1] = pixel.0[1].min(luma);
                pixel.0[2] = pixel.0[2].min(luma);
                pixel.0[3] = 255;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::testing::FixedAdvance;
    use crate::fonts::FontWeight;
    use crate::template::{RasterNode, RectNode, TextNode, VerticalBaseline};

    fn doc(nodes: Vec<Node>) -> ResolvedDocument {
        ResolvedDocument {
            width: 100.0,
            height: 50.0,
            nodes,
        }
    }

    fn black_pixels(buffer: &PixelBuffer) -> usize {
        buffer.pixels().filter(|p| p.0[0] < 128).count()
    }

    #[test]
    fn empty_document_renders_solid_white_at_dot_density() {
        let buffer = rasterize(
            &doc(vec![]),
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap();
        // 40mm and 30mm at 203dpi
        assert_eq!((buffer.width(), buffer.height()), (320, 240));
        assert_eq!(black_pixels(&buffer), 0);
        assert!(buffer.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn zero_sized_label_is_rejected() {
        let err = rasterize(
            &doc(vec![]),
            0.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::EmptyTarget { .. }));
    }

    #[test]
    fn degenerate_document_is_rejected() {
        let bad = ResolvedDocument {
            width: 0.0,
            height: 50.0,
            nodes: vec![],
        };
        let err = rasterize(
            &bad,
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidDocument { .. }));
    }

    #[test]
    fn rect_fills_scaled_area() {
        // Left half of the document.
        let buffer = rasterize(
            &doc(vec![Node::Rect(RectNode {
                x: 0.0,
                y: 0.0,
                width: 50.0,
                height: 50.0,
            })]),
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap();
        let half = (buffer.width() / 2) as usize * buffer.height() as usize;
        assert_eq!(black_pixels(&buffer), half);
        assert_eq!(buffer.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(buffer.get_pixel(buffer.width() - 1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn landscape_keeps_label_dimensions_and_rotates_content() {
        let left_half = vec![Node::Rect(RectNode {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
        })];
        let buffer = rasterize(
            &doc(left_half),
            40.0,
            30.0,
            Orientation::Landscape,
            &FixedAdvance::new(),
        )
        .unwrap();
        // buffer still matches the physical label
        assert_eq!((buffer.width(), buffer.height()), (320, 240));
        // the document's left half lands in the label's top half
        let top = buffer.get_pixel(buffer.width() / 2, 10).0;
        let bottom = buffer.get_pixel(buffer.width() / 2, buffer.height() - 10).0;
        assert_eq!(top, [0, 0, 0, 255]);
        assert_eq!(bottom, [255, 255, 255, 255]);
    }

    #[test]
    fn resolved_text_is_drawn_and_placeholders_are_not() {
        let resolved = Node::Text(TextNode {
            field: None,
            x: 10.0,
            y: 30.0,
            font_size: 12.0,
            weight: FontWeight::Normal,
            anchor: HorizontalAnchor::Start,
            baseline: VerticalBaseline::Baseline,
            line_advance: Some(15.0),
            lines: vec!["hi".to_string()],
        });
        let placeholder = Node::Text(TextNode {
            field: Some("name".to_string()),
            x: 10.0,
            y: 30.0,
            font_size: 12.0,
            weight: FontWeight::Normal,
            anchor: HorizontalAnchor::Start,
            baseline: VerticalBaseline::Baseline,
            line_advance: None,
            lines: vec!["sample".to_string()],
        });

        let with_text = rasterize(
            &doc(vec![resolved]),
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap();
        assert!(black_pixels(&with_text) > 0);

        let with_placeholder = rasterize(
            &doc(vec![placeholder]),
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap();
        assert_eq!(black_pixels(&with_placeholder), 0);
    }

    #[test]
    fn embedded_raster_stays_inside_its_box() {
        let node = Node::Raster(RasterNode {
            field: None,
            x: 25.0,
            y: 0.0,
            width: 25.0,
            height: 25.0,
            content: Some(crate::template::EmbeddedRaster {
                width: 2,
                height: 2,
                luma: vec![0, 255, 255, 0],
            }),
        });
        let buffer = rasterize(
            &doc(vec![node]),
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap();
        assert!(black_pixels(&buffer) > 0);
        // box spans x in [80, 160), y in [0, 120) device pixels
        for (x, y, p) in buffer.enumerate_pixels() {
            if p.0[0] < 128 {
                assert!((80..160).contains(&x), "ink at x={x}");
                assert!(y < 120, "ink at y={y}");
            }
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let nodes = vec![
            Node::Rect(RectNode {
                x: 5.0,
                y: 5.0,
                width: 20.0,
                height: 10.0,
            }),
            Node::Text(TextNode {
                field: None,
                x: 50.0,
                y: 30.0,
                font_size: 10.0,
                weight: FontWeight::Bold,
                anchor: HorizontalAnchor::Middle,
                baseline: VerticalBaseline::Baseline,
                line_advance: Some(12.0),
                lines: vec!["a".to_string(), "b".to_string()],
            }),
        ];
        let a = rasterize(
            &doc(nodes.clone()),
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap();
        let b = rasterize(
            &doc(nodes),
            40.0,
            30.0,
            Orientation::Portrait,
            &FixedAdvance::new(),
        )
        .unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
