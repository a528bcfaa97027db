//! Dynamic text fitting.
//!
//! Finds the largest font size, no larger than the size the template
//! declares, at which a field's text stays inside its box. The measured
//! width is monotonic in font size, so a binary search over the size
//! interval is valid.

use log::debug;

use crate::fonts::{FontWeight, Typesetter};
use crate::MIN_FONT_SIZE;

/// Outcome of a fitting pass: the chosen size and the laid-out lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Fit {
    pub size: f32,
    pub lines: Vec<String>,
}

/// Fit `text` into `max_width` pixels starting from `base_size`.
///
/// Multiline fields split on explicit line breaks and share one size,
/// computed from the widest line alone. Single-line fields keep the text as
/// one run. The size never exceeds `base_size`; when the text already fits,
/// `base_size` comes back unchanged. A shrunken size is the floor of the
/// binary search's lower bound, so rounding can never break the fit. Text
/// that still overflows at size 8 is accepted overflowing.
pub fn fit(
    typesetter: &dyn Typesetter,
    text: &str,
    max_width: f32,
    base_size: f32,
    weight: FontWeight,
    multiline: bool,
) -> Fit {
    if text.is_empty() {
        return Fit {
            size: base_size,
            lines: Vec::new(),
        };
    }

    let lines: Vec<String> = if multiline {
        text.split('\n').map(str::to_string).collect()
    } else {
        vec![text.to_string()]
    };

    // All lines share one size, driven by the widest line only.
    let mut widest = lines[0].as_str();
    let mut widest_width = typesetter.line_width(widest, base_size, weight);
    for line in &lines[1..] {
        let width = typesetter.line_width(line, base_size, weight);
        if width > widest_width {
            widest = line;
            widest_width = width;
        }
    }
    let widest = widest.to_string();

    if widest_width <= max_width {
        return Fit {
            size: base_size,
            lines,
        };
    }

    let floor = MIN_FONT_SIZE.min(base_size);
    if typesetter.line_width(&widest, floor, weight) > max_width {
        // Overflow at the minimum size is accepted; no wrapping.
        debug!(
            "text overflows {}px box even at size {}",
            max_width, floor
        );
        return Fit { size: floor, lines };
    }

    let mut lo = floor;
    let mut hi = base_size;
    while hi - lo > 0.5 {
        let mid = (lo + hi) / 2.0;
        if typesetter.line_width(&widest, mid, weight) <= max_width {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Fit {
        size: lo.floor(),
        lines,
    }
}
