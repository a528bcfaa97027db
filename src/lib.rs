//! Phomemo Label Printer Driver
//!
//! This crate renders a label template into a 1-bit raster and drives
//! Phomemo M-series thermal label printers (M110, M120, M220) over a serial
//! connection.
//!
//! # Example
//!
//! ```rust,no_run
//! use phomemo_label::{FieldValues, FontLibrary, Model, Printer, PrinterConfig, Template};
//!
//! let template: Template = serde_json::from_str(r#"{ "document": { "width": 320.0,
//!     "height": 240.0, "nodes": [] }, "fields": [] }"#).unwrap();
//! let fonts = FontLibrary::from_vec(std::fs::read("DejaVuSans.ttf").unwrap()).unwrap();
//!
//! let config = PrinterConfig::new(Model::M110, 40.0, 30.0).darkness(10);
//! let printer = Printer::open(config, "/dev/ttyUSB0", fonts).unwrap();
//!
//! let mut values = FieldValues::new();
//! values.insert_text("name", "Hello");
//! printer.print(&template, &values).unwrap();
//! ```

mod compose;
mod dither;
mod error;
mod fitter;
mod fonts;
mod model;
mod printer;
mod protocol;
mod raster;
mod template;
mod transport;

pub use crate::{
    compose::{compose, Composition, FieldIssue},
    dither::{dither, MonoBitmap},
    error::{CompositionError, ConfigError, Error, RenderError},
    fitter::{fit, Fit},
    fonts::{FontLibrary, FontWeight, Typesetter},
    model::{Model, Profile},
    printer::{Orientation, PrintOutput, PrintPreview, Printer, PrinterConfig},
    protocol::{encode, Frame, FrameKind, FrameSequence},
    raster::{rasterize, PixelBuffer},
    template::{
        Document, EmbeddedRaster, FieldKind, FieldMetadata, FieldValue, FieldValues,
        HorizontalAnchor, LineNode, Node, RasterNode, RectNode, ResolvedDocument, Template,
        TextNode, VerticalBaseline,
    },
    transport::{Connection, SerialTransport, Transport},
};

/// Print head resolution of every supported Phomemo model, in dots per
/// millimeter (203 dpi).
pub const DOTS_PER_MM: f32 = 203.0 / 25.4;

/// Smallest font size the text fitter will shrink down to.
///
/// Text that still overflows its box at this size is printed overflowing;
/// the fitter never wraps or shrinks further.
pub const MIN_FONT_SIZE: f32 = 8.0;

/// Horizontal padding reserved on each side of a text field's box, in
/// template units.
pub const TEXT_BOX_PADDING: f32 = 20.0;

/// Paper type code for die-cut labels separated by a gap.
pub const PAPER_GAPPED: u8 = 0x0A;

/// Paper type code for continuous (endless) paper.
pub const PAPER_CONTINUOUS: u8 = 0x0B;

/// Paper type code for continuous paper with a printed black mark.
pub const PAPER_MARKED: u8 = 0x26;
