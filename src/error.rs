//! Error types for the render and print pipeline.
//!
//! Every failure names the stage it came from (config, composition,
//! rasterization, transport) and carries the underlying cause, so the caller
//! can decide whether to retry, reconfigure, or abort.

use thiserror::Error;

/// Main error type for label print operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Printer configuration rejected before any rendering work began.
    ///
    /// Fully recoverable: correct the configuration and print again.
    #[error("invalid printer configuration")]
    Config(#[from] ConfigError),

    /// The template itself is structurally unusable.
    ///
    /// Per-field data problems (a malformed date value, an undecodable
    /// image) do not raise this; they are reported as
    /// [`FieldIssue`](crate::FieldIssue)s alongside the composed document.
    #[error("template composition failed")]
    Composition(#[from] CompositionError),

    /// The resolved document could not be rasterized.
    ///
    /// Fatal for the request; no partial raster is returned.
    #[error("rasterization failed")]
    Render(#[from] RenderError),

    /// The serial connection could not be opened.
    #[error("failed to open printer connection")]
    Connection(#[source] serialport::Error),

    /// Transmission failed partway through a frame sequence.
    ///
    /// `frames_sent` counts the frames fully delivered before the failure.
    /// Resuming is not possible; a retry must restart from the init frame.
    #[error("write failed after {frames_sent} frames")]
    Write {
        frames_sent: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration values the device would reject.
///
/// These are caller errors. The encoder validates and fails fast; it never
/// clamps an out-of-range value into the documented range.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("darkness {0} out of range 1..=15")]
    DarknessOutOfRange(u8),

    #[error("speed {0} out of range 1..=5")]
    SpeedOutOfRange(u8),

    /// Recognized codes are 0x0A (gapped), 0x0B (continuous), 0x26 (marked).
    #[error("unrecognized paper type code {0:#04X}")]
    UnknownPaperType(u8),

    /// The dithered bitmap is wider than the selected model's print head.
    #[error("bitmap width {width} exceeds {dots} print head dots")]
    WidthExceedsHead { width: u32, dots: u32 },
}

/// Structural template faults found during composition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("duplicate field id {0:?}")]
    DuplicateFieldId(String),

    /// A field's declared kind does not match its placeholder node, e.g. a
    /// `qr` field bound to a text node.
    #[error("field {id:?} of kind {kind} bound to an incompatible {node} node")]
    KindMismatch {
        id: String,
        kind: &'static str,
        node: &'static str,
    },
}

/// The resolved document could not be turned into pixels.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("label target is {width}x{height} dots; nothing to rasterize")]
    EmptyTarget { width: u32, height: u32 },

    #[error("document size {width}x{height} is not renderable")]
    InvalidDocument { width: f32, height: f32 },
}
