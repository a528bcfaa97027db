//! Printer configuration and the print pipeline.
//!
//! One print request runs compose -> rasterize -> dither -> encode ->
//! transmit as a single causal chain; each stage consumes the previous
//! stage's complete output. Rendering stages of concurrent requests may run
//! in parallel, only transmission serializes on the connection.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::compose::{compose, FieldIssue};
use crate::dither::{dither, MonoBitmap};
use crate::error::Error;
use crate::fonts::{FontLibrary, Typesetter};
use crate::model::Model;
use crate::protocol::{encode, validate_config};
use crate::raster::{rasterize, PixelBuffer};
use crate::template::{FieldValues, Template};
use crate::transport::{Connection, SerialTransport, Transport};
use crate::PAPER_GAPPED;

/// Label orientation relative to the feed direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Device configuration for one printer.
///
/// Values are carried as supplied; the encoder validates and rejects
/// out-of-range darkness/speed and unknown paper codes instead of clamping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub(crate) model: Model,
    pub(crate) darkness: u8,
    pub(crate) speed: u8,
    pub(crate) paper_type: u8,
    pub(crate) width_mm: f32,
    pub(crate) height_mm: f32,
    pub(crate) orientation: Orientation,
}

impl PrinterConfig {
    /// Initialize configuration for a label of `width_mm` x `height_mm`.
    ///
    /// Defaults: darkness 8, speed 2, gapped labels, portrait.
    pub fn new(model: Model, width_mm: f32, height_mm: f32) -> PrinterConfig {
        PrinterConfig {
            model,
            darkness: 8,
            speed: 2,
            paper_type: PAPER_GAPPED,
            width_mm,
            height_mm,
            orientation: Orientation::Portrait,
        }
    }

    /// Print darkness, documented range 1..=15.
    pub fn darkness(self, darkness: u8) -> Self {
        PrinterConfig { darkness, ..self }
    }

    /// Print speed, documented range 1..=5.
    pub fn speed(self, speed: u8) -> Self {
        PrinterConfig { speed, ..self }
    }

    /// Paper type code: [`PAPER_GAPPED`](crate::PAPER_GAPPED),
    /// [`PAPER_CONTINUOUS`](crate::PAPER_CONTINUOUS) or
    /// [`PAPER_MARKED`](crate::PAPER_MARKED).
    pub fn paper_type(self, paper_type: u8) -> Self {
        PrinterConfig { paper_type, ..self }
    }

    pub fn orientation(self, orientation: Orientation) -> Self {
        PrinterConfig { orientation, ..self }
    }

    pub fn model(&self) -> Model {
        self.model
    }
}

/// Rendered output of one request, available to the caller for preview.
#[derive(Debug)]
pub struct PrintPreview {
    pub pixels: PixelBuffer,
    pub bitmap: MonoBitmap,
    /// Per-field problems that resolved to empty or raw content.
    pub issues: Vec<FieldIssue>,
}

/// Successful print: the rendered preview plus transmission accounting.
#[derive(Debug)]
pub struct PrintOutput {
    pub preview: PrintPreview,
    pub frames_written: usize,
}

/// A configured printer bound to one connection.
pub struct Printer<T: Transport = SerialTransport, F: Typesetter = FontLibrary> {
    connection: Connection<T>,
    typesetter: F,
    config: PrinterConfig,
}

impl Printer<SerialTransport, FontLibrary> {
    /// Open the serial device at `path` and bind it to `config`.
    pub fn open(
        config: PrinterConfig,
        path: &str,
        fonts: FontLibrary,
    ) -> Result<Self, Error> {
        let transport = SerialTransport::open(path)?;
        Ok(Printer::with_transport(config, transport, fonts))
    }
}

impl<T: Transport, F: Typesetter> Printer<T, F> {
    /// Bind an already-open transport. The seam for tests and for
    /// non-serial channels.
    pub fn with_transport(config: PrinterConfig, transport: T, typesetter: F) -> Self {
        Printer {
            connection: Connection::new(transport),
            typesetter,
            config,
        }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    /// Render `template` with `values` without touching the device.
    ///
    /// For a fixed template, values and config the output is byte-identical
    /// across calls.
    pub fn preview(
        &self,
        template: &Template,
        values: &FieldValues,
    ) -> Result<PrintPreview, Error> {
        let composition = compose(template, values, &self.typesetter)?;
        if !composition.issues.is_empty() {
            debug!("composition finished with {} issue(s)", composition.issues.len());
        }
        let pixels = rasterize(
            &composition.document,
            self.config.width_mm,
            self.config.height_mm,
            self.config.orientation,
            &self.typesetter,
        )?;
        let bitmap = dither(&pixels);
        Ok(PrintPreview {
            pixels,
            bitmap,
            issues: composition.issues,
        })
    }

    /// Run the full pipeline and transmit the job.
    ///
    /// Configuration is validated before any rendering work begins. The
    /// transport phase waits for any in-flight job on the same connection.
    pub fn print(
        &self,
        template: &Template,
        values: &FieldValues,
    ) -> Result<PrintOutput, Error> {
        validate_config(&self.config)?;

        let preview = self.preview(template, values)?;
        let frames = encode(&preview.bitmap, &self.config)?;
        let frames_written = self.connection.transmit(&frames)?;
        info!(
            "printed {}x{} label in {} frames",
            preview.bitmap.width(),
            preview.bitmap.height(),
            frames_written
        );
        Ok(PrintOutput {
            preview,
            frames_written,
        })
    }

    /// Tear down the printer and hand the transport back.
    pub fn into_transport(self) -> T {
        self.connection.into_inner()
    }
}
