//! Phomemo command protocol encoding.
//!
//! Turns a 1-bit bitmap plus device configuration into the ordered frame
//! sequence the printer's state machine expects. Purely a function of its
//! inputs; no device I/O happens here.

use log::debug;

use crate::dither::MonoBitmap;
use crate::error::ConfigError;
use crate::printer::PrinterConfig;
use crate::{PAPER_CONTINUOUS, PAPER_GAPPED, PAPER_MARKED};

// Command prefixes. The argument ranges (darkness 0x01-0x0F, speed
// 0x01-0x05, paper 0x0A/0x0B/0x26) are the hardware contract.
const CMD_INIT: [u8; 2] = [0x1B, 0x40]; // ESC @
const CMD_DARKNESS: [u8; 3] = [0x1B, 0x4E, 0x0D]; // ESC N 0D
const CMD_SPEED: [u8; 3] = [0x1B, 0x4E, 0x04]; // ESC N 04
const CMD_PAPER_TYPE: [u8; 2] = [0x1F, 0x11]; // US DC1
const CMD_RASTER: [u8; 4] = [0x1D, 0x76, 0x30, 0x00]; // GS v 0
const CMD_FEED: [u8; 1] = [0x0C]; // FF, advance to next label

/// Length of the raster frame header preceding the packed row payload.
const RASTER_HEADER_LEN: usize = 8;

/// Role of a frame within the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Initialize,
    Darkness,
    Speed,
    PaperType,
    Raster,
    Feed,
}

/// One discrete command or data unit, sent as a contiguous byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub bytes: Vec<u8>,
}

impl Frame {
    fn new(kind: FrameKind, bytes: Vec<u8>) -> Self {
        Frame { kind, bytes }
    }

    /// Packed row data of a raster frame, without the command header.
    pub fn raster_payload(&self) -> Option<&[u8]> {
        match self.kind {
            FrameKind::Raster => Some(&self.bytes[RASTER_HEADER_LEN..]),
            _ => None,
        }
    }
}

/// Ordered frames of one print job. Must be transmitted in order, with no
/// reordering and no coalescing across frame boundaries.
pub type FrameSequence = Vec<Frame>;

/// Encode `bitmap` under `config`.
///
/// Validation fails fast: an out-of-range darkness or speed, an unknown
/// paper type, or a bitmap wider than the model's head yields a
/// [`ConfigError`] and zero frames. Values are never clamped.
pub fn encode(bitmap: &MonoBitmap, config: &PrinterConfig) -> Result<FrameSequence, ConfigError> {
    validate_config(config)?;
    let profile = config.model.profile();
    if bitmap.width() > profile.head_dots {
        return Err(ConfigError::WidthExceedsHead {
            width: bitmap.width(),
            dots: profile.head_dots,
        });
    }

    let mut frames: FrameSequence = Vec::new();

    let mut init = CMD_INIT.to_vec();
    init.extend_from_slice(profile.init_tail);
    frames.push(Frame::new(FrameKind::Initialize, init));

    let mut darkness = CMD_DARKNESS.to_vec();
    darkness.push(config.darkness);
    frames.push(Frame::new(FrameKind::Darkness, darkness));

    let mut speed = CMD_SPEED.to_vec();
    speed.push(config.speed);
    frames.push(Frame::new(FrameKind::Speed, speed));

    let mut paper = CMD_PAPER_TYPE.to_vec();
    paper.push(config.paper_type);
    frames.push(Frame::new(FrameKind::PaperType, paper));

    let bytes_per_row = ((bitmap.width() + 7) / 8) as usize;
    let rows_per_frame = (profile.raster_buffer_bytes / bytes_per_row).max(1) as u32;

    let mut row = 0;
    while row < bitmap.height() {
        let rows = rows_per_frame.min(bitmap.height() - row);
        let mut bytes = Vec::with_capacity(RASTER_HEADER_LEN + bytes_per_row * rows as usize);
        bytes.extend_from_slice(&CMD_RASTER);
        bytes.extend_from_slice(&(bytes_per_row as u16).to_le_bytes());
        bytes.extend_from_slice(&(rows as u16).to_le_bytes());
        for y in row..row + rows {
            pack_row(bitmap, y, &mut bytes);
        }
        frames.push(Frame::new(FrameKind::Raster, bytes));
        row += rows;
    }

    frames.push(Frame::new(FrameKind::Feed, CMD_FEED.to_vec()));

    debug!(
        "encoded {}x{} bitmap into {} frames, {} bytes",
        bitmap.width(),
        bitmap.height(),
        frames.len(),
        frames.iter().map(|f| f.bytes.len()).sum::<usize>()
    );
    Ok(frames)
}

/// Check `config` against the documented ranges without encoding anything.
///
/// The print pipeline calls this before any rendering work so a bad config
/// fails fast.
pub(crate) fn validate_config(config: &PrinterConfig) -> Result<(), ConfigError> {
    if !(1..=15).contains(&config.darkness) {
        return Err(ConfigError::DarknessOutOfRange(config.darkness));
    }
    if !(1..=5).contains(&config.speed) {
        return Err(ConfigError::SpeedOutOfRange(config.speed));
    }
    if ![PAPER_GAPPED, PAPER_CONTINUOUS, PAPER_MARKED].contains(&config.paper_type) {
        return Err(ConfigError::UnknownPaperType(config.paper_type));
    }
    Ok(())
}

/// Pack one bitmap row MSB-first, 8 pixels per byte, 1 = black.
fn pack_row(bitmap: &MonoBitmap, y: u32, out: &mut Vec<u8>) {
    let row = bitmap.row(y);
    for chunk in row.chunks(8) {
        let mut byte = 0u8;
        for (i, &sample) in chunk.iter().enumerate() {
            byte |= sample << (7 - i);
        }
        out.push(byte);
    }
}
