use serde::{Deserialize, Serialize};

/// Supported Phomemo device models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    M110,
    M120,
    M220,
}

/// Per-model constants the encoder is parameterized over.
///
/// The encoding algorithm itself is model-agnostic; everything
/// device-specific lives here.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    /// Native print head width in dots.
    pub head_dots: u32,
    /// Device raster buffer capacity; one raster frame's payload must not
    /// exceed this. Calibration constant, not hardware-verified.
    pub raster_buffer_bytes: usize,
    /// Model-specific bytes appended to the init frame.
    pub init_tail: &'static [u8],
}

impl Model {
    pub fn profile(&self) -> Profile {
        match self {
            Self::M110 => Profile {
                head_dots: 384,
                raster_buffer_bytes: 16 * 1024,
                init_tail: &[],
            },
            Self::M120 => Profile {
                head_dots: 384,
                raster_buffer_bytes: 16 * 1024,
                init_tail: &[],
            },
            Self::M220 => Profile {
                head_dots: 576,
                raster_buffer_bytes: 32 * 1024,
                init_tail: &[0x1F, 0x11, 0x0E],
            },
        }
    }

    /// Widest printable label for this model, in millimeters.
    pub fn max_width_mm(&self) -> f32 {
        self.profile().head_dots as f32 / crate::DOTS_PER_MM
    }
}
