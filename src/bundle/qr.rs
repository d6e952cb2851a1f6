// src/bundle/qr.rs

use image::Luma;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};

use crate::bundle::error::BundleError;

/// Light border the renderer draws around the symbol, in modules.
pub const QUIET_ZONE_MODULES: usize = 4;

const DARK: u8 = 0x00;
const LIGHT: u8 = 0xFF;

/// Identity printed on a cover page: which student, which exam.
/// Ids travel as strings so scanners never have to care about integer width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub student_id: String,
    pub exam_id: String,
}

impl QrPayload {
    pub fn new(student_id: i64, exam_id: i64) -> Self {
        Self {
            student_id: student_id.to_string(),
            exam_id: exam_id.to_string(),
        }
    }

    /// Compact JSON, `studentId` first.
    pub fn to_json(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Square 8-bit grayscale image of a QR symbol, row-major, quiet zone included.
#[derive(Debug, Clone)]
pub struct QrRaster {
    side: u32,
    pixels: Vec<u8>,
}

impl QrRaster {
    /// Encodes `data` and draws each module as a `module_px` × `module_px` block.
    pub fn encode(data: &str, module_px: u32) -> Result<Self, BundleError> {
        let scale = module_px.max(1);
        let image = QrCode::new(data.as_bytes())?
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .module_dimensions(scale, scale)
            .dark_color(Luma([DARK]))
            .light_color(Luma([LIGHT]))
            .build();

        Ok(Self {
            side: image.width(),
            pixels: image.into_raw(),
        })
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
