// THEORY:
// A snapshot is the composed canvas at one moment, encoded once and then fanned
// out to every viewer. Encoding happens up front so that each viewer only pays
// for a cheap `Arc` clone. Viewers are browsers, so the wire payload is the
// smallest thing a browser can drop straight into an `<img>`: a JSON object
// holding a data URL.

use crate::error::ShareResult;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Png,
    Jpeg,
}

impl SnapshotFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            SnapshotFormat::Png => "image/png",
            SnapshotFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPacket {
    pub ts_millis: u64,
    pub width: u32,
    pub height: u32,
    pub format: SnapshotFormat,
    pub data: Arc<[u8]>,
}

/// What a viewer receives: `{"image": "data:image/png;base64,..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub image: String,
}

impl SnapshotPacket {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }

    pub fn payload(&self) -> SnapshotPayload {
        SnapshotPayload {
            image: self.data_url(),
        }
    }

    pub fn payload_json(&self) -> ShareResult<String> {
        Ok(serde_json::to_string(&self.payload())?)
    }
}

/// Encodes a composed frame. JPEG drops the alpha channel.
pub fn encode_snapshot(frame: &RgbaImage, format: SnapshotFormat, ts_millis: u64) -> ShareResult<SnapshotPacket> {
    let (width, height) = frame.dimensions();
    let mut data = Vec::new();

    match format {
        SnapshotFormat::Png => {
            PngEncoder::new(&mut data).write_image(frame.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
        SnapshotFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }

    Ok(SnapshotPacket {
        ts_millis,
        width,
        height,
        format,
        data: data.into(),
    })
}
