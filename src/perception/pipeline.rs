//! Screenshot preparation for inference.
//!
//! [`MAX_LINE_RES`] is shared with the coordinate mapper in
//! `executor::coordinator`; both sides must use the same value or taps drift
//! away from what the model saw.
use std::io::Cursor;

use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::errors::PilotResult;
use crate::perception::types::{Frame, PreparedFrame};

/// Longest side, in pixels, of any screenshot sent to the model.
pub const MAX_LINE_RES: u32 = 1120;

/// Target dimensions after the downscale. Height is clamped first, then width,
/// truncating each derived side. Never upscales.
pub fn fit_within_max_line(width: u32, height: u32) -> (u32, u32) {
    let (mut w, mut h) = (width as u64, height as u64);
    let max_line = MAX_LINE_RES as u64;
    if h > max_line {
        w = w * max_line / h;
        h = max_line;
    }
    if w > max_line {
        h = h * max_line / w;
        w = max_line;
    }
    (w.max(1) as u32, h.max(1) as u32)
}

pub fn resize_for_inference(image: &DynamicImage) -> DynamicImage {
    let (w, h) = fit_within_max_line(image.width(), image.height());
    if (w, h) == (image.width(), image.height()) {
        return image.clone();
    }
    tracing::debug!(
        from = %format!("{}x{}", image.width(), image.height()),
        to = %format!("{w}x{h}"),
        "screenshot resized"
    );
    image.resize_exact(w, h, FilterType::Lanczos3)
}

pub fn encode_png_base64(image: &DynamicImage) -> PilotResult<String> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
}

/// Resize + encode a captured frame for a user turn.
pub fn prepare(frame: &Frame) -> PilotResult<PreparedFrame> {
    let resized = resize_for_inference(&frame.image);
    let b64 = encode_png_base64(&resized)?;
    Ok(PreparedFrame {
        width: resized.width(),
        height: resized.height(),
        data_url: format!("data:image/png;base64,{b64}"),
    })
}
