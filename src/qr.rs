//! QR rendering: claim id → PNG bytes.
//!
//! Rendering runs on the blocking pool; callers await an explicit
//! completion signal (a oneshot carrying the result), never a timer. The
//! payload is the claim id as plain text — no prefix, no checksum, no
//! structured encoding.

use anyhow::{Context as _, Result};
use qrcode::QrCode;

/// Minimum edge length of the rendered image in pixels.
const MIN_IMAGE_SIZE: u32 = 200;

/// Encode `payload` as a QR code and return PNG bytes. Synchronous;
/// use [`render_png`] from async contexts.
pub fn render_png_blocking(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes()).context("failed to build QR code")?;
    let img = code
        .render::<image::Luma<u8>>()
        .min_dimensions(MIN_IMAGE_SIZE, MIN_IMAGE_SIZE)
        .build();

    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .context("failed to encode QR PNG")?;
    Ok(bytes)
}

/// Render on a blocking worker and await its completion signal.
pub async fn render_png(payload: String) -> Result<Vec<u8>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::task::spawn_blocking(move || {
        // Receiver dropped means the caller went away; nothing to do.
        let _ = tx.send(render_png_blocking(&payload));
    });
    rx.await
        .map_err(|_| anyhow::anyhow!("QR render worker exited before signalling completion"))?
}
