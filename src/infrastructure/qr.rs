use crate::domain::ports::QrScanner;
use crate::error::Result;
use tracing::debug;

/// Scans slip photos for a QR payload by rasterising to greyscale and
/// running grid detection over the result.
///
/// Bank slips embed an EMV-style payload in their QR; the pipeline only
/// uses its presence as a gating signal, so decode misses and unreadable
/// image bytes both report `None` instead of failing the event.
#[derive(Default, Clone, Copy)]
pub struct ImageQrScanner;

impl ImageQrScanner {
    pub fn new() -> Self {
        Self
    }
}

impl QrScanner for ImageQrScanner {
    fn scan(&self, image: &[u8]) -> Result<Option<String>> {
        let Ok(decoded) = image::load_from_memory(image) else {
            debug!("image bytes not decodable, treating as no QR");
            return Ok(None);
        };
        let luma = decoded.to_luma8();
        let (width, height) = luma.dimensions();

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| luma.get_pixel(x as u32, y as u32).0[0],
        );
        for grid in prepared.detect_grids() {
            if let Ok((_meta, payload)) = grid.decode() {
                return Ok(Some(payload));
            }
        }
        Ok(None)
    }
}
