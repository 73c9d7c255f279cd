//! Decodes a data-URI image, re-encodes it to JPEG at quality 90, and
//! writes it to a uniquely named temp file (§4.5 rule 5). Grounded on the
//! `image` crate's `ImageReader`/`JpegEncoder` pair, since this codebase
//! never needed a raster image codec of its own; temp-file creation mirrors
//! the `tempfile::Builder` usage this codebase already has for compression
//! scratch files.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::ImageReader;

use crate::error::{ErrorKind, ErrorRecord};

const JPEG_QUALITY: u8 = 90;

/// Parse a `data:image/<fmt>;base64,<payload>` URL into raw bytes.
pub fn decode_data_uri(url: &str) -> Result<Vec<u8>, ErrorRecord> {
    let payload = url
        .split_once(";base64,")
        .map(|(_, b64)| b64)
        .ok_or_else(|| ErrorRecord::with_retryable(format!("unsupported image_url format: {url}"), ErrorKind::HttpError, false))?;

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ErrorRecord::with_retryable(format!("invalid base64 image payload: {e}"), ErrorKind::HttpError, false))
}

/// Re-encode arbitrary image bytes to JPEG@90 and write them to a uniquely
/// named file under `temp_dir`. Returns the written path.
pub fn reencode_to_jpeg_tempfile(bytes: &[u8], temp_dir: &Path) -> Result<PathBuf, ErrorRecord> {
    let decoded = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ErrorRecord::with_retryable(format!("unreadable image format: {e}"), ErrorKind::HttpError, false))?
        .decode()
        .map_err(|e| ErrorRecord::with_retryable(format!("failed to decode image: {e}"), ErrorKind::HttpError, false))?;

    let mut jpeg_bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_bytes, JPEG_QUALITY);
    encoder
        .encode_image(&decoded)
        .map_err(|e| ErrorRecord::with_retryable(format!("failed to re-encode image as jpeg: {e}"), ErrorKind::HttpError, false))?;

    use std::io::Write as _;

    let mut file = tempfile::Builder::new()
        .prefix("gateway-image-")
        .suffix(".jpg")
        .rand_bytes(12)
        .tempfile_in(temp_dir)
        .map_err(|e| ErrorRecord::with_retryable(format!("failed to create temp file: {e}"), ErrorKind::HttpError, true))?;

    file.write_all(&jpeg_bytes)
        .map_err(|e| ErrorRecord::with_retryable(format!("failed to write temp file: {e}"), ErrorKind::HttpError, true))?;

    let (_, path) = file
        .keep()
        .map_err(|e| ErrorRecord::with_retryable(format!("failed to persist temp file: {e}"), ErrorKind::HttpError, true))?;

    Ok(path)
}

/// Decode + re-encode in one step, for the parser's per-image loop.
pub fn data_uri_to_jpeg_tempfile(url: &str, temp_dir: &Path) -> Result<PathBuf, ErrorRecord> {
    let bytes = decode_data_uri(url)?;
    reencode_to_jpeg_tempfile(&bytes, temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png_data_uri() -> String {
        // A single red pixel, 1x1 PNG.
        let png_bytes: &[u8] = &[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00,
            0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x03, 0x01,
            0x01, 0x00, 0x18, 0xDD, 0x8D, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ];
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes);
        format!("data:image/png;base64,{encoded}")
    }

    #[test]
    fn decodes_and_reencodes_a_minimal_png() {
        let dir = tempfile::tempdir().unwrap();
        let uri = tiny_png_data_uri();
        let path = data_uri_to_jpeg_tempfile(&uri, dir.path()).unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "jpg");
    }

    #[test]
    fn rejects_non_data_uri() {
        let err = decode_data_uri("https://example.com/cat.png").unwrap_err();
        assert_eq!(err.code, ErrorKind::HttpError);
        assert!(!err.retryable);
    }
}
