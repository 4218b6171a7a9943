//! Caption helpers for the original-image surface.

use std::{io::Cursor, sync::Arc};

use image::ImageReader;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size with up to two decimals, e.g. `1.91 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(SIZE_UNITS.len() - 1);
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{rounded} {}", SIZE_UNITS[exponent])
}

/// Reads pixel dimensions from the image header without decoding the pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Runs [`probe_dimensions`] on the blocking pool.
pub async fn probe_dimensions_async(bytes: Arc<[u8]>) -> Option<(u32, u32)> {
    match tokio::task::spawn_blocking(move || probe_dimensions(&bytes)).await {
        Ok(dimensions) => dimensions,
        Err(err) => {
            tracing::warn!(error = %err, "dimension probe task failed");
            None
        }
    }
}

/// `"{w}×{h}px • {size} • {TYPE}"`.
pub fn original_caption(dimensions: (u32, u32), size_bytes: u64, mime_type: &str, name: &str) -> String {
    let kind = mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype)
        .filter(|subtype| !subtype.is_empty())
        .or_else(|| name.rsplit_once('.').map(|(_, ext)| ext))
        .unwrap_or("unknown")
        .to_ascii_uppercase();
    format!(
        "{}×{}px • {} • {}",
        dimensions.0,
        dimensions.1,
        format_file_size(size_bytes),
        kind
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes_like_the_upload_panel() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2_000_000), "1.91 MB");
        assert_eq!(format_file_size(15 * 1024 * 1024), "15 MB");
    }

    #[test]
    fn caption_falls_back_to_extension() {
        assert_eq!(
            original_caption((640, 480), 1024, "image/png", "a.png"),
            "640×480px • 1 KB • PNG"
        );
        assert_eq!(
            original_caption((10, 20), 2048, "", "DJI_0001.jpg"),
            "10×20px • 2 KB • JPG"
        );
    }

    #[test]
    fn probe_reads_png_header() {
        let mut bytes = Vec::new();
        image::RgbImage::new(3, 2)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        assert_eq!(probe_dimensions(&bytes), Some((3, 2)));
        assert_eq!(probe_dimensions(b"not an image"), None);
    }
}
