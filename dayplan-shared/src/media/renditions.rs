/// Avatar renditions
///
/// An upload is kept byte-for-byte as the `original` and scaled down twice:
///
/// - `medium`: fits within 600×600
/// - `small`: fits within 150×150
///
/// Aspect ratio is preserved and images already inside the box are not
/// enlarged. JPEG uploads produce JPEG renditions; every other format
/// produces PNG.
///
/// Decoding and resizing are CPU-bound; async callers use
/// [`render_blocking`].

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use std::io::Cursor;

/// Bounding box of the medium rendition
pub const MEDIUM_SIZE: u32 = 600;

/// Bounding box of the small rendition
pub const SMALL_SIZE: u32 = 150;

const JPEG_QUALITY: u8 = 85;

/// Error type for rendition generation
#[derive(Debug, thiserror::Error)]
pub enum RenditionError {
    /// Upload is not an image we can read
    #[error("Unsupported or corrupt image: {0}")]
    Decode(String),

    /// Scaled image could not be encoded
    #[error("Failed to encode rendition: {0}")]
    Encode(String),

    /// The blocking task died
    #[error("Rendition task failed: {0}")]
    Task(String),
}

/// Encoding used for the scaled renditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionFormat {
    Jpeg,
    Png,
}

impl RenditionFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RenditionFormat::Jpeg => "jpg",
            RenditionFormat::Png => "png",
        }
    }
}

/// The three encoded renditions of one upload
#[derive(Debug, Clone)]
pub struct Renditions {
    /// Uploaded bytes, untouched
    pub original: Bytes,

    /// File extension matching the original's detected format
    pub original_extension: &'static str,

    pub format: RenditionFormat,
    pub medium: Vec<u8>,
    pub small: Vec<u8>,
}

/// Decodes an upload and produces its renditions
pub fn render(original: Bytes) -> Result<Renditions, RenditionError> {
    let source_format =
        image::guess_format(&original).map_err(|e| RenditionError::Decode(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(&original, source_format)
        .map_err(|e| RenditionError::Decode(e.to_string()))?;

    let format = if source_format == ImageFormat::Jpeg {
        RenditionFormat::Jpeg
    } else {
        RenditionFormat::Png
    };

    let medium = encode(&fit_within(&decoded, MEDIUM_SIZE), format)?;
    let small = encode(&fit_within(&decoded, SMALL_SIZE), format)?;

    Ok(Renditions {
        original_extension: extension_for(source_format),
        original,
        format,
        medium,
        small,
    })
}

/// [`render`] on the blocking thread pool
pub async fn render_blocking(original: Bytes) -> Result<Renditions, RenditionError> {
    tokio::task::spawn_blocking(move || render(original))
        .await
        .map_err(|e| RenditionError::Task(e.to_string()))?
}

fn fit_within(image: &DynamicImage, size: u32) -> DynamicImage {
    if image.width() <= size && image.height() <= size {
        image.clone()
    } else {
        image.thumbnail(size, size)
    }
}

fn encode(image: &DynamicImage, format: RenditionFormat) -> Result<Vec<u8>, RenditionError> {
    let mut buffer = Cursor::new(Vec::new());

    let result = match format {
        // JPEG has no alpha channel
        RenditionFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut buffer, ImageOutputFormat::Jpeg(JPEG_QUALITY)),
        RenditionFormat::Png => image.write_to(&mut buffer, ImageOutputFormat::Png),
    };
    result.map_err(|e| RenditionError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}

fn extension_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Ico => "ico",
        _ => "img",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn sample(width: u32, height: u32, format: ImageOutputFormat) -> Bytes {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 80, 40]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, format)
            .unwrap();
        Bytes::from(buffer.into_inner())
    }

    fn dimensions(bytes: &[u8]) -> (u32, u32) {
        image::load_from_memory(bytes).unwrap().dimensions()
    }

    #[test]
    fn test_png_renditions_fit_their_boxes() {
        let original = sample(1200, 800, ImageOutputFormat::Png);

        let out = render(original.clone()).unwrap();

        assert_eq!(out.original, original);
        assert_eq!(out.original_extension, "png");
        assert_eq!(out.format, RenditionFormat::Png);
        assert_eq!(dimensions(&out.medium), (600, 400));
        assert_eq!(dimensions(&out.small), (150, 100));
        assert_eq!(image::guess_format(&out.small).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_jpeg_stays_jpeg() {
        let out = render(sample(300, 900, ImageOutputFormat::Jpeg(90))).unwrap();

        assert_eq!(out.format, RenditionFormat::Jpeg);
        assert_eq!(out.original_extension, "jpg");
        assert_eq!(image::guess_format(&out.medium).unwrap(), ImageFormat::Jpeg);
        assert_eq!(dimensions(&out.medium), (200, 600));
        assert_eq!(dimensions(&out.small), (50, 150));
    }

    #[test]
    fn test_small_images_are_not_enlarged() {
        let out = render(sample(100, 40, ImageOutputFormat::Png)).unwrap();

        assert_eq!(dimensions(&out.medium), (100, 40));
        assert_eq!(dimensions(&out.small), (100, 40));
    }

    #[test]
    fn test_non_image_is_rejected() {
        let result = render(Bytes::from_static(b"definitely not an image"));

        assert!(matches!(result, Err(RenditionError::Decode(_))));
    }

    #[tokio::test]
    async fn test_render_blocking() {
        let out = render_blocking(sample(640, 480, ImageOutputFormat::Png))
            .await
            .unwrap();

        assert_eq!(dimensions(&out.medium), (600, 450));
    }
}
