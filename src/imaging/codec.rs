//! Decoding sources and encoding finished pages.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, BMP, GIF, TIFF, WebP) | `image::ImageReader`, format guessed from content |
//! | Alpha flatten + luma | custom, onto white, ITU-R 601 weights |
//! | Encode → PNG (8-bit gray) | `image::codecs::png::PngEncoder` |
//! | Encode → BMP (1-bit) | custom writer; `image` only writes 8/24/32-bit BMP |

use super::raster::{Depth, RasterBuffer};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, ImageFormat, ImageReader, Luma};
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Input extensions paired with the decoder that handles them.
const SOURCE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("bmp", ImageFormat::Bmp),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SOURCE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Case-insensitive extension check against [`supported_input_extensions`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// File format of a finished page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    /// 8-bit grayscale PNG.
    Png,
    /// 1-bit palettized BMP.
    Bmp,
}

impl PageFormat {
    pub fn for_depth(depth: Depth) -> Self {
        match depth {
            Depth::Gray8 => PageFormat::Png,
            Depth::Mono1 => PageFormat::Bmp,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            PageFormat::Png => "png",
            PageFormat::Bmp => "bmp",
        }
    }
}

/// Decode a source image to 8-bit luma.
///
/// The format is guessed from the file content, not the extension. Alpha is
/// composited onto white before conversion.
pub fn decode_gray(path: &Path) -> Result<GrayImage, CodecError> {
    let decode_err = |message: String| CodecError::Decode {
        path: path.display().to_string(),
        message,
    };
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;

    let rgba = img.to_rgba8();
    Ok(GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Luma([flatten(luma601(r, g, b), a)])
    }))
}

fn luma601(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

/// Composite a gray sample with coverage `a` over white.
fn flatten(v: u8, a: u8) -> u8 {
    let (v, a) = (v as u32, a as u32);
    ((v * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Encode a raster in the format matching its depth.
pub fn encode_page(raster: &RasterBuffer, out: &mut impl Write) -> Result<(), CodecError> {
    match PageFormat::for_depth(raster.depth()) {
        PageFormat::Png => encode_png(raster, out),
        PageFormat::Bmp => encode_bmp1(raster, out),
    }
}

fn encode_png(raster: &RasterBuffer, out: &mut impl Write) -> Result<(), CodecError> {
    PngEncoder::new(out)
        .write_image(
            raster.as_bytes(),
            raster.width(),
            raster.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| CodecError::Encode(format!("PNG: {e}")))
}

const BMP_FILE_HEADER: u32 = 14;
const BMP_INFO_HEADER: u32 = 40;
const BMP_PALETTE: u32 = 2 * 4;
/// 72 DPI in pixels per metre.
const BMP_PPM: i32 = 2835;

/// Write a Mono1 raster as a bottom-up 1-bit BMP with a black/white palette.
///
/// Palette index 0 is black and 1 is white, so packed raster bits are copied
/// through unchanged. Rows are padded to 4 bytes.
fn encode_bmp1(raster: &RasterBuffer, out: &mut impl Write) -> Result<(), CodecError> {
    let width = raster.width();
    let height = raster.height();
    let src_stride = raster.row_stride();
    let row_size = width.div_ceil(32) * 4;
    let image_size = row_size * height;
    let offset = BMP_FILE_HEADER + BMP_INFO_HEADER + BMP_PALETTE;

    let mut buf = Vec::with_capacity((offset + image_size) as usize);
    // File header
    buf.extend_from_slice(b"BM");
    buf.extend_from_slice(&(offset + image_size).to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&offset.to_le_bytes());
    // BITMAPINFOHEADER
    buf.extend_from_slice(&BMP_INFO_HEADER.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&image_size.to_le_bytes());
    buf.extend_from_slice(&BMP_PPM.to_le_bytes());
    buf.extend_from_slice(&BMP_PPM.to_le_bytes());
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    // Palette (BGRA)
    buf.extend_from_slice(&[0, 0, 0, 0, 255, 255, 255, 0]);

    let padding = vec![0u8; row_size as usize - src_stride];
    for row in raster.as_bytes().chunks_exact(src_stride).rev() {
        buf.extend_from_slice(row);
        buf.extend_from_slice(&padding);
    }

    out.write_all(&buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn supported_extensions_cover_source_formats() {
        let exts = supported_input_extensions();
        for expected in ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"] {
            assert!(
                exts.contains(&expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn supported_image_check_ignores_case() {
        assert!(is_supported_image(Path::new("PAGE01.JPG")));
        assert!(is_supported_image(Path::new("scan.Tiff")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    #[test]
    fn decode_flattens_alpha_onto_white() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("alpha.png");
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        img.save(&path).unwrap();

        let gray = decode_gray(&path).unwrap();
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn decode_guesses_format_from_content() {
        let tmp = TempDir::new().unwrap();
        let png = tmp.path().join("page.png");
        GrayImage::from_pixel(3, 2, Luma([90])).save(&png).unwrap();
        let misnamed = tmp.path().join("page.jpg");
        std::fs::rename(&png, &misnamed).unwrap();

        let gray = decode_gray(&misnamed).unwrap();
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.get_pixel(0, 0).0[0], 90);
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(matches!(
            decode_gray(&path),
            Err(CodecError::Decode { .. })
        ));
    }

    #[test]
    fn decode_missing_file_is_io_error() {
        assert!(matches!(
            decode_gray(Path::new("/nonexistent/page.png")),
            Err(CodecError::Io(_))
        ));
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    #[test]
    fn bmp1_layout_and_decode_back() {
        let samples: Vec<u8> = (0..10 * 3)
            .map(|i| if (i % 10 + i / 10) % 2 == 0 { 255 } else { 0 })
            .collect();
        let raster = RasterBuffer::from_raw(10, 3, Depth::Gray8, samples)
            .unwrap()
            .to_mono();

        let mut bytes = Vec::new();
        encode_page(&raster, &mut bytes).unwrap();

        // 62-byte header + 3 rows of 4 bytes
        assert_eq!(&bytes[..2], b"BM");
        assert_eq!(bytes.len(), 62 + 12);
        assert_eq!(u16::from_le_bytes([bytes[28], bytes[29]]), 1);

        let decoded = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (10, 3));
        for y in 0..3 {
            for x in 0..10 {
                assert_eq!(decoded.get_pixel(x, y).0[0], raster.sample(x, y), "({x},{y})");
            }
        }
    }

    #[test]
    fn png_gray_decodes_back() {
        let raster = RasterBuffer::from_raw(4, 2, Depth::Gray8, vec![0, 255, 0, 255, 255, 0, 255, 0])
            .unwrap();
        let mut bytes = Vec::new();
        encode_page(&raster, &mut bytes).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(matches!(decoded, image::DynamicImage::ImageLuma8(_)));
        assert_eq!(decoded.to_luma8().into_raw(), raster.as_bytes());
    }

    #[test]
    fn page_format_follows_depth() {
        assert_eq!(PageFormat::for_depth(Depth::Gray8).extension(), "png");
        assert_eq!(PageFormat::for_depth(Depth::Mono1).extension(), "bmp");
    }
}
