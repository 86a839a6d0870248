//! Icon raster normalization
//!
//! Decodes a fetched icon and produces a uniform 16-bit-per-channel RGBA
//! raster with near-white and near-transparent pixels knocked out, so that
//! downstream UIs can composite site emblems on any background. The result is
//! re-encoded as PNG. No resizing or colour-space conversion happens here.

use std::io::Cursor;

use image::codecs::ico::IcoDecoder;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};

use crate::errors::AppResult;
use crate::sniff::IconKind;

type Rgba16Image = ImageBuffer<Rgba<u16>, Vec<u16>>;

/// A normalized icon raster. `filled` records whether any non-transparent
/// pixel survived the mask; it travels as object metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    image: Rgba16Image,
    pub filled: bool,
}

impl NormalizedImage {
    /// Re-encode as PNG.
    pub fn encode_png(&self) -> AppResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Decode `bytes` as `kind` and apply the transparency mask.
///
/// ICO goes through the dedicated ICO decoder; every other kind goes through
/// the format-generic decoder registry. Animated inputs yield their first
/// frame.
pub fn normalize(kind: IconKind, bytes: &[u8]) -> AppResult<NormalizedImage> {
    let decoded = match kind {
        IconKind::Ico => {
            let decoder = IcoDecoder::new(Cursor::new(bytes))?;
            DynamicImage::from_decoder(decoder)?
        }
        _ => image::load_from_memory(bytes)?,
    };

    Ok(patch(&decoded))
}

/// Whiteish: luminance of the 8-bit channels at or above 95 on the 0..100
/// scale.
fn is_whiteish(r: u8, g: u8, b: u8) -> bool {
    let luminance = 0.2126 * f64::from(r) + 0.7152 * f64::from(g) + 0.0722 * f64::from(b);
    (luminance / 255.0) * 100.0 >= 95.0
}

/// Per-pixel transform over the full bounds. Channels are read in 16-bit
/// precision, the whiteish/transparent decision is made on the 8-bit
/// downscale, and survivors are widened back to 16 bits.
fn patch(icon: &DynamicImage) -> NormalizedImage {
    let rgba = icon.to_rgba16();
    let (width, height) = rgba.dimensions();
    let mut out = Rgba16Image::new(width, height);
    let mut filled = false;

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let (r8, g8, b8, a8) = ((r >> 8) as u8, (g >> 8) as u8, (b >> 8) as u8, (a >> 8) as u8);

        if is_whiteish(r8, g8, b8) || a8 <= 5 {
            out.put_pixel(x, y, Rgba([u16::MAX, u16::MAX, u16::MAX, 0]));
        } else {
            filled = true;
            out.put_pixel(
                x,
                y,
                Rgba([
                    u16::from(r8) * 257,
                    u16::from(g8) * 257,
                    u16::from(b8) * 257,
                    u16::from(a8) * 257,
                ]),
            );
        }
    }

    NormalizedImage { image: out, filled }
}
