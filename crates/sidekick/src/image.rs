//! Turns an image inside the sandbox into a payload for a vision model.

use std::fs;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

use crate::sandbox::{Sandbox, SandboxError};

/// Quality used when re-encoding as JPEG.
pub const JPEG_QUALITY: u8 = 85;

/// MIME type of the prepared payload.
pub const MEDIA_TYPE: &str = "image/jpeg";

/// Errors raised by [`prepare`].
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The path could not be resolved or read.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    /// The file is not an image in a supported format.
    #[error("cannot decode image: {0}")]
    Decode(#[source] image::ImageError),
    /// Re-encoding failed.
    #[error("cannot encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Loads the image at `relative_path`, flattens it onto an opaque white
/// background, re-encodes it as JPEG and returns the base64 text.
pub fn prepare(
    sandbox: &Sandbox,
    relative_path: &str,
) -> Result<String, ImageError> {
    let path = sandbox.resolve(relative_path)?;
    let bytes = fs::read(&path).map_err(|err| SandboxError::Io {
        path: relative_path.to_owned(),
        source: err,
    })?;
    let image = image::load_from_memory(&bytes).map_err(ImageError::Decode)?;
    debug!(
        "decoded {relative_path}: {}x{} {:?}",
        image.width(),
        image.height(),
        image.color()
    );

    let jpeg = encode_jpeg(&flatten(&image)).map_err(ImageError::Encode)?;
    Ok(STANDARD.encode(jpeg))
}

fn flatten(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| {
            let c = u16::from(c) * u16::from(a)
                + 255 * (255 - u16::from(a));
            (c / 255) as u8
        };
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(
        &mut buf,
        JPEG_QUALITY,
    ))?;
    Ok(buf)
}
