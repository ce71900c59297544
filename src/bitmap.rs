use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::png::PngEncoder;
use image::error::{ImageError, ImageResult, ParameterError, ParameterErrorKind};
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, ColorType, Frame, ImageEncoder, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode an RGB bitmap as the PNG payload of a still frame
pub fn encode_png(image: &RgbImage) -> ImageResult<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(png)
}

/// Horizontal band `index` of a vertically stacked canvas
pub fn crop_band(image: &RgbImage, index: u32, band_height: u32) -> RgbImage {
    imageops::crop_imm(image, 0, index * band_height, image.width(), band_height).to_image()
}

/// Scale an image to exactly `width`x`height`, leaving matching images untouched
pub fn fit(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    debug!("Resizing {}x{} image to {}x{}", image.width(), image.height(), width, height);
    imageops::resize(&image, width, height, FilterType::Lanczos3)
}

/// Re-encode a GIF so every frame matches the panel and at most `max_frames` remain.
///
/// Frame delays are kept; the result loops forever.
pub fn prepare_animation(
    data: &[u8],
    width: u32,
    height: u32,
    max_frames: usize,
) -> ImageResult<Vec<u8>> {
    let decoder = GifDecoder::new(Cursor::new(data))?;

    let mut frames = Vec::new();
    for frame in decoder.into_frames().take(max_frames.max(1)) {
        let frame = frame?;
        let delay = frame.delay();
        let buffer = frame.into_buffer();
        let buffer = if buffer.dimensions() == (width, height) {
            buffer
        } else {
            imageops::resize(&buffer, width, height, FilterType::Lanczos3)
        };
        frames.push(Frame::from_parts(buffer, 0, 0, delay));
    }

    if frames.is_empty() {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::NoMoreData,
        )));
    }

    debug!(frames = frames.len(), "Normalised animation to {}x{}", width, height);

    let mut gif = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut gif);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames)?;
    }
    Ok(gif)
}
