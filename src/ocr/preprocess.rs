use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbaImage};

/// Converts image to binary by keeping only bright pixels.
///
/// Pixels where R > threshold AND G > threshold AND B > threshold become black (text).
/// All other pixels become white (background).
///
/// The game draws banner and counter text in near-white over dark panels, so
/// this strips the panel art Tesseract would otherwise read as glyphs.
pub fn threshold_bright_pixels(img: &RgbaImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] > threshold && pixel[1] > threshold && pixel[2] > threshold {
            0u8
        } else {
            255u8
        };

        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Prepares a captured region for recognition: threshold, then upscale.
///
/// Regions like the turn counter are only ~10px tall, well under the glyph
/// height Tesseract is trained on.
pub fn prepare_for_ocr(img: &RgbaImage, threshold: u8, scale: u32) -> GrayImage {
    let binary = threshold_bright_pixels(img, threshold);
    let scale = scale.max(1);
    if scale == 1 || binary.width() == 0 || binary.height() == 0 {
        return binary;
    }
    imageops::resize(
        &binary,
        binary.width() * scale,
        binary.height() * scale,
        FilterType::Nearest,
    )
}
