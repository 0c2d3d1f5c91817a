//! Grayscale conversion and contrast preprocessing.

use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::vision::RecognitionError;

/// ITU-R BT.601 luma, the weighting the game UI templates were captured with.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (width, height) = rgb.dimensions();
    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        out.put_pixel(x, y, Luma([luma(pixel[0], pixel[1], pixel[2])]));
    }
    out
}

/// Converts a captured region to grayscale.
///
/// Accepts 8-bit gray, RGB and RGBA captures. Zero-area regions and any other
/// pixel layout are rejected instead of being coerced.
pub fn region_to_gray(region: &DynamicImage) -> Result<GrayImage, RecognitionError> {
    let (width, height) = (region.width(), region.height());
    if width == 0 || height == 0 {
        return Err(RecognitionError::EmptyRegion { width, height });
    }

    match region {
        DynamicImage::ImageLuma8(gray) => Ok(gray.clone()),
        DynamicImage::ImageRgb8(rgb) => Ok(rgb_to_gray(rgb)),
        DynamicImage::ImageRgba8(rgba) => {
            let mut out = GrayImage::new(width, height);
            for (x, y, pixel) in rgba.enumerate_pixels() {
                out.put_pixel(x, y, Luma([luma(pixel[0], pixel[1], pixel[2])]));
            }
            Ok(out)
        }
        other => Err(RecognitionError::UnsupportedFormat(format!("{:?}", other.color()))),
    }
}

/// Converts any decoded template file to grayscale.
pub fn template_to_gray(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => rgb_to_gray(&other.to_rgb8()),
    }
}

/// Linearly maps `[lower, upper]` onto `[0, 255]`, clamping outside values.
pub fn linear_stretch(image: &mut GrayImage, lower: u8, upper: u8) {
    let span = (upper as f32 - lower as f32).max(1.0);
    for pixel in image.pixels_mut() {
        let v = (pixel[0] as f32 - lower as f32) / span * 255.0;
        pixel[0] = v.clamp(0.0, 255.0) as u8;
    }
}

/// A transform applied to regions (at classify time) or templates (at load time).
///
/// Always runs after grayscale conversion.
pub trait Preprocessor: Send + Sync {
    fn apply(&self, image: GrayImage) -> GrayImage;
}

/// Leaves the image untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Preprocessor for Identity {
    fn apply(&self, image: GrayImage) -> GrayImage {
        image
    }
}

/// Contrast stretch, see [`linear_stretch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearStretch {
    pub lower: u8,
    pub upper: u8,
}

impl LinearStretch {
    /// Preset for captured stat text regions.
    pub const TEXT_REGION: Self = Self { lower: 100, upper: 255 };
    /// Preset for rendered stat text templates.
    pub const TEXT_TEMPLATE: Self = Self { lower: 128, upper: 255 };
}

impl Preprocessor for LinearStretch {
    fn apply(&self, mut image: GrayImage) -> GrayImage {
        linear_stretch(&mut image, self.lower, self.upper);
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, LumaA, Rgba};

    #[test]
    fn test_region_to_gray_rgba() {
        let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([255, 0, 0, 255]));

        let gray = region_to_gray(&DynamicImage::ImageRgba8(img)).unwrap();

        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 76, "Pure red should map to BT.601 luma");
    }

    #[test]
    fn test_region_to_gray_rejects_empty() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 5));
        assert!(matches!(
            region_to_gray(&img),
            Err(RecognitionError::EmptyRegion { width: 0, height: 5 })
        ));
    }

    #[test]
    fn test_region_to_gray_rejects_other_layouts() {
        let img: ImageBuffer<LumaA<u8>, Vec<u8>> = ImageBuffer::new(4, 4);
        assert!(matches!(
            region_to_gray(&DynamicImage::ImageLumaA8(img)),
            Err(RecognitionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_linear_stretch() {
        let mut img = GrayImage::from_raw(4, 1, vec![50, 100, 177, 255]).unwrap();

        linear_stretch(&mut img, 100, 255);

        assert_eq!(img.get_pixel(0, 0)[0], 0, "Below lower bound clamps to black");
        assert_eq!(img.get_pixel(1, 0)[0], 0);
        assert_eq!(img.get_pixel(2, 0)[0], 126);
        assert_eq!(img.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn test_identity_preprocessor() {
        let img = GrayImage::from_raw(2, 1, vec![10, 20]).unwrap();
        assert_eq!(Identity.apply(img.clone()), img);
    }
}
