use palette::{FromColor, Hsv, Srgb};

use crate::util::envelope::RGB;

/// Converts HSV to an 8-bit color.
///
/// `hue` is in degrees and wraps; `saturation` and `value` are clamped to
/// 0..=1.
pub fn hsv_color(hue: f64, saturation: f64, value: f64) -> RGB {
    let hsv = Hsv::new(
        hue.rem_euclid(360.0) as f32,
        saturation.clamp(0.0, 1.0) as f32,
        value.clamp(0.0, 1.0) as f32,
    );
    let rgb: Srgb<u8> = Srgb::<f32>::from_color(hsv).into_format();
    RGB::new(rgb.red, rgb.green, rgb.blue)
}
