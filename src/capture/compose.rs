use std::io::Cursor;

use anyhow::{bail, Context, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{imageops, imageops::FilterType, DynamicImage, ImageFormat, Rgb, RgbImage};

/// Height of the dark band above each stacked part, which carries its label.
pub const SEPARATOR_HEIGHT: u32 = 30;
const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
/// 8x8 glyphs drawn at this multiple.
const LABEL_SCALE: u32 = 2;
const LABEL_LEFT: u32 = 10;

/// One image to place in a composed frame.
pub struct Part {
    pub label: String,
    pub png: Vec<u8>,
    pub scale: f32,
}

/// Stacks the parts top to bottom, left-aligned, each preceded by a band
/// holding its label, and encodes the result as PNG.
pub fn stack_vertically(parts: &[Part]) -> Result<Vec<u8>> {
    if parts.is_empty() {
        bail!("no images to compose");
    }

    let mut decoded = Vec::with_capacity(parts.len());
    for part in parts {
        let img = image::load_from_memory(&part.png)
            .with_context(|| format!("failed to decode {} image", part.label))?;
        decoded.push(scaled(img, part.scale));
    }

    let width = decoded.iter().map(|img| img.width()).max().unwrap_or(0);
    let height: u32 = decoded
        .iter()
        .map(|img| img.height() + SEPARATOR_HEIGHT)
        .sum();

    let mut canvas = RgbImage::from_pixel(width.max(1), height.max(1), BACKGROUND);
    let mut y = 0u32;
    for (part, img) in parts.iter().zip(&decoded) {
        draw_label(&mut canvas, &part.label, y);
        y += SEPARATOR_HEIGHT;
        imageops::overlay(&mut canvas, &img.to_rgb8(), 0, i64::from(y));
        y += img.height();
    }

    encode_png(&DynamicImage::ImageRgb8(canvas))
}

/// Writes `text` in the band starting at row `band_top`, clipped to the canvas.
fn draw_label(canvas: &mut RgbImage, text: &str, band_top: u32) {
    let glyph_size = 8 * LABEL_SCALE;
    let top = band_top + SEPARATOR_HEIGHT.saturating_sub(glyph_size) / 2;
    let mut left = LABEL_LEFT;

    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            left += glyph_size;
            continue;
        };
        for (row, &bits) in glyph.iter().enumerate() {
            for col in 0..8u32 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let px = left + col * LABEL_SCALE;
                let py = top + row as u32 * LABEL_SCALE;
                for dy in 0..LABEL_SCALE {
                    for dx in 0..LABEL_SCALE {
                        let (x, y) = (px + dx, py + dy);
                        if x < canvas.width() && y < canvas.height() {
                            canvas.put_pixel(x, y, LABEL_COLOR);
                        }
                    }
                }
            }
        }
        left += glyph_size;
    }
}

fn scaled(img: DynamicImage, scale: f32) -> DynamicImage {
    if !scale.is_finite() || scale <= 0.0 || (scale - 1.0).abs() < f32::EPSILON {
        return img;
    }
    let width = ((img.width() as f32) * scale).round().max(1.0) as u32;
    let height = ((img.height() as f32) * scale).round().max(1.0) as u32;
    img.resize_exact(width, height, FilterType::Lanczos3)
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
    encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
}
