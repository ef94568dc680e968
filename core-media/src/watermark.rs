//! Watermark band rendering.
//!
//! Text is drawn with the 8x8 bitmap glyphs from `font8x8`, scaled up by an
//! integer factor derived from the image width so the band stays legible on
//! high resolution camera output.

use chrono::{DateTime, FixedOffset};
use font8x8::UnicodeFonts;
use image::{Rgb, RgbImage};

const GLYPH_SIZE: u32 = 8;
const BAND_COLOR: Rgb<u8> = Rgb([24, 24, 24]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const SHADOW_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Pixels of image width per glyph scale step.
const WIDTH_PER_SCALE: u32 = 320;
const MAX_SCALE: u32 = 8;

/// Lines stamped into a report photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkText {
    pub name: String,
    pub national_id: String,
    pub coordinates: String,
    pub timestamp: String,
}

impl WatermarkText {
    pub fn new(
        name: &str,
        national_id: &str,
        latitude: &str,
        longitude: &str,
        taken_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            name: name.to_string(),
            national_id: national_id.to_string(),
            coordinates: format!("{}, {}", latitude, longitude),
            timestamp: taken_at.format("%d-%m-%Y %H:%M:%S").to_string(),
        }
    }

    pub fn lines(&self) -> [&str; 4] {
        [
            self.name.as_str(),
            self.national_id.as_str(),
            self.coordinates.as_str(),
            self.timestamp.as_str(),
        ]
    }
}

/// Geometry of the band for a given image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BandLayout {
    pub scale: u32,
    pub margin: u32,
    pub line_gap: u32,
    pub top: u32,
}

impl BandLayout {
    pub(crate) fn for_image(width: u32, height: u32, line_count: u32) -> Self {
        let scale = (width / WIDTH_PER_SCALE).clamp(1, MAX_SCALE);
        let margin = GLYPH_SIZE * scale / 2;
        let line_gap = 2 * scale;
        let text_height = line_count * GLYPH_SIZE * scale + line_count.saturating_sub(1) * line_gap;
        let band_height = (text_height + 2 * margin).min(height);

        Self {
            scale,
            margin,
            line_gap,
            top: height - band_height,
        }
    }

    fn line_y(&self, index: u32) -> u32 {
        self.top + self.margin + index * (GLYPH_SIZE * self.scale + self.line_gap)
    }
}

/// Paints the dark band across the bottom of `img` and writes each line
/// left-aligned with a drop shadow.
pub fn apply_watermark(img: &mut RgbImage, text: &WatermarkText) {
    let lines = text.lines();
    let layout = BandLayout::for_image(img.width(), img.height(), lines.len() as u32);

    for y in layout.top..img.height() {
        for x in 0..img.width() {
            img.put_pixel(x, y, BAND_COLOR);
        }
    }

    for (index, line) in lines.iter().enumerate() {
        let y = layout.line_y(index as u32);
        let x = layout.margin;
        draw_text(img, line, x + layout.scale, y + layout.scale, layout.scale, SHADOW_COLOR);
        draw_text(img, line, x, y, layout.scale, TEXT_COLOR);
    }
}

fn draw_text(img: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    let advance = GLYPH_SIZE * scale;
    for (i, ch) in text.chars().enumerate() {
        let glyph_x = x.saturating_add(i as u32 * advance);
        if glyph_x >= img.width() {
            break;
        }
        let glyph = font8x8::BASIC_FONTS
            .get(ch)
            .or_else(|| font8x8::BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        draw_glyph(img, &glyph, glyph_x, y, scale, color);
    }
}

fn draw_glyph(img: &mut RgbImage, glyph: &[u8; 8], x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..GLYPH_SIZE {
            if bits & (1 << col) == 0 {
                continue;
            }
            let px = x + col * scale;
            let py = y + row as u32 * scale;
            fill_block(img, px, py, scale, color);
        }
    }
}

fn fill_block(img: &mut RgbImage, x: u32, y: u32, size: u32, color: Rgb<u8>) {
    let x_end = x.saturating_add(size).min(img.width());
    let y_end = y.saturating_add(size).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_text() -> WatermarkText {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let taken_at = offset.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap();
        WatermarkText::new("Siti Rahma", "3201010101010001", "-6.4817", "106.8540", taken_at)
    }

    #[test]
    fn test_watermark_lines() {
        let text = sample_text();
        assert_eq!(
            text.lines(),
            [
                "Siti Rahma",
                "3201010101010001",
                "-6.4817, 106.8540",
                "10-03-2024 06:30:00"
            ]
        );
    }

    #[test]
    fn test_layout_scales_with_width() {
        let small = BandLayout::for_image(320, 240, 4);
        let large = BandLayout::for_image(3200, 2400, 4);

        assert_eq!(small.scale, 1);
        assert_eq!(large.scale, 8);
        assert!(large.top < 2400);
        assert!(small.top < 240);
    }

    #[test]
    fn test_band_clamped_to_tiny_image() {
        let layout = BandLayout::for_image(16, 10, 4);
        assert_eq!(layout.top, 0);
    }

    #[test]
    fn test_apply_watermark_paints_band_and_text() {
        let mut img = RgbImage::from_pixel(640, 480, Rgb([250, 250, 250]));
        apply_watermark(&mut img, &sample_text());

        let layout = BandLayout::for_image(640, 480, 4);

        // Above the band is untouched
        assert_eq!(*img.get_pixel(10, 10), Rgb([250, 250, 250]));
        assert_eq!(*img.get_pixel(639, layout.top - 1), Rgb([250, 250, 250]));

        // Band corners are band colored
        assert_eq!(*img.get_pixel(639, 479), BAND_COLOR);
        assert_eq!(*img.get_pixel(0, layout.top), BAND_COLOR);

        // Some text and shadow pixels were drawn inside the band
        let mut text_pixels = 0;
        let mut shadow_pixels = 0;
        for y in layout.top..480 {
            for x in 0..640 {
                let pixel = *img.get_pixel(x, y);
                if pixel == TEXT_COLOR {
                    text_pixels += 1;
                } else if pixel == SHADOW_COLOR {
                    shadow_pixels += 1;
                }
            }
        }
        assert!(text_pixels > 100);
        assert!(shadow_pixels > 0);
    }

    #[test]
    fn test_unknown_glyph_does_not_panic() {
        let mut img = RgbImage::from_pixel(100, 60, Rgb([0, 128, 0]));
        let mut text = sample_text();
        text.name = "Désiré 测试".to_string();
        apply_watermark(&mut img, &text);
    }
}
