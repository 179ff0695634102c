#![allow(dead_code)]

use bgone::Color;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Encode an image to PNG bytes for feeding into the library
pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes.into_inner()
}

pub fn save_png(path: &Path, image: &RgbaImage) {
    image.save(path).expect("Failed to save test image");
}

pub fn solid_image(width: u32, height: u32, color: Color) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([color[0], color[1], color[2], 255]))
}

/// A centered square of `foreground` on a solid `background`
pub fn square_image(size: u32, foreground: Color, background: Color) -> RgbaImage {
    let mut img = solid_image(size, size, background);
    for y in size / 4..size * 3 / 4 {
        for x in size / 4..size * 3 / 4 {
            img.put_pixel(x, y, Rgba([foreground[0], foreground[1], foreground[2], 255]));
        }
    }
    img
}

/// A radial gradient of `foreground` alpha-blended onto `background`,
/// simulating an anti-aliased shape that fades out toward the edges
pub fn circle_gradient_image(size: u32, foreground: Color, background: Color) -> RgbaImage {
    let center = size as f32 / 2.0;
    let radius = size as f32 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        let distance = (dx * dx + dy * dy).sqrt();
        let alpha = (1.0 - distance / radius).max(0.0);
        let blend = |fg: u8, bg: u8| {
            (alpha * fg as f32 + (1.0 - alpha) * bg as f32).round() as u8
        };
        Rgba([
            blend(foreground[0], background[0]),
            blend(foreground[1], background[1]),
            blend(foreground[2], background[2]),
            255,
        ])
    })
}

/// Two solid color patches side by side on a solid background
pub fn two_patch_image(left: Color, right: Color, background: Color) -> RgbaImage {
    let mut img = solid_image(60, 30, background);
    for y in 8..22 {
        for x in 4..28 {
            img.put_pixel(x, y, Rgba([left[0], left[1], left[2], 255]));
        }
        for x in 32..56 {
            img.put_pixel(x, y, Rgba([right[0], right[1], right[2], 255]));
        }
    }
    img
}

/// Overlay an image with alpha channel onto a solid background color
pub fn overlay_on_background(foreground: &RgbaImage, background: Color) -> RgbaImage {
    let (width, height) = foreground.dimensions();
    let mut result = RgbaImage::new(width, height);

    for (x, y, result_pixel) in result.enumerate_pixels_mut() {
        let pixel = foreground.get_pixel(x, y);
        let rgb = bgone::composite_over_background(pixel.0, background);
        *result_pixel = Rgba([rgb[0], rgb[1], rgb[2], 255]);
    }

    result
}

/// Mean squared error over the RGB channels of two same-sized images
pub fn calculate_mse(a: &RgbaImage, b: &RgbaImage) -> f64 {
    assert_eq!(a.dimensions(), b.dimensions(), "Images must have same dimensions");

    let mut sum_squared_diff = 0.0;
    let mut channel_count = 0u64;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        for i in 0..3 {
            let diff = pa[i] as f64 - pb[i] as f64;
            sum_squared_diff += diff * diff;
            channel_count += 1;
        }
    }
    sum_squared_diff / channel_count as f64
}

/// Peak signal-to-noise ratio in decibels (higher is better)
pub fn calculate_psnr(a: &RgbaImage, b: &RgbaImage) -> f64 {
    let mse = calculate_mse(a, b);
    if mse == 0.0 {
        return f64::INFINITY;
    }
    20.0 * (255.0 / mse.sqrt()).log10()
}

/// Similarity percentage based on normalized MSE (100% = identical)
pub fn calculate_similarity_percentage(a: &RgbaImage, b: &RgbaImage) -> f64 {
    let mse = calculate_mse(a, b);
    (1.0 - mse / (255.0 * 255.0)) * 100.0
}

/// Assert that compositing `output` back over `background` reproduces
/// `original` within one 8-bit step per channel
pub fn assert_reconstructs_exactly(output: &RgbaImage, original: &RgbaImage, background: Color) {
    let reconstructed = overlay_on_background(output, background);
    for (x, y, pixel) in original.enumerate_pixels() {
        let got = reconstructed.get_pixel(x, y);
        for i in 0..3 {
            assert!(
                (got[i] as i32 - pixel[i] as i32).abs() <= 1,
                "pixel ({}, {}) channel {}: reconstructed {} vs original {}",
                x,
                y,
                i,
                got[i],
                pixel[i]
            );
        }
    }
}
