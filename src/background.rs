use crate::color::Color;
use crate::error::{Error, Result};
use image::RgbaImage;
use std::collections::HashMap;

/// Detect the background color by scanning the image borders.
///
/// Every pixel on the four borders (top row, bottom row, left and right
/// columns) is counted by its exact RGB triple; the most frequent triple
/// wins. Ties go to the triple seen first in scan order (top to bottom,
/// left to right within a row). Borders are the strongest prior for a solid
/// background and the scan is O(perimeter).
pub fn detect_background_color(image: &RgbaImage) -> Result<Color> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage);
    }

    // (count, index of first occurrence) per color
    let mut color_counts: HashMap<Color, (u32, u32)> = HashMap::new();
    let mut order = 0u32;
    let mut tally = |x: u32, y: u32| {
        let pixel = image.get_pixel(x, y);
        let color = [pixel[0], pixel[1], pixel[2]];
        let entry = color_counts.entry(color).or_insert((0, order));
        entry.0 += 1;
        order += 1;
    };

    for x in 0..width {
        tally(x, 0);
    }
    for y in 1..height.saturating_sub(1) {
        tally(0, y);
        if width > 1 {
            tally(width - 1, y);
        }
    }
    if height > 1 {
        for x in 0..width {
            tally(x, height - 1);
        }
    }

    let (color, _) = color_counts
        .into_iter()
        .max_by_key(|&(_, (count, first))| (count, std::cmp::Reverse(first)))
        .ok_or(Error::EmptyImage)?;
    Ok(color)
}
