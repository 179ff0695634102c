use image::{imageops, RgbaImage};

/// Crop away fully transparent borders.
///
/// The result is the bounding box of all pixels with non-zero alpha; an image
/// with no such pixel collapses to a single transparent pixel. This runs on
/// the already-unmixed buffer, so "transparent" here means removed background.
pub fn trim_transparent_border(image: &RgbaImage) -> RgbaImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, x, y, y),
            Some((min_x, max_x, min_y, max_y)) => {
                (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
            }
        });
    }

    match bounds {
        Some((min_x, max_x, min_y, max_y)) => imageops::crop_imm(
            image,
            min_x,
            min_y,
            max_x - min_x + 1,
            max_y - min_y + 1,
        )
        .to_image(),
        None => RgbaImage::new(1, 1),
    }
}
