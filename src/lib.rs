pub mod background;
pub mod color;
pub mod deduce;
pub mod driver;
pub mod error;
pub mod trim;
pub mod unmix;

use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::background::detect_background_color;
use crate::deduce::deduce_unknown_colors;

pub use crate::color::{
    composite_over_background, format_hex_color, parse_foreground_spec, parse_hex_color, Color,
    ForegroundColorSpec, NormalizedColor,
};
pub use crate::error::{Error, Result};
pub use crate::unmix::{compute_unmix_result_color, unmix_color, UnmixResult};

/// Options for a background removal run.
///
/// `input` holds encoded image bytes in any format the decoder understands;
/// the output is always PNG. A missing `background` is detected from the
/// image borders, a missing `foreground` means every pixel is solved freely,
/// and `Auto` foreground entries are deduced from the image.
#[derive(Debug, Clone)]
pub struct Options {
    /// Encoded input image bytes
    pub input: Vec<u8>,
    /// Background color to remove; detected from the borders when None
    pub background: Option<Color>,
    /// Foreground basis colors; None removes the background without a palette
    pub foreground: Option<Vec<ForegroundColorSpec>>,
    /// Restrict every pixel to the declared/deduced foreground colors
    pub strict: bool,
    /// Color closeness threshold in [0, 1]; None uses the default
    pub threshold: Option<f32>,
    /// Crop fully transparent borders from the output
    pub trim: bool,
}

impl Options {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input,
            background: None,
            foreground: None,
            strict: false,
            threshold: None,
            trim: false,
        }
    }
}

/// The default color closeness threshold (5% of the maximum RGB distance)
pub fn default_threshold() -> f32 {
    unmix::DEFAULT_COLOR_CLOSENESS_THRESHOLD
}

/// Remove the background from an encoded image, returning PNG bytes.
pub fn process(options: &Options) -> Result<Vec<u8>> {
    let image = decode_image(&options.input)?;

    let background = match options.background {
        Some(color) => color,
        None => detect_background_color(&image)?,
    };
    let threshold = options
        .threshold
        .unwrap_or(unmix::DEFAULT_COLOR_CLOSENESS_THRESHOLD);
    let foreground = match &options.foreground {
        Some(specs) => deduce_unknown_colors(&image, specs, background, threshold)?,
        None => Vec::new(),
    };

    let output = driver::remove_background(&image, &foreground, background, options.strict, threshold);
    let output = if options.trim {
        trim::trim_transparent_border(&output)
    } else {
        output
    };

    encode_png(&output)
}

/// Async variant of [`process`].
///
/// The whole pipeline (decode, unmix, encode) runs on a blocking worker so
/// the calling scheduler is never stalled; the rayon pool underneath is
/// shared process-wide and reused across calls.
pub async fn process_async(options: Options) -> Result<Vec<u8>> {
    match tokio::task::spawn_blocking(move || process(&options)).await {
        Ok(result) => result,
        Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
    }
}

/// Detect the background color of an encoded image from its borders.
pub fn detect_background(input: &[u8]) -> Result<Color> {
    let image = decode_image(input)?;
    detect_background_color(&image)
}

/// Crop fully transparent borders from an encoded image, returning PNG bytes.
pub fn trim_image(input: &[u8]) -> Result<Vec<u8>> {
    let image = decode_image(input)?;
    encode_png(&trim::trim_transparent_border(&image))
}

fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes)
        .map_err(Error::DecodeFailed)?
        .to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::EmptyImage);
    }
    Ok(image)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(Error::EncodeFailed)?;
    Ok(bytes.into_inner())
}
