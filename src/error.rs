use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while removing a background.
///
/// The unmix kernel itself never fails; infeasible solves are handled by the
/// pixel driver's fallback policy, so only the surrounding stages (parsing,
/// codec work, color deduction) surface errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A hex color string could not be parsed
    #[error("invalid color '{0}' (expected 3 or 6 hex digits, e.g. f00 or ff0000)")]
    InvalidColor(String),

    /// The input bytes could not be decoded as an image
    #[error("failed to decode input image: {0}")]
    DecodeFailed(image::ImageError),

    /// The image has zero width or height
    #[error("image has no pixels (zero width or height)")]
    EmptyImage,

    /// Color deduction could not produce the requested number of colors
    #[error("cannot deduce {requested} foreground color(s): only {found} distinct candidate(s) in the image")]
    InsufficientColors { requested: usize, found: usize },

    /// The output image could not be encoded as PNG
    #[error("failed to encode output image: {0}")]
    EncodeFailed(image::ImageError),
}
