use crate::color::{color_distance, normalize_color, Color, MAX_RGB_DISTANCE};
use crate::unmix::{
    compute_unmix_result_color, unmix_free, unmix_multi, unmix_single, vec3, KernelSolve,
};
use image::RgbaImage;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Minimum slab height in rows; a slab is the unit of parallel dispatch
const MIN_SLAB_ROWS: u32 = 16;

/// Remove the background from a decoded image.
///
/// Every pixel is decomposed against `foreground_colors` (which may be empty)
/// and `background`, producing a straight-alpha RGBA buffer of the same
/// dimensions. Pixels are independent, so the work is split into row-aligned
/// slabs processed on the rayon pool; each slab writes its own region of the
/// output and the result is byte-identical regardless of worker count.
pub fn remove_background(
    image: &RgbaImage,
    foreground_colors: &[Color],
    background: Color,
    strict: bool,
    threshold: f32,
) -> RgbaImage {
    let (width, height) = image.dimensions();
    let basis: Vec<Vector3<f32>> = foreground_colors
        .iter()
        .map(|&c| vec3(normalize_color(c)))
        .collect();
    let background_norm = vec3(normalize_color(background));
    let threshold_distance = threshold * MAX_RGB_DISTANCE;

    let input = image.as_raw();
    let mut output = vec![0u8; input.len()];
    let slab_len = (MIN_SLAB_ROWS * width * 4).max(4) as usize;

    output
        .par_chunks_mut(slab_len)
        .zip(input.par_chunks(slab_len))
        .for_each(|(out_slab, in_slab)| {
            for (out_pixel, in_pixel) in out_slab.chunks_exact_mut(4).zip(in_slab.chunks_exact(4))
            {
                let observed = [in_pixel[0], in_pixel[1], in_pixel[2]];
                let result = unmix_pixel(
                    observed,
                    foreground_colors,
                    &basis,
                    background,
                    background_norm,
                    strict,
                    threshold_distance,
                );
                out_pixel.copy_from_slice(&result);
            }
        });

    // Length is 4 * width * height by construction
    RgbaImage::from_raw(width, height, output)
        .unwrap_or_else(|| RgbaImage::new(width, height))
}

/// Per-pixel policy: choose between the constrained solve, the strict-mode
/// fallback and the free solve.
fn unmix_pixel(
    observed: Color,
    foreground_colors: &[Color],
    basis: &[Vector3<f32>],
    background: Color,
    background_norm: Vector3<f32>,
    strict: bool,
    threshold_distance: f32,
) -> [u8; 4] {
    // Pixels that are exactly the background disappear entirely
    if observed == background {
        return [0, 0, 0, 0];
    }

    let observed_norm = vec3(normalize_color(observed));

    if basis.is_empty() {
        return free_pixel(observed_norm, background_norm);
    }

    let closest = foreground_colors
        .iter()
        .map(|&fg| color_distance(normalize_color(observed), normalize_color(fg)))
        .fold(f32::INFINITY, f32::min);

    if strict || closest <= threshold_distance {
        let solve = match basis.len() {
            1 => unmix_single(observed_norm, basis[0], background_norm),
            _ => unmix_multi(observed_norm, basis, background_norm),
        };
        if solve.feasible {
            return compute_unmix_result_color(&solve.result, foreground_colors);
        }
        if strict {
            return best_single_basis_pixel(observed_norm, foreground_colors, basis, background_norm);
        }
        // Non-strict: a near-basis pixel the basis cannot express keeps its
        // exact appearance through the free solve
        return free_pixel(observed_norm, background_norm);
    }

    // Non-strict and far from every basis color: glows, highlights and
    // out-of-palette colors survive as free foregrounds
    free_pixel(observed_norm, background_norm)
}

fn free_pixel(observed: Vector3<f32>, background: Vector3<f32>) -> [u8; 4] {
    let (effective, alpha) = unmix_free(observed, background);
    [
        (effective[0] * 255.0).round() as u8,
        (effective[1] * 255.0).round() as u8,
        (effective[2] * 255.0).round() as u8,
        (alpha * 255.0).round() as u8,
    ]
}

/// Strict-mode fallback when the joint solve cannot express the pixel:
/// each basis color is tried alone and the one whose reconstruction comes
/// closest to the observed color wins, at its clamped alpha.
fn best_single_basis_pixel(
    observed: Vector3<f32>,
    foreground_colors: &[Color],
    basis: &[Vector3<f32>],
    background: Vector3<f32>,
) -> [u8; 4] {
    let mut best_index = 0;
    let mut best_error = f32::INFINITY;
    let mut best_solve: Option<KernelSolve> = None;

    for (i, &fg) in basis.iter().enumerate() {
        let solve = unmix_single(observed, fg, background);
        let reconstructed = background + (fg - background) * solve.result.alpha;
        let error = (reconstructed - observed).norm();
        if error < best_error {
            best_error = error;
            best_index = i;
            best_solve = Some(solve);
        }
    }

    match best_solve {
        Some(solve) => {
            let fg = foreground_colors[best_index];
            let alpha = (solve.result.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
            [fg[0], fg[1], fg[2], alpha]
        }
        // Unreachable with a non-empty basis; emit transparency rather than panic
        None => [0, 0, 0, 0],
    }
}
