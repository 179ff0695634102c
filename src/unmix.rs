use crate::color::{denormalize_color, normalize_color, Color};
use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector, Vector3};

/// Channel-wise comparison epsilon for the kernel (1/512, half an 8-bit step)
pub(crate) const EPSILON: f32 = 1.0 / 512.0;

/// Default threshold for color closeness in non-strict mode (0.05 = 5% of max RGB distance)
pub const DEFAULT_COLOR_CLOSENESS_THRESHOLD: f32 = 0.05;

/// Smallest alpha considered by the multi-basis search (below this the
/// effective color is numerically meaningless)
const ALPHA_FLOOR: f32 = 1.0 / 255.0;

/// Bisection stops once the alpha bracket is tighter than this
const ALPHA_PRECISION: f32 = 1.0 / 512.0;

/// Result of color unmixing: weights for each foreground color and overall alpha
///
/// Weights are non-negative and describe how much of each basis color makes
/// up the effective foreground before alpha is applied; their sum can exceed
/// 1 when the basis colors are not linearly independent.
#[derive(Debug, Clone)]
pub struct UnmixResult {
    /// Weight for each foreground color
    pub weights: Vec<f32>,
    /// Overall alpha value (0.0 = fully transparent, 1.0 = fully opaque)
    pub alpha: f32,
}

/// A kernel solve plus whether it reconstructs the observed color within epsilon.
/// Infeasible solves are never errors; the pixel driver picks a fallback.
#[derive(Debug, Clone)]
pub(crate) struct KernelSolve {
    pub result: UnmixResult,
    pub feasible: bool,
}

pub(crate) fn vec3(color: [f32; 3]) -> Vector3<f32> {
    Vector3::new(color[0], color[1], color[2])
}

/// Unmix an observed color into foreground components.
///
/// Given an observed color and known foreground/background colors, determines
/// how much of each foreground color contributed to the observed color and
/// how opaque the reconstructed foreground is. The basis must not be empty;
/// background removal without any foreground colors goes through the free
/// solve in the pixel driver instead.
pub fn unmix_color(
    observed: Color,
    foreground_colors: &[Color],
    background: Color,
) -> Result<UnmixResult> {
    if foreground_colors.is_empty() {
        return Err(Error::InsufficientColors {
            requested: 1,
            found: 0,
        });
    }

    let observed = vec3(normalize_color(observed));
    let background = vec3(normalize_color(background));
    let basis: Vec<Vector3<f32>> = foreground_colors
        .iter()
        .map(|&c| vec3(normalize_color(c)))
        .collect();

    let solve = match basis.len() {
        1 => unmix_single(observed, basis[0], background),
        _ => unmix_multi(observed, &basis, background),
    };
    Ok(solve.result)
}

/// Unmix against a single foreground color.
///
/// observed = alpha * fg + (1 - alpha) * bg per channel; alpha is solved on
/// the channel where |fg - bg| is largest, which keeps the division stable.
pub(crate) fn unmix_single(
    observed: Vector3<f32>,
    foreground: Vector3<f32>,
    background: Vector3<f32>,
) -> KernelSolve {
    let span = foreground - background;
    let mut k = 0;
    for i in 1..3 {
        if span[i].abs() > span[k].abs() {
            k = i;
        }
    }

    if span[k].abs() <= EPSILON {
        // Foreground indistinguishable from background; only the background
        // itself can be reconstructed
        let feasible = (observed - background).amax() <= EPSILON;
        return KernelSolve {
            result: UnmixResult {
                weights: vec![1.0],
                alpha: 0.0,
            },
            feasible,
        };
    }

    let alpha = ((observed[k] - background[k]) / span[k]).clamp(0.0, 1.0);
    let reconstructed = background + span * alpha;
    let feasible = (reconstructed - observed).amax() <= EPSILON;

    KernelSolve {
        result: UnmixResult {
            weights: vec![1.0],
            alpha,
        },
        feasible,
    }
}

/// Unmix against two or more foreground colors.
///
/// Finds the smallest alpha in [1/255, 1] whose implied effective foreground
/// E = bg + (observed - bg) / alpha stays inside the RGB cube and can be
/// written as a non-negative combination of the basis colors. Maximizing
/// transparency this way keeps anti-aliased edges soft instead of snapping
/// them to full opacity.
pub(crate) fn unmix_multi(
    observed: Vector3<f32>,
    basis: &[Vector3<f32>],
    background: Vector3<f32>,
) -> KernelSolve {
    let attempt = |alpha: f32| -> Option<Vec<f32>> {
        let effective = background + (observed - background) / alpha;
        for k in 0..3 {
            if effective[k] < -EPSILON || effective[k] > 1.0 + EPSILON {
                return None;
            }
        }
        let (weights, residual) = solve_nonnegative_weights(effective, basis);
        (residual <= EPSILON).then_some(weights)
    };

    // Full opacity infeasible means no exact decomposition exists at all
    let Some(mut best_weights) = attempt(1.0) else {
        let (weights, _) = solve_nonnegative_weights(observed, basis);
        return KernelSolve {
            result: UnmixResult {
                weights,
                alpha: 1.0,
            },
            feasible: false,
        };
    };

    let mut lo = ALPHA_FLOOR;
    let mut hi = 1.0f32;
    if let Some(weights) = attempt(lo) {
        return KernelSolve {
            result: UnmixResult {
                weights,
                alpha: lo,
            },
            feasible: true,
        };
    }
    while hi - lo > ALPHA_PRECISION {
        let mid = 0.5 * (lo + hi);
        match attempt(mid) {
            Some(weights) => {
                best_weights = weights;
                hi = mid;
            }
            None => lo = mid,
        }
    }

    KernelSolve {
        result: UnmixResult {
            weights: best_weights,
            alpha: hi,
        },
        feasible: true,
    }
}

/// Non-negative least squares by active-set enumeration.
///
/// Solves min ||A w - target|| with w >= 0, where A's columns are the basis
/// colors. Every subset of the basis is tried with an unconstrained least
/// squares (pseudo-inverse); subsets producing a negative weight are
/// rejected. With at most a handful of basis colors the 2^n enumeration is
/// cheaper than an iterative NNLS and has no convergence concerns.
fn solve_nonnegative_weights(target: Vector3<f32>, basis: &[Vector3<f32>]) -> (Vec<f32>, f32) {
    let n = basis.len();
    let target_vec = DVector::from_column_slice(target.as_slice());

    // Empty active set: the all-zero weights (target is black)
    let mut best_weights = vec![0.0f32; n];
    let mut best_residual = target.norm();

    for mask in 1u32..(1u32 << n) {
        let members: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();

        let mut columns = Vec::with_capacity(3 * members.len());
        for &i in &members {
            columns.extend_from_slice(basis[i].as_slice());
        }
        let a = DMatrix::from_column_slice(3, members.len(), &columns);

        let solution = match a.clone().pseudo_inverse(EPSILON) {
            Ok(inverse) => inverse * &target_vec,
            Err(_) => continue,
        };
        if solution.iter().any(|&w| w < -EPSILON) {
            continue;
        }

        let mut weights = vec![0.0f32; n];
        for (slot, &i) in members.iter().enumerate() {
            weights[i] = solution[slot].max(0.0);
        }

        let clamped = DVector::from_iterator(members.len(), members.iter().map(|&i| weights[i]));
        let residual = (&a * clamped - &target_vec).norm();
        if residual < best_residual {
            best_residual = residual;
            best_weights = weights;
        }
    }

    (best_weights, best_residual)
}

/// Free-foreground solve: no basis, the foreground color is unconstrained.
///
/// Picks the minimum alpha that keeps E = bg + (observed - bg) / alpha inside
/// the RGB cube. Per channel the limit is the headroom in the displacement's
/// direction (toward white it is 1 - bg, toward black it is bg), so the
/// binding channel lands exactly on a cube face and reconstruction is exact.
/// Returns (effective foreground, alpha); alpha is 0 when observed == bg.
pub(crate) fn unmix_free(observed: Vector3<f32>, background: Vector3<f32>) -> (Vector3<f32>, f32) {
    let mut alpha = 0.0f32;
    for k in 0..3 {
        let displacement = observed[k] - background[k];
        let ratio = if displacement > 0.0 {
            displacement / (1.0 - background[k])
        } else if displacement < 0.0 {
            -displacement / background[k]
        } else {
            0.0
        };
        alpha = alpha.max(ratio);
    }
    let alpha = alpha.min(1.0);

    if alpha <= 0.0 {
        return (Vector3::zeros(), 0.0);
    }

    let mut effective = background + (observed - background) / alpha;
    for k in 0..3 {
        effective[k] = effective[k].clamp(0.0, 1.0);
    }
    (effective, alpha)
}

/// Compute the output RGBA pixel from an unmix result.
///
/// The color channels come from the effective foreground (the weighted sum of
/// the basis colors, clamped to the RGB cube); the alpha channel is the
/// result's alpha. Weights are applied as-is, without renormalization.
pub fn compute_unmix_result_color(result: &UnmixResult, foreground_colors: &[Color]) -> [u8; 4] {
    let mut effective = [0.0f32; 3];
    for (i, &weight) in result.weights.iter().enumerate() {
        if let Some(&fg) = foreground_colors.get(i) {
            let fg = normalize_color(fg);
            for k in 0..3 {
                effective[k] += weight * fg[k];
            }
        }
    }
    for channel in &mut effective {
        *channel = channel.clamp(0.0, 1.0);
    }

    let rgb = denormalize_color(effective);
    let alpha = (result.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    [rgb[0], rgb[1], rgb[2], alpha]
}
