use crate::color::{
    color_distance, denormalize_color, normalize_color, Color, ForegroundColorSpec,
    NormalizedColor, MAX_RGB_DISTANCE,
};
use crate::error::{Error, Result};
use crate::unmix::{unmix_free, vec3};
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Fixed PRNG seed so deduction is reproducible across runs
const KMEANS_SEED: u64 = 0x62_67_6f_6e_65;

/// Lloyd iteration cap; clustering stops earlier at a fixed point
const MAX_KMEANS_ITERATIONS: usize = 32;

/// Deduce unknown foreground colors from an image.
///
/// Every unique color that is not within the closeness threshold of the
/// background is lifted to the pure foreground that would produce it at its
/// natural alpha (the free solve). Those candidate foregrounds are clustered
/// with k-means (one cluster per `Auto` slot) and the slots are filled with
/// the cluster centroids, most populous cluster first.
///
/// Candidates close to a caller-provided color are dropped beforehand, so a
/// known color is never deduced a second time.
pub fn deduce_unknown_colors(
    image: &RgbaImage,
    specs: &[ForegroundColorSpec],
    background: Color,
    threshold: f32,
) -> Result<Vec<Color>> {
    let auto_count = specs
        .iter()
        .filter(|spec| matches!(spec, ForegroundColorSpec::Auto))
        .count();

    if auto_count == 0 {
        return Ok(specs
            .iter()
            .filter_map(|spec| match spec {
                ForegroundColorSpec::Known(color) => Some(*color),
                ForegroundColorSpec::Auto => None,
            })
            .collect());
    }

    let known: Vec<NormalizedColor> = specs
        .iter()
        .filter_map(|spec| match spec {
            ForegroundColorSpec::Known(color) => Some(normalize_color(*color)),
            ForegroundColorSpec::Auto => None,
        })
        .collect();

    let candidates = collect_candidate_foregrounds(image, background, threshold, &known);
    if candidates.len() < auto_count {
        return Err(Error::InsufficientColors {
            requested: auto_count,
            found: candidates.len(),
        });
    }

    let deduced = cluster_candidates(&candidates, auto_count)?;

    // Fill Auto slots in order, preserving the caller's slot layout
    let mut next_deduced = deduced.into_iter();
    let mut resolved = Vec::with_capacity(specs.len());
    for spec in specs {
        match spec {
            ForegroundColorSpec::Known(color) => resolved.push(*color),
            ForegroundColorSpec::Auto => {
                // auto_count deduced colors exist by construction
                if let Some(color) = next_deduced.next() {
                    resolved.push(color);
                }
            }
        }
    }
    Ok(resolved)
}

/// Lift each unique non-background color to its implied pure foreground.
///
/// Candidates are kept in first-seen scan order and deduplicated, which makes
/// the downstream clustering deterministic.
fn collect_candidate_foregrounds(
    image: &RgbaImage,
    background: Color,
    threshold: f32,
    known: &[NormalizedColor],
) -> Vec<NormalizedColor> {
    let background_norm = normalize_color(background);
    let threshold_distance = threshold * MAX_RGB_DISTANCE;

    let mut seen_colors: HashSet<Color> = HashSet::new();
    let mut seen_points: HashSet<[u32; 3]> = HashSet::new();
    let mut candidates = Vec::new();

    for pixel in image.pixels() {
        let color = [pixel[0], pixel[1], pixel[2]];
        if !seen_colors.insert(color) {
            continue;
        }

        let color_norm = normalize_color(color);
        if color_distance(color_norm, background_norm) <= threshold_distance {
            continue;
        }

        // The free solve yields the foreground this color would be at its
        // natural alpha, always inside the RGB cube
        let (effective, alpha) = unmix_free(vec3(color_norm), vec3(background_norm));
        if alpha <= 0.0 {
            continue;
        }
        let point = [effective[0], effective[1], effective[2]];

        if known
            .iter()
            .any(|&k| color_distance(point, k) <= threshold_distance)
        {
            continue;
        }

        if seen_points.insert(point.map(f32::to_bits)) {
            candidates.push(point);
        }
    }

    candidates
}

/// k-means over the candidate foregrounds: k-means++ seeding from a fixed
/// RNG, Lloyd iteration to a fixed point. Returns the centroids snapped to
/// 8-bit RGB, ordered by descending cluster population.
fn cluster_candidates(candidates: &[NormalizedColor], k: usize) -> Result<Vec<Color>> {
    let mut rng = StdRng::seed_from_u64(KMEANS_SEED);

    // k-means++: each new centroid is picked with probability proportional
    // to its squared distance from the nearest existing centroid
    let mut centroids: Vec<NormalizedColor> = Vec::with_capacity(k);
    centroids.push(candidates[rng.gen_range(0..candidates.len())]);
    while centroids.len() < k {
        let distances: Vec<f32> = candidates
            .iter()
            .map(|&point| {
                centroids
                    .iter()
                    .map(|&c| squared_distance(point, c))
                    .fold(f32::INFINITY, f32::min)
            })
            .collect();
        let total: f32 = distances.iter().sum();
        if total <= 0.0 {
            return Err(Error::InsufficientColors {
                requested: k,
                found: centroids.len(),
            });
        }

        let mut target = rng.gen::<f32>() * total;
        let mut chosen = distances
            .iter()
            .rposition(|&d| d > 0.0)
            .unwrap_or(candidates.len() - 1);
        for (i, &d) in distances.iter().enumerate() {
            if target < d {
                chosen = i;
                break;
            }
            target -= d;
        }
        centroids.push(candidates[chosen]);
    }

    let mut assignments = vec![0usize; candidates.len()];
    for _ in 0..MAX_KMEANS_ITERATIONS {
        let mut changed = false;
        for (i, &point) in candidates.iter().enumerate() {
            let mut best = 0;
            let mut best_distance = f32::INFINITY;
            for (j, &centroid) in centroids.iter().enumerate() {
                let d = squared_distance(point, centroid);
                if d < best_distance {
                    best_distance = d;
                    best = j;
                }
            }
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![[0.0f32; 3]; k];
        let mut counts = vec![0usize; k];
        for (i, &point) in candidates.iter().enumerate() {
            let j = assignments[i];
            counts[j] += 1;
            for channel in 0..3 {
                sums[j][channel] += point[channel];
            }
        }
        for j in 0..k {
            if counts[j] > 0 {
                for channel in 0..3 {
                    centroids[j][channel] = sums[j][channel] / counts[j] as f32;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let mut populations = vec![0usize; k];
    for &j in &assignments {
        populations[j] += 1;
    }
    let found = populations.iter().filter(|&&count| count > 0).count();
    if found < k {
        return Err(Error::InsufficientColors {
            requested: k,
            found,
        });
    }

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by_key(|&j| std::cmp::Reverse(populations[j]));

    Ok(order
        .into_iter()
        .map(|j| denormalize_color(centroids[j]))
        .collect())
}

fn squared_distance(a: NormalizedColor, b: NormalizedColor) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}
