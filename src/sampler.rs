//! Dominant color extraction.
//!
//! Steps performed by [`extract_dominant_color`]:
//! 1. Crop the grid to its center region (`crop_fraction` per axis).
//! 2. Drop background/highlight pixels whose mean channel value reaches
//!    `brightness_threshold`. If nothing survives, cluster everything and
//!    raise `filtered_to_empty`.
//! 3. Run seeded k-means in RGB space.
//! 4. Report the centroid of the most populous cluster as `#rrggbb`.

use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::grid::PixelGrid;

/// Squared centroid shift below which a centroid counts as stationary.
const CONVERGENCE_TOLERANCE_SQ: f64 = 1e-12;

/// Tunables for one extraction call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    /// Fraction in (0, 1] of rows and of columns kept around the center.
    pub crop_fraction: f64,
    /// Pixels whose channel mean is at or above this are background.
    pub brightness_threshold: u8,
    /// Requested number of k-means clusters.
    pub cluster_count: usize,
    /// Upper bound on refinement passes.
    pub max_iterations: u32,
    /// Seed for centroid initialization.
    pub seed: u64,
}

impl SamplerParams {
    /// Whole product photos: wide crop, lenient threshold, more clusters.
    pub const GENERAL_PRODUCT: SamplerParams = SamplerParams {
        crop_fraction: 0.5,
        brightness_threshold: 230,
        cluster_count: 5,
        max_iterations: 10,
        seed: 42,
    };

    /// Garment shot filling the middle of the frame.
    pub const GARMENT_SWATCH: SamplerParams = SamplerParams {
        crop_fraction: 0.3,
        brightness_threshold: 240,
        cluster_count: 3,
        max_iterations: 10,
        seed: 42,
    };

    pub fn validate(&self) -> Result<()> {
        if !(self.crop_fraction > 0.0 && self.crop_fraction <= 1.0) {
            return Err(ExtractError::invalid_parameter(
                "crop_fraction",
                self.crop_fraction,
            ));
        }
        if self.cluster_count == 0 {
            return Err(ExtractError::invalid_parameter("cluster_count", 0));
        }
        if self.max_iterations == 0 {
            return Err(ExtractError::invalid_parameter("max_iterations", 0));
        }
        Ok(())
    }
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self::GENERAL_PRODUCT
    }
}

/// Named parameter presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    General,
    Swatch,
}

impl Profile {
    pub fn params(self) -> SamplerParams {
        match self {
            Profile::General => SamplerParams::GENERAL_PRODUCT,
            Profile::Swatch => SamplerParams::GARMENT_SWATCH,
        }
    }
}

impl FromStr for Profile {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "product" => Ok(Profile::General),
            "swatch" | "garment" => Ok(Profile::Swatch),
            other => Err(ExtractError::invalid_parameter("profile", other)),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::General => f.write_str("general"),
            Profile::Swatch => f.write_str("swatch"),
        }
    }
}

/// Outcome of a successful extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantColor {
    /// Lowercase `#rrggbb`.
    pub hex: String,
    pub rgb: [u8; 3],
    /// Every cropped pixel was at or above the brightness threshold, so the
    /// unfiltered crop was clustered instead.
    pub filtered_to_empty: bool,
    /// Size of the clustered working set.
    pub clustered_pixels: usize,
    /// Cluster count after clamping to the working set size.
    pub cluster_count: usize,
    /// Refinement passes actually run.
    pub iterations: u32,
}

/// Extract the dominant non-background color of `grid`.
///
/// Fails with [`ExtractError::InvalidImage`] on a zero-pixel grid and with
/// [`ExtractError::InvalidParameter`] on out-of-range tunables. Identical
/// inputs always produce identical output.
pub fn extract_dominant_color(grid: &PixelGrid, params: &SamplerParams) -> Result<DominantColor> {
    if grid.is_empty() {
        return Err(ExtractError::InvalidImage {
            width: grid.width(),
            height: grid.height(),
        });
    }
    params.validate()?;

    let cropped = grid.center_crop(params.crop_fraction);
    let (candidates, filtered_to_empty) =
        foreground_pixels(cropped.pixels(), params.brightness_threshold);

    let k = params.cluster_count.min(candidates.len());
    log::debug!(
        "clustering {} of {} cropped pixels into {k} clusters",
        candidates.len(),
        cropped.len()
    );

    let clusters = kmeans(&candidates, k, params.max_iterations, params.seed);
    let best = dominant_index(&clusters.counts);
    let rgb = quantize(clusters.centroids[best]);

    Ok(DominantColor {
        hex: to_hex(rgb),
        rgb: [rgb.red, rgb.green, rgb.blue],
        filtered_to_empty,
        clustered_pixels: candidates.len(),
        cluster_count: k,
        iterations: clusters.iterations,
    })
}

/// Unweighted mean of the three channels.
#[inline(always)]
pub fn brightness(pixel: Srgb<u8>) -> f32 {
    (pixel.red as u16 + pixel.green as u16 + pixel.blue as u16) as f32 / 3.0
}

/// Lowercase `#rrggbb` for a pixel.
pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

/// Pixels below the brightness threshold, or all of them (flagged) when the
/// threshold would remove everything.
fn foreground_pixels(pixels: &[Srgb<u8>], threshold: u8) -> (Vec<Srgb<u8>>, bool) {
    let limit = threshold as f32;
    let kept: Vec<Srgb<u8>> = pixels
        .iter()
        .copied()
        .filter(|&p| brightness(p) < limit)
        .collect();

    if kept.is_empty() {
        log::debug!("brightness threshold {threshold} removed every pixel");
        (pixels.to_vec(), true)
    } else {
        (kept, false)
    }
}

struct Clusters {
    centroids: Vec<[f64; 3]>,
    counts: Vec<usize>,
    iterations: u32,
}

/// Lloyd's k-means over `pixels` with centroids seeded from `k` distinct
/// pixels. `pixels` must be non-empty and `1 <= k <= pixels.len()`.
fn kmeans(pixels: &[Srgb<u8>], k: usize, max_iterations: u32, seed: u64) -> Clusters {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids: Vec<[f64; 3]> = index::sample(&mut rng, pixels.len(), k)
        .into_vec()
        .into_iter()
        .map(|i| point(pixels[i]))
        .collect();

    let mut counts = vec![0usize; k];
    let mut iterations = 0;

    while iterations < max_iterations {
        let mut sums = vec![[0.0f64; 3]; k];
        counts.fill(0);

        for &pixel in pixels {
            let p = point(pixel);
            let idx = nearest(&centroids, p);
            counts[idx] += 1;
            sums[idx][0] += p[0];
            sums[idx][1] += p[1];
            sums[idx][2] += p[2];
        }
        iterations += 1;

        let mut moved = false;
        for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            // An empty cluster keeps its previous position.
            if count == 0 {
                continue;
            }
            let n = count as f64;
            let next = [sum[0] / n, sum[1] / n, sum[2] / n];
            if distance_sq(*centroid, next) > CONVERGENCE_TOLERANCE_SQ {
                moved = true;
            }
            *centroid = next;
        }

        if !moved {
            break;
        }
    }

    log::debug!("k-means stopped after {iterations} of {max_iterations} passes");
    Clusters {
        centroids,
        counts,
        iterations,
    }
}

#[inline(always)]
fn point(pixel: Srgb<u8>) -> [f64; 3] {
    [pixel.red as f64, pixel.green as f64, pixel.blue as f64]
}

#[inline(always)]
fn distance_sq(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

/// Index of the closest centroid; ties go to the lower index.
fn nearest(centroids: &[[f64; 3]], p: [f64; 3]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for (idx, &c) in centroids.iter().enumerate() {
        let d = distance_sq(c, p);
        if d < best_dist {
            best_dist = d;
            best_idx = idx;
        }
    }
    best_idx
}

/// Largest cluster; ties go to the earliest-initialized one.
fn dominant_index(counts: &[usize]) -> usize {
    let mut best = 0;
    for (idx, &count) in counts.iter().enumerate().skip(1) {
        if count > counts[best] {
            best = idx;
        }
    }
    best
}

fn quantize(centroid: [f64; 3]) -> Srgb<u8> {
    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Srgb::new(channel(centroid[0]), channel(centroid[1]), channel(centroid[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE_250: Srgb<u8> = Srgb::new(250, 250, 250);
    const DARK_RED: Srgb<u8> = Srgb::new(150, 20, 10);

    fn full_frame(params: SamplerParams) -> SamplerParams {
        SamplerParams {
            crop_fraction: 1.0,
            ..params
        }
    }

    fn is_hex(s: &str) -> bool {
        s.len() == 7
            && s.starts_with('#')
            && s[1..].chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    /// 10x10 grid: first row dark red, the rest near-white.
    fn mostly_white() -> PixelGrid {
        PixelGrid::from_fn(10, 10, |_, y| if y == 0 { DARK_RED } else { WHITE_250 })
    }

    #[test]
    fn background_is_excluded() {
        let params = full_frame(SamplerParams::GARMENT_SWATCH);
        let result = extract_dominant_color(&mostly_white(), &params).unwrap();

        assert_eq!(result.hex, "#96140a");
        assert!(!result.filtered_to_empty);
        assert_eq!(result.clustered_pixels, 10);
    }

    #[test]
    fn all_bright_falls_back_to_unfiltered() {
        let grid = PixelGrid::from_fn(6, 6, |_, _| Srgb::new(255, 255, 255));
        let params = SamplerParams {
            brightness_threshold: 240,
            ..SamplerParams::GENERAL_PRODUCT
        };
        let result = extract_dominant_color(&grid, &params).unwrap();

        assert!(result.filtered_to_empty);
        assert_eq!(result.hex, "#ffffff");
        assert_eq!(result.clustered_pixels, 9);
    }

    #[test]
    fn threshold_is_inclusive() {
        // Brightness exactly 240 is background.
        let grid = PixelGrid::from_fn(2, 1, |x, _| {
            if x == 0 { Srgb::new(240, 240, 240) } else { Srgb::new(10, 200, 30) }
        });
        let params = SamplerParams {
            crop_fraction: 1.0,
            brightness_threshold: 240,
            cluster_count: 1,
            ..SamplerParams::default()
        };
        let result = extract_dominant_color(&grid, &params).unwrap();

        assert_eq!(result.hex, "#0ac81e");
        assert_eq!(result.clustered_pixels, 1);
    }

    #[test]
    fn majority_cluster_wins() {
        let blue = Srgb::new(20, 40, 200);
        let green = Srgb::new(30, 180, 40);
        let grid = PixelGrid::from_fn(10, 10, |x, _| if x < 7 { blue } else { green });
        let params = SamplerParams {
            crop_fraction: 1.0,
            cluster_count: 2,
            ..SamplerParams::default()
        };

        for seed in 0..8 {
            let result = extract_dominant_color(&grid, &SamplerParams { seed, ..params }).unwrap();
            assert_eq!(result.hex, "#1428c8", "seed {seed}");
        }
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let grid = PixelGrid::from_fn(32, 24, |x, y| {
            Srgb::new((x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 5 % 256) as u8)
        });
        let params = SamplerParams::GENERAL_PRODUCT;

        let first = extract_dominant_color(&grid, &params).unwrap();
        for _ in 0..5 {
            assert_eq!(extract_dominant_color(&grid, &params).unwrap(), first);
        }
        assert!(is_hex(&first.hex));
    }

    #[test]
    fn cluster_count_clamped_to_candidates() {
        let grid = PixelGrid::from_fn(2, 1, |x, _| {
            if x == 0 { Srgb::new(10, 10, 10) } else { Srgb::new(90, 90, 90) }
        });
        let params = SamplerParams {
            crop_fraction: 1.0,
            cluster_count: 5,
            ..SamplerParams::default()
        };
        let result = extract_dominant_color(&grid, &params).unwrap();

        assert_eq!(result.cluster_count, 2);
        assert!(is_hex(&result.hex));
    }

    #[test]
    fn duplicate_colors_do_not_break_clustering() {
        // Fewer distinct colors than clusters.
        let grid = PixelGrid::from_fn(4, 4, |_, _| Srgb::new(1, 2, 3));
        let params = SamplerParams {
            crop_fraction: 1.0,
            cluster_count: 5,
            ..SamplerParams::default()
        };
        let result = extract_dominant_color(&grid, &params).unwrap();

        assert_eq!(result.hex, "#010203");
        assert_eq!(result.cluster_count, 5);
    }

    #[test]
    fn single_pixel_survives_small_crop() {
        let grid = PixelGrid::from_fn(1, 1, |_, _| Srgb::new(12, 34, 56));
        let params = SamplerParams {
            crop_fraction: 0.3,
            ..SamplerParams::default()
        };
        let result = extract_dominant_color(&grid, &params).unwrap();

        assert_eq!(result.hex, "#0c2238");
        assert_eq!(result.clustered_pixels, 1);
    }

    #[test]
    fn never_exceeds_max_iterations() {
        let grid = PixelGrid::from_fn(40, 40, |x, y| {
            Srgb::new((x * 6) as u8, (y * 6) as u8, ((x * y) % 200) as u8)
        });
        for max_iterations in [1, 2, 3, 10] {
            let params = SamplerParams {
                max_iterations,
                ..SamplerParams::GENERAL_PRODUCT
            };
            let result = extract_dominant_color(&grid, &params).unwrap();
            assert!(result.iterations >= 1);
            assert!(result.iterations <= max_iterations);
        }
    }

    #[test]
    fn full_seed_range_is_accepted() {
        let grid = mostly_white();
        for seed in [0, u32::MAX as u64 + 1, u64::MAX] {
            let params = SamplerParams {
                seed,
                ..full_frame(SamplerParams::GARMENT_SWATCH)
            };
            let result = extract_dominant_color(&grid, &params).unwrap();
            assert_eq!(result.hex, "#96140a", "seed {seed}");
        }
    }

    #[test]
    fn uniform_image_converges_in_one_pass() {
        let grid = PixelGrid::from_fn(8, 8, |_, _| Srgb::new(100, 50, 25));
        let result = extract_dominant_color(&grid, &SamplerParams::default()).unwrap();
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn empty_grid_is_rejected() {
        for (w, h) in [(0, 0), (0, 4), (4, 0)] {
            let grid = PixelGrid::new(w, h, Vec::new()).unwrap();
            let err = extract_dominant_color(&grid, &SamplerParams::default()).unwrap_err();
            assert!(matches!(err, ExtractError::InvalidImage { .. }));
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let grid = mostly_white();
        let bad = [
            SamplerParams { crop_fraction: 0.0, ..SamplerParams::default() },
            SamplerParams { crop_fraction: 1.5, ..SamplerParams::default() },
            SamplerParams { crop_fraction: f64::NAN, ..SamplerParams::default() },
            SamplerParams { cluster_count: 0, ..SamplerParams::default() },
            SamplerParams { max_iterations: 0, ..SamplerParams::default() },
        ];
        for params in bad {
            let err = extract_dominant_color(&grid, &params).unwrap_err();
            assert!(matches!(err, ExtractError::InvalidParameter { .. }), "{params:?}");
            assert!(!err.is_recoverable());
        }
    }

    #[test]
    fn counts_cover_every_pixel() {
        let pixels: Vec<Srgb<u8>> = (0..200u32)
            .map(|i| Srgb::new((i * 3 % 256) as u8, (i * 17 % 256) as u8, (i * 29 % 256) as u8))
            .collect();
        let clusters = kmeans(&pixels, 4, 10, 42);

        assert_eq!(clusters.counts.iter().sum::<usize>(), pixels.len());
        assert_eq!(clusters.centroids.len(), 4);
    }

    #[test]
    fn ties_pick_earliest_cluster() {
        assert_eq!(dominant_index(&[3, 5, 5]), 1);
        assert_eq!(dominant_index(&[4, 4, 4]), 0);
        assert_eq!(dominant_index(&[1, 2, 9]), 2);
    }

    #[test]
    fn nearest_prefers_lower_index_on_equal_distance() {
        let centroids = [[10.0, 0.0, 0.0], [10.0, 0.0, 0.0]];
        assert_eq!(nearest(&centroids, [0.0, 0.0, 0.0]), 0);
    }

    #[test]
    fn quantize_rounds_and_clamps() {
        assert_eq!(quantize([-3.0, 255.6, 127.5]), Srgb::new(0, 255, 128));
        assert_eq!(quantize([0.49, 1.5, 254.4]), Srgb::new(0, 2, 254));
    }

    #[test]
    fn brightness_is_channel_mean() {
        assert_eq!(brightness(Srgb::new(30, 60, 90)), 60.0);
        assert_eq!(brightness(WHITE_250), 250.0);
    }

    #[test]
    fn filter_uses_brightness_boundary() {
        // Means of 239.67 and 240.0 against a threshold of 240.
        let just_below = Srgb::new(239, 240, 240);
        let at_threshold = Srgb::new(240, 240, 240);
        assert!(brightness(just_below) < 240.0);

        let (kept, flagged) = foreground_pixels(&[just_below, at_threshold], 240);
        assert_eq!(kept, vec![just_below]);
        assert!(!flagged);
    }

    #[test]
    fn profiles_parse_and_match_presets() {
        assert_eq!("swatch".parse::<Profile>().unwrap().params(), SamplerParams::GARMENT_SWATCH);
        assert_eq!("General".parse::<Profile>().unwrap(), Profile::General);
        assert!("poster".parse::<Profile>().is_err());
        assert_eq!(Profile::Swatch.to_string(), "swatch");
    }

    #[test]
    fn partial_params_json_layers_over_defaults() {
        let params: SamplerParams =
            serde_json::from_str(r#"{ "cluster_count": 3, "seed": 7 }"#).unwrap();

        assert_eq!(params.cluster_count, 3);
        assert_eq!(params.seed, 7);
        assert_eq!(params.crop_fraction, 0.5);
        assert_eq!(params.brightness_threshold, 230);
    }
}
