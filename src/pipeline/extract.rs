use std::collections::HashMap;

use kmeans_colors::get_kmeans_hamerly;
use palette::Lab;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::color::Color;
use crate::config::{ClusterSpace, Config, MAX_CLUSTERS};
use crate::error::{Error, Result};

/// Centroid movement threshold for the Lab backend.
const LAB_CONVERGE: f32 = 0.5;

/// A palette color with the share of pixels its cluster holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Swatch {
    pub color: Color,
    pub weight: f32,
}

/// Representative colors of one image, most prominent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Palette {
    swatches: Vec<Swatch>,
}

impl Palette {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.swatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }

    pub fn swatches(&self) -> &[Swatch] {
        &self.swatches
    }

    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.swatches.iter().map(|s| s.color)
    }

    /// Build from per-cluster `(centroid, population)` pairs. Empty clusters
    /// are dropped and clusters that ended on the same color are merged.
    fn from_clusters(clusters: impl IntoIterator<Item = (Color, u64)>) -> Result<Self> {
        let mut merged: Vec<(Color, u64)> = Vec::new();
        for (color, population) in clusters {
            if population == 0 {
                continue;
            }
            match merged.iter_mut().find(|(c, _)| *c == color) {
                Some((_, total)) => *total += population,
                None => merged.push((color, population)),
            }
        }
        if merged.is_empty() {
            return Err(Error::Extraction("no cluster received any pixel".into()));
        }

        // stable: equal populations keep cluster order
        merged.sort_by(|a, b| b.1.cmp(&a.1));
        let total: u64 = merged.iter().map(|(_, n)| n).sum();
        let swatches = merged
            .into_iter()
            .map(|(color, n)| Swatch {
                color,
                weight: n as f32 / total as f32,
            })
            .collect();
        Ok(Self { swatches })
    }
}

/// Palette extraction settings, usually taken from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    pub clusters: usize,
    pub max_iterations: usize,
    pub space: ClusterSpace,
    pub seed: Option<u64>,
}

impl Extractor {
    pub fn new(clusters: usize, max_iterations: usize) -> Self {
        Self {
            clusters,
            max_iterations,
            space: ClusterSpace::Rgb,
            seed: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            clusters: config.clusters,
            max_iterations: config.max_iterations,
            space: config.space,
            seed: config.seed,
        }
    }

    /// Reduce `pixels` to at most `clusters` representative colors.
    pub fn extract(&self, pixels: &[Color]) -> Result<Palette> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        match self.space {
            ClusterSpace::Rgb => {
                extract_rgb(pixels, self.clusters, self.max_iterations, &mut rng)
                    .map(|c| c.palette)
            }
            ClusterSpace::Lab => {
                extract_lab(pixels, self.clusters, self.max_iterations, rng.gen())
            }
        }
    }
}

/// Result of a Lloyd run in RGB space.
#[derive(Debug, Clone)]
pub struct Clustering {
    pub palette: Palette,
    pub iterations: usize,
    /// Whether the run stopped because no pixel changed cluster.
    pub converged: bool,
}

/// k-means over RGB with squared Euclidean distance.
///
/// Centroids are seeded from distinct pixel colors, recomputed as the rounded
/// channel mean of their members, and iteration stops once an assignment pass
/// moves no pixel or `max_iterations` passes have run. Images with fewer than
/// `k` distinct colors yield one swatch per distinct color.
pub fn extract_rgb<R: Rng + ?Sized>(
    pixels: &[Color],
    k: usize,
    max_iterations: usize,
    rng: &mut R,
) -> Result<Clustering> {
    if k == 0 {
        return Err(Error::Config("cluster count must be at least 1".into()));
    }
    if pixels.is_empty() {
        return Err(Error::Config("image has no pixels".into()));
    }

    let max_iterations = max_iterations.max(1);

    // Identical pixels always share a cluster, so cluster the histogram.
    let distinct = histogram(pixels);
    let k = k.min(distinct.len());
    let mut centroids: Vec<Color> = rand::seq::index::sample(rng, distinct.len(), k)
        .into_iter()
        .map(|i| distinct[i].0)
        .collect();

    let mut assignment = vec![usize::MAX; distinct.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;

        let mut changed = false;
        for (slot, (color, _)) in assignment.iter_mut().zip(&distinct) {
            let nearest = nearest_centroid(&centroids, *color);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }

        let mut sums = vec![[0u64; 4]; k];
        for (&cluster, (color, count)) in assignment.iter().zip(&distinct) {
            let sum = &mut sums[cluster];
            sum[0] += color.r as u64 * count;
            sum[1] += color.g as u64 * count;
            sum[2] += color.b as u64 * count;
            sum[3] += count;
        }
        let mut empty = Vec::new();
        for (cluster, sum) in sums.iter().enumerate() {
            let n = sum[3];
            if n > 0 {
                let mean = |s: u64| ((s + n / 2) / n) as u8;
                centroids[cluster] = Color::new(mean(sum[0]), mean(sum[1]), mean(sum[2]));
            } else {
                empty.push(cluster);
            }
        }
        for cluster in empty {
            reseed(&mut centroids, cluster, &distinct, &assignment);
        }
    }

    let mut populations = vec![0u64; k];
    for (&cluster, (_, count)) in assignment.iter().zip(&distinct) {
        populations[cluster] += count;
    }

    tracing::debug!(k, iterations, converged, "rgb clustering finished");

    let palette = Palette::from_clusters(centroids.into_iter().zip(populations))?;
    Ok(Clustering {
        palette,
        iterations,
        converged,
    })
}

/// Hamerly k-means in CIELAB with K-means++ initialization.
pub fn extract_lab(pixels: &[Color], k: usize, max_iterations: usize, seed: u64) -> Result<Palette> {
    if k == 0 || k > MAX_CLUSTERS {
        return Err(Error::Config(format!(
            "cluster count must be within 1..={MAX_CLUSTERS}, got {k}"
        )));
    }
    if pixels.is_empty() {
        return Err(Error::Config("image has no pixels".into()));
    }

    let k = k.min(histogram(pixels).len());
    let labs: Vec<Lab> = pixels.iter().map(|c| c.to_lab()).collect();
    let result = get_kmeans_hamerly(k, max_iterations, LAB_CONVERGE, false, &labs, seed);

    let mut counts = vec![0u64; result.centroids.len()];
    for &idx in &result.indices {
        counts[idx as usize] += 1;
    }

    tracing::debug!(k, score = result.score, "lab clustering finished");

    Palette::from_clusters(
        result
            .centroids
            .iter()
            .zip(counts)
            .map(|(lab, n)| (Color::from_lab(*lab), n)),
    )
}

/// Distinct colors with their pixel counts, in channel order.
fn histogram(pixels: &[Color]) -> Vec<(Color, u64)> {
    let mut counts: HashMap<Color, u64> = HashMap::new();
    for &p in pixels {
        *counts.entry(p).or_default() += 1;
    }
    let mut distinct: Vec<(Color, u64)> = counts.into_iter().collect();
    distinct.sort_by_key(|(c, _)| (c.r, c.g, c.b));
    distinct
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest_centroid(centroids: &[Color], color: Color) -> usize {
    let mut best = 0;
    let mut best_dist = u32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = c.distance_sq(color);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

/// Move an empty cluster onto the color farthest from its current centroid,
/// skipping colors some centroid already sits on. Leaves the cluster alone
/// (to be dropped) when every distinct color is taken.
fn reseed(
    centroids: &mut [Color],
    empty: usize,
    distinct: &[(Color, u64)],
    assignment: &[usize],
) {
    let mut candidate = None;
    let mut farthest = 0;
    for ((color, _), &cluster) in distinct.iter().zip(assignment) {
        if centroids.contains(color) {
            continue;
        }
        let d = color.distance_sq(centroids[cluster]);
        if candidate.is_none() || d > farthest {
            candidate = Some(*color);
            farthest = d;
        }
    }

    if let Some(color) = candidate {
        centroids[empty] = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn blocks(parts: &[(Color, usize)]) -> Vec<Color> {
        parts
            .iter()
            .flat_map(|&(c, n)| std::iter::repeat(c).take(n))
            .collect()
    }

    const RED: Color = Color::new(200, 50, 50);
    const GREEN: Color = Color::new(50, 200, 50);
    const BLUE: Color = Color::new(50, 50, 200);

    #[test]
    fn uniform_image_produces_one_color() {
        let pixels = vec![RED; 1000];
        let result = extract_rgb(&pixels, 5, 100, &mut rng()).unwrap();
        assert_eq!(result.palette.colors().collect::<Vec<_>>(), vec![RED]);
        assert_eq!(result.palette.swatches()[0].weight, 1.0);
        assert!(result.converged);
    }

    #[test]
    fn fewer_distinct_colors_than_k_yields_each_exactly() {
        let pixels = blocks(&[(RED, 600), (BLUE, 300), (GREEN, 100)]);
        let result = extract_rgb(&pixels, 5, 100, &mut rng()).unwrap();

        // ordered by prominence
        assert_eq!(
            result.palette.colors().collect::<Vec<_>>(),
            vec![RED, BLUE, GREEN]
        );
        let weights: Vec<f32> = result.palette.swatches().iter().map(|s| s.weight).collect();
        assert!((weights[0] - 0.6).abs() < 1e-6);
        assert!((weights[1] - 0.3).abs() < 1e-6);
        assert!((weights[2] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn stops_early_once_assignments_are_stable() {
        let pixels = blocks(&[(RED, 10), (BLUE, 10)]);
        let result = extract_rgb(&pixels, 2, 100, &mut rng()).unwrap();
        assert!(result.converged);
        // one pass to assign, one to confirm nothing moved
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn iteration_cap_is_respected() {
        let pixels: Vec<Color> = (0..=255u8)
            .flat_map(|v| [Color::new(v, 0, 255 - v), Color::new(0, v, v / 2)])
            .collect();
        let result = extract_rgb(&pixels, 5, 1, &mut rng()).unwrap();
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
        assert!(!result.palette.is_empty());
    }

    #[test]
    fn many_distinct_colors_yield_exactly_k() {
        let pixels: Vec<Color> = (0..64u32)
            .flat_map(|i| {
                let v = (i * 4) as u8;
                [Color::new(v, 0, 0), Color::new(0, v, 0), Color::new(0, 0, v)]
            })
            .collect();
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = extract_rgb(&pixels, 5, 100, &mut rng).unwrap();
            assert!(result.converged, "seed {seed} did not converge");
            assert_eq!(result.palette.len(), 5, "seed {seed}");
            let mut colors: Vec<Color> = result.palette.colors().collect();
            colors.sort_by_key(|c| (c.r, c.g, c.b));
            colors.dedup();
            assert_eq!(colors.len(), 5, "seed {seed} produced duplicates");
        }
    }

    #[test]
    fn centroids_are_rounded_means() {
        // two shades that must share the single cluster
        let pixels = blocks(&[(Color::new(10, 20, 30), 1), (Color::new(11, 21, 31), 1)]);
        let result = extract_rgb(&pixels, 1, 100, &mut rng()).unwrap();
        // (10 + 11) / 2 = 10.5 rounds half up
        assert_eq!(
            result.palette.colors().collect::<Vec<_>>(),
            vec![Color::new(11, 21, 31)]
        );
    }

    #[test]
    fn zero_clusters_is_config_error() {
        let result = extract_rgb(&[RED], 0, 100, &mut rng());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn empty_image_is_config_error() {
        let result = extract_rgb(&[], 5, 100, &mut rng());
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(Extractor::new(5, 100).extract(&[]).is_err());
    }

    #[test]
    fn extractor_uses_configured_seed() {
        let pixels: Vec<Color> = (0..=255u8).map(|v| Color::new(v, v / 3, 255 - v)).collect();
        let extractor = Extractor {
            seed: Some(7),
            ..Extractor::new(4, 100)
        };
        assert_eq!(
            extractor.extract(&pixels).unwrap(),
            extractor.extract(&pixels).unwrap()
        );
    }

    #[test]
    fn lab_two_color_image_produces_two_colors() {
        let pixels = blocks(&[(RED, 500), (BLUE, 500)]);
        let palette = extract_lab(&pixels, 5, 20, 42).unwrap();

        assert_eq!(palette.len(), 2);
        let total: f32 = palette.swatches().iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-4);
        for swatch in palette.swatches() {
            let close = [RED, BLUE].iter().any(|c| c.distance_sq(swatch.color) <= 12);
            assert!(close, "unexpected centroid {}", swatch.color);
        }
    }

    #[test]
    fn lab_rejects_zero_clusters() {
        assert!(matches!(extract_lab(&[RED], 0, 20, 1), Err(Error::Config(_))));
    }
}
