use std::num::NonZeroUsize;

use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_CLUSTERS: usize = 5;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 180;
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 130;
pub const DEFAULT_RECENT_CAPACITY: usize = 10;

/// Cluster indices are stored as `u8` by the Lab backend.
pub const MAX_CLUSTERS: usize = 255;

/// Color space the k-means runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSpace {
    /// Lloyd iterations in RGB, stopping once assignments are stable
    #[default]
    Rgb,
    /// Hamerly k-means in CIELAB (perceptual)
    Lab,
}

/// Tunables for one picker session.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Palette size K.
    pub clusters: usize,
    /// Upper bound on clustering iterations M.
    pub max_iterations: usize,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub recent_capacity: usize,
    /// Size of the worker pool, i.e. the most images decoded and clustered
    /// at once. `0` lets rayon pick one thread per logical CPU.
    pub workers: usize,
    pub space: ClusterSpace,
    /// Fixed seed for centroid initialization. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clusters: DEFAULT_CLUSTERS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            thumbnail_height: DEFAULT_THUMBNAIL_HEIGHT,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            workers: default_workers(),
            space: ClusterSpace::default(),
            seed: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.clusters == 0 {
            return Err(Error::Config("cluster count must be at least 1".into()));
        }
        if self.clusters > MAX_CLUSTERS {
            return Err(Error::Config(format!(
                "cluster count {} exceeds the maximum of {MAX_CLUSTERS}",
                self.clusters
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("iteration limit must be at least 1".into()));
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(Error::Config(format!(
                "thumbnail bound {}x{} has a zero side",
                self.thumbnail_width, self.thumbnail_height
            )));
        }
        if self.recent_capacity == 0 {
            return Err(Error::Config("recent color capacity must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}
