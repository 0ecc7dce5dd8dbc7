use std::path::PathBuf;

use clap::Parser;

use crate::color::ColorFormat;
use crate::config::{
    ClusterSpace, Config, DEFAULT_CLUSTERS, DEFAULT_MAX_ITERATIONS, DEFAULT_RECENT_CAPACITY,
    DEFAULT_THUMBNAIL_HEIGHT, DEFAULT_THUMBNAIL_WIDTH,
};

/// Pick dominant colors from images and reuse them in other tools.
#[derive(Parser, Debug)]
#[command(name = "swatchpick", version, about)]
pub struct Args {
    /// Images to add (png, jpg, jpeg, gif, bmp). Without any, the images
    /// remembered from earlier runs are loaded.
    pub images: Vec<PathBuf>,

    /// Output format for picked colors
    #[arg(short, long, value_enum, default_value_t = ColorFormat::Rgb)]
    pub format: ColorFormat,

    /// Number of K-means clusters per image
    #[arg(short = 'k', long = "colors", default_value_t = DEFAULT_CLUSTERS)]
    pub colors: usize,

    /// Maximum K-means iterations
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub iterations: usize,

    /// Color space to cluster in
    #[arg(long, value_enum, default_value_t = ClusterSpace::Rgb)]
    pub space: ClusterSpace,

    /// Thumbnail bounding box width
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_WIDTH)]
    pub thumb_width: u32,

    /// Thumbnail bounding box height
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_HEIGHT)]
    pub thumb_height: u32,

    /// Number of recently picked colors to keep
    #[arg(long, default_value_t = DEFAULT_RECENT_CAPACITY)]
    pub recent: usize,

    /// Images processed at once (0 = one per CPU)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Seed for centroid initialization, for reproducible palettes
    #[arg(long)]
    pub seed: Option<u64>,

    /// Preferences file (defaults to the user configuration directory)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Print a colored terminal preview of each palette
    #[arg(long, conflicts_with = "json")]
    pub preview: bool,

    /// Print palettes as JSON
    #[arg(long)]
    pub json: bool,

    /// Launch the interactive picker
    #[arg(long, conflicts_with_all = ["json", "preview"])]
    pub tui: bool,
}

impl Args {
    pub fn config(&self) -> Config {
        let defaults = Config::default();
        Config {
            clusters: self.colors,
            max_iterations: self.iterations,
            thumbnail_width: self.thumb_width,
            thumbnail_height: self.thumb_height,
            recent_capacity: self.recent,
            workers: self.workers.unwrap_or(defaults.workers),
            space: self.space,
            seed: self.seed,
        }
    }
}
