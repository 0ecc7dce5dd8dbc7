use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use image::RgbImage;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::extract::{Extractor, Palette};
use crate::pipeline::load::{load_thumbnail, pixels};
use crate::registry::{normalize_path, KnownFileRegistry, SEPARATOR};
use crate::store::PreferenceStore;

/// One successfully loaded image with its palette.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub thumbnail: RgbImage,
    pub palette: Palette,
}

/// Notifications delivered to the caller while a batch runs, in completion
/// order.
#[derive(Debug)]
pub enum IngestEvent<'a> {
    Published(&'a ImageRecord),
    Skipped { path: &'a Path, error: &'a Error },
    Progress(f64),
}

/// Completion counter for the running batch, shown as a percentage.
///
/// The last path of a batch shows exactly 100, after which the counter
/// wraps back to 0, ready for the next batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    completed: usize,
    value: f64,
}

impl Progress {
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Paths finished so far in the running batch.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Count one finished path of a batch of `total` and return the value to
    /// display. A zero-sized batch leaves the counter untouched.
    pub fn advance(&mut self, total: usize) -> f64 {
        if total == 0 {
            return self.value;
        }
        self.completed += 1;
        let shown = self.completed as f64 * 100.0 / total as f64;
        if self.completed >= total {
            self.reset();
        } else {
            self.value = shown;
        }
        shown
    }

    pub fn reset(&mut self) {
        self.completed = 0;
        self.value = 0.0;
    }
}

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<ImageRecord>,
    pub skipped: Vec<(PathBuf, Error)>,
    /// Paths whose palette could not be extracted; they are still in `records`
    /// with an empty palette.
    pub degraded: Vec<PathBuf>,
    /// Loaded paths the known file list cannot hold: not UTF-8, or
    /// containing the `$` separator.
    pub unremembered: Vec<PathBuf>,
    pub total: usize,
    /// Highest progress value shown during the batch.
    pub progress: f64,
    /// Set when the known file list could not be written back.
    pub persist_error: Option<Error>,
}

enum Outcome {
    Loaded {
        record: ImageRecord,
        extraction_error: Option<Error>,
    },
    Skipped(PathBuf, Error),
}

/// Loads images concurrently, extracts their palettes and keeps the known
/// file list up to date.
pub struct Pipeline<S: PreferenceStore> {
    config: Config,
    extractor: Extractor,
    store: S,
    registry: KnownFileRegistry,
    load_error: Option<Error>,
    pool: ThreadPool,
    progress: Progress,
}

impl<S: PreferenceStore> Pipeline<S> {
    /// Validate `config`, start the worker pool and load the known file list
    /// from `store`.
    ///
    /// An unreadable store starts the session with an empty list; the error
    /// is kept in [`Pipeline::load_error`].
    pub fn new(config: Config, store: S) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("swatchpick-worker-{i}"))
            .build()?;
        let (registry, load_error) = match store.load() {
            Ok(registry) => (registry, None),
            Err(error) => {
                tracing::warn!(%error, "starting with an empty known file list");
                (KnownFileRegistry::new(), Some(error))
            }
        };
        Ok(Self {
            extractor: Extractor::from_config(&config),
            config,
            store,
            registry,
            load_error,
            pool,
            progress: Progress::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &KnownFileRegistry {
        &self.registry
    }

    /// Why the known file list could not be loaded at startup, if it could not.
    pub fn load_error(&self) -> Option<&Error> {
        self.load_error.as_ref()
    }

    pub fn progress(&self) -> f64 {
        self.progress.value()
    }

    /// Known files as paths, for re-ingesting a previous session.
    pub fn known_paths(&self) -> Vec<PathBuf> {
        self.registry.iter().map(PathBuf::from).collect()
    }

    /// Process every path, blocking until all of them are done.
    ///
    /// Each path runs independently on the worker pool.
    /// Missing or undecodable files are skipped, failed extractions keep the
    /// image with an empty palette. Every path advances progress whatever
    /// its outcome. Once all workers finish, loaded paths are merged into
    /// the known file list, which is saved, and progress is reset.
    pub fn ingest<F>(&mut self, paths: &[PathBuf], mut on_event: F) -> BatchReport
    where
        F: FnMut(IngestEvent<'_>),
    {
        let total = paths.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        if total == 0 {
            return report;
        }

        self.progress.reset();
        tracing::info!(
            images = total,
            workers = self.pool.current_num_threads(),
            "ingesting batch"
        );

        let (tx, rx) = mpsc::channel::<Outcome>();
        let mut pending: Vec<String> = Vec::new();
        let pool = &self.pool;
        let config = &self.config;
        let extractor = &self.extractor;

        thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    paths.par_iter().for_each_with(tx, |tx, path| {
                        // the receiver outlives every sender
                        let _ = tx.send(process(path, config, extractor));
                    });
                });
            });

            // Coordinator: the only place shared batch state is touched.
            for outcome in rx {
                match outcome {
                    Outcome::Loaded {
                        record,
                        extraction_error,
                    } => {
                        if let Some(error) = extraction_error {
                            tracing::warn!(path = %record.path.display(), %error, "no palette available");
                            report.degraded.push(record.path.clone());
                        }
                        match normalize_path(&record.path).filter(|key| !key.contains(SEPARATOR)) {
                            Some(key) => pending.push(key),
                            None => {
                                tracing::warn!(
                                    path = %record.path.display(),
                                    "path cannot be kept in the known file list"
                                );
                                report.unremembered.push(record.path.clone());
                            }
                        }
                        on_event(IngestEvent::Published(&record));
                        report.records.push(record);
                    }
                    Outcome::Skipped(path, error) => {
                        tracing::warn!(path = %path.display(), %error, "skipping image");
                        on_event(IngestEvent::Skipped {
                            path: &path,
                            error: &error,
                        });
                        report.skipped.push((path, error));
                    }
                }

                let shown = self.progress.advance(total);
                report.progress = report.progress.max(shown);
                on_event(IngestEvent::Progress(shown));
            }
        });

        let added = self.registry.add_all(pending);
        if let Err(error) = self.store.save(&self.registry) {
            tracing::error!(%error, "failed to save known files");
            report.persist_error = Some(error);
        }
        self.progress.reset();

        tracing::info!(
            loaded = report.records.len(),
            skipped = report.skipped.len(),
            new_files = added,
            "batch finished"
        );
        report
    }
}

/// Load, thumbnail and extract one path. Runs on the worker pool.
fn process(path: &Path, config: &Config, extractor: &Extractor) -> Outcome {
    let thumbnail = match load_thumbnail(path, config.thumbnail_width, config.thumbnail_height) {
        Ok(thumbnail) => thumbnail,
        Err(error) => return Outcome::Skipped(path.to_path_buf(), error),
    };

    let (palette, extraction_error) = match extractor.extract(&pixels(&thumbnail)) {
        Ok(palette) => (palette, None),
        Err(error) => (Palette::empty(), Some(error)),
    };
    tracing::debug!(path = %path.display(), colors = palette.len(), "image processed");

    Outcome::Loaded {
        record: ImageRecord {
            path: path.to_path_buf(),
            thumbnail,
            palette,
        },
        extraction_error,
    }
}
