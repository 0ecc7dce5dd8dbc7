use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::style::{self, Stylize};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use swatchpick::cli::Args;
use swatchpick::color::{Color, ColorFormat, Hsl};
use swatchpick::history::RecentColors;
use swatchpick::pipeline::ingest::{BatchReport, ImageRecord, IngestEvent, Pipeline};
use swatchpick::pipeline::load::is_accepted_image;
use swatchpick::selection::{ClipboardSink, Selector, WriterSink};
use swatchpick::store::JsonPreferences;
use swatchpick::tui::{self, TuiApp, UiMessage};

fn main() -> Result<()> {
    let args = Args::parse();

    // The TUI owns the terminal, so it runs without a log subscriber.
    if !args.tui {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| "swatchpick=warn".into()),
            )
            .with_writer(io::stderr)
            .without_time()
            .init();
    }

    let store = match &args.store {
        Some(path) => JsonPreferences::new(path),
        None => JsonPreferences::default_location()?,
    };
    let pipeline = Pipeline::new(args.config(), store).context("failed to start swatchpick")?;
    if let Some(error) = pipeline.load_error() {
        eprintln!("swatchpick: {error}; starting with no known files");
    }
    let paths = select_paths(&args, &pipeline);

    if args.tui {
        run_tui(&args, pipeline, paths)
    } else {
        run_batch(&args, pipeline, &paths)
    }
}

/// Paths given on the command line filtered to accepted image types, or every
/// remembered file when none were given.
fn select_paths(args: &Args, pipeline: &Pipeline<JsonPreferences>) -> Vec<PathBuf> {
    if args.images.is_empty() {
        return pipeline.known_paths();
    }
    args.images
        .iter()
        .filter(|path| {
            let accepted = is_accepted_image(path);
            if !accepted {
                tracing::warn!(path = %path.display(), "ignoring file that is not png, jpg, jpeg, gif or bmp");
            }
            accepted
        })
        .cloned()
        .collect()
}

fn run_batch(args: &Args, mut pipeline: Pipeline<JsonPreferences>, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        eprintln!("swatchpick: no images to load");
        return Ok(());
    }

    let show_progress = io::stderr().is_terminal();
    let report = pipeline.ingest(paths, |event| {
        if let IngestEvent::Progress(value) = event {
            if show_progress {
                eprint!("\r{value:5.1}%");
            }
        }
    });
    if show_progress {
        eprintln!();
    }
    report_unsaved(&report.unremembered, report.persist_error.as_ref());

    let mut stdout = io::stdout().lock();
    if args.json {
        write_json(&mut stdout, &report, args.format)?;
    } else {
        for record in &report.records {
            write_record(&mut stdout, record, args.format, args.preview)?;
        }
    }
    Ok(())
}

fn report_unsaved(unremembered: &[PathBuf], persist_error: Option<&swatchpick::Error>) {
    for path in unremembered {
        eprintln!(
            "swatchpick: {} will not be remembered (contains '$' or is not UTF-8)",
            path.display()
        );
    }
    if let Some(error) = persist_error {
        eprintln!("swatchpick: {error}");
    }
}

fn write_record(out: &mut impl Write, record: &ImageRecord, format: ColorFormat, preview: bool) -> Result<()> {
    let (width, height) = record.thumbnail.dimensions();
    writeln!(out, "{} ({width}x{height})", record.path.display())?;
    if record.palette.is_empty() {
        writeln!(out, "  (no palette)")?;
    }
    for swatch in record.palette.swatches() {
        let text = swatch.color.format(format);
        if preview {
            let block = "      ".on(terminal_color(swatch.color));
            writeln!(out, "  {block}  {text}  {:4.1}%", swatch.weight * 100.0)?;
        } else {
            writeln!(out, "  {text}")?;
        }
    }
    Ok(())
}

fn terminal_color(c: Color) -> style::Color {
    style::Color::Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    path: &'a Path,
    width: u32,
    height: u32,
    palette: Vec<JsonSwatch>,
}

#[derive(Serialize)]
struct JsonSwatch {
    hex: String,
    rgb: [u8; 3],
    hsl: Hsl,
    weight: f32,
    text: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    format: ColorFormat,
    images: Vec<JsonRecord<'a>>,
    skipped: Vec<JsonSkipped<'a>>,
    unremembered: Vec<&'a Path>,
}

#[derive(Serialize)]
struct JsonSkipped<'a> {
    path: &'a Path,
    reason: String,
}

fn write_json(out: &mut impl Write, report: &BatchReport, format: ColorFormat) -> Result<()> {
    let images = report
        .records
        .iter()
        .map(|record| JsonRecord {
            path: &record.path,
            width: record.thumbnail.width(),
            height: record.thumbnail.height(),
            palette: record
                .palette
                .swatches()
                .iter()
                .map(|s| JsonSwatch {
                    hex: s.color.to_hex(),
                    rgb: [s.color.r, s.color.g, s.color.b],
                    hsl: s.color.to_hsl(),
                    weight: s.weight,
                    text: s.color.format(format),
                })
                .collect(),
        })
        .collect();
    let skipped = report
        .skipped
        .iter()
        .map(|(path, error)| JsonSkipped {
            path,
            reason: error.to_string(),
        })
        .collect();

    serde_json::to_writer_pretty(
        &mut *out,
        &JsonReport {
            format,
            images,
            skipped,
            unremembered: report.unremembered.iter().map(PathBuf::as_path).collect(),
        },
    )?;
    writeln!(out)?;
    Ok(())
}

fn run_tui(args: &Args, mut pipeline: Pipeline<JsonPreferences>, paths: Vec<PathBuf>) -> Result<()> {
    let recent = RecentColors::with_capacity(pipeline.config().recent_capacity);
    let (tx, rx) = mpsc::channel();

    let ingest = thread::spawn(move || {
        let report = pipeline.ingest(&paths, |event| {
            let message = match event {
                IngestEvent::Published(record) => UiMessage::Record(record.clone()),
                IngestEvent::Skipped { path, error } => UiMessage::Skipped {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                },
                IngestEvent::Progress(value) => UiMessage::Progress(value),
            };
            // the picker may already be closed
            let _ = tx.send(message);
        });
        let _ = tx.send(UiMessage::Finished {
            loaded: report.records.len(),
            skipped: report.skipped.len(),
        });
        (report.unremembered, report.persist_error)
    });

    let mut app = TuiApp::new(Selector::new(args.format, recent, Vec::<String>::new()));
    tui::run(&mut app, rx)?;

    // Let a running batch finish so the known file list is saved.
    let (unremembered, persist_error) = ingest
        .join()
        .map_err(|_| anyhow!("ingestion thread panicked"))?;
    report_unsaved(&unremembered, persist_error.as_ref());

    // Picked colors go to stdout once the terminal is restored.
    let mut stdout = WriterSink(io::stdout().lock());
    for text in app.into_selector().into_clipboard() {
        stdout.set_text(&text)?;
    }
    Ok(())
}
