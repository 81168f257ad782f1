//! Manga/comic conversion: page folders to XTC books.
//!
//! For every book found under the input root:
//!
//! 1. clear `<input>/.temp_png/<book>/` so pages from an earlier run with a
//!    different selection never leak into the book
//! 2. render the selected pages into it (split, rotated, dithered, 480×800 PNG)
//! 3. hand the folder to the [`XtcEncoder`], producing `<input>/xtc_output/<book>.xtc`
//!
//! Books run one after another; pages within a book run in parallel. An
//! encoder failure is recorded against its book and the next book proceeds.
//! With `cleanup`, `.temp_png` is removed at the end, but only when every
//! book was encoded, so failed books can be re-encoded by hand.

use super::PipelineError;
use crate::config::{ConfigError, InkpageConfig};
use crate::encoder::XtcEncoder;
use crate::imaging::{Depth, Geometry, JobConfig, Padding, TransformConfig};
use crate::naming::{TEMP_DIR, book_output_path, book_page_dir};
use crate::scan::{Book, PageSelection, discover_books};
use crate::scheduler::{JobError, JobErrorKind, ProgressEvent, RunSummary, Scheduler};
use crate::writer::{FileWriter, OutputLayout};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

/// Resolved settings for one manga run.
#[derive(Debug, Clone, PartialEq)]
pub struct MangaOptions {
    pub job: JobConfig,
    pub selection: PageSelection,
    pub cleanup: bool,
}

impl MangaOptions {
    pub fn from_config(config: &InkpageConfig, selection: PageSelection) -> Result<Self, ConfigError> {
        let manga = &config.manga;
        let mut geometry = Geometry::device();
        geometry.padding = Padding {
            color: manga.pad,
            ..Default::default()
        };
        Ok(Self {
            job: JobConfig {
                transform: TransformConfig {
                    split: manga.split.then_some(manga.split_axis),
                    reading_order: manga.reading_order,
                    contrast: manga.contrast_boost()?,
                    margin: manga.margin()?,
                },
                dither: manga.dither,
                geometry,
                depth: Depth::Gray8,
            },
            selection,
            cleanup: manga.cleanup,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EncodeOutcome {
    Encoded { output: PathBuf },
    Failed(JobError),
    /// No page of the book was written.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookReport {
    pub name: String,
    pub pages: RunSummary,
    pub encode: EncodeOutcome,
}

impl BookReport {
    pub fn has_failures(&self) -> bool {
        self.pages.has_failures() || matches!(self.encode, EncodeOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MangaReport {
    pub books: Vec<BookReport>,
    /// Whether the page scratch folder was removed.
    pub cleaned: bool,
}

impl MangaReport {
    pub fn has_failures(&self) -> bool {
        self.books.iter().any(BookReport::has_failures)
    }

    pub fn encoded(&self) -> impl Iterator<Item = &PathBuf> {
        self.books.iter().filter_map(|b| match &b.encode {
            EncodeOutcome::Encoded { output } => Some(output),
            _ => None,
        })
    }
}

/// Convert every book under `input`.
pub fn run_manga(
    input: &Path,
    options: &MangaOptions,
    scheduler: &Scheduler,
    encoder: &impl XtcEncoder,
    events: Option<Sender<ProgressEvent>>,
) -> Result<MangaReport, PipelineError> {
    // `.` and `..` have no name or usable parent until resolved
    let resolved;
    let input = match input.file_name() {
        Some(_) => input,
        None => {
            resolved = input.canonicalize()?;
            resolved.as_path()
        }
    };
    let books = discover_books(input)?;
    // A single-book input keeps its working folders beside the book
    let root = match books.as_slice() {
        [book] if book.dir == input => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new(".")),
        _ => input,
    };

    let mut reports = Vec::with_capacity(books.len());
    for book in &books {
        let report = convert_book(root, book, options, scheduler, encoder, events.as_ref())?;
        reports.push(report);
    }

    let all_encoded = reports
        .iter()
        .all(|r| matches!(r.encode, EncodeOutcome::Encoded { .. }));
    let cleaned = if options.cleanup && all_encoded {
        remove_if_exists(&root.join(TEMP_DIR))?;
        true
    } else {
        if options.cleanup {
            tracing::warn!("keeping {} because not every book was encoded", TEMP_DIR);
        }
        false
    };

    Ok(MangaReport {
        books: reports,
        cleaned,
    })
}

fn convert_book(
    root: &Path,
    book: &Book,
    options: &MangaOptions,
    scheduler: &Scheduler,
    encoder: &impl XtcEncoder,
    events: Option<&Sender<ProgressEvent>>,
) -> Result<BookReport, PipelineError> {
    let emit = |event: ProgressEvent| {
        if let Some(tx) = events {
            let _ = tx.send(event);
        }
    };

    let items = book.items(&options.selection);
    tracing::info!(book = %book.name, pages = items.len(), "converting book");
    emit(ProgressEvent::BookStarted {
        name: book.name.clone(),
        pages: items.len(),
    });

    let page_dir = book_page_dir(root, &book.name);
    remove_if_exists(&page_dir)?;
    std::fs::create_dir_all(&page_dir)?;

    let sink = FileWriter::new(OutputLayout::BookPages {
        dir: page_dir.clone(),
    });
    let pages = scheduler.run(&items, &options.job, &sink, events)?;

    let encode = if pages.succeeded == 0 {
        tracing::warn!(book = %book.name, "no pages written, not encoding");
        EncodeOutcome::Skipped
    } else {
        let output = book_output_path(root, &book.name);
        match encoder.encode(&page_dir, &output) {
            Ok(()) => {
                emit(ProgressEvent::BookEncoded {
                    name: book.name.clone(),
                    output: output.clone(),
                });
                EncodeOutcome::Encoded { output }
            }
            Err(e) => {
                tracing::warn!(book = %book.name, "encoding failed: {e}");
                emit(ProgressEvent::BookFailed {
                    name: book.name.clone(),
                    message: e.to_string(),
                });
                EncodeOutcome::Failed(JobError {
                    kind: JobErrorKind::EncodingHandoff,
                    message: e.to_string(),
                    path: page_dir,
                    part: None,
                    algorithm: options.job.dither,
                })
            }
        }
    };

    Ok(BookReport {
        name: book.name.clone(),
        pages,
        encode,
    })
}

fn remove_if_exists(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
