//! Writing finished pages to disk.
//!
//! [`PageSink`] is the seam between the scheduler and the filesystem. The
//! production [`FileWriter`] encodes each raster into a temp file in the
//! destination directory and persists it under its final name, so a page is
//! either complete on disk or absent. Names are unique per job as long as
//! the caller flags sources with a shared stem (see
//! [`SourceItem::stem_shared`](crate::scheduler::SourceItem::stem_shared)),
//! so no locking is needed.

use crate::imaging::codec::{PageFormat, encode_page};
use crate::imaging::RasterBuffer;
use crate::naming::{background_file_name, page_file_name};
use crate::scheduler::{Job, JobError, JobErrorKind};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Destination for rendered pages. Must be callable from many workers at once.
pub trait PageSink: Sync {
    /// Persist `raster` for `job` and return the written path.
    fn write(&self, job: &Job<'_>, raster: &RasterBuffer) -> Result<PathBuf, JobError>;
}

/// Where a [`FileWriter`] puts each page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLayout {
    /// Manga pages: `<dir>/<page:04>_<part>.<ext>`.
    BookPages { dir: PathBuf },
    /// Backgrounds: `<stem>[_<ext>]_bw_<alg>.bmp`, in `dir` or next to the source.
    BesideSource { dir: Option<PathBuf> },
}

impl OutputLayout {
    pub fn path_for(&self, job: &Job<'_>) -> PathBuf {
        match self {
            OutputLayout::BookPages { dir } => {
                let name = page_file_name(job.item.page, job.part);
                let ext = PageFormat::for_depth(job.config.depth).extension();
                dir.join(name).with_extension(ext)
            }
            OutputLayout::BesideSource { dir } => {
                let name =
                    background_file_name(&job.item.path, job.config.dither, job.item.stem_shared);
                let parent = dir
                    .as_deref()
                    .or_else(|| job.item.path.parent())
                    .unwrap_or(Path::new("."));
                parent.join(name)
            }
        }
    }
}

/// Atomic filesystem sink.
#[derive(Debug, Clone)]
pub struct FileWriter {
    layout: OutputLayout,
}

impl FileWriter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }
}

impl PageSink for FileWriter {
    fn write(&self, job: &Job<'_>, raster: &RasterBuffer) -> Result<PathBuf, JobError> {
        let target = self.layout.path_for(job);
        let io_err = |what: &str, e: &dyn std::fmt::Display| {
            JobError::new(
                JobErrorKind::Io,
                format!("{what} {}: {e}", target.display()),
                job,
            )
        };

        let dir = target.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| io_err("cannot create directory for", &e))?;

        let tmp = NamedTempFile::new_in(dir).map_err(|e| io_err("cannot stage", &e))?;
        {
            let mut out = BufWriter::new(tmp.as_file());
            encode_page(raster, &mut out).map_err(|e| io_err("cannot encode", &e))?;
            out.flush().map_err(|e| io_err("cannot write", &e))?;
        }
        tmp.persist(&target)
            .map_err(|e| io_err("cannot persist", &e.error))?;
        Ok(target)
    }
}
