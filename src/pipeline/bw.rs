//! Background images: any picture to a 1-bit BMP for the sleep screen.
//!
//! Each source is fitted into the configured size (480×800 by default),
//! padded, dithered and written as `<stem>_bw_<algorithm>.bmp` next to the
//! source or into an explicit output folder. With `keep_size` the source
//! dimensions are kept and nothing is padded.

use super::PipelineError;
use crate::config::BwConfig;
use crate::imaging::{Depth, DitherAlgorithm, Geometry, JobConfig, Padding, TransformConfig};
use crate::scan::discover_images;
use crate::scheduler::{ProgressEvent, RunSummary, Scheduler};
use crate::writer::{FileWriter, OutputLayout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq)]
pub struct BwOptions {
    pub job: JobConfig,
    /// Write here instead of next to each source.
    pub output_dir: Option<PathBuf>,
}

impl BwOptions {
    pub fn from_config(config: &BwConfig, keep_size: bool, output_dir: Option<PathBuf>) -> Self {
        let geometry = if keep_size {
            Geometry::pass_through()
        } else {
            Geometry {
                target: Some(config.dimensions()),
                padding: Padding {
                    color: config.pad,
                    ..Default::default()
                },
            }
        };
        Self {
            job: JobConfig {
                transform: TransformConfig::default(),
                dither: config.dither,
                geometry,
                depth: Depth::Mono1,
            },
            output_dir,
        }
    }

    pub fn algorithm(&self) -> DitherAlgorithm {
        self.job.dither
    }
}

/// Convert one image or every image in a folder.
pub fn run_bw(
    input: &Path,
    options: &BwOptions,
    scheduler: &Scheduler,
    events: Option<Sender<ProgressEvent>>,
) -> Result<RunSummary, PipelineError> {
    let items = discover_images(input)?;
    tracing::info!(images = items.len(), algorithm = %options.algorithm(), "converting backgrounds");
    if let Some(dir) = &options.output_dir {
        std::fs::create_dir_all(dir)?;
    }
    let sink = FileWriter::new(OutputLayout::BesideSource {
        dir: options.output_dir.clone(),
    });
    Ok(scheduler.run(&items, &options.job, &sink, events.as_ref())?)
}
