//! The two user-facing flows.
//!
//! | Flow | Input | Output |
//! |---|---|---|
//! | [`manga`] | folder of books (page image folders) | one `.xtc` per book |
//! | [`bw`] | image file or folder | `<stem>_bw_<alg>.bmp` per image |
//!
//! Both build a [`JobConfig`](crate::imaging::JobConfig) from configuration,
//! discover their sources with [`scan`](crate::scan), and hand them to a
//! [`Scheduler`](crate::scheduler::Scheduler). Per-page failures end up in the
//! returned report; only errors that stop the whole run are returned as
//! [`PipelineError`].

pub mod bw;
pub mod manga;

use crate::config::ConfigError;
use crate::scan::ScanError;
use crate::scheduler::FatalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("{0}")]
    Fatal(#[from] FatalError),
}

pub use bw::{BwOptions, run_bw};
pub use manga::{BookReport, EncodeOutcome, MangaOptions, MangaReport, run_manga};
