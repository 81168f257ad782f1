//! Handing finished page folders to the XTC encoder.
//!
//! The XTC container is produced by the external `png2xtc.py` script. The
//! [`XtcEncoder`] trait keeps that process boundary injectable: pipelines
//! only see "turn this folder of PNGs into that `.xtc` file".
//!
//! ## Locating `png2xtc.py`
//!
//! First hit wins:
//!
//! | # | Candidate |
//! |---|---|
//! | 1 | `--encoder` flag |
//! | 2 | `PNG2XTC_PATH` environment variable |
//! | 3 | `[encoder] path` in `inkpage.toml` |
//! | 4 | next to the `inkpage` executable |
//! | 5 | `epub2xtc/` next to the executable |
//! | 6 | the executable's parent folder, then its `epub2xtc/` |
//!
//! Each candidate may name the script itself or a folder containing it.
//! Only the first of 1-3 that is set is tried: a named location that does
//! not hold the script is an error, not a reason to keep searching.
//!
//! ## Success
//!
//! The script must exit with status 0 within the timeout *and* leave the
//! output file behind. Anything else is an [`EncodeError`]. The script writes
//! into a staging folder next to the output, so a failed or timed-out run
//! never leaves a partial `.xtc` under the final name, and a stale `.xtc`
//! from an earlier run can never pass for a fresh one.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const SCRIPT_NAME: &str = "png2xtc.py";
pub const ENV_PATH: &str = "PNG2XTC_PATH";

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Longest stderr excerpt kept in an error.
const STDERR_EXCERPT: usize = 2000;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("png2xtc.py not found; install epub2xtc or set PNG2XTC_PATH")]
    NotFound,
    #[error("png2xtc.py not found at {}", .0.display())]
    NotFoundAt(PathBuf),
    #[error("cannot run encoder: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("encoder timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("encoder exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("encoder reported success but {} is missing", .0.display())]
    MissingOutput(PathBuf),
}

/// Converts a folder of page PNGs into one `.xtc` file.
pub trait XtcEncoder: Sync {
    fn encode(&self, page_dir: &Path, output: &Path) -> Result<(), EncodeError>;
}

/// Production encoder: `<interpreter> <script> <page_dir> <output>`.
#[derive(Debug, Clone)]
pub struct Png2XtcEncoder {
    script: PathBuf,
    interpreter: String,
    timeout: Duration,
}

impl Png2XtcEncoder {
    pub fn new(script: PathBuf, interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            script,
            interpreter: interpreter.into(),
            timeout,
        }
    }

    /// Locate the script with [`find_png2xtc`] and build an encoder for it.
    pub fn discover(
        cli: Option<&Path>,
        configured: Option<&Path>,
        interpreter: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EncodeError> {
        let script = find_png2xtc(cli, configured)?;
        tracing::debug!(script = %script.display(), "using encoder");
        Ok(Self::new(script, interpreter, timeout))
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

impl XtcEncoder for Png2XtcEncoder {
    fn encode(&self, page_dir: &Path, output: &Path) -> Result<(), EncodeError> {
        let out_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(out_dir)?;
        // The script writes into a private staging folder; only a finished
        // file is renamed onto `output`. Dropping the folder removes leftovers.
        let staging = tempfile::Builder::new()
            .prefix(".inkpage-encode")
            .tempdir_in(out_dir)?;
        let staged = staging
            .path()
            .join(output.file_name().unwrap_or(OsStr::new("book.xtc")));

        // stderr goes to an anonymous file so a chatty script can never
        // block on a full pipe while we poll
        let mut stderr_file = tempfile::tempfile()?;
        let mut child = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(page_dir)
            .arg(&staged)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file.try_clone()?))
            .spawn()?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EncodeError::Timeout(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(EncodeError::Failed {
                status,
                stderr: read_excerpt(&mut stderr_file),
            });
        }
        if !staged.is_file() {
            return Err(EncodeError::MissingOutput(output.to_path_buf()));
        }
        std::fs::rename(&staged, output)?;
        Ok(())
    }
}

fn read_excerpt(file: &mut File) -> String {
    let mut text = String::new();
    if file.rewind().is_ok() {
        let _ = file.read_to_string(&mut text);
    }
    let text = text.trim();
    match text.char_indices().nth(STDERR_EXCERPT) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Search for `png2xtc.py`, reading `PNG2XTC_PATH` and the executable location.
pub fn find_png2xtc(cli: Option<&Path>, configured: Option<&Path>) -> Result<PathBuf, EncodeError> {
    let env = std::env::var_os(ENV_PATH).map(PathBuf::from);
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let explicit = explicit_encoder_path(cli, env.as_deref(), configured);
    locate_png2xtc(explicit, exe_dir.as_deref())
}

/// The location the user named, if any: `--encoder`, then `PNG2XTC_PATH`,
/// then `[encoder] path`. An empty value counts as unset.
pub fn explicit_encoder_path<'a>(
    cli: Option<&'a Path>,
    env: Option<&'a Path>,
    configured: Option<&'a Path>,
) -> Option<&'a Path> {
    [cli, env, configured]
        .into_iter()
        .flatten()
        .find(|p| !p.as_os_str().is_empty())
}

/// Pure form of [`find_png2xtc`].
///
/// A named location must hold the script; it never falls through to the
/// search next to the executable.
pub fn locate_png2xtc(explicit: Option<&Path>, exe_dir: Option<&Path>) -> Result<PathBuf, EncodeError> {
    if let Some(path) = explicit {
        return resolve_script(path).ok_or_else(|| EncodeError::NotFoundAt(path.to_path_buf()));
    }
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = exe_dir {
        candidates.push(dir.to_path_buf());
        candidates.push(dir.join("epub2xtc"));
        if let Some(parent) = dir.parent() {
            candidates.push(parent.to_path_buf());
            candidates.push(parent.join("epub2xtc"));
        }
    }
    candidates
        .into_iter()
        .find_map(|c| resolve_script(&c))
        .ok_or(EncodeError::NotFound)
}

fn resolve_script(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    let inside = candidate.join(SCRIPT_NAME);
    inside.is_file().then_some(inside)
}
