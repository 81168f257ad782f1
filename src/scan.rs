//! Finding books and images on disk.
//!
//! ## Manga input
//!
//! ```text
//! manga/                      # input root
//! ├── inkpage.toml            # optional config
//! ├── Vol 1/                  # book "Vol 1"
//! │   ├── 001.jpg
//! │   └── 002.jpg
//! ├── Vol 2/
//! │   └── chapter1/           # nested folders are flattened into the book
//! │       └── p01.png
//! ├── __MACOSX/               # ignored
//! ├── .temp_png/              # ignored (our scratch space)
//! └── xtc_output/             # ignored (our output)
//! ```
//!
//! If the input root itself holds images it is treated as a single book
//! named after the folder.
//!
//! ## Ordering
//!
//! Pages are ordered by their path relative to the book, compared
//! case-insensitively. A page's number is its 1-based position in that
//! order and stays fixed regardless of [`PageSelection`], so `--skip 3`
//! never renames page 4.
//!
//! ## Background input
//!
//! A single image file, or the images directly inside a folder (not
//! recursive). Files that already look like our output (`*_bw_*`) are left
//! alone. Sources sharing a stem (`a.png`, `a.jpg`) are flagged so their
//! outputs get the extension in the name.

use crate::imaging::{ContrastBoost, PageOverrides, ParseParamError, is_supported_image};
use crate::naming::{OUTPUT_DIR, TEMP_DIR};
use crate::scheduler::SourceItem;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot walk directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Unsupported image type: {0}")]
    Unsupported(PathBuf),
    #[error("No books with images found in {0}")]
    NoBooks(PathBuf),
    #[error("No images found in {0}")]
    NoImages(PathBuf),
}

/// A folder of page images processed and encoded as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub name: String,
    pub dir: PathBuf,
    /// Page images in reading order.
    pub pages: Vec<PathBuf>,
}

impl Book {
    /// Source items for the pages kept by `selection`, numbered by position.
    pub fn items(&self, selection: &PageSelection) -> Vec<SourceItem> {
        self.pages
            .iter()
            .zip(1u32..)
            .filter(|(_, page)| selection.includes(*page))
            .map(|(path, page)| SourceItem {
                path: path.clone(),
                book: self.name.clone(),
                page,
                stem_shared: false,
                overrides: selection.overrides(page),
            })
            .collect()
    }
}

// ============================================================================
// Page selection
// ============================================================================

/// Comma-separated list of 1-based page numbers, e.g. `3,7,12`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageList(pub BTreeSet<u32>);

impl FromStr for PageList {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| match p.parse::<u32>() {
                Ok(0) | Err(_) => Err(ParseParamError(format!(
                    "invalid page number {p:?} (pages start at 1)"
                ))),
                Ok(n) => Ok(n),
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(PageList)
    }
}

impl fmt::Display for PageList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

/// Per-page contrast levels, `<page>-<dark>-<light>` comma-separated,
/// e.g. `1-6-2,40-3-3`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContrasts(pub BTreeMap<u32, ContrastBoost>);

impl FromStr for PageContrasts {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |entry: &str| {
            ParseParamError(format!(
                "invalid page contrast {entry:?} (expected PAGE-DARK-LIGHT, levels 0-{})",
                ContrastBoost::MAX_LEVEL
            ))
        };
        let mut map = BTreeMap::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let fields: Vec<&str> = entry.split('-').map(str::trim).collect();
            let [page, dark, light] = fields.as_slice() else {
                return Err(invalid(entry));
            };
            let page: u32 = page.parse().map_err(|_| invalid(entry))?;
            let dark: u8 = dark.parse().map_err(|_| invalid(entry))?;
            let light: u8 = light.parse().map_err(|_| invalid(entry))?;
            if page == 0 || dark > ContrastBoost::MAX_LEVEL || light > ContrastBoost::MAX_LEVEL {
                return Err(invalid(entry));
            }
            map.insert(page, ContrastBoost { dark, light });
        }
        Ok(PageContrasts(map))
    }
}

impl fmt::Display for PageContrasts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(page, b)| format!("{page}-{}-{}", b.dark, b.light))
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Which pages of a book to process, and the pages that get handled
/// differently from the rest of the run. All filters combine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection {
    pub skip: PageList,
    /// Empty means every page.
    pub only: PageList,
    pub start: Option<u32>,
    pub stop: Option<u32>,
    /// Pages rendered whole even when splitting is on (covers, real spreads).
    pub keep_whole: PageList,
    pub contrast: PageContrasts,
}

impl PageSelection {
    pub fn includes(&self, page: u32) -> bool {
        !self.skip.0.contains(&page)
            && (self.only.0.is_empty() || self.only.0.contains(&page))
            && self.start.is_none_or(|s| page >= s)
            && self.stop.is_none_or(|s| page <= s)
    }

    pub fn overrides(&self, page: u32) -> PageOverrides {
        PageOverrides {
            keep_whole: self.keep_whole.0.contains(&page),
            contrast: self.contrast.0.get(&page).copied(),
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Discover the books under a manga input root.
pub fn discover_books(root: &Path) -> Result<Vec<Book>, ScanError> {
    check_dir(root)?;

    let direct = direct_images(root)?;
    if !direct.is_empty() {
        let name = dir_name(root);
        tracing::debug!(book = %name, pages = direct.len(), "input root is a single book");
        return Ok(vec![Book {
            name,
            dir: root.to_path_buf(),
            pages: direct,
        }]);
    }

    let mut books = Vec::new();
    for dir in collect_entries(root)?.into_iter().filter(|p| p.is_dir()) {
        let pages = book_pages(&dir)?;
        if pages.is_empty() {
            tracing::debug!(dir = %dir.display(), "no images, skipping");
            continue;
        }
        books.push(Book {
            name: dir_name(&dir),
            dir,
            pages,
        });
    }

    if books.is_empty() {
        return Err(ScanError::NoBooks(root.to_path_buf()));
    }
    Ok(books)
}

/// Discover the images to turn into backgrounds.
pub fn discover_images(input: &Path) -> Result<Vec<SourceItem>, ScanError> {
    if !input.exists() {
        return Err(ScanError::NotFound(input.to_path_buf()));
    }

    let paths = if input.is_file() {
        if !is_supported_image(input) {
            return Err(ScanError::Unsupported(input.to_path_buf()));
        }
        vec![input.to_path_buf()]
    } else {
        let images: Vec<PathBuf> = direct_images(input)?
            .into_iter()
            .filter(|p| !is_background_output(p))
            .collect();
        if images.is_empty() {
            return Err(ScanError::NoImages(input.to_path_buf()));
        }
        images
    };

    let mut stems: HashMap<String, usize> = HashMap::new();
    for path in &paths {
        *stems.entry(stem_key(path)).or_default() += 1;
    }

    Ok(paths
        .into_iter()
        .zip(1u32..)
        .map(|(path, page)| SourceItem {
            stem_shared: stems.get(&stem_key(&path)).is_some_and(|&n| n > 1),
            path,
            book: String::new(),
            page,
            overrides: PageOverrides::default(),
        })
        .collect())
}

/// Case-folded so `A.png` and `a.jpg` count as a collision on any filesystem.
fn stem_key(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn check_dir(path: &Path) -> Result<(), ScanError> {
    if !path.exists() {
        return Err(ScanError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ScanError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// Folder name, resolving `.` and `..` through the filesystem.
fn dir_name(path: &Path) -> String {
    let named = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());
    named(path)
        .or_else(|| path.canonicalize().ok().as_deref().and_then(named))
        .unwrap_or_else(|| "book".to_string())
}

/// Hidden files, macOS resource forks and our own working folders.
fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || name == "__MACOSX" || name == TEMP_DIR || name == OUTPUT_DIR
}

fn is_background_output(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|s| s.to_string_lossy().contains("_bw_"))
}

fn sort_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Non-ignored entries of a directory, sorted case-insensitively.
fn collect_entries(path: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .filter(|e| !is_ignored(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    entries.sort_by_key(|p| sort_key(p));
    Ok(entries)
}

fn direct_images(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    Ok(collect_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect())
}

/// All images below `dir`, ordered by relative path.
fn book_pages(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_ignored(&e.file_name().to_string_lossy()));

    let mut pages = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            pages.push(entry.into_path());
        }
    }
    pages.sort_by_key(|p| sort_key(p.strip_prefix(dir).unwrap_or(p)));
    Ok(pages)
}
