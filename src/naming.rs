//! Deterministic output names.
//!
//! Every output path is a pure function of its source, so re-running over the
//! same input overwrites the same files instead of accumulating new ones.
//!
//! ## Layout
//!
//! ```text
//! <input>/
//! ├── Vol 1/                     # book: page images
//! ├── .temp_png/
//! │   └── Vol 1/
//! │       ├── 0001_0.png         # page 1, unsplit
//! │       ├── 0002_1l.png        # page 2, first half (left)
//! │       └── 0002_2r.png        # page 2, second half (right)
//! └── xtc_output/
//!     └── Vol 1.xtc
//!
//! photo.jpg → photo_bw_floyd.bmp  # background pipeline
//! a.png, a.jpg → a_png_bw_floyd.bmp, a_jpg_bw_floyd.bmp
//! ```

use crate::imaging::{DitherAlgorithm, PagePart};
use std::path::{Path, PathBuf};

/// Scratch folder for rendered manga pages, under the input directory.
pub const TEMP_DIR: &str = ".temp_png";
/// Folder for encoded books, under the input directory.
pub const OUTPUT_DIR: &str = "xtc_output";

/// `<page:04>_<part>.png`; part `0` is an unsplit page, otherwise `<seq><side>`.
///
/// - `(7, None)` → `"0007_0.png"`
/// - `(7, Some(1r))` → `"0007_1r.png"`
pub fn page_file_name(page: u32, part: Option<PagePart>) -> String {
    match part {
        Some(part) => format!("{page:04}_{part}.png"),
        None => format!("{page:04}_0.png"),
    }
}

/// `<stem>_bw_<algorithm>.bmp`, or `<stem>_<ext>_bw_<algorithm>.bmp` when
/// another source in the run has the same stem.
pub fn background_file_name(source: &Path, algorithm: DitherAlgorithm, stem_shared: bool) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|_| stem_shared);
    match ext {
        Some(ext) => format!("{stem}_{ext}_bw_{algorithm}.bmp"),
        None => format!("{stem}_bw_{algorithm}.bmp"),
    }
}

/// Directory receiving the rendered pages of `book`.
pub fn book_page_dir(input_root: &Path, book: &str) -> PathBuf {
    input_root.join(TEMP_DIR).join(book)
}

/// Encoded output path for `book`.
pub fn book_output_path(input_root: &Path, book: &str) -> PathBuf {
    input_root.join(OUTPUT_DIR).join(format!("{book}.xtc"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Side;

    #[test]
    fn unsplit_page_name() {
        assert_eq!(page_file_name(7, None), "0007_0.png");
        assert_eq!(page_file_name(12345, None), "12345_0.png");
    }

    #[test]
    fn split_page_names() {
        let right = PagePart {
            seq: 1,
            side: Side::Right,
        };
        let left = PagePart {
            seq: 2,
            side: Side::Left,
        };
        assert_eq!(page_file_name(7, Some(right)), "0007_1r.png");
        assert_eq!(page_file_name(7, Some(left)), "0007_2l.png");
        let bottom = PagePart {
            seq: 2,
            side: Side::Bottom,
        };
        assert_eq!(page_file_name(1, Some(bottom)), "0001_2b.png");
    }

    #[test]
    fn page_names_sort_in_reading_order() {
        let mut names = vec![
            page_file_name(10, None),
            page_file_name(2, Some(PagePart { seq: 2, side: Side::Left })),
            page_file_name(2, Some(PagePart { seq: 1, side: Side::Right })),
            page_file_name(1, None),
        ];
        names.sort();
        assert_eq!(names, vec!["0001_0.png", "0002_1r.png", "0002_2l.png", "0010_0.png"]);
    }

    #[test]
    fn background_name_uses_stem_and_algorithm() {
        assert_eq!(
            background_file_name(Path::new("/photos/Sunset.Beach.JPG"), DitherAlgorithm::Floyd, false),
            "Sunset.Beach_bw_floyd.bmp"
        );
        assert_eq!(
            background_file_name(Path::new("cat.png"), DitherAlgorithm::None, false),
            "cat_bw_none.bmp"
        );
    }

    #[test]
    fn shared_stem_adds_extension() {
        let png = background_file_name(Path::new("a.png"), DitherAlgorithm::Floyd, true);
        let jpg = background_file_name(Path::new("a.JPG"), DitherAlgorithm::Floyd, true);
        assert_eq!(png, "a_png_bw_floyd.bmp");
        assert_eq!(jpg, "a_jpg_bw_floyd.bmp");
    }

    #[test]
    fn book_paths() {
        let root = Path::new("/manga");
        assert_eq!(
            book_page_dir(root, "Vol 1"),
            PathBuf::from("/manga/.temp_png/Vol 1")
        );
        assert_eq!(
            book_output_path(root, "Vol 1"),
            PathBuf::from("/manga/xtc_output/Vol 1.xtc")
        );
    }
}
