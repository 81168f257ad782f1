//! End-to-end runs of both flows through the public library API.
//!
//! The XTC encoder is replaced by a fake that records the folders it was
//! handed and writes a stub `.xtc`, so no Python is needed.

use image::{GrayImage, Luma, RgbImage};
use inkpage::config::{InkpageConfig, load_config};
use inkpage::encoder::{EncodeError, XtcEncoder};
use inkpage::imaging::{DitherAlgorithm, SplitAxis};
use inkpage::pipeline::{BwOptions, EncodeOutcome, MangaOptions, run_bw, run_manga};
use inkpage::scan::PageSelection;
use inkpage::scheduler::{CancelToken, ProgressEvent, Scheduler};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct FakeEncoder {
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl XtcEncoder for FakeEncoder {
    fn encode(&self, page_dir: &Path, output: &Path) -> Result<(), EncodeError> {
        let pages = sorted_names(page_dir);
        std::fs::create_dir_all(output.parent().unwrap())?;
        std::fs::write(output, pages.join("\n"))?;
        self.calls
            .lock()
            .unwrap()
            .push((page_dir.to_path_buf(), pages));
        Ok(())
    }
}

fn sorted_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A two-page spread: dark left half, light right half.
fn write_spread(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            image::Rgb([40, 40, 40])
        } else {
            image::Rgb([220, 220, 220])
        }
    });
    img.save(path).unwrap();
}

fn mean(img: &GrayImage) -> f64 {
    img.pixels().map(|p| p.0[0] as f64).sum::<f64>() / (img.width() * img.height()) as f64
}

#[test]
fn manga_spread_becomes_two_device_pages_and_one_book() {
    let tmp = TempDir::new().unwrap();
    write_spread(&tmp.path().join("Vol 1").join("001.png"), 960, 1400);
    write_spread(&tmp.path().join("Vol 1").join("002.png"), 960, 1400);

    let mut config = InkpageConfig::default();
    config.manga.contrast = "0".into();
    let options = MangaOptions::from_config(&config, PageSelection::default()).unwrap();
    let scheduler = Scheduler::new(3).unwrap();
    let encoder = FakeEncoder::default();
    let (tx, rx) = std::sync::mpsc::channel();

    let report = run_manga(tmp.path(), &options, &scheduler, &encoder, Some(tx)).unwrap();
    let events: Vec<ProgressEvent> = rx.iter().collect();

    assert!(!report.has_failures());
    let book = &report.books[0];
    assert_eq!(book.pages.succeeded, 4);
    assert!(matches!(book.encode, EncodeOutcome::Encoded { .. }));

    let calls = encoder.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].1,
        vec!["0001_1l.png", "0001_2r.png", "0002_1l.png", "0002_2r.png"]
    );

    // Left half is the dark one, both halves fill the screen width after rotation
    let left = image::open(tmp.path().join(".temp_png/Vol 1/0001_1l.png"))
        .unwrap()
        .to_luma8();
    let right = image::open(tmp.path().join(".temp_png/Vol 1/0001_2r.png"))
        .unwrap()
        .to_luma8();
    assert_eq!(left.dimensions(), (480, 800));
    assert_eq!(right.dimensions(), (480, 800));
    assert!(left.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    assert!(mean(&left) < mean(&right));

    assert!(tmp.path().join("xtc_output/Vol 1.xtc").exists());
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::BookStarted { pages: 2, .. })));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::BookEncoded { .. })));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::PageWritten { .. }))
            .count(),
        4
    );
}

#[test]
fn manga_settings_from_config_file() {
    let tmp = TempDir::new().unwrap();
    write_spread(&tmp.path().join("B").join("p1.png"), 300, 200);
    std::fs::write(
        tmp.path().join("inkpage.toml"),
        "[manga]\nreading_order = \"right-to-left\"\ndither = \"ordered\"\ncleanup = true\n",
    )
    .unwrap();

    let config = load_config(tmp.path()).unwrap();
    let options = MangaOptions::from_config(&config, PageSelection::default()).unwrap();
    assert_eq!(options.job.dither, DitherAlgorithm::Ordered);
    assert_eq!(options.job.transform.split, Some(SplitAxis::Vertical));

    let encoder = FakeEncoder::default();
    let report = run_manga(
        tmp.path(),
        &options,
        &Scheduler::new(2).unwrap(),
        &encoder,
        None,
    )
    .unwrap();

    assert!(report.cleaned);
    assert!(!tmp.path().join(".temp_png").exists());
    // Right half first for right-to-left reading
    assert_eq!(
        encoder.calls.lock().unwrap()[0].1,
        vec!["0001_1r.png", "0001_2l.png"]
    );
}

#[test]
fn cancelled_run_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    write_spread(&tmp.path().join("B").join("p1.png"), 100, 80);
    let token = CancelToken::new();
    token.cancel();
    let scheduler = Scheduler::new(2).unwrap().with_cancel_token(token);
    let encoder = FakeEncoder::default();
    let options =
        MangaOptions::from_config(&InkpageConfig::default(), PageSelection::default()).unwrap();

    let report = run_manga(tmp.path(), &options, &scheduler, &encoder, None).unwrap();

    assert_eq!(report.books[0].pages.succeeded, 0);
    assert_eq!(report.books[0].pages.skipped, 2);
    assert_eq!(report.books[0].encode, EncodeOutcome::Skipped);
    assert!(encoder.calls.lock().unwrap().is_empty());
    assert!(sorted_names(&tmp.path().join(".temp_png/B")).is_empty());
}

#[test]
fn bw_folder_to_mono_bmps() {
    let tmp = TempDir::new().unwrap();
    let photos = tmp.path().join("photos");
    std::fs::create_dir(&photos).unwrap();
    GrayImage::from_fn(200, 100, |x, _| Luma([(x * 255 / 199) as u8]))
        .save(photos.join("ramp.png"))
        .unwrap();
    write_spread(&photos.join("spread.jpg"), 64, 64);

    let mut config = InkpageConfig::default();
    config.bw.dither = DitherAlgorithm::Rasterize;
    let options = BwOptions::from_config(&config.bw, false, None);
    let summary = run_bw(&photos, &options, &Scheduler::new(2).unwrap(), None).unwrap();

    assert_eq!(summary.succeeded, 2);
    assert!(!summary.has_failures());
    for name in ["ramp_bw_rasterize.bmp", "spread_bw_rasterize.bmp"] {
        let bytes = std::fs::read(photos.join(name)).unwrap();
        // 1 bit per pixel in the BMP header
        assert_eq!(u16::from_le_bytes([bytes[28], bytes[29]]), 1, "{name}");
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (480, 800));
    }
}

#[test]
fn summary_json_is_stable() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("a.png");
    write_spread(&src, 20, 20);
    let options = BwOptions::from_config(&InkpageConfig::default().bw, true, None);
    let summary = run_bw(&src, &options, &Scheduler::new(1).unwrap(), None).unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["jobs"][0]["page"], 1);
    assert_eq!(json["jobs"][0]["outcome"]["status"], "written");
    assert!(
        json["jobs"][0]["outcome"]["output"]
            .as_str()
            .unwrap()
            .ends_with("a_bw_floyd.bmp")
    );
}
