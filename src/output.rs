//! CLI output formatting for both flows.
//!
//! # Output Format
//!
//! ## Manga
//!
//! ```text
//! Vol 1 (3 pages)
//!     [  1/6] 001 1l → 0001_1l.png  ETA 0:04
//!     [  2/6] 001 2r → 0001_2r.png  ETA 0:03
//!     [  3/5] FAILED decode error on Vol 1/002.jpg: ...
//!     ...
//!     Encoded → xtc_output/Vol 1.xtc
//!
//! Vol 1: 4 written, 1 failed, 0 skipped in 2.1s, encoded
//! ```
//!
//! ## Background
//!
//! ```text
//!     [  1/2] 001 → cat_bw_floyd.bmp  ETA 0:01
//!     [  2/2] 002 → dog_bw_floyd.bmp
//!
//! 2 written, 0 failed, 0 skipped in 0.8s
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::pipeline::{EncodeOutcome, MangaReport};
use crate::scheduler::{ProgressEvent, RunSummary};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based page number as 3-digit zero-padded.
fn format_index(pos: u32) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// `[finished/total]` with the counter padded to the width of the total.
fn counter(finished: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("[{finished:>width$}/{total}]")
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_progress_event(event: &ProgressEvent) -> Vec<String> {
    match event {
        ProgressEvent::BookStarted { name, pages } => {
            let noun = if *pages == 1 { "page" } else { "pages" };
            vec![format!("{name} ({pages} {noun})")]
        }
        ProgressEvent::PageWritten {
            page,
            part,
            output,
            finished,
            total,
            eta,
        } => {
            let label = match part {
                Some(part) => format!("{} {part}", format_index(*page)),
                None => format_index(*page),
            };
            let mut line = format!(
                "{}{} {label} → {}",
                indent(1),
                counter(*finished, *total),
                file_name(output)
            );
            if let Some(eta) = (*eta).filter(|_| finished < total) {
                line.push_str(&format!("  ETA {}", format_duration(eta)));
            }
            vec![line]
        }
        ProgressEvent::PageFailed {
            error,
            finished,
            total,
        } => vec![format!(
            "{}{} FAILED {}",
            indent(1),
            counter(*finished, *total),
            error
        )],
        ProgressEvent::BookEncoded { output, .. } => {
            vec![format!("{}Encoded → {}", indent(1), output.display())]
        }
        ProgressEvent::BookFailed { message, .. } => {
            vec![format!("{}Encoding FAILED: {message}", indent(1))]
        }
    }
}

// ============================================================================
// Summaries
// ============================================================================

fn counts_line(summary: &RunSummary) -> String {
    format!(
        "{} written, {} failed, {} skipped in {:.1}s",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.elapsed_ms as f64 / 1000.0
    )
}

/// Format a background run summary, listing every failure.
pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![counts_line(summary)];
    lines.extend(summary.failures().map(|e| format!("{}{e}", indent(1))));
    lines
}

/// Format the per-book results of a manga run.
pub fn format_manga_report(report: &MangaReport) -> Vec<String> {
    let mut lines = Vec::new();
    for book in &report.books {
        let encode = match &book.encode {
            EncodeOutcome::Encoded { .. } => "encoded".to_string(),
            EncodeOutcome::Failed(e) => format!("encoding failed: {}", e.message),
            EncodeOutcome::Skipped => "not encoded".to_string(),
        };
        lines.push(format!("{}: {}, {encode}", book.name, counts_line(&book.pages)));
        lines.extend(book.pages.failures().map(|e| format!("{}{e}", indent(1))));
    }
    let encoded = report.encoded().count();
    lines.push(format!("{encoded} of {} books encoded", report.books.len()));
    if report.cleaned {
        lines.push("Temporary pages removed".to_string());
    }
    lines
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}

pub fn print_manga_report(report: &MangaReport) {
    for line in format_manga_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{DitherAlgorithm, PagePart, Side};
    use crate::pipeline::BookReport;
    use crate::scheduler::{JobError, JobErrorKind, JobOutcome, JobRecord};
    use std::path::PathBuf;

    fn decode_error() -> JobError {
        JobError {
            kind: JobErrorKind::Decode,
            message: "bad header".into(),
            path: PathBuf::from("Vol 1/002.jpg"),
            part: None,
            algorithm: DitherAlgorithm::Floyd,
        }
    }

    fn summary(written: usize, failed: bool) -> RunSummary {
        let mut jobs: Vec<JobRecord> = (1..=written as u32)
            .map(|page| JobRecord {
                source: PathBuf::from(format!("{page}.png")),
                page,
                part: None,
                outcome: JobOutcome::Written {
                    output: PathBuf::from(format!("{page:04}_0.png")),
                    elapsed_ms: 10,
                },
            })
            .collect();
        if failed {
            jobs.push(JobRecord {
                source: PathBuf::from("Vol 1/002.jpg"),
                page: 99,
                part: None,
                outcome: JobOutcome::Failed(decode_error()),
            });
        }
        RunSummary::from_records(jobs, Duration::from_millis(2140))
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn duration_formats() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
    }

    #[test]
    fn counter_pads_to_total_width() {
        assert_eq!(counter(1, 6), "[  1/6]");
        assert_eq!(counter(42, 1200), "[  42/1200]");
    }

    // =========================================================================
    // Progress events
    // =========================================================================

    #[test]
    fn book_started_line() {
        let lines = format_progress_event(&ProgressEvent::BookStarted {
            name: "Vol 1".into(),
            pages: 1,
        });
        assert_eq!(lines, vec!["Vol 1 (1 page)"]);
    }

    #[test]
    fn page_written_with_part_and_eta() {
        let lines = format_progress_event(&ProgressEvent::PageWritten {
            page: 1,
            part: Some(PagePart {
                seq: 1,
                side: Side::Left,
            }),
            output: PathBuf::from("/x/.temp_png/Vol 1/0001_1l.png"),
            finished: 1,
            total: 6,
            eta: Some(Duration::from_secs(4)),
        });
        assert_eq!(lines, vec!["    [  1/6] 001 1l → 0001_1l.png  ETA 0:04"]);
    }

    #[test]
    fn last_page_has_no_eta() {
        let lines = format_progress_event(&ProgressEvent::PageWritten {
            page: 2,
            part: None,
            output: PathBuf::from("dog_bw_floyd.bmp"),
            finished: 2,
            total: 2,
            eta: Some(Duration::ZERO),
        });
        assert_eq!(lines, vec!["    [  2/2] 002 → dog_bw_floyd.bmp"]);
    }

    #[test]
    fn page_failed_line_names_source() {
        let lines = format_progress_event(&ProgressEvent::PageFailed {
            error: decode_error(),
            finished: 3,
            total: 5,
        });
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("    [  3/5] FAILED decode error on Vol 1/002.jpg"));
        assert!(lines[0].ends_with("bad header"));
    }

    #[test]
    fn book_encode_lines() {
        let ok = format_progress_event(&ProgressEvent::BookEncoded {
            name: "B".into(),
            output: PathBuf::from("xtc_output/B.xtc"),
        });
        assert_eq!(ok, vec!["    Encoded → xtc_output/B.xtc"]);
        let failed = format_progress_event(&ProgressEvent::BookFailed {
            name: "B".into(),
            message: "timed out".into(),
        });
        assert_eq!(failed, vec!["    Encoding FAILED: timed out"]);
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    #[test]
    fn run_summary_lists_failures() {
        let lines = format_run_summary(&summary(2, true));
        assert_eq!(lines[0], "2 written, 1 failed, 0 skipped in 2.1s");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("bad header"));
    }

    #[test]
    fn manga_report_per_book() {
        let report = MangaReport {
            books: vec![
                BookReport {
                    name: "A".into(),
                    pages: summary(4, false),
                    encode: EncodeOutcome::Encoded {
                        output: PathBuf::from("xtc_output/A.xtc"),
                    },
                },
                BookReport {
                    name: "B".into(),
                    pages: summary(1, true),
                    encode: EncodeOutcome::Failed(JobError {
                        kind: JobErrorKind::EncodingHandoff,
                        message: "exit 1".into(),
                        ..decode_error()
                    }),
                },
            ],
            cleaned: false,
        };
        let lines = format_manga_report(&report);
        assert_eq!(lines[0], "A: 4 written, 0 failed, 0 skipped in 2.1s, encoded");
        assert_eq!(
            lines[1],
            "B: 1 written, 1 failed, 0 skipped in 2.1s, encoding failed: exit 1"
        );
        assert!(lines[2].contains("bad header"));
        assert_eq!(lines.last().unwrap(), "1 of 2 books encoded");
    }

    #[test]
    fn manga_report_mentions_cleanup() {
        let report = MangaReport {
            books: vec![],
            cleaned: true,
        };
        assert_eq!(
            format_manga_report(&report),
            vec!["0 of 0 books encoded", "Temporary pages removed"]
        );
    }
}
