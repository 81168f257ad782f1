//! # inkpage
//!
//! Turns manga/comic pages and ordinary pictures into images the XTEink X4
//! e-reader can show well: 480×800 portrait, grayscale reduced to pure black
//! and white by dithering.
//!
//! # Two Flows
//!
//! ```text
//! manga   books/<book>/*.jpg  →  .temp_png/<book>/NNNN_P.png  →  xtc_output/<book>.xtc
//! bw      photo.jpg           →  photo_bw_floyd.bmp
//! ```
//!
//! - **manga** splits each page into halves (a landscape-held screen shows a
//!   half page at a readable size), rotates them clockwise, fits, dithers and
//!   writes 8-bit PNGs, then hands each book's folder to the external
//!   `png2xtc.py` encoder.
//! - **bw** fits, dithers and writes 1-bit BMPs for the sleep screen.
//!
//! # The Page Pipeline
//!
//! Every page goes through the same steps, parameterized by a
//! [`JobConfig`](imaging::JobConfig):
//!
//! ```text
//! decode → contrast → margin crop → [split → rotate] → resize → dither → pad → write
//! ```
//!
//! Padding happens after dithering, so the border is exactly the fill color
//! and never picks up dither noise.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Raster buffer, dithering engine, page transform, codecs |
//! | [`scheduler`] | Bounded parallel job execution, progress, run summary |
//! | [`writer`] | Atomic page output (`PageSink`) |
//! | [`encoder`] | `png2xtc.py` handoff behind the `XtcEncoder` trait |
//! | [`scan`] | Book/image discovery and page selection |
//! | [`pipeline`] | The `manga` and `bw` flows |
//! | [`naming`] | Deterministic output names and folders |
//! | [`config`] | `inkpage.toml` loading, merging, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Pool, Many Jobs
//!
//! The dithering algorithms are sequential by nature (error diffusion carries
//! state pixel to pixel), so parallelism lives one level up: the
//! [`Scheduler`](scheduler::Scheduler) runs whole page jobs on a fixed-size
//! rayon pool. Each job owns its buffers; only progress counters are shared.
//!
//! ## The Encoder Is a Black Box
//!
//! The XTC container format belongs to `png2xtc.py`. inkpage only prepares
//! the folder of pages and checks that the script produced its output.

pub mod config;
pub mod encoder;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod scan;
pub mod scheduler;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;
