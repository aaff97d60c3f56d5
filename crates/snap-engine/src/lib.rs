//! Highlight snapshot engine
//!
//! Finds text-highlight annotations in a PDF and assembles a compact PDF holding
//! a rendered snapshot of every highlighted line, one output page per source page.

pub mod compositor;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod scanner;
pub mod source;

pub use compositor::{compose_page, plan_page, BandPlan, MarkerLine, PagePlan, SnapshotPlacement};
pub use error::{SnapError, SnapResult, Stage, StageError};
pub use geometry::{PageSize, QuadRegion, Rect};
pub use output::{OutputDocument, OutputPage};
pub use pipeline::{extract_file, ExtractReport, Extractor};
#[cfg(feature = "pdfium")]
pub use render::pdfium_backend::PdfiumBackend;
pub use render::{
    crop_region, PlaceholderBackend, RegionRenderer, RegionRequest, RenderBackend, RgbImage,
    SNAPSHOT_DPI,
};
pub use scanner::{scan_page, Layout, PageScan};
pub use source::{Annotation, HighlightMarkup, OpenSource, SourceDocument, SourcePage};
