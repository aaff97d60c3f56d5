use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum SnapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("malformed annotation on page {page}: {reason}")]
    MalformedAnnotation { page: u32, reason: String },
    #[error("malformed PDF object: {reason}")]
    MalformedObject { reason: String },
    #[error("region {region} lies outside the rendered page")]
    EmptyRegion { region: String },
    #[error("backend error: {0}")]
    Backend(String),
}

/// The pipeline step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Open,
    Scan,
    Crop,
    Compose,
    Save,
}

impl Stage {
    /// Whether a failure in this stage discards the whole file rather than a single page.
    pub fn is_fatal(self) -> bool {
        matches!(self, Stage::Open | Stage::Save)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Open => "open",
            Stage::Scan => "scan",
            Stage::Crop => "crop",
            Stage::Compose => "compose",
            Stage::Save => "save",
        };
        f.write_str(name)
    }
}

/// A [`SnapError`] tagged with the stage and, for page-scoped stages, the 1-based page number.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed{}", .page.map(|page| format!(" on page {page}")).unwrap_or_default())]
pub struct StageError {
    pub stage: Stage,
    pub page: Option<u32>,
    #[source]
    pub source: SnapError,
}

impl StageError {
    pub fn new(stage: Stage, source: SnapError) -> Self {
        Self { stage, page: None, source }
    }

    pub fn on_page(stage: Stage, page: u32, source: SnapError) -> Self {
        Self { stage, page: Some(page), source }
    }
}

pub type SnapResult<T> = Result<T, SnapError>;
