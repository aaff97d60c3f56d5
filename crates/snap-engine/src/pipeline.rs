//! One input file end to end: open, scan, crop, compose, save.

use crate::compositor::{compose_page, plan_page};
use crate::error::{Stage, StageError};
use crate::output::OutputDocument;
use crate::render::{RegionRenderer, RenderBackend};
use crate::scanner::scan_page;
use crate::source::{OpenSource, SourceDocument};
use std::path::Path;

/// Outcome of extracting one file.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub pages_scanned: u32,
    pub pages_written: u32,
    pub highlights: usize,
    pub snapshots: usize,
    /// Page-scoped failures; each of these pages was left out of the output.
    pub failed_pages: Vec<StageError>,
}

impl ExtractReport {
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }
}

pub struct Extractor<'b> {
    backend: &'b dyn RenderBackend,
}

impl<'b> Extractor<'b> {
    pub fn new(backend: &'b dyn RenderBackend) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Builds the snapshot document for `source`.
    ///
    /// Only file-scoped failures are returned as `Err`; failed pages are skipped and
    /// listed in the report.
    pub fn extract(
        &self,
        source: &SourceDocument,
    ) -> Result<(OutputDocument, ExtractReport), StageError> {
        let mut output = OutputDocument::new();
        let mut report = ExtractReport::default();
        let mut session: Option<Box<dyn RegionRenderer + '_>> = None;

        for index in 0..source.page_count() {
            report.pages_scanned += 1;
            let page = match source.page(index) {
                Ok(page) => page,
                Err(err) => {
                    record_page_failure(
                        &mut report,
                        StageError::on_page(Stage::Scan, index + 1, err),
                    )?;
                    continue;
                }
            };

            let scan = scan_page(&page);
            if !scan.has_highlights() {
                tracing::debug!(page = page.number(), "no highlights");
                continue;
            }

            if session.is_none() {
                tracing::debug!(backend = self.backend.name(), "opening render session");
                let opened = self
                    .backend
                    .open_session(source)
                    .map_err(|err| StageError::new(Stage::Open, err))?;
                session = Some(opened);
            }
            let Some(renderer) = session.as_deref_mut() else {
                continue;
            };

            let plan = plan_page(&scan);
            tracing::debug!(
                page = plan.page_number(),
                highlights = scan.highlights.len(),
                width = plan.size.width_pt,
                height = plan.size.height_pt,
                "composing page"
            );

            match compose_page(&mut output, &plan, renderer) {
                Ok(snapshots) => {
                    report.pages_written += 1;
                    report.highlights += scan.highlights.len();
                    report.snapshots += snapshots;
                }
                Err(err) => record_page_failure(&mut report, err)?,
            }
        }

        Ok((output, report))
    }

    /// Reads `input`, extracts it and writes the result to `output`.
    ///
    /// Nothing is written when opening fails. The output is saved even if every
    /// page failed.
    pub fn extract_file(&self, input: &Path, output: &Path) -> Result<ExtractReport, StageError> {
        let source = SourceDocument::open(OpenSource::from(input))
            .map_err(|err| StageError::new(Stage::Open, err))?;

        let (mut document, report) = self.extract(&source)?;
        document.save(output).map_err(|err| StageError::new(Stage::Save, err))?;

        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            pages_scanned = report.pages_scanned,
            pages_written = report.pages_written,
            highlights = report.highlights,
            snapshots = report.snapshots,
            failed_pages = report.failed_pages.len(),
            "extracted highlights"
        );

        Ok(report)
    }
}

/// Convenience wrapper over [`Extractor::extract_file`].
pub fn extract_file(
    input: &Path,
    output: &Path,
    backend: &dyn RenderBackend,
) -> Result<ExtractReport, StageError> {
    Extractor::new(backend).extract_file(input, output)
}

/// Records a page-scoped failure; failures of file-scoped stages are handed back.
fn record_page_failure(report: &mut ExtractReport, err: StageError) -> Result<(), StageError> {
    if err.stage.is_fatal() {
        return Err(err);
    }

    tracing::warn!(error = %err, cause = %err.source, "skipping page");
    report.failed_pages.push(err);
    Ok(())
}
