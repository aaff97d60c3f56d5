//! Lays highlight snapshots out on output pages and draws them.
//!
//! Layout happens in two steps. [`plan_page`] turns a [`PageScan`] into pure geometry:
//! one band per highlight, stacked from the top of the page down in annotation
//! order, with every quad region's target rectangle inside its band. [`compose_page`]
//! then renders each region through a [`RegionRenderer`] and paints the page.
//!
//! Within a band the regions are stacked upwards from the band's bottom edge by a
//! running `remaining` height that starts at the highlight's `/Rect` height, so a
//! multi-line highlight is reassembled line by line in its original shape.

use crate::error::{Stage, StageError};
use crate::geometry::{PageSize, Rect};
use crate::output::{OutputDocument, OutputPage};
use crate::render::{RegionRenderer, RegionRequest, SNAPSHOT_DPI};
use crate::scanner::{band_height, PageScan, LABEL_MARGIN};
use std::fmt;

/// Baseline of the "Page: N" label.
pub const LABEL_BASELINE: f32 = 5.0;
pub const MARKER_LENGTH: f32 = 30.0;
/// How far below a band's bottom edge its marker line sits.
pub const MARKER_DROP: f32 = 3.0;
pub const MARKER_COLOR: [f32; 3] = [1.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotPlacement {
    /// Quad region on the source page.
    pub source: Rect,
    /// Where the rendered region is painted on the output page.
    pub target: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerLine {
    pub from: (f32, f32),
    pub to: (f32, f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandPlan {
    pub top: f32,
    pub bottom: f32,
    pub snapshots: Vec<SnapshotPlacement>,
    pub marker: MarkerLine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub page_index: u32,
    pub page_box: Rect,
    pub size: PageSize,
    pub label: String,
    pub bands: Vec<BandPlan>,
}

impl PagePlan {
    pub fn page_number(&self) -> u32 {
        self.page_index + 1
    }

    pub fn snapshot_count(&self) -> usize {
        self.bands.iter().map(|band| band.snapshots.len()).sum()
    }
}

impl fmt::Display for PagePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "page {} ({} x {}) label {:?}",
            self.page_number(),
            self.size.width_pt,
            self.size.height_pt,
            self.label
        )?;
        for band in &self.bands {
            writeln!(f, "band {}..{}", band.top, band.bottom)?;
            for snapshot in &band.snapshots {
                writeln!(f, "  snapshot {} -> {}", snapshot.source, snapshot.target)?;
            }
            writeln!(
                f,
                "  marker {},{} -> {},{}",
                band.marker.from.0, band.marker.from.1, band.marker.to.0, band.marker.to.1
            )?;
        }
        Ok(())
    }
}

/// Computes the output page geometry for a scanned page.
///
/// `scan.highlights` must already be in the order the bands should appear, top
/// first; [`crate::scanner::scan_page`] yields them in `/Annots` order.
pub fn plan_page(scan: &PageScan<'_>) -> PagePlan {
    let size = scan.layout.page_size();
    let mut cursor = scan.layout.total_height + LABEL_MARGIN;
    let mut bands = Vec::with_capacity(scan.highlights.len());

    for highlight in &scan.highlights {
        let top = cursor;
        cursor -= band_height(highlight);

        let mut remaining = highlight.rect.height();
        let mut snapshots = Vec::with_capacity(highlight.regions.len());
        for region in &highlight.regions {
            remaining -= region.height();
            if region.bounds.is_empty() {
                tracing::debug!(page = scan.page_number(), region = %region.bounds, "skipping degenerate quad");
                continue;
            }

            let llx = region.bounds.llx - highlight.rect.llx;
            let lly = cursor + remaining;
            snapshots.push(SnapshotPlacement {
                source: region.bounds,
                target: Rect { llx, lly, urx: llx + region.width(), ury: lly + region.height() },
            });
        }

        let marker_y = cursor - MARKER_DROP;
        bands.push(BandPlan {
            top,
            bottom: cursor,
            snapshots,
            marker: MarkerLine { from: (0.0, marker_y), to: (MARKER_LENGTH, marker_y) },
        });
    }

    PagePlan {
        page_index: scan.page_index,
        page_box: scan.page_box,
        size,
        label: format!("Page: {}", scan.page_number()),
        bands,
    }
}

/// Renders and draws every band of `plan` onto a new output page.
///
/// The page is only added to `output` once every snapshot has been drawn; on error
/// `output` is left untouched. Returns the number of snapshots embedded.
pub fn compose_page(
    output: &mut OutputDocument,
    plan: &PagePlan,
    renderer: &mut (dyn RegionRenderer + '_),
) -> Result<usize, StageError> {
    let page_number = plan.page_number();
    let mut page = OutputPage::new(plan.size);
    page.draw_label(&plan.label, 0.0, LABEL_BASELINE);

    for band in &plan.bands {
        for snapshot in &band.snapshots {
            let request = RegionRequest {
                page_index: plan.page_index,
                page_box: plan.page_box,
                region: snapshot.source,
                dpi: SNAPSHOT_DPI,
            };
            let raster = renderer
                .render_region(&request)
                .map_err(|err| StageError::on_page(Stage::Crop, page_number, err))?;

            tracing::trace!(
                page = page_number,
                width = raster.width(),
                height = raster.height(),
                target = %snapshot.target,
                "placing snapshot"
            );

            page.draw_image(&raster, snapshot.target)
                .map_err(|err| StageError::on_page(Stage::Compose, page_number, err))?;
        }
        page.draw_line(band.marker.from, band.marker.to, MARKER_COLOR);
    }

    let snapshots = page.image_count();
    output
        .add_page(page)
        .map_err(|err| StageError::on_page(Stage::Compose, page_number, err))?;

    Ok(snapshots)
}
