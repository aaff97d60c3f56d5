//! Highlight discovery and output page sizing.

use crate::geometry::{PageSize, Rect};
use crate::source::{HighlightMarkup, SourcePage};

/// Vertical gap added below every highlight band.
pub const HIGHLIGHT_GAP: f32 = 5.0;
/// Room kept at the bottom of each output page for the page label.
pub const LABEL_MARGIN: f32 = 20.0;
/// Extra width so the widest snapshot is never clipped at the right edge.
pub const WIDTH_PADDING: f32 = 1.0;

/// Height of the band a highlight occupies on the output page.
///
/// Page sizing and band placement must both go through this, or pages come out
/// too short or too tall for their content.
pub fn band_height(highlight: &HighlightMarkup) -> f32 {
    highlight.rect.height() + HIGHLIGHT_GAP
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Layout {
    /// Sum of all band heights.
    pub total_height: f32,
    /// Widest highlight bounding rectangle.
    pub max_width: f32,
}

impl Layout {
    pub fn page_size(&self) -> PageSize {
        PageSize {
            width_pt: self.max_width + WIDTH_PADDING,
            height_pt: self.total_height + LABEL_MARGIN,
        }
    }
}

/// Highlights of one source page, in `/Annots` order, with the layout they need.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan<'a> {
    pub page_index: u32,
    /// Visible area of the source page, used to map regions onto its raster.
    pub page_box: Rect,
    pub highlights: Vec<&'a HighlightMarkup>,
    pub layout: Layout,
}

impl PageScan<'_> {
    /// Pages without highlights get no output page at all.
    pub fn has_highlights(&self) -> bool {
        !self.highlights.is_empty()
    }

    pub fn page_number(&self) -> u32 {
        self.page_index + 1
    }
}

pub fn scan_page(page: &SourcePage) -> PageScan<'_> {
    let mut layout = Layout::default();
    let mut highlights = Vec::new();

    for highlight in page.annotations.iter().filter_map(|annotation| annotation.as_highlight()) {
        layout.total_height += band_height(highlight);
        layout.max_width = layout.max_width.max(highlight.rect.width());
        highlights.push(highlight);
    }

    tracing::trace!(
        page = page.number(),
        highlights = highlights.len(),
        ignored = page.annotations.len() - highlights.len(),
        "scanned page"
    );

    PageScan { page_index: page.index, page_box: page.page_box, highlights, layout }
}
