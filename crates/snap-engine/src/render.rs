use crate::error::{SnapError, SnapResult};
use crate::geometry::Rect;
use crate::source::SourceDocument;
use image::Rgb;

pub use image::RgbImage;

/// Resolution every snapshot is rendered at.
pub const SNAPSHOT_DPI: f32 = 300.0;

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRequest {
    pub page_index: u32,
    /// Visible box of the source page; raster pixel (0, 0) is its upper-left corner.
    pub page_box: Rect,
    /// Area to render, in the same user space as `page_box`.
    pub region: Rect,
    pub dpi: f32,
}

impl RegionRequest {
    pub fn scale(&self) -> f32 {
        if self.dpi <= 0.0 {
            1.0
        } else {
            self.dpi / POINTS_PER_INCH
        }
    }

    /// Raster size of the region at the requested resolution, never smaller than 1x1.
    pub fn pixel_size(&self) -> (u32, u32) {
        let scale = self.scale();
        let width = (self.region.width() * scale).round().max(1.0) as u32;
        let height = (self.region.height() * scale).round().max(1.0) as u32;
        (width, height)
    }
}

/// Produces render sessions over an opened source document.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    /// Opens a session for one document. Dropping the session releases the
    /// backend's document handle and any cached page rasters.
    fn open_session<'a>(
        &'a self,
        source: &'a SourceDocument,
    ) -> SnapResult<Box<dyn RegionRenderer + 'a>>;
}

pub trait RegionRenderer {
    /// Rasterizes exactly `request.region` of the page. The source page itself is
    /// never modified, so requests may arrive in any order.
    fn render_region(&mut self, request: &RegionRequest) -> SnapResult<RgbImage>;
}

/// Cuts `region` out of a raster of the whole `page_box`.
///
/// The raster may be any resolution; the scale is derived from its size. The crop is
/// clamped to the raster and `None` is returned when nothing of the region remains.
pub fn crop_region(page_raster: &RgbImage, page_box: Rect, region: Rect) -> Option<RgbImage> {
    if page_box.is_empty() || page_raster.width() == 0 || page_raster.height() == 0 {
        return None;
    }

    let scale_x = page_raster.width() as f32 / page_box.width();
    let scale_y = page_raster.height() as f32 / page_box.height();

    let left = ((region.llx - page_box.llx) * scale_x).round();
    let right = ((region.urx - page_box.llx) * scale_x).round();
    // raster rows grow downwards from the top edge of the page box
    let top = ((page_box.ury - region.ury) * scale_y).round();
    let bottom = ((page_box.ury - region.lly) * scale_y).round();

    let left = left.clamp(0.0, page_raster.width() as f32) as u32;
    let right = right.clamp(0.0, page_raster.width() as f32) as u32;
    let top = top.clamp(0.0, page_raster.height() as f32) as u32;
    let bottom = bottom.clamp(0.0, page_raster.height() as f32) as u32;

    if right <= left || bottom <= top {
        return None;
    }

    Some(image::imageops::crop_imm(page_raster, left, top, right - left, bottom - top).to_image())
}

/// Renders blank framed tiles of the right size without touching page content.
///
/// Useful for dry runs and on machines without a PDFium library.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderBackend;

impl RenderBackend for PlaceholderBackend {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn open_session<'a>(
        &'a self,
        _source: &'a SourceDocument,
    ) -> SnapResult<Box<dyn RegionRenderer + 'a>> {
        Ok(Box::new(PlaceholderSession))
    }
}

struct PlaceholderSession;

impl RegionRenderer for PlaceholderSession {
    fn render_region(&mut self, request: &RegionRequest) -> SnapResult<RgbImage> {
        if request.region.is_empty() {
            return Err(SnapError::EmptyRegion { region: request.region.to_string() });
        }

        let (width, height) = request.pixel_size();
        let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        if width >= 4 && height >= 4 {
            let frame = Rgb([220, 220, 220]);
            for x in 0..width {
                image.put_pixel(x, 0, frame);
                image.put_pixel(x, height - 1, frame);
            }
            for y in 0..height {
                image.put_pixel(0, y, frame);
                image.put_pixel(width - 1, y, frame);
            }
        }

        Ok(image)
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;
    use std::cell::OnceCell;
    use std::path::{Path, PathBuf};

    /// Environment variable naming a directory that holds the PDFium shared library.
    pub const PDFIUM_DIR_ENV: &str = "HIGHLIGHT_SNAP_PDFIUM_DIR";

    /// PDFium rasterizer. The library is bound on first use, so constructing the
    /// backend never fails and documents without highlights never need PDFium.
    #[derive(Default)]
    pub struct PdfiumBackend {
        library_dir: Option<PathBuf>,
        pdfium: OnceCell<Pdfium>,
    }

    impl PdfiumBackend {
        /// Reads the library directory from [`PDFIUM_DIR_ENV`], if set.
        pub fn from_env() -> Self {
            Self { library_dir: std::env::var_os(PDFIUM_DIR_ENV).map(PathBuf::from), ..Self::default() }
        }

        fn pdfium(&self) -> SnapResult<&Pdfium> {
            if let Some(pdfium) = self.pdfium.get() {
                return Ok(pdfium);
            }

            let bindings = self.bind()?;
            Ok(self.pdfium.get_or_init(|| Pdfium::new(bindings)))
        }

        /// Search order: configured directory, executable directory, working directory,
        /// system library paths.
        fn bind(&self) -> SnapResult<Box<dyn PdfiumLibraryBindings>> {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|path| path.parent().map(Path::to_path_buf));

            let candidates = self
                .library_dir
                .iter()
                .cloned()
                .chain(exe_dir)
                .chain(std::iter::once(PathBuf::from("./")));

            for dir in candidates {
                if let Ok(bindings) =
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                {
                    tracing::debug!(dir = %dir.display(), "bound pdfium library");
                    return Ok(bindings);
                }
            }

            Pdfium::bind_to_system_library().map_err(|err| {
                SnapError::Backend(format!("failed to bind pdfium library: {err}"))
            })
        }
    }

    impl RenderBackend for PdfiumBackend {
        fn name(&self) -> &'static str {
            "pdfium"
        }

        fn open_session<'a>(
            &'a self,
            source: &'a SourceDocument,
        ) -> SnapResult<Box<dyn RegionRenderer + 'a>> {
            let document = self
                .pdfium()?
                .load_pdf_from_byte_slice(source.bytes(), None)
                .map_err(|err| SnapError::Backend(format!("pdfium failed to load document: {err}")))?;

            Ok(Box::new(PdfiumSession { document, cached: None }))
        }
    }

    struct CachedPage {
        page_index: u32,
        dpi: f32,
        raster: RgbImage,
    }

    struct PdfiumSession<'a> {
        document: PdfDocument<'a>,
        cached: Option<CachedPage>,
    }

    impl PdfiumSession<'_> {
        fn page_raster(&mut self, page_index: u32, dpi: f32) -> SnapResult<&RgbImage> {
            let hit = matches!(
                &self.cached,
                Some(cached) if cached.page_index == page_index && cached.dpi == dpi
            );

            if !hit {
                let raster = self.render_page(page_index, dpi)?;
                self.cached = Some(CachedPage { page_index, dpi, raster });
            }

            match &self.cached {
                Some(cached) => Ok(&cached.raster),
                None => Err(SnapError::Backend("page raster cache is empty".to_owned())),
            }
        }

        fn render_page(&self, page_index: u32, dpi: f32) -> SnapResult<RgbImage> {
            let page_count = self.document.pages().len() as u32;
            if page_index >= page_count {
                return Err(SnapError::PageOutOfRange { page: page_index, page_count });
            }

            let page = self
                .document
                .pages()
                .get(page_index as u16)
                .map_err(|err| SnapError::Backend(format!("pdfium page {page_index}: {err}")))?;

            let config = PdfRenderConfig::new()
                .scale_page_by_factor(dpi / POINTS_PER_INCH)
                .render_annotations(true)
                .render_form_data(true);

            let bitmap = page
                .render_with_config(&config)
                .map_err(|err| SnapError::Backend(format!("pdfium render failed: {err}")))?;

            let width = bitmap.width().max(0) as u32;
            let height = bitmap.height().max(0) as u32;
            let rgba = image::RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
                .ok_or_else(|| SnapError::Backend("pdfium bitmap has unexpected size".to_owned()))?;

            tracing::debug!(page = page_index + 1, width, height, "rendered page raster");

            Ok(image::DynamicImage::ImageRgba8(rgba).to_rgb8())
        }
    }

    impl RegionRenderer for PdfiumSession<'_> {
        fn render_region(&mut self, request: &RegionRequest) -> SnapResult<RgbImage> {
            let raster = self.page_raster(request.page_index, request.dpi)?;

            crop_region(raster, request.page_box, request.region)
                .ok_or_else(|| SnapError::EmptyRegion { region: request.region.to_string() })
        }
    }
}
