//! In-memory source PDFs for tests.

use crate::error::SnapResult;
use crate::geometry::Rect;
use crate::render::{RegionRenderer, RegionRequest, RenderBackend, RgbImage};
use crate::source::SourceDocument;
use image::Rgb;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::cell::RefCell;
use std::path::Path;

#[derive(Debug, Clone)]
enum AnnotationDef {
    Highlight { rect: [f32; 4], quad_points: Option<Vec<f32>> },
    Other { subtype: &'static str, rect: [f32; 4] },
    /// Written into `/Annots` as-is: a direct dictionary, a dangling reference, null.
    Raw(Object),
}

#[derive(Debug, Clone)]
struct PageDef {
    media_box: Option<[f32; 4]>,
    crop_box: Option<[f32; 4]>,
    annotations: Vec<AnnotationDef>,
    indirect_annots: bool,
}

/// Builds small PDFs with a filled rectangle per page and arbitrary annotations.
///
/// Annotation methods attach to the most recently added page.
#[derive(Debug, Clone, Default)]
pub struct SourcePdfBuilder {
    pages: Vec<PageDef>,
    inherited_media_box: Option<[f32; 4]>,
    encrypt: bool,
}

impl SourcePdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a US Letter page.
    pub fn page(self) -> Self {
        self.page_with_boxes([0.0, 0.0, 612.0, 792.0], None)
    }

    pub fn page_with_boxes(mut self, media_box: [f32; 4], crop_box: Option<[f32; 4]>) -> Self {
        self.pages.push(PageDef {
            media_box: Some(media_box),
            crop_box,
            annotations: Vec::new(),
            indirect_annots: false,
        });
        self
    }

    /// Adds a page without boxes of its own; see [`Self::inherited_media_box`].
    pub fn page_without_boxes(mut self) -> Self {
        self.pages.push(PageDef {
            media_box: None,
            crop_box: None,
            annotations: Vec::new(),
            indirect_annots: false,
        });
        self
    }

    /// Puts a `/MediaBox` on the `/Pages` node for pages to inherit.
    pub fn inherited_media_box(mut self, media_box: [f32; 4]) -> Self {
        self.inherited_media_box = Some(media_box);
        self
    }

    /// Stores the last page's `/Annots` array as an indirect object.
    pub fn indirect_annots(mut self) -> Self {
        self.last_page().indirect_annots = true;
        self
    }

    /// Adds an `/Encrypt` dictionary to the trailer.
    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    /// Adds a highlight whose regions are given as `[llx, lly, urx, ury]` rectangles.
    pub fn highlight(self, rect: [f32; 4], regions: &[[f32; 4]]) -> Self {
        let quad_points = regions
            .iter()
            .flat_map(|[llx, lly, urx, ury]| [*llx, *ury, *urx, *ury, *llx, *lly, *urx, *lly])
            .collect();
        self.raw_highlight(rect, Some(quad_points))
    }

    /// Adds a highlight with verbatim `/QuadPoints` (or none at all).
    pub fn raw_highlight(mut self, rect: [f32; 4], quad_points: Option<Vec<f32>>) -> Self {
        self.last_page().annotations.push(AnnotationDef::Highlight { rect, quad_points });
        self
    }

    pub fn annotation(mut self, subtype: &'static str, rect: [f32; 4]) -> Self {
        self.last_page().annotations.push(AnnotationDef::Other { subtype, rect });
        self
    }

    pub fn raw_annotation(mut self, entry: impl Into<Object>) -> Self {
        self.last_page().annotations.push(AnnotationDef::Raw(entry.into()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(self.pages.len());

        for def in &self.pages {
            let content = Content {
                operations: vec![
                    Operation::new("rg", vec![0.2f32.into(), 0.4f32.into(), 0.8f32.into()]),
                    Operation::new("re", vec![40.into(), 40.into(), 200.into(), 300.into()]),
                    Operation::new("f", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("fixture content should encode"),
            ));

            let annots: Vec<Object> = def
                .annotations
                .iter()
                .map(|annotation| annotation_entry(&mut doc, annotation))
                .collect();

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if let Some(media_box) = def.media_box {
                page.set("MediaBox", numbers(&media_box));
            }
            if let Some(crop_box) = def.crop_box {
                page.set("CropBox", numbers(&crop_box));
            }
            if def.indirect_annots {
                page.set("Annots", doc.add_object(annots));
            } else if !annots.is_empty() {
                page.set("Annots", annots);
            }

            kids.push(doc.add_object(page).into());
        }

        let count = kids.len() as i64;
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        };
        if let Some(media_box) = self.inherited_media_box {
            pages.set("MediaBox", numbers(&media_box));
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if self.encrypt {
            let encrypt_id = doc.add_object(dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
            });
            doc.trailer.set("Encrypt", encrypt_id);
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture should serialize");
        bytes
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }

    fn last_page(&mut self) -> &mut PageDef {
        self.pages.last_mut().expect("add a page before adding annotations")
    }
}

fn numbers(values: &[f32]) -> Vec<Object> {
    values.iter().map(|value| Object::from(*value)).collect()
}

fn annotation_entry(doc: &mut Document, annotation: &AnnotationDef) -> Object {
    let dict = match annotation {
        AnnotationDef::Highlight { rect, quad_points } => {
            let mut dict = dictionary! {
                "Type" => "Annot",
                "Subtype" => "Highlight",
                "Rect" => numbers(rect),
                "C" => numbers(&[1.0, 1.0, 0.0]),
            };
            if let Some(quad_points) = quad_points {
                dict.set("QuadPoints", numbers(quad_points));
            }
            dict
        }
        AnnotationDef::Other { subtype, rect } => dictionary! {
            "Type" => "Annot",
            "Subtype" => *subtype,
            "Rect" => numbers(rect),
        },
        AnnotationDef::Raw(entry) => return entry.clone(),
    };
    doc.add_object(dict).into()
}

/// Backend that records every request and answers with a flat gray raster of the
/// region's pixel size.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    requests: RefCell<Vec<RegionRequest>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RegionRequest> {
        self.requests.borrow().clone()
    }
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn open_session<'a>(
        &'a self,
        _source: &'a SourceDocument,
    ) -> SnapResult<Box<dyn RegionRenderer + 'a>> {
        Ok(Box::new(RecordingSession { backend: self }))
    }
}

struct RecordingSession<'a> {
    backend: &'a RecordingBackend,
}

impl RegionRenderer for RecordingSession<'_> {
    fn render_region(&mut self, request: &RegionRequest) -> SnapResult<RgbImage> {
        self.backend.requests.borrow_mut().push(*request);
        let (width, height) = request.pixel_size();
        Ok(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }
}

/// Region with the given bounds, for building expectations.
pub fn rect(llx: f32, lly: f32, urx: f32, ury: f32) -> Rect {
    Rect { llx, lly, urx, ury }
}

/// What an output page draws, recovered by decoding its content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnPage {
    pub size: (f32, f32),
    pub labels: Vec<String>,
    /// Image placements in drawing order, from each `cm` preceding a `Do`.
    pub images: Vec<Rect>,
    pub lines: Vec<((f32, f32), (f32, f32))>,
    pub xobject_count: usize,
}

pub fn inspect_output(bytes: &[u8]) -> Vec<DrawnPage> {
    let doc = Document::load_mem(bytes).expect("output should parse");

    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let page = doc.get_dictionary(page_id).expect("page dictionary");
            let media_box: Vec<f32> = page
                .get(b"MediaBox")
                .and_then(Object::as_array)
                .expect("page has a MediaBox")
                .iter()
                .map(|value| number(value).expect("numeric MediaBox"))
                .collect();

            let xobject_count = page
                .get(b"Resources")
                .and_then(Object::as_dict)
                .and_then(|resources| resources.get(b"XObject"))
                .and_then(Object::as_dict)
                .map(|xobjects| xobjects.len())
                .unwrap_or(0);

            let content = doc.get_page_content(page_id).expect("page content");
            let operations = Content::decode(&content).expect("content decodes").operations;

            let mut drawn = DrawnPage {
                size: (media_box[2] - media_box[0], media_box[3] - media_box[1]),
                labels: Vec::new(),
                images: Vec::new(),
                lines: Vec::new(),
                xobject_count,
            };
            let mut matrix = [0.0f32; 6];
            let mut start = (0.0, 0.0);

            for operation in operations {
                let operands: Vec<f32> = operation.operands.iter().filter_map(number).collect();
                match operation.operator.as_str() {
                    "cm" if operands.len() == 6 => matrix.copy_from_slice(&operands),
                    "Do" => drawn.images.push(Rect {
                        llx: matrix[4],
                        lly: matrix[5],
                        urx: matrix[4] + matrix[0],
                        ury: matrix[5] + matrix[3],
                    }),
                    "m" if operands.len() == 2 => start = (operands[0], operands[1]),
                    "l" if operands.len() == 2 => {
                        drawn.lines.push((start, (operands[0], operands[1])))
                    }
                    "Tj" => {
                        if let Some(Object::String(text, _)) = operation.operands.first() {
                            drawn.labels.push(String::from_utf8_lossy(text).into_owned());
                        }
                    }
                    _ => {}
                }
            }

            drawn
        })
        .collect()
}

pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}
