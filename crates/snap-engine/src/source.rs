//! Read-only view of an input PDF: pages, page boxes and their annotations.

use crate::error::{SnapError, SnapResult};
use crate::geometry::{PageSize, QuadRegion, Rect};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::fs;
use std::path::{Path, PathBuf};

/// Guards `/Parent` walks and reference chains against cycles in broken files.
const MAX_INDIRECTION_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A text-highlight markup annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightMarkup {
    /// The annotation's `/Rect`, which may include inter-line gaps the regions do not cover.
    pub rect: Rect,
    /// Quad regions in authored order, typically one per highlighted line.
    pub regions: Vec<QuadRegion>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Highlight(HighlightMarkup),
    /// Any other annotation; kept only so callers can report what was skipped.
    Ignored { subtype: Option<String> },
}

impl Annotation {
    pub fn as_highlight(&self) -> Option<&HighlightMarkup> {
        match self {
            Annotation::Highlight(markup) => Some(markup),
            Annotation::Ignored { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    /// 0-based index into the document's page tree.
    pub index: u32,
    /// Visible page area (CropBox, else MediaBox) in user space.
    pub page_box: Rect,
    /// Annotations in `/Annots` order, which is the order they were authored in.
    pub annotations: Vec<Annotation>,
}

impl SourcePage {
    /// 1-based page number as printed on output pages.
    pub fn number(&self) -> u32 {
        self.index + 1
    }
}

pub struct SourceDocument {
    bytes: Vec<u8>,
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl SourceDocument {
    pub fn open(source: OpenSource) -> SnapResult<Self> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let doc = match Document::load_mem(&bytes) {
            Ok(doc) => doc,
            Err(_) if contains_encrypt_marker(&bytes) => {
                return Err(SnapError::EncryptedUnsupported)
            }
            Err(err) => return Err(err.into()),
        };

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(SnapError::EncryptedUnsupported);
        }

        let page_ids = doc.get_pages().into_values().collect();

        Ok(Self { bytes, doc, page_ids })
    }

    /// Raw file bytes, handed to rasterizers that parse the document themselves.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    pub fn page(&self, index: u32) -> SnapResult<SourcePage> {
        let page_id = *self
            .page_ids
            .get(index as usize)
            .ok_or(SnapError::PageOutOfRange { page: index, page_count: self.page_count() })?;

        let page_box = self.page_box(page_id);
        let annotations = self.annotations(page_id, index + 1)?;

        Ok(SourcePage { index, page_box, annotations })
    }

    fn page_box(&self, page_id: ObjectId) -> Rect {
        [b"CropBox".as_slice(), b"MediaBox".as_slice()]
            .iter()
            .find_map(|key| {
                let values = self.numbers(self.inherited(page_id, key)?)?;
                Rect::from_pdf_array(&values)
            })
            .unwrap_or(Rect {
                llx: 0.0,
                lly: 0.0,
                urx: PageSize::US_LETTER.width_pt,
                ury: PageSize::US_LETTER.height_pt,
            })
    }

    fn annotations(&self, page_id: ObjectId, page: u32) -> SnapResult<Vec<Annotation>> {
        let page_dict = self.doc.get_dictionary(page_id)?;
        let entries = match page_dict.get(b"Annots") {
            Ok(annots) => match self.resolve(annots)? {
                Object::Array(entries) => entries,
                _ => {
                    return Err(SnapError::MalformedAnnotation {
                        page,
                        reason: "/Annots is not an array".to_owned(),
                    })
                }
            },
            Err(_) => return Ok(Vec::new()),
        };

        let mut annotations = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.resolve(entry) {
                Ok(Object::Dictionary(dict)) => annotations.push(self.classify(dict, page)?),
                // null and non-dictionary entries carry no annotation
                Ok(_) => annotations.push(Annotation::Ignored { subtype: None }),
                // dangling references
                Err(err) => {
                    tracing::debug!(page, error = %err, "unresolvable /Annots entry");
                    annotations.push(Annotation::Ignored { subtype: None });
                }
            }
        }

        Ok(annotations)
    }

    fn classify(&self, dict: &Dictionary, page: u32) -> SnapResult<Annotation> {
        let subtype = dict.get(b"Subtype").ok().and_then(|object| self.name(object));
        if subtype != Some(b"Highlight".as_slice()) {
            return Ok(Annotation::Ignored {
                subtype: subtype.map(|name| String::from_utf8_lossy(name).into_owned()),
            });
        }

        let rect = dict
            .get(b"Rect")
            .ok()
            .and_then(|object| self.numbers(object))
            .and_then(|values| Rect::from_pdf_array(&values))
            .ok_or_else(|| SnapError::MalformedAnnotation {
                page,
                reason: "highlight without a valid /Rect".to_owned(),
            })?;

        let quad_points = match dict.get(b"QuadPoints") {
            Ok(object) => self.numbers(object).ok_or_else(|| SnapError::MalformedAnnotation {
                page,
                reason: "/QuadPoints is not an array of numbers".to_owned(),
            })?,
            Err(_) => Vec::new(),
        };

        if quad_points.len() % QuadRegion::COORDINATES != 0 {
            return Err(SnapError::MalformedAnnotation {
                page,
                reason: format!(
                    "/QuadPoints has {} values, expected a multiple of {}",
                    quad_points.len(),
                    QuadRegion::COORDINATES
                ),
            });
        }

        let regions = quad_points
            .chunks_exact(QuadRegion::COORDINATES)
            .map(|chunk| {
                let mut quad = [0.0; QuadRegion::COORDINATES];
                quad.copy_from_slice(chunk);
                QuadRegion::from_quad(&quad)
            })
            .collect();

        Ok(Annotation::Highlight(HighlightMarkup { rect, regions }))
    }

    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INDIRECTION_DEPTH {
            if let Ok(value) = current.get(key) {
                return self.resolve(value).ok();
            }
            let parent = match current.get(b"Parent").ok()? {
                Object::Reference(id) => *id,
                _ => return None,
            };
            current = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> SnapResult<&'a Object> {
        let mut current = object;
        for _ in 0..MAX_INDIRECTION_DEPTH {
            match current {
                Object::Reference(id) => current = self.doc.get_object(*id)?,
                other => return Ok(other),
            }
        }
        Err(SnapError::MalformedObject { reason: "reference chain too deep".to_owned() })
    }

    fn name<'a>(&'a self, object: &'a Object) -> Option<&'a [u8]> {
        match self.resolve(object).ok()? {
            Object::Name(name) => Some(name.as_slice()),
            _ => None,
        }
    }

    fn number(&self, object: &Object) -> Option<f32> {
        match self.resolve(object).ok()? {
            Object::Integer(value) => Some(*value as f32),
            Object::Real(value) => Some(*value as f32),
            _ => None,
        }
    }

    fn numbers(&self, object: &Object) -> Option<Vec<f32>> {
        match self.resolve(object).ok()? {
            Object::Array(items) => items.iter().map(|item| self.number(item)).collect(),
            _ => None,
        }
    }
}

fn contains_encrypt_marker(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::SourcePdfBuilder;
    use lopdf::dictionary;

    fn open(builder: &SourcePdfBuilder) -> SourceDocument {
        SourceDocument::open(OpenSource::Bytes(builder.build())).expect("fixture should open")
    }

    #[test]
    fn reads_pages_in_order() {
        let doc = open(&SourcePdfBuilder::new().page().page().page());

        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page(2).expect("third page").number(), 3);
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let doc = open(&SourcePdfBuilder::new().page());
        let err = doc.page(4).expect_err("page 4 does not exist");

        assert!(matches!(err, SnapError::PageOutOfRange { page: 4, page_count: 1 }));
    }

    #[test]
    fn classifies_highlights_and_ignores_other_subtypes() {
        let doc = open(
            &SourcePdfBuilder::new()
                .page()
                .annotation("Text", [5.0, 5.0, 25.0, 25.0])
                .highlight([10.0, 100.0, 110.0, 120.0], &[[10.0, 110.0, 110.0, 120.0]])
                .annotation("Underline", [10.0, 50.0, 60.0, 60.0]),
        );
        let page = doc.page(0).expect("first page");

        assert_eq!(page.annotations.len(), 3);
        assert_eq!(page.annotations[0], Annotation::Ignored { subtype: Some("Text".to_owned()) });
        assert_eq!(
            page.annotations[2],
            Annotation::Ignored { subtype: Some("Underline".to_owned()) }
        );

        let highlight = page.annotations[1].as_highlight().expect("second is a highlight");
        assert_eq!(highlight.rect, Rect { llx: 10.0, lly: 100.0, urx: 110.0, ury: 120.0 });
        assert_eq!(highlight.regions.len(), 1);
        assert_eq!(highlight.regions[0].bounds, Rect { llx: 10.0, lly: 110.0, urx: 110.0, ury: 120.0 });
    }

    #[test]
    fn missing_quad_points_yield_zero_regions() {
        let doc = open(&SourcePdfBuilder::new().page().raw_highlight([0.0, 0.0, 40.0, 12.0], None));
        let page = doc.page(0).expect("first page");

        let highlight = page.annotations[0].as_highlight().expect("highlight");
        assert!(highlight.regions.is_empty());
    }

    #[test]
    fn quad_points_not_multiple_of_eight_are_malformed() {
        let doc = open(
            &SourcePdfBuilder::new()
                .page()
                .raw_highlight([0.0, 0.0, 40.0, 12.0], Some(vec![0.0, 12.0, 40.0, 12.0, 0.0])),
        );
        let err = doc.page(0).expect_err("odd quad points must fail");

        assert!(matches!(err, SnapError::MalformedAnnotation { page: 1, .. }));
    }

    #[test]
    fn page_box_prefers_crop_box() {
        let doc = open(
            &SourcePdfBuilder::new()
                .page_with_boxes([0.0, 0.0, 300.0, 400.0], Some([20.0, 30.0, 280.0, 380.0])),
        );

        assert_eq!(
            doc.page(0).expect("page").page_box,
            Rect { llx: 20.0, lly: 30.0, urx: 280.0, ury: 380.0 }
        );
    }

    #[test]
    fn invalid_bytes_fail_to_open() {
        let result = SourceDocument::open(OpenSource::Bytes(b"not a pdf".to_vec()));

        assert!(matches!(result, Err(SnapError::Parse(_))));
    }

    #[test]
    fn encrypt_marker_in_unparseable_file_is_reported_as_encrypted() {
        let result =
            SourceDocument::open(OpenSource::Bytes(b"%PDF-1.4 trailer << /Encrypt 5 0 R >>".to_vec()));

        assert!(matches!(result, Err(SnapError::EncryptedUnsupported)));
    }

    fn one_highlight() -> SourcePdfBuilder {
        SourcePdfBuilder::new()
            .page()
            .highlight([10.0, 100.0, 110.0, 120.0], &[[10.0, 110.0, 110.0, 120.0]])
    }

    #[test]
    fn dangling_annots_entry_is_ignored_and_highlights_survive() {
        let doc = open(&one_highlight().raw_annotation(Object::Reference((9999, 0))));
        let page = doc.page(0).expect("dangling entry must not fail the page");

        assert_eq!(page.annotations.len(), 2);
        assert!(page.annotations[0].as_highlight().is_some());
        assert_eq!(page.annotations[1], Annotation::Ignored { subtype: None });
    }

    #[test]
    fn null_annots_entry_is_ignored() {
        let doc = open(&one_highlight().raw_annotation(Object::Null));
        let page = doc.page(0).expect("page");

        assert_eq!(page.annotations[1], Annotation::Ignored { subtype: None });
    }

    #[test]
    fn direct_dictionary_entries_are_classified() {
        let doc = open(&SourcePdfBuilder::new().page().raw_annotation(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => vec![0.into(), 0.into(), 50.into(), 10.into()],
        }));
        let page = doc.page(0).expect("page");

        let highlight = page.annotations[0].as_highlight().expect("direct highlight");
        assert_eq!(highlight.rect, Rect { llx: 0.0, lly: 0.0, urx: 50.0, ury: 10.0 });
        assert!(highlight.regions.is_empty());
    }

    #[test]
    fn indirect_annots_array_is_followed() {
        let doc = open(&one_highlight().annotation("Link", [0.0, 0.0, 5.0, 5.0]).indirect_annots());
        let page = doc.page(0).expect("page");

        assert_eq!(page.annotations.len(), 2);
        assert!(page.annotations[0].as_highlight().is_some());
        assert_eq!(page.annotations[1], Annotation::Ignored { subtype: Some("Link".to_owned()) });
    }

    #[test]
    fn highlight_without_rect_is_malformed() {
        let doc = open(&SourcePdfBuilder::new().page().raw_annotation(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
        }));

        let err = doc.page(0).expect_err("missing /Rect must fail");
        assert!(matches!(err, SnapError::MalformedAnnotation { page: 1, .. }));
    }

    #[test]
    fn highlight_with_short_rect_is_malformed() {
        let doc = open(&SourcePdfBuilder::new().page().raw_annotation(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => vec![0.into(), 0.into(), 50.into()],
        }));

        let err = doc.page(0).expect_err("three-number /Rect must fail");
        assert!(matches!(err, SnapError::MalformedAnnotation { page: 1, .. }));
    }

    #[test]
    fn non_numeric_quad_points_are_malformed() {
        let mut quad_points: Vec<Object> = (0..7).map(|value| Object::from(value as f32)).collect();
        quad_points.push(Object::Name(b"Oops".to_vec()));
        let doc = open(&SourcePdfBuilder::new().page().raw_annotation(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => vec![0.into(), 0.into(), 50.into(), 10.into()],
            "QuadPoints" => quad_points,
        }));

        let err = doc.page(0).expect_err("named quad point must fail");
        assert!(matches!(err, SnapError::MalformedAnnotation { page: 1, .. }));
    }

    #[test]
    fn media_box_is_inherited_from_pages_node() {
        let doc = open(
            &SourcePdfBuilder::new()
                .inherited_media_box([0.0, 0.0, 420.0, 595.0])
                .page_without_boxes(),
        );

        assert_eq!(
            doc.page(0).expect("page").page_box,
            Rect { llx: 0.0, lly: 0.0, urx: 420.0, ury: 595.0 }
        );
    }

    #[test]
    fn page_without_any_box_defaults_to_letter() {
        let doc = open(&SourcePdfBuilder::new().page_without_boxes());

        assert_eq!(
            doc.page(0).expect("page").page_box,
            Rect { llx: 0.0, lly: 0.0, urx: 612.0, ury: 792.0 }
        );
    }

    #[test]
    fn encrypt_entry_in_trailer_is_rejected() {
        let bytes = SourcePdfBuilder::new().page().encrypted().build();
        let result = SourceDocument::open(OpenSource::Bytes(bytes));

        assert!(matches!(result, Err(SnapError::EncryptedUnsupported)));
    }

    #[test]
    fn self_referencing_object_is_malformed() {
        let mut doc = Document::with_version("1.5");
        doc.objects.insert((1, 0), Object::Reference((1, 0)));
        let source = SourceDocument { bytes: Vec::new(), doc, page_ids: Vec::new() };

        let err = source.resolve(&Object::Reference((1, 0))).expect_err("cycle must fail");
        assert!(matches!(err, SnapError::MalformedObject { .. }));
    }
}
