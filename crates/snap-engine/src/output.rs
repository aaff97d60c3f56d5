//! The snapshot document being assembled.

use crate::error::SnapResult;
use crate::geometry::{PageSize, Rect};
use crate::render::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const LABEL_FONT_SIZE: f32 = 11.0;
pub const JPEG_QUALITY: u8 = 75;

const LABEL_FONT: &str = "F1";

/// Output PDF. Pages are appended whole; nothing is written until [`OutputDocument::save`].
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Self { doc, pages_id, font_id, page_ids: Vec::new() }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Commits a finished page: its images, content stream and page object.
    pub fn add_page(&mut self, page: OutputPage) -> SnapResult<ObjectId> {
        let mut xobjects = Dictionary::new();
        for (name, stream) in page.images {
            let image_id = self.doc.add_object(stream);
            xobjects.set(name, image_id);
        }

        let content = Content { operations: page.operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                page.size.width_pt.into(),
                page.size.height_pt.into(),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { LABEL_FONT => self.font_id },
                "XObject" => xobjects,
            },
        });
        self.page_ids.push(page_id);

        Ok(page_id)
    }

    pub fn save(&mut self, path: &Path) -> SnapResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> SnapResult<()> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| (*id).into()).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        self.doc.save_to(writer)?;
        Ok(())
    }

    pub fn to_bytes(&mut self) -> SnapResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Drawing operations and image streams for one output page, kept out of the
/// document until the page is complete.
#[derive(Debug)]
pub struct OutputPage {
    size: PageSize,
    operations: Vec<Operation>,
    images: Vec<(String, Stream)>,
}

impl OutputPage {
    pub fn new(size: PageSize) -> Self {
        Self { size, operations: Vec::new(), images: Vec::new() }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Helvetica text with its baseline starting at `(x, y)`.
    pub fn draw_label(&mut self, text: &str, x: f32, y: f32) {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![LABEL_FONT.into(), LABEL_FONT_SIZE.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Embeds `image` as a JPEG XObject and paints it stretched over `target`.
    pub fn draw_image(&mut self, image: &RgbImage, target: Rect) -> SnapResult<()> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(image)?;

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width()),
                "Height" => i64::from(image.height()),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );

        let name = format!("Im{}", self.images.len() + 1);
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    target.width().into(),
                    0.into(),
                    0.into(),
                    target.height().into(),
                    target.llx.into(),
                    target.lly.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self.images.push((name, stream));

        Ok(())
    }

    /// Strokes a straight line in the given RGB color (components in 0..=1).
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: [f32; 3]) {
        let [r, g, b] = color;
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("RG", vec![r.into(), g.into(), b.into()]),
            Operation::new("m", vec![from.0.into(), from.1.into()]),
            Operation::new("l", vec![to.0.into(), to.1.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }
}
