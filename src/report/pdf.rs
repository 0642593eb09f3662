//! PDF report via `printpdf`.
//!
//! Layout and serialization are separate: [`layout_pdf`] places every item
//! on A4 pages in millimetres, [`render_pdf`] writes them out. Lines
//! Helvetica can encode use it; every other line is set in a TrueType face
//! from [`FontBook`], embedded on first use.

use std::io::BufWriter;

use printpdf::image_crate::{self, DynamicImage, GenericImageView, GrayImage, Luma};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use qrcode::{Color, QrCode};

use super::fonts::{self, FontBook};
use super::{
    field_line, fit_within, ImageSlot, RenderError, RenderOptions, ReportDocument,
    ANALYSIS_HEADING, DISCLAIMER_HEADING, IMAGE_HEADING, IMAGE_PLACEHOLDER, NO_IMAGE,
    PATIENT_HEADING,
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM_MARGIN: f32 = 20.0;
const LEFT: f32 = 20.0;
const INDENT: f32 = 25.0;

const MAX_IMAGE_WIDTH: f32 = 120.0;
const MAX_IMAGE_HEIGHT: f32 = 90.0;
const QR_SIZE: f32 = 25.0;
/// Raster pixels per QR module.
const QR_MODULE_PX: u32 = 8;
const QR_QUIET_ZONE: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PdfItem {
    Text {
        text: String,
        size: f32,
        bold: bool,
        x: f32,
        y: f32,
    },
    /// The report image; `(x, y)` is the lower-left corner.
    Image { x: f32, y: f32, width: f32, height: f32 },
    /// QR code encoding the report id.
    Qr { x: f32, y: f32, size: f32 },
}

#[derive(Debug, Default)]
pub(crate) struct PdfPage {
    pub items: Vec<PdfItem>,
}

struct Cursor {
    pages: Vec<PdfPage>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![PdfPage::default()],
            y: TOP,
        }
    }

    /// Start a new page unless `height` still fits above the bottom margin.
    fn reserve(&mut self, height: f32) {
        if self.y - height < BOTTOM_MARGIN {
            self.pages.push(PdfPage::default());
            self.y = TOP;
        }
    }

    fn push(&mut self, item: PdfItem) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn text(&mut self, text: &str, size: f32, bold: bool, x: f32, advance: f32) {
        self.reserve(advance);
        let y = self.y;
        self.push(PdfItem::Text {
            text: text.to_string(),
            size,
            bold,
            x,
            y,
        });
        self.y -= advance;
    }

    fn wrapped(&mut self, text: &str, size: f32, x: f32, max_chars: usize, advance: f32) {
        for line in wrap_text(text, max_chars) {
            self.text(&line, size, false, x, advance);
        }
    }

    fn heading(&mut self, text: &str) {
        self.y -= 4.0;
        self.text(text, 12.0, true, LEFT, 7.0);
    }
}

/// Place every item of the report on A4 pages.
pub(crate) fn layout_pdf(doc: &ReportDocument<'_>, options: &RenderOptions) -> Vec<PdfPage> {
    let mut cur = Cursor::new();

    cur.text(doc.title, 16.0, true, LEFT, 10.0);
    if options.pdf_qr_code {
        cur.push(PdfItem::Qr {
            x: PAGE_WIDTH - LEFT - QR_SIZE,
            y: TOP - QR_SIZE,
            size: QR_SIZE,
        });
    }
    for (label, value) in &doc.metadata {
        cur.text(&field_line(label, value), 9.0, false, LEFT, 4.5);
    }
    if options.pdf_qr_code && cur.y > TOP - QR_SIZE {
        cur.y = TOP - QR_SIZE - 2.0;
    }

    cur.heading(PATIENT_HEADING);
    for (label, value) in &doc.patient {
        cur.wrapped(&field_line(label, value), 10.0, INDENT, 90, 5.0);
    }

    cur.heading(IMAGE_HEADING);
    match &doc.image {
        ImageSlot::Embeddable(img) => {
            let (w, h) = fit_within(
                img.width,
                img.height,
                f64::from(MAX_IMAGE_WIDTH),
                f64::from(MAX_IMAGE_HEIGHT),
            );
            let (width, height) = (w as f32, h as f32);
            cur.reserve(height);
            let y = cur.y - height;
            cur.push(PdfItem::Image {
                x: INDENT,
                y,
                width,
                height,
            });
            cur.y = y - 4.0;
        }
        ImageSlot::Absent => cur.text(NO_IMAGE, 10.0, false, INDENT, 5.0),
        ImageSlot::Unembeddable { .. } => cur.text(IMAGE_PLACEHOLDER, 10.0, false, INDENT, 5.0),
    }

    cur.heading(ANALYSIS_HEADING);
    for paragraph in &doc.paragraphs {
        cur.wrapped(paragraph, 10.0, INDENT, 95, 5.0);
        cur.y -= 2.0;
    }

    cur.heading(DISCLAIMER_HEADING);
    cur.wrapped(doc.disclaimer, 8.0, INDENT, 110, 4.0);

    cur.pages
}

struct Fonts<'a> {
    pdf: &'a PdfDocumentReference,
    book: &'a FontBook,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Embedded faces by `book` index.
    external: Vec<Option<IndirectFontRef>>,
}

impl<'a> Fonts<'a> {
    fn new(pdf: &'a PdfDocumentReference, book: &'a FontBook) -> Result<Self, RenderError> {
        Ok(Self {
            pdf,
            book,
            regular: pdf
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| RenderError::Pdf(format!("font error: {e}")))?,
            bold: pdf
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(|e| RenderError::Pdf(format!("font error: {e}")))?,
            external: Vec::new(),
        })
    }

    /// Font to draw `text` with. Bold only applies to Helvetica.
    fn for_text(&mut self, text: &str, bold: bool) -> Result<IndirectFontRef, RenderError> {
        if fonts::is_winansi(text) {
            return Ok(if bold { self.bold.clone() } else { self.regular.clone() });
        }
        let book = self.book;
        let Some((index, face)) = book
            .pick(text)
            .and_then(|i| book.face(i).map(|face| (i, face)))
        else {
            return Ok(self.regular.clone());
        };
        if self.external.len() <= index {
            self.external.resize(index + 1, None);
        }
        if let Some(font) = &self.external[index] {
            return Ok(font.clone());
        }
        let font = self
            .pdf
            .add_external_font(face.data())
            .map_err(|e| RenderError::Pdf(format!("font {} error: {e}", face.name())))?;
        tracing::debug!(font = face.name(), "Embedded PDF font");
        self.external[index] = Some(font.clone());
        Ok(font)
    }
}

pub fn render_pdf(doc: &ReportDocument<'_>, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    let pages = layout_pdf(doc, options);

    let (pdf, page1, layer1) =
        PdfDocument::new(doc.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let mut fonts = Fonts::new(&pdf, &options.fonts)?;

    let picture = match &doc.image {
        ImageSlot::Embeddable(img) => match image_crate::load_from_memory(img.bytes) {
            Ok(decoded) => Some(DynamicImage::ImageRgb8(decoded.to_rgb8())),
            Err(e) => {
                tracing::warn!(error = %e, "PDF image decode failed, using placeholder");
                None
            }
        },
        _ => None,
    };
    let qr = if options.pdf_qr_code {
        qr_image(&doc.report_id)
    } else {
        None
    };

    for (i, page) in pages.iter().enumerate() {
        let layer = if i == 0 {
            pdf.get_page(page1).get_layer(layer1)
        } else {
            let (p, l) = pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            pdf.get_page(p).get_layer(l)
        };

        for item in &page.items {
            match item {
                PdfItem::Text {
                    text,
                    size,
                    bold,
                    x,
                    y,
                } => {
                    let font = fonts.for_text(text, *bold)?;
                    layer.use_text(text.as_str(), *size, Mm(*x), Mm(*y), &font);
                }
                PdfItem::Image {
                    x,
                    y,
                    width,
                    height,
                } => match &picture {
                    Some(picture) => place_image(&layer, picture, *x, *y, *width),
                    None => layer.use_text(
                        IMAGE_PLACEHOLDER,
                        10.0,
                        Mm(*x),
                        Mm(*y + *height - 5.0),
                        &fonts.regular,
                    ),
                },
                PdfItem::Qr { x, y, size } => {
                    if let Some(qr) = &qr {
                        place_image(&layer, qr, *x, *y, *size);
                    }
                }
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    pdf.save(&mut buf)
        .map_err(|e| RenderError::Pdf(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| RenderError::Pdf(format!("buffer error: {e}")))
}

/// Draw `image` with its lower-left corner at `(x, y)`, `width` mm wide.
fn place_image(layer: &PdfLayerReference, image: &DynamicImage, x: f32, y: f32, width: f32) {
    let px = image.dimensions().0.max(1) as f32;
    let dpi = px * 25.4 / width;
    Image::from_dynamic_image(image).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}

fn qr_image(report_id: &str) -> Option<DynamicImage> {
    let code = match QrCode::new(report_id.as_bytes()) {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!(error = %e, "QR encoding failed, omitting code");
            return None;
        }
    };
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QR_QUIET_ZONE) * QR_MODULE_PX;

    let gray = GrayImage::from_fn(side, side, |px, py| {
        let mx = (px / QR_MODULE_PX).checked_sub(QR_QUIET_ZONE);
        let my = (py / QR_MODULE_PX).checked_sub(QR_QUIET_ZONE);
        let dark = match (mx, my) {
            (Some(mx), Some(my)) if mx < modules && my < modules => {
                colors[(my * modules + mx) as usize] == Color::Dark
            }
            _ => false,
        };
        Luma([if dark { 0 } else { 255 }])
    });
    Some(DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray).to_rgb8()))
}

/// Greedy word wrap on character count. Words longer than a line are
/// split at `max_chars`.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut len = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            if len > 0 && len + 1 + piece.len() > max_chars {
                lines.push(std::mem::take(&mut current));
                len = 0;
            }
            if len > 0 {
                current.push(' ');
                len += 1;
            }
            current.extend(piece);
            len += piece.len();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
