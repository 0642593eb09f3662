use chrono::NaiveDateTime;
use image::{GenericImageView, ImageFormat};

use super::{ReportInput, DISCLAIMER, REPORT_TITLE};
use crate::analysis::language_name;

pub const PATIENT_HEADING: &str = "Patient Information";
pub const IMAGE_HEADING: &str = "Medical Image";
pub const ANALYSIS_HEADING: &str = "Analysis";
pub const ANALYSIS_CONTINUED_HEADING: &str = "Analysis (continued)";
pub const DISCLAIMER_HEADING: &str = "Disclaimer";
pub const NO_IMAGE: &str = "No image attached";

/// Analysis paragraphs per PPTX slide.
pub const PARAGRAPHS_PER_SLIDE: usize = 5;

/// Format-independent content of a report.
#[derive(Debug, Clone)]
pub struct ReportDocument<'a> {
    pub title: &'static str,
    pub report_id: String,
    pub generated_at: NaiveDateTime,
    pub metadata: Vec<(&'static str, String)>,
    pub patient: Vec<(&'static str, String)>,
    pub image: ImageSlot<'a>,
    pub paragraphs: Vec<String>,
    pub disclaimer: &'static str,
}

#[derive(Debug, Clone)]
pub enum ImageSlot<'a> {
    Absent,
    /// Decodable and in a format the office containers accept.
    Embeddable(EmbeddableImage<'a>),
    /// Present but unusable; renderers print the placeholder.
    Unembeddable { mime: &'a str, size: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct EmbeddableImage<'a> {
    pub bytes: &'a [u8],
    pub content_type: &'static str,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

impl<'a> ReportDocument<'a> {
    pub fn new(input: &ReportInput<'a>) -> Self {
        let metadata = vec![
            (
                "Generated",
                input.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            (
                "Language",
                format!("{} ({})", language_name(input.language), input.language),
            ),
            ("Report ID", input.report_id.to_string()),
        ];

        let patient = input
            .patient
            .fields()
            .into_iter()
            .map(|(label, value)| (label, value.to_string()))
            .collect();

        let image = match input.image {
            None => ImageSlot::Absent,
            Some(img) => match embeddable_image(img.bytes) {
                Some(embeddable) => ImageSlot::Embeddable(embeddable),
                None => {
                    tracing::warn!(mime = img.mime, size = img.bytes.len(), "Image cannot be embedded");
                    ImageSlot::Unembeddable {
                        mime: img.mime,
                        size: img.bytes.len(),
                    }
                }
            },
        };

        Self {
            title: REPORT_TITLE,
            report_id: input.report_id.to_string(),
            generated_at: input.generated_at,
            metadata,
            patient,
            image,
            paragraphs: split_paragraphs(input.analysis),
            disclaimer: DISCLAIMER,
        }
    }

    /// Analysis paragraphs grouped into PPTX slides with their titles.
    /// Always at least one slide.
    pub fn analysis_slides(&self) -> Vec<(&'static str, &[String])> {
        if self.paragraphs.is_empty() {
            return vec![(ANALYSIS_HEADING, &self.paragraphs[..])];
        }
        self.paragraphs
            .chunks(PARAGRAPHS_PER_SLIDE)
            .enumerate()
            .map(|(i, chunk)| {
                let title = if i == 0 { ANALYSIS_HEADING } else { ANALYSIS_CONTINUED_HEADING };
                (title, chunk)
            })
            .collect()
    }
}

/// Split on line breaks, trim, drop blank lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// `Label: value`, or `Label:` when the value is empty.
pub fn field_line(label: &str, value: &str) -> String {
    format!("{label}: {value}").trim_end().to_string()
}

/// Scale `(width, height)` to fit inside the box, keeping the aspect ratio.
pub fn fit_within(width: u32, height: u32, max_width: f64, max_height: f64) -> (f64, f64) {
    let (w, h) = (f64::from(width.max(1)), f64::from(height.max(1)));
    let scale = (max_width / w).min(max_height / h);
    (w * scale, h * scale)
}

fn embeddable_image(bytes: &[u8]) -> Option<EmbeddableImage<'_>> {
    let format = image::guess_format(bytes).ok()?;
    let (content_type, extension) = match format {
        ImageFormat::Png => ("image/png", "png"),
        ImageFormat::Jpeg => ("image/jpeg", "jpeg"),
        ImageFormat::Tiff => ("image/tiff", "tiff"),
        _ => return None,
    };
    let decoded = image::load_from_memory_with_format(bytes, format).ok()?;
    let (width, height) = decoded.dimensions();
    Some(EmbeddableImage {
        bytes,
        content_type,
        extension,
        width,
        height,
    })
}
