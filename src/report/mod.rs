//! Report rendering: one analysis, four container formats.
//!
//! Every format is a projection of the same [`ReportDocument`]: title,
//! metadata, patient block, image, analysis paragraphs, disclaimer, in that
//! order. Rendering is total with respect to the image: bytes that cannot
//! be embedded are replaced by [`IMAGE_PLACEHOLDER`]. Only container
//! writing (zip or PDF serialization) can fail.

pub mod docx;
pub mod fonts;
pub mod layout;
pub mod ooxml;
pub mod pdf;
pub mod pptx;
pub mod text;

pub use layout::*;

use std::str::FromStr;

use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::models::PatientInfo;

pub const REPORT_TITLE: &str = "Medical Image Analysis Report";
pub const DISCLAIMER: &str = "AI-generated analysis, not a substitute for professional medical advice. \
Always consult a qualified healthcare professional.";
pub const IMAGE_PLACEHOLDER: &str = "[Image could not be embedded]";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Docx,
    Pptx,
    Text,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Pdf, Self::Docx, Self::Pptx, Self::Text];

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Pptx => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            Self::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Text => "txt",
        }
    }

    /// Download name, derived only from the language code.
    pub fn file_name(&self, language: &str) -> String {
        format!("medical_report_{}.{}", language, self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" | "word" => Ok(Self::Docx),
            "pptx" | "powerpoint" => Ok(Self::Pptx),
            "txt" | "text" => Ok(Self::Text),
            other => Err(format!("Unsupported export format: {other}")),
        }
    }
}

/// Image attached to a report, as uploaded.
#[derive(Debug, Clone, Copy)]
pub struct ReportImage<'a> {
    pub bytes: &'a [u8],
    pub mime: &'a str,
}

/// Everything a renderer needs.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub analysis: &'a str,
    pub patient: &'a PatientInfo,
    pub image: Option<ReportImage<'a>>,
    /// Language code, e.g. `en`.
    pub language: &'a str,
    pub generated_at: NaiveDateTime,
    pub report_id: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Draw a QR code carrying the report id on the PDF title page.
    pub pdf_qr_code: bool,
    /// Faces for PDF lines outside WinAnsi.
    pub fonts: fonts::FontBook,
}

/// Render `input` into `format`.
pub fn render(
    format: ExportFormat,
    input: &ReportInput<'_>,
    options: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    let document = ReportDocument::new(input);
    let bytes = match format {
        ExportFormat::Pdf => pdf::render_pdf(&document, options)?,
        ExportFormat::Docx => docx::render_docx(&document)?,
        ExportFormat::Pptx => pptx::render_pptx(&document)?,
        ExportFormat::Text => text::render_text(&document).into_bytes(),
    };
    tracing::debug!(
        format = format.extension(),
        report_id = %document.report_id,
        size = bytes.len(),
        "Report rendered"
    );
    Ok(bytes)
}

/// Printed report identifier, `MR-YYYYMMDD-XXXXXXXX`, derived from the
/// stored report row. Not verifiable.
pub fn report_id(at: NaiveDateTime, id: &Uuid) -> String {
    let hex = id.simple().to_string().to_ascii_uppercase();
    format!("MR-{}-{}", at.format("%Y%m%d"), &hex[..8])
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::models::{PatientDetails, PatientInfo};

    pub fn jane() -> PatientInfo {
        PatientInfo {
            name: "Jane Doe".into(),
            patient_id: "P001".into(),
            details: PatientDetails::Indications {
                indications: "routine".into(),
            },
        }
    }

    pub fn generated_at() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-03-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    pub fn input<'a>(
        analysis: &'a str,
        patient: &'a PatientInfo,
        image: Option<ReportImage<'a>>,
    ) -> ReportInput<'a> {
        ReportInput {
            analysis,
            patient,
            image,
            language: "en",
            generated_at: generated_at(),
            report_id: "MR-20260301-0000ABCD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::imaging::test_images::png;

    #[test]
    fn every_format_renders_nonempty_with_matching_mime() {
        let patient = jane();
        let image = png(16, 16);
        let input = input(
            "Line1\n\nLine2",
            &patient,
            Some(ReportImage { bytes: &image, mime: "image/png" }),
        );

        for format in ExportFormat::ALL {
            let bytes = render(format, &input, &RenderOptions { pdf_qr_code: true, ..Default::default() }).unwrap();
            assert!(!bytes.is_empty(), "{format:?}");
            match format {
                ExportFormat::Pdf => assert_eq!(&bytes[..4], b"%PDF"),
                ExportFormat::Docx | ExportFormat::Pptx => assert_eq!(&bytes[..2], b"PK"),
                ExportFormat::Text => assert!(std::str::from_utf8(&bytes).is_ok()),
            }
        }
    }

    #[test]
    fn mime_types() {
        assert_eq!(ExportFormat::Pdf.mime_type(), "application/pdf");
        assert!(ExportFormat::Docx.mime_type().ends_with("wordprocessingml.document"));
        assert!(ExportFormat::Pptx.mime_type().ends_with("presentationml.presentation"));
        assert!(ExportFormat::Text.mime_type().starts_with("text/plain"));
    }

    #[test]
    fn file_names_derive_from_language() {
        assert_eq!(ExportFormat::Pdf.file_name("fr"), "medical_report_fr.pdf");
        assert_eq!(ExportFormat::Text.file_name("en"), "medical_report_en.txt");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("pptx".parse::<ExportFormat>().unwrap(), ExportFormat::Pptx);
        assert!("odt".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn report_id_shape() {
        let uuid = Uuid::parse_str("0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d").unwrap();
        assert_eq!(report_id(generated_at(), &uuid), "MR-20260301-0A1B2C3D");
    }

    #[test]
    fn corrupt_image_never_fails_render() {
        let patient = jane();
        let garbage = b"\x89PNG not really".to_vec();
        let input = input(
            "Findings",
            &patient,
            Some(ReportImage { bytes: &garbage, mime: "image/png" }),
        );
        for format in ExportFormat::ALL {
            assert!(render(format, &input, &RenderOptions::default()).is_ok(), "{format:?}");
        }
    }
}
