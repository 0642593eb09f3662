use std::fmt::Write;

use super::{
    field_line, ImageSlot, ReportDocument, ANALYSIS_HEADING, DISCLAIMER_HEADING, IMAGE_HEADING,
    NO_IMAGE, PATIENT_HEADING,
};

/// Plain-text report. Deterministic for a given document; the timestamp
/// and report id come from the input.
pub fn render_text(doc: &ReportDocument<'_>) -> String {
    let mut out = String::new();

    heading(&mut out, doc.title, '=');
    for (label, value) in &doc.metadata {
        line(&mut out, &field_line(label, value));
    }
    out.push('\n');

    heading(&mut out, PATIENT_HEADING, '-');
    for (label, value) in &doc.patient {
        line(&mut out, &field_line(label, value));
    }
    out.push('\n');

    heading(&mut out, IMAGE_HEADING, '-');
    let image_line = match &doc.image {
        ImageSlot::Absent => NO_IMAGE.to_string(),
        ImageSlot::Embeddable(img) => format!(
            "Attached image: {}x{} {} ({} bytes)",
            img.width,
            img.height,
            img.content_type,
            img.bytes.len()
        ),
        ImageSlot::Unembeddable { mime, size } => {
            format!("Attached image: {mime} ({size} bytes)")
        }
    };
    line(&mut out, &image_line);
    out.push('\n');

    heading(&mut out, ANALYSIS_HEADING, '-');
    for paragraph in &doc.paragraphs {
        line(&mut out, paragraph);
        out.push('\n');
    }

    heading(&mut out, DISCLAIMER_HEADING, '-');
    line(&mut out, doc.disclaimer);
    out
}

fn heading(out: &mut String, title: &str, underline: char) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(
        out,
        "{}",
        underline.to_string().repeat(title.chars().count())
    );
}

fn line(out: &mut String, text: &str) {
    let _ = writeln!(out, "{text}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::test_images::png;
    use crate::models::PatientInfo;
    use crate::report::fixtures::{input, jane};
    use crate::report::{ReportImage, DISCLAIMER, REPORT_TITLE};

    #[test]
    fn sections_in_order() {
        let patient = jane();
        let text = render_text(&ReportDocument::new(&input("Line1\n\nLine2", &patient, None)));

        let positions: Vec<usize> = [
            REPORT_TITLE,
            "Generated: 2026-03-01 12:00:00",
            "Report ID: MR-20260301-0000ABCD",
            "Name: Jane Doe",
            "Patient ID: P001",
            "Indications: routine",
            "No image attached",
            "Line1",
            "Line2",
            DISCLAIMER,
        ]
        .iter()
        .map(|needle| text.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    }

    #[test]
    fn paragraphs_separated_by_blank_line() {
        let patient = jane();
        let text = render_text(&ReportDocument::new(&input("Line1\nLine2", &patient, None)));
        assert!(text.contains("Line1\n\nLine2\n"));
    }

    #[test]
    fn identical_input_identical_output() {
        let patient = jane();
        let a = render_text(&ReportDocument::new(&input("Same\ntext", &patient, None)));
        let b = render_text(&ReportDocument::new(&input("Same\ntext", &patient, None)));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_patient_fields_render_empty_labels() {
        let patient = PatientInfo::default();
        let text = render_text(&ReportDocument::new(&input("x", &patient, None)));
        assert!(text.contains("\nName:\n"));
        assert!(text.contains("\nPatient ID:\n"));
        assert!(text.contains("\nIndications:\n"));
    }

    #[test]
    fn attached_image_named() {
        let patient = jane();
        let bytes = png(8, 6);
        let text = render_text(&ReportDocument::new(&input(
            "x",
            &patient,
            Some(ReportImage { bytes: &bytes, mime: "image/png" }),
        )));
        assert!(text.contains("Attached image: 8x6 image/png"));
    }
}
