//! WordprocessingML (DOCX) report.

use super::ooxml::{
    content_types_xml, core_properties_xml, relationships_xml, xml_escape, Package, Relationship,
    CORE_PROPERTIES_TYPE, EMU_PER_INCH, REL_CORE_PROPERTIES, REL_IMAGE, REL_OFFICE_DOCUMENT,
    XML_HEADER,
};
use super::{
    fit_within, EmbeddableImage, ImageSlot, RenderError, ReportDocument, ANALYSIS_HEADING,
    DISCLAIMER_HEADING, IMAGE_HEADING, IMAGE_PLACEHOLDER, NO_IMAGE, PATIENT_HEADING,
};

const DOCUMENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const STYLES_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
const IMAGE_REL_ID: &str = "rIdImage1";

/// Largest picture on an A4 page with 1" margins.
const MAX_IMAGE_WIDTH_IN: f64 = 6.0;
const MAX_IMAGE_HEIGHT_IN: f64 = 4.5;

const STYLES_XML: &str = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:eastAsia="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:jc w:val="center"/><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="36"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Meta"><w:name w:val="Meta"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="0"/></w:pPr><w:rPr><w:color w:val="555555"/><w:sz w:val="18"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Disclaimer"><w:name w:val="Disclaimer"/><w:basedOn w:val="Normal"/><w:rPr><w:i/><w:sz w:val="18"/></w:rPr></w:style></w:styles>"#;

pub fn render_docx(doc: &ReportDocument<'_>) -> Result<Vec<u8>, RenderError> {
    let embedded = match &doc.image {
        ImageSlot::Embeddable(img) => Some(*img),
        _ => None,
    };

    let mut pkg = Package::new();

    let image_defaults: Vec<(&str, &str)> = embedded
        .iter()
        .map(|img| (img.extension, img.content_type))
        .collect();
    pkg.add_xml(
        "[Content_Types].xml",
        &content_types_xml(
            &image_defaults,
            &[
                ("/word/document.xml".to_string(), DOCUMENT_TYPE),
                ("/word/styles.xml".to_string(), STYLES_TYPE),
                ("/docProps/core.xml".to_string(), CORE_PROPERTIES_TYPE),
            ],
        ),
    )?;
    pkg.add_xml(
        "_rels/.rels",
        &relationships_xml(&[
            Relationship {
                id: "rId1",
                rel_type: REL_OFFICE_DOCUMENT,
                target: "word/document.xml",
            },
            Relationship {
                id: "rId2",
                rel_type: REL_CORE_PROPERTIES,
                target: "docProps/core.xml",
            },
        ]),
    )?;
    pkg.add_xml("docProps/core.xml", &core_properties_xml(doc))?;
    pkg.add_xml("word/styles.xml", &format!("{XML_HEADER}{STYLES_XML}"))?;

    let mut rels = vec![Relationship {
        id: "rIdStyles",
        rel_type: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
        target: "styles.xml",
    }];
    let media_target = embedded.map(|img| format!("media/image1.{}", img.extension));
    if let Some(target) = &media_target {
        rels.push(Relationship {
            id: IMAGE_REL_ID,
            rel_type: REL_IMAGE,
            target: target.as_str(),
        });
    }
    pkg.add_xml("word/_rels/document.xml.rels", &relationships_xml(&rels))?;

    if let (Some(img), Some(target)) = (embedded, &media_target) {
        pkg.add(&format!("word/{target}"), img.bytes)?;
    }

    pkg.add_xml("word/document.xml", &document_xml(doc, embedded))?;
    pkg.finish()
}

fn document_xml(doc: &ReportDocument<'_>, embedded: Option<EmbeddableImage<'_>>) -> String {
    let mut body = String::new();

    body.push_str(&styled_paragraph("Title", doc.title));
    for (label, value) in &doc.metadata {
        body.push_str(&labelled_paragraph(Some("Meta"), label, value));
    }

    body.push_str(&styled_paragraph("Heading1", PATIENT_HEADING));
    for (label, value) in &doc.patient {
        body.push_str(&labelled_paragraph(None, label, value));
    }

    body.push_str(&styled_paragraph("Heading1", IMAGE_HEADING));
    match (&doc.image, embedded) {
        (_, Some(img)) => body.push_str(&picture_paragraph(&img)),
        (ImageSlot::Absent, None) => body.push_str(&plain_paragraph(NO_IMAGE)),
        (_, None) => body.push_str(&plain_paragraph(IMAGE_PLACEHOLDER)),
    }

    body.push_str(&styled_paragraph("Heading1", ANALYSIS_HEADING));
    for paragraph in &doc.paragraphs {
        body.push_str(&plain_paragraph(paragraph));
    }

    body.push_str(&styled_paragraph("Heading1", DISCLAIMER_HEADING));
    body.push_str(&styled_paragraph("Disclaimer", doc.disclaimer));

    format!(
        r#"{XML_HEADER}<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    )
}

fn run(text: &str, bold: bool) -> String {
    let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        r#"<w:r>{props}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        xml_escape(text)
    )
}

fn plain_paragraph(text: &str) -> String {
    format!("<w:p>{}</w:p>", run(text, false))
}

fn styled_paragraph(style: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr>{}</w:p>"#,
        run(text, false)
    )
}

/// Bold `Label:` followed by the value, which may be empty.
fn labelled_paragraph(style: Option<&str>, label: &str, value: &str) -> String {
    let props = style
        .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
        .unwrap_or_default();
    let value_run = if value.is_empty() {
        String::new()
    } else {
        run(&format!(" {value}"), false)
    };
    format!("<w:p>{props}{}{value_run}</w:p>", run(&format!("{label}:"), true))
}

fn picture_paragraph(img: &EmbeddableImage<'_>) -> String {
    let (w, h) = fit_within(
        img.width,
        img.height,
        MAX_IMAGE_WIDTH_IN * EMU_PER_INCH,
        MAX_IMAGE_HEIGHT_IN * EMU_PER_INCH,
    );
    let (cx, cy) = (w.round() as i64, h.round() as i64);
    format!(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="1" name="Medical image"/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:nvPicPr><pic:cNvPr id="1" name="image1.{ext}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{IMAGE_REL_ID}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
        ext = img.extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::test_images::png;
    use crate::models::PatientInfo;
    use crate::report::fixtures::{input, jane};
    use crate::report::ooxml::{entry_names, paragraph_texts, read_entry};
    use crate::report::{ReportImage, DISCLAIMER, REPORT_TITLE};

    fn render(analysis: &str, patient: &PatientInfo, image: Option<ReportImage<'_>>) -> Vec<u8> {
        render_docx(&ReportDocument::new(&input(analysis, patient, image))).unwrap()
    }

    #[test]
    fn analysis_paragraphs_round_trip_in_order() {
        let patient = jane();
        let bytes = render("Line1\n\nLine2\n  Line3  ", &patient, None);
        let paragraphs = paragraph_texts(&read_entry(&bytes, "word/document.xml"), "w");

        let start = paragraphs.iter().position(|p| p == "Analysis").unwrap();
        assert_eq!(&paragraphs[start + 1..start + 4], &["Line1", "Line2", "Line3"]);
        assert_eq!(paragraphs.last().unwrap(), DISCLAIMER);
        assert_eq!(paragraphs[0], REPORT_TITLE);
    }

    #[test]
    fn patient_block_verbatim() {
        let patient = jane();
        let bytes = render("x", &patient, None);
        let paragraphs = paragraph_texts(&read_entry(&bytes, "word/document.xml"), "w");
        for expected in ["Name: Jane Doe", "Patient ID: P001", "Indications: routine"] {
            assert!(paragraphs.iter().any(|p| p == expected), "missing {expected}");
        }
    }

    #[test]
    fn missing_fields_keep_labels() {
        let patient = PatientInfo::default();
        let bytes = render("x", &patient, None);
        let paragraphs = paragraph_texts(&read_entry(&bytes, "word/document.xml"), "w");
        assert!(paragraphs.iter().any(|p| p == "Name:"));
        assert!(paragraphs.iter().any(|p| p == "Indications:"));
    }

    #[test]
    fn image_stored_as_original_bytes() {
        let patient = jane();
        let image = png(20, 10);
        let bytes = render("x", &patient, Some(ReportImage { bytes: &image, mime: "image/png" }));

        assert!(entry_names(&bytes).contains(&"word/media/image1.png".to_string()));
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(&bytes[..])).unwrap();
        let mut stored = Vec::new();
        std::io::Read::read_to_end(&mut archive.by_name("word/media/image1.png").unwrap(), &mut stored).unwrap();
        assert_eq!(stored, image);

        let document = read_entry(&bytes, "word/document.xml");
        assert!(document.contains(r#"r:embed="rIdImage1""#));
        assert!(read_entry(&bytes, "[Content_Types].xml").contains(r#"Extension="png""#));
        assert!(read_entry(&bytes, "word/_rels/document.xml.rels").contains("media/image1.png"));
    }

    #[test]
    fn corrupt_image_replaced_by_placeholder() {
        let patient = jane();
        let garbage = b"GIF89a-but-broken".to_vec();
        let bytes = render("x", &patient, Some(ReportImage { bytes: &garbage, mime: "image/gif" }));

        assert!(!entry_names(&bytes).iter().any(|n| n.starts_with("word/media/")));
        let paragraphs = paragraph_texts(&read_entry(&bytes, "word/document.xml"), "w");
        assert!(paragraphs.iter().any(|p| p == IMAGE_PLACEHOLDER));
    }

    #[test]
    fn markup_in_analysis_escaped() {
        let patient = jane();
        let bytes = render("Mass < 2cm & stable", &patient, None);
        let xml = read_entry(&bytes, "word/document.xml");
        assert!(xml.contains("Mass &lt; 2cm &amp; stable"));
        assert!(paragraph_texts(&xml, "w").iter().any(|p| p == "Mass < 2cm & stable"));
    }

    #[test]
    fn core_properties_carry_report_id() {
        let patient = jane();
        let bytes = render("x", &patient, None);
        let core = read_entry(&bytes, "docProps/core.xml");
        assert!(core.contains("<dc:identifier>MR-20260301-0000ABCD</dc:identifier>"));
        assert!(core.contains("2026-03-01T12:00:00Z"));
    }
}
