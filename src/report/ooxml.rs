//! Shared plumbing for the Office Open XML containers (DOCX, PPTX).

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{ReportDocument, RenderError};

pub const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub const EMU_PER_INCH: f64 = 914_400.0;

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Escape text for element content and attribute values. Characters that
/// XML 1.0 forbids are dropped.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

/// A zip package being assembled in memory.
pub struct Package {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

impl Package {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    pub fn add(&mut self, path: &str, data: &[u8]) -> Result<(), RenderError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(path, options)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    pub fn add_xml(&mut self, path: &str, xml: &str) -> Result<(), RenderError> {
        self.add(path, xml.as_bytes())
    }

    pub fn finish(self) -> Result<Vec<u8>, RenderError> {
        Ok(self.writer.finish()?.into_inner())
    }
}

/// One relationship entry.
pub struct Relationship<'a> {
    pub id: &'a str,
    pub rel_type: &'a str,
    pub target: &'a str,
}

pub fn relationships_xml(rels: &[Relationship<'_>]) -> String {
    let mut xml = format!(
        r#"{XML_HEADER}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
    );
    for rel in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            rel.id,
            rel.rel_type,
            xml_escape(rel.target)
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// `[Content_Types].xml` with the given image defaults and part overrides.
pub fn content_types_xml(image_defaults: &[(&str, &str)], overrides: &[(String, &str)]) -> String {
    let mut xml = format!(
        r#"{XML_HEADER}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#
    );
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    for (ext, content_type) in image_defaults {
        xml.push_str(&format!(
            r#"<Default Extension="{ext}" ContentType="{content_type}"/>"#
        ));
    }
    for (part, content_type) in overrides {
        xml.push_str(&format!(
            r#"<Override PartName="{part}" ContentType="{content_type}"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

pub const CORE_PROPERTIES_TYPE: &str = "application/vnd.openxmlformats-package.core-properties+xml";

/// `docProps/core.xml`: title, report id and creation time.
pub fn core_properties_xml(doc: &ReportDocument<'_>) -> String {
    format!(
        r#"{XML_HEADER}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title><dc:identifier>{}</dc:identifier><dc:creator>{}</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created></cp:coreProperties>"#,
        xml_escape(doc.title),
        xml_escape(&doc.report_id),
        crate::config::APP_NAME,
        doc.generated_at.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

/// Text of every paragraph in a WordprocessingML or DrawingML part, in
/// document order. `prefix` is `w` or `a`.
#[cfg(test)]
pub(crate) fn paragraph_texts(xml: &str, prefix: &str) -> Vec<String> {
    let para = regex::Regex::new(&format!(r"(?s)<{prefix}:p[ >].*?</{prefix}:p>")).unwrap();
    let run = regex::Regex::new(&format!(r"(?s)<{prefix}:t(?: [^>]*)?>(.*?)</{prefix}:t>")).unwrap();
    para.find_iter(xml)
        .map(|p| {
            run.captures_iter(p.as_str())
                .map(|c| unescape(&c[1]))
                .collect::<String>()
        })
        .collect()
}

#[cfg(test)]
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Read one entry of a zip package as a string.
#[cfg(test)]
pub(crate) fn read_entry(bytes: &[u8], name: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    out
}

#[cfg(test)]
pub(crate) fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(String::from).collect()
}
