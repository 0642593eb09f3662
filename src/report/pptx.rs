//! PresentationML (PPTX) report: title slide, image slide, analysis slides
//! of [`super::PARAGRAPHS_PER_SLIDE`] paragraphs, disclaimer slide.

use super::ooxml::{
    content_types_xml, core_properties_xml, relationships_xml, xml_escape, Package, Relationship,
    CORE_PROPERTIES_TYPE, EMU_PER_INCH, REL_CORE_PROPERTIES, REL_IMAGE, REL_OFFICE_DOCUMENT,
    XML_HEADER,
};
use super::{
    field_line, fit_within, EmbeddableImage, ImageSlot, RenderError, ReportDocument,
    DISCLAIMER_HEADING, IMAGE_HEADING, IMAGE_PLACEHOLDER, NO_IMAGE, PATIENT_HEADING,
};

const PRESENTATION_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const SLIDE_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const SLIDE_LAYOUT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";
const SLIDE_MASTER_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
const THEME_TYPE: &str = "application/vnd.openxmlformats-officedocument.theme+xml";

const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
const REL_THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

/// 16:9 slide.
const SLIDE_WIDTH: i64 = 12_192_000;
const SLIDE_HEIGHT: i64 = 6_858_000;
const MARGIN: i64 = (EMU_PER_INCH * 0.5) as i64;
const TITLE_HEIGHT: i64 = (EMU_PER_INCH * 1.0) as i64;
const BODY_TOP: i64 = MARGIN + TITLE_HEIGHT + MARGIN / 2;

const EMPTY_TREE: &str = r#"<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>"#;

const THEME_XML: &str = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="MedReport"><a:themeElements><a:clrScheme name="MedReport"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F3A5F"/></a:dk2><a:lt2><a:srgbClr val="E7ECF2"/></a:lt2><a:accent1><a:srgbClr val="2E75B6"/></a:accent1><a:accent2><a:srgbClr val="C55A11"/></a:accent2><a:accent3><a:srgbClr val="7F7F7F"/></a:accent3><a:accent4><a:srgbClr val="BF9000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="MedReport"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="MedReport"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#;

/// Body content of one slide.
enum SlideBody<'a> {
    /// Paragraphs; `true` marks a bold one.
    Text(Vec<(String, bool)>),
    Picture(EmbeddableImage<'a>),
}

struct Slide<'a> {
    title: &'a str,
    body: SlideBody<'a>,
}

fn slides<'a>(doc: &'a ReportDocument<'a>) -> Vec<Slide<'a>> {
    let mut title_body: Vec<(String, bool)> = doc
        .metadata
        .iter()
        .map(|(label, value)| (field_line(label, value), false))
        .collect();
    title_body.push((PATIENT_HEADING.to_string(), true));
    title_body.extend(
        doc.patient
            .iter()
            .map(|(label, value)| (field_line(label, value), false)),
    );

    let mut out = vec![Slide {
        title: doc.title,
        body: SlideBody::Text(title_body),
    }];

    out.push(Slide {
        title: IMAGE_HEADING,
        body: match &doc.image {
            ImageSlot::Embeddable(img) => SlideBody::Picture(*img),
            ImageSlot::Absent => SlideBody::Text(vec![(NO_IMAGE.to_string(), false)]),
            ImageSlot::Unembeddable { .. } => {
                SlideBody::Text(vec![(IMAGE_PLACEHOLDER.to_string(), false)])
            }
        },
    });

    for (title, chunk) in doc.analysis_slides() {
        out.push(Slide {
            title,
            body: SlideBody::Text(chunk.iter().map(|p| (p.clone(), false)).collect()),
        });
    }

    out.push(Slide {
        title: DISCLAIMER_HEADING,
        body: SlideBody::Text(vec![(doc.disclaimer.to_string(), false)]),
    });
    out
}

pub fn render_pptx(doc: &ReportDocument<'_>) -> Result<Vec<u8>, RenderError> {
    let slides = slides(doc);
    let image = match &doc.image {
        ImageSlot::Embeddable(img) => Some(*img),
        _ => None,
    };
    let media_name = image.map(|img| format!("image1.{}", img.extension));

    let mut pkg = Package::new();

    let mut overrides = vec![
        ("/ppt/presentation.xml".to_string(), PRESENTATION_TYPE),
        ("/ppt/slideMasters/slideMaster1.xml".to_string(), SLIDE_MASTER_TYPE),
        ("/ppt/slideLayouts/slideLayout1.xml".to_string(), SLIDE_LAYOUT_TYPE),
        ("/ppt/theme/theme1.xml".to_string(), THEME_TYPE),
        ("/docProps/core.xml".to_string(), CORE_PROPERTIES_TYPE),
    ];
    for n in 1..=slides.len() {
        overrides.push((format!("/ppt/slides/slide{n}.xml"), SLIDE_TYPE));
    }
    let image_defaults: Vec<(&str, &str)> = image
        .iter()
        .map(|img| (img.extension, img.content_type))
        .collect();
    pkg.add_xml(
        "[Content_Types].xml",
        &content_types_xml(&image_defaults, &overrides),
    )?;

    pkg.add_xml(
        "_rels/.rels",
        &relationships_xml(&[
            Relationship {
                id: "rId1",
                rel_type: REL_OFFICE_DOCUMENT,
                target: "ppt/presentation.xml",
            },
            Relationship {
                id: "rId2",
                rel_type: REL_CORE_PROPERTIES,
                target: "docProps/core.xml",
            },
        ]),
    )?;
    pkg.add_xml("docProps/core.xml", &core_properties_xml(doc))?;

    pkg.add_xml("ppt/presentation.xml", &presentation_xml(slides.len()))?;
    let slide_ids: Vec<(String, String)> = (1..=slides.len())
        .map(|n| (format!("rIdSlide{n}"), format!("slides/slide{n}.xml")))
        .collect();
    let mut presentation_rels = vec![Relationship {
        id: "rIdMaster1",
        rel_type: REL_SLIDE_MASTER,
        target: "slideMasters/slideMaster1.xml",
    }];
    presentation_rels.extend(slide_ids.iter().map(|(id, target)| Relationship {
        id: id.as_str(),
        rel_type: REL_SLIDE,
        target: target.as_str(),
    }));
    presentation_rels.push(Relationship {
        id: "rIdTheme1",
        rel_type: REL_THEME,
        target: "theme/theme1.xml",
    });
    pkg.add_xml(
        "ppt/_rels/presentation.xml.rels",
        &relationships_xml(&presentation_rels),
    )?;

    pkg.add_xml(
        "ppt/slideMasters/slideMaster1.xml",
        &format!(
            r#"{XML_HEADER}<p:sldMaster {NS}>{EMPTY_TREE}<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
        ),
    )?;
    pkg.add_xml(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &relationships_xml(&[
            Relationship {
                id: "rId1",
                rel_type: REL_SLIDE_LAYOUT,
                target: "../slideLayouts/slideLayout1.xml",
            },
            Relationship {
                id: "rId2",
                rel_type: REL_THEME,
                target: "../theme/theme1.xml",
            },
        ]),
    )?;
    pkg.add_xml(
        "ppt/slideLayouts/slideLayout1.xml",
        &format!(
            r#"{XML_HEADER}<p:sldLayout {NS} type="blank" preserve="1">{EMPTY_TREE}<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
        ),
    )?;
    pkg.add_xml(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &relationships_xml(&[Relationship {
            id: "rId1",
            rel_type: REL_SLIDE_MASTER,
            target: "../slideMasters/slideMaster1.xml",
        }]),
    )?;
    pkg.add_xml("ppt/theme/theme1.xml", &format!("{XML_HEADER}{THEME_XML}"))?;

    if let (Some(img), Some(name)) = (image, &media_name) {
        pkg.add(&format!("ppt/media/{name}"), img.bytes)?;
    }

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        pkg.add_xml(&format!("ppt/slides/slide{n}.xml"), &slide_xml(slide))?;

        let mut rels = vec![Relationship {
            id: "rId1",
            rel_type: REL_SLIDE_LAYOUT,
            target: "../slideLayouts/slideLayout1.xml",
        }];
        let media_target = media_name.as_ref().map(|name| format!("../media/{name}"));
        if let (SlideBody::Picture(_), Some(target)) = (&slide.body, &media_target) {
            rels.push(Relationship {
                id: "rIdImage1",
                rel_type: REL_IMAGE,
                target: target.as_str(),
            });
        }
        pkg.add_xml(
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            &relationships_xml(&rels),
        )?;
    }

    pkg.finish()
}

fn presentation_xml(slide_count: usize) -> String {
    let ids: String = (1..=slide_count)
        .map(|n| format!(r#"<p:sldId id="{}" r:id="rIdSlide{n}"/>"#, 255 + n))
        .collect();
    format!(
        r#"{XML_HEADER}<p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rIdMaster1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{SLIDE_WIDTH}" cy="{SLIDE_HEIGHT}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

fn slide_xml(slide: &Slide<'_>) -> String {
    let width = SLIDE_WIDTH - 2 * MARGIN;
    let title = text_shape(
        2,
        "Title",
        (MARGIN, MARGIN, width, TITLE_HEIGHT),
        &[(slide.title.to_string(), true)],
        3200,
    );
    let body_frame = (MARGIN, BODY_TOP, width, SLIDE_HEIGHT - BODY_TOP - MARGIN);
    let body = match &slide.body {
        SlideBody::Text(paragraphs) => text_shape(3, "Body", body_frame, paragraphs, 1600),
        SlideBody::Picture(img) => picture_shape(3, body_frame, img),
    };
    format!(
        r#"{XML_HEADER}<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{title}{body}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn text_shape(
    id: u32,
    name: &str,
    (x, y, cx, cy): (i64, i64, i64, i64),
    paragraphs: &[(String, bool)],
    size: u32,
) -> String {
    let body: String = if paragraphs.is_empty() {
        r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string()
    } else {
        paragraphs
            .iter()
            .map(|(text, bold)| {
                format!(
                    r#"<a:p><a:r><a:rPr lang="en-US" sz="{size}" b="{}" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
                    u8::from(*bold),
                    xml_escape(text)
                )
            })
            .collect()
    };
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="square"><a:normAutofit/></a:bodyPr><a:lstStyle/>{body}</p:txBody></p:sp>"#
    )
}

fn picture_shape(
    id: u32,
    (x, y, max_cx, max_cy): (i64, i64, i64, i64),
    img: &EmbeddableImage<'_>,
) -> String {
    let (w, h) = fit_within(img.width, img.height, max_cx as f64, max_cy as f64);
    let (cx, cy) = (w.round() as i64, h.round() as i64);
    let off_x = x + (max_cx - cx) / 2;
    let off_y = y + (max_cy - cy) / 2;
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Medical image"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rIdImage1"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{off_x}" y="{off_y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
    )
}
