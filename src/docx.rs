//! In-memory builder for the press-clipping `.docx` document.
//!
//! A `.docx` file is a ZIP package of OOXML parts. The fixed parts
//! (content types, relationships, styles) are static; `word/document.xml`
//! is generated per run.

use std::io::{Cursor, Write};

use chrono::NaiveDate;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::eventregistry::types::Article;

pub const MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DEFAULT_FILENAME: &str = "DigitalClippings.docx";

const DOCUMENT_TITLE: &str = "DIGITAL MEDIA PRESS CLIPPING";
const ARTICLE_SEPARATOR: &str = "==================";
const WORDPROCESSING_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

// Font sizes are OOXML half-points: 36 = 18pt, 28 = 14pt.
const TITLE_HALF_POINTS: &str = "36";
const DATE_HALF_POINTS: &str = "28";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:pPr><w:spacing w:before="200" w:after="80"/></w:pPr><w:rPr><w:b/><w:sz w:val="26"/></w:rPr></w:style></w:styles>"#;

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("failed to assemble document package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to write document XML: {0}")]
    Xml(String),

    #[error("I/O error while writing document: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the complete document for the given articles, in their aggregated
/// order: a centered title page stamped with the generation date, then one
/// block per article (heading, source line, content, separator).
pub fn build_document(articles: &[Article], generated_on: NaiveDate) -> Result<Vec<u8>, DocxError> {
    let document = document_xml(articles, generated_on)?;
    package(&document)
}

fn package(document_xml: &[u8]) -> Result<Vec<u8>, DocxError> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    archive.start_file("[Content_Types].xml", options)?;
    archive.write_all(CONTENT_TYPES_XML.as_bytes())?;
    archive.start_file("_rels/.rels", options)?;
    archive.write_all(PACKAGE_RELS_XML.as_bytes())?;
    archive.start_file("word/_rels/document.xml.rels", options)?;
    archive.write_all(DOCUMENT_RELS_XML.as_bytes())?;
    archive.start_file("word/styles.xml", options)?;
    archive.write_all(STYLES_XML.as_bytes())?;
    archive.start_file("word/document.xml", options)?;
    archive.write_all(document_xml)?;

    Ok(archive.finish()?.into_inner())
}

fn document_xml(articles: &[Article], generated_on: NaiveDate) -> Result<Vec<u8>, DocxError> {
    let mut doc = DocBuilder::new();

    doc.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut root = BytesStart::new("w:document");
    root.push_attribute(("xmlns:w", WORDPROCESSING_NS));
    doc.write(Event::Start(root))?;
    doc.start("w:body")?;

    front_page(&mut doc, generated_on)?;
    page_break(&mut doc)?;

    for article in articles {
        article_block(&mut doc, article)?;
    }

    doc.end("w:body")?;
    doc.write(Event::End(BytesEnd::new("w:document")))?;
    Ok(doc.into_bytes())
}

/// Centered front page: bold 18pt title, then the date and day on the next
/// line at 14pt.
fn front_page(doc: &mut DocBuilder, generated_on: NaiveDate) -> Result<(), DocxError> {
    doc.start("w:p")?;
    doc.start("w:pPr")?;
    doc.empty_val("w:jc", "center")?;
    doc.end("w:pPr")?;

    doc.start("w:r")?;
    doc.start("w:rPr")?;
    doc.empty("w:b")?;
    doc.empty_val("w:sz", TITLE_HALF_POINTS)?;
    doc.end("w:rPr")?;
    doc.text_element(DOCUMENT_TITLE)?;
    doc.end("w:r")?;

    doc.start("w:r")?;
    doc.empty("w:br")?;
    doc.end("w:r")?;

    let stamp = format!(
        "{} ({})",
        generated_on.format("%Y-%m-%d"),
        generated_on.format("%A")
    );
    doc.start("w:r")?;
    doc.start("w:rPr")?;
    doc.empty_val("w:sz", DATE_HALF_POINTS)?;
    doc.end("w:rPr")?;
    doc.text_element(&stamp)?;
    doc.end("w:r")?;

    doc.end("w:p")
}

fn page_break(doc: &mut DocBuilder) -> Result<(), DocxError> {
    doc.start("w:p")?;
    doc.start("w:r")?;
    doc.empty_val_named("w:br", "w:type", "page")?;
    doc.end("w:r")?;
    doc.end("w:p")
}

fn article_block(doc: &mut DocBuilder, article: &Article) -> Result<(), DocxError> {
    paragraph(doc, Some("Heading2"), None, &article.title)?;
    paragraph(doc, None, None, &format!("Source: {}", article.url))?;
    paragraph(doc, None, Some("both"), "Content:")?;
    paragraph(doc, None, Some("both"), &article.body)?;
    paragraph(doc, None, None, ARTICLE_SEPARATOR)
}

fn paragraph(
    doc: &mut DocBuilder,
    style: Option<&str>,
    justify: Option<&str>,
    text: &str,
) -> Result<(), DocxError> {
    doc.start("w:p")?;
    if style.is_some() || justify.is_some() {
        doc.start("w:pPr")?;
        if let Some(style) = style {
            doc.empty_val("w:pStyle", style)?;
        }
        if let Some(justify) = justify {
            doc.empty_val("w:jc", justify)?;
        }
        doc.end("w:pPr")?;
    }
    doc.start("w:r")?;
    doc.text_element(text)?;
    doc.end("w:r")?;
    doc.end("w:p")
}

/// Thin wrapper over the XML event writer; every write funnels through
/// `write` so error conversion lives in one place.
struct DocBuilder {
    writer: Writer<Vec<u8>>,
}

impl DocBuilder {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), DocxError> {
        self.writer
            .write_event(event)
            .map_err(|e| DocxError::Xml(e.to_string()))
    }

    fn start(&mut self, name: &str) -> Result<(), DocxError> {
        self.write(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<(), DocxError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str) -> Result<(), DocxError> {
        self.write(Event::Empty(BytesStart::new(name)))
    }

    fn empty_val(&mut self, name: &str, val: &str) -> Result<(), DocxError> {
        self.empty_val_named(name, "w:val", val)
    }

    fn empty_val_named(&mut self, name: &str, attr: &str, val: &str) -> Result<(), DocxError> {
        let mut element = BytesStart::new(name);
        element.push_attribute((attr, val));
        self.write(Event::Empty(element))
    }

    /// `<w:t xml:space="preserve">text</w:t>` with the text escaped.
    fn text_element(&mut self, text: &str) -> Result<(), DocxError> {
        let mut element = BytesStart::new("w:t");
        element.push_attribute(("xml:space", "preserve"));
        self.write(Event::Start(element))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end("w:t")
    }
}
