//! Document text loaders
//!
//! PDF text comes from lopdf page extraction; plain text and markdown are read
//! as-is. Spreadsheet rows and JSON leaves become `key: value` lines, and Office
//! documents are read straight from their zipped XML parts. Extracted text keeps
//! its paragraph structure so the chunker can split on it.

use crate::errors::IngestionError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, warn};

/// Formats the loaders understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    PlainText,
    Csv,
    Json,
    Docx,
    Pptx,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, IngestionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(SourceFormat::Pdf),
            "txt" | "text" | "md" | "markdown" => Ok(SourceFormat::PlainText),
            "csv" => Ok(SourceFormat::Csv),
            "json" => Ok(SourceFormat::Json),
            "docx" => Ok(SourceFormat::Docx),
            "pptx" => Ok(SourceFormat::Pptx),
            other => Err(IngestionError::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            })),
        }
    }
}

/// Load the text of a file, dispatching on its extension
pub fn load_text(path: &Path) -> Result<String, IngestionError> {
    let name = path.display().to_string();
    let text = match SourceFormat::from_path(path)? {
        SourceFormat::Pdf => extract_text_from_pdf(path)?,
        SourceFormat::PlainText => clean_text(&std::fs::read_to_string(path)?),
        SourceFormat::Csv => extract_text_from_csv(std::fs::File::open(path)?, &name)?,
        SourceFormat::Json => extract_text_from_json(&std::fs::read(path)?, &name)?,
        SourceFormat::Docx => extract_text_from_docx(std::fs::File::open(path)?, &name)?,
        SourceFormat::Pptx => extract_text_from_pptx(std::fs::File::open(path)?, &name)?,
    };
    if text.trim().is_empty() {
        return Err(IngestionError::EmptyDocument(name));
    }
    Ok(text)
}

/// Extract text content from a PDF file
pub fn extract_text_from_pdf(path: &Path) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParse {
        path: path.display().to_string(),
        message: format!("failed to load PDF: {}", e),
    })?;
    extract_from_document(&doc, &path.display().to_string())
}

/// Extract text content from an in-memory PDF
pub fn extract_text_from_pdf_bytes(bytes: &[u8], name: &str) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::PdfParse {
        path: name.to_string(),
        message: format!("failed to load PDF: {}", e),
    })?;
    extract_from_document(&doc, name)
}

fn extract_from_document(doc: &lopdf::Document, name: &str) -> Result<String, IngestionError> {
    let pages = doc.get_pages();
    debug!(page_count = pages.len(), source = name, "Extracting text from PDF");

    let mut page_texts = Vec::with_capacity(pages.len());
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) => page_texts.push(text),
            Err(e) => warn!(page = page_num, error = %e, "Failed to extract page text, skipping"),
        }
    }

    let text = page_texts.join("\n\n");
    if text.trim().is_empty() {
        return Err(IngestionError::PdfParse {
            path: name.to_string(),
            message: "no text content extracted".to_string(),
        });
    }

    let cleaned = clean_text(&text);
    debug!(
        original_len = text.len(),
        cleaned_len = cleaned.len(),
        "Text extraction complete"
    );
    Ok(cleaned)
}

/// One paragraph per record, one `header: value` line per non-empty field
pub fn extract_text_from_csv<R: Read>(reader: R, name: &str) -> Result<String, IngestionError> {
    let malformed = |e: csv::Error| IngestionError::Malformed {
        format: "csv",
        path: name.to_string(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers().map_err(malformed)?.clone();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(i, value)| match headers.get(i).filter(|h| !h.trim().is_empty()) {
                Some(header) => format!("{}: {}", header.trim(), value.trim()),
                None => format!("column {}: {}", i + 1, value.trim()),
            })
            .collect();
        if !lines.is_empty() {
            records.push(lines.join("\n"));
        }
    }
    debug!(records = records.len(), source = name, "Extracted CSV records");
    Ok(clean_text(&records.join("\n\n")))
}

/// Flatten a JSON document into `path: value` lines
pub fn extract_text_from_json(bytes: &[u8], name: &str) -> Result<String, IngestionError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| IngestionError::Malformed {
            format: "json",
            path: name.to_string(),
            message: e.to_string(),
        })?;

    let mut lines = Vec::new();
    flatten_json(&value, String::new(), &mut lines);
    Ok(clean_text(&lines.join("\n")))
}

fn flatten_json(value: &serde_json::Value, path: String, lines: &mut Vec<String>) {
    use serde_json::Value;

    let leaf = |text: String, lines: &mut Vec<String>| {
        if path.is_empty() {
            lines.push(text);
        } else {
            lines.push(format!("{}: {}", path, text));
        }
    };
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_json(child, child_path, lines);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_json(child, format!("{}[{}]", path, i), lines);
            }
        }
        Value::String(text) if text.trim().is_empty() => {}
        Value::String(text) => leaf(text.clone(), lines),
        Value::Null => {}
        other => leaf(other.to_string(), lines),
    }
}

/// Paragraph text of a Word document's main body
pub fn extract_text_from_docx<R: Read + Seek>(reader: R, name: &str) -> Result<String, IngestionError> {
    let mut archive = open_archive(reader, "docx", name)?;
    let xml = read_part(&mut archive, "word/document.xml", "docx", name)?;
    Ok(clean_text(&xml_paragraphs(&xml, "docx", name)?))
}

/// Slide text of a PowerPoint deck, slides in order
pub fn extract_text_from_pptx<R: Read + Seek>(reader: R, name: &str) -> Result<String, IngestionError> {
    let mut archive = open_archive(reader, "pptx", name)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|part| {
            let number = part
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((number, part.to_string()))
        })
        .collect();
    slides.sort();
    debug!(slide_count = slides.len(), source = name, "Extracting text from PPTX");

    let mut texts = Vec::with_capacity(slides.len());
    for (_, part) in &slides {
        let xml = read_part(&mut archive, part, "pptx", name)?;
        texts.push(xml_paragraphs(&xml, "pptx", name)?);
    }
    Ok(clean_text(&texts.join("\n\n")))
}

fn open_archive<R: Read + Seek>(
    reader: R,
    format: &'static str,
    name: &str,
) -> Result<zip::ZipArchive<R>, IngestionError> {
    zip::ZipArchive::new(reader).map_err(|e| IngestionError::Malformed {
        format,
        path: name.to_string(),
        message: format!("not a valid archive: {}", e),
    })
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    part: &str,
    format: &'static str,
    name: &str,
) -> Result<String, IngestionError> {
    let mut file = archive.by_name(part).map_err(|e| IngestionError::Malformed {
        format,
        path: name.to_string(),
        message: format!("missing {}: {}", part, e),
    })?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Text runs (`<w:t>`, `<a:t>`) joined per paragraph (`<w:p>`, `<a:p>`)
fn xml_paragraphs(xml: &str, format: &'static str, name: &str) -> Result<String, IngestionError> {
    let malformed = |e: quick_xml::Error| IngestionError::Malformed {
        format,
        path: name.to_string(),
        message: e.to_string(),
    };

    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run = false;
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push(' '),
                b"br" => out.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_run => out.push_str(&text.unescape().map_err(malformed)?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Normalize extracted text: collapse runs of spaces within a line, keep at
/// most one blank line between paragraphs, strip BOMs and typographic quotes.
pub fn clean_text(text: &str) -> String {
    let text = text
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace("\r\n", "\n");

    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let input = "Hello   World\r\n\n\n\nTest  \u{201C}quoted\u{201D}\nnext";
        assert_eq!(clean_text(input), "Hello World\n\nTest \"quoted\"\nnext");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a/b/Deck.PDF")).unwrap(), SourceFormat::Pdf);
        assert_eq!(SourceFormat::from_path(Path::new("notes.md")).unwrap(), SourceFormat::PlainText);
        assert_eq!(SourceFormat::from_path(Path::new("deals.CSV")).unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_path(Path::new("memo.docx")).unwrap(), SourceFormat::Docx);
        assert_eq!(SourceFormat::from_path(Path::new("deck.pptx")).unwrap(), SourceFormat::Pptx);
        assert_eq!(SourceFormat::from_path(Path::new("a.json")).unwrap(), SourceFormat::Json);
        assert!(matches!(
            SourceFormat::from_path(Path::new("model.xlsx")),
            Err(IngestionError::UnsupportedFormat(_))
        ));
        assert!(SourceFormat::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn test_load_plain_text() {
        let path = std::env::temp_dir().join(format!("dealflow-loader-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "First  paragraph.\n\n\nSecond paragraph.").unwrap();
        let text = load_text(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(text, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_text(Path::new("/definitely/not/here.txt"));
        assert!(matches!(result, Err(IngestionError::Io(_))));
    }

    fn zipped(parts: &[(&str, &str)]) -> std::io::Cursor<Vec<u8>> {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_csv_rows_become_paragraphs() {
        let csv = "company,revenue,notes\nAcme,120,Strong pipeline\nBeta,,\n";
        let text = extract_text_from_csv(csv.as_bytes(), "deals.csv").unwrap();
        assert_eq!(
            text,
            "company: Acme\nrevenue: 120\nnotes: Strong pipeline\n\ncompany: Beta"
        );
    }

    #[test]
    fn test_csv_file_through_load_text() {
        let path = std::env::temp_dir().join(format!("dealflow-loader-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&path, "metric,value\nEBITDA margin,18%\n").unwrap();
        let text = load_text(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(text, "metric: EBITDA margin\nvalue: 18%");
    }

    #[test]
    fn test_header_only_csv_is_empty() {
        let path = std::env::temp_dir().join(format!("dealflow-loader-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&path, "company,revenue\n").unwrap();
        let result = load_text(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(IngestionError::EmptyDocument(_))));
    }

    #[test]
    fn test_json_is_flattened() {
        let json = br#"{"company": {"name": "Acme", "segments": ["grid", "storage"]}, "revenue": 120.5, "note": null}"#;
        let text = extract_text_from_json(json, "profile.json").unwrap();
        assert!(text.contains("company.name: Acme"));
        assert!(text.contains("company.segments[0]: grid"));
        assert!(text.contains("company.segments[1]: storage"));
        assert!(text.contains("revenue: 120.5"));
        assert!(!text.contains("note"));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let result = extract_text_from_json(b"{ not json", "broken.json");
        assert!(matches!(result, Err(IngestionError::Malformed { format: "json", .. })));
    }

    #[test]
    fn test_docx_paragraphs() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Investment</w:t></w:r><w:r><w:t xml:space="preserve"> memo</w:t></w:r></w:p>
    <w:p><w:r><w:t>Margins &amp; growth are strong.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let docx = zipped(&[("word/document.xml", body)]);
        let text = extract_text_from_docx(docx, "memo.docx").unwrap();
        assert_eq!(text, "Investment memo\n\nMargins & growth are strong.");
    }

    #[test]
    fn test_docx_without_body_rejected() {
        let docx = zipped(&[("word/styles.xml", "<w:styles/>")]);
        let result = extract_text_from_docx(docx, "odd.docx");
        assert!(matches!(result, Err(IngestionError::Malformed { format: "docx", .. })));
    }

    #[test]
    fn test_pptx_slides_in_order() {
        let slide = |text: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
                text
            )
        };
        let (s1, s2, s10) = (slide("Intro"), slide("Market"), slide("Ask"));
        let pptx = zipped(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
            ("ppt/presentation.xml", "<p:presentation/>"),
        ]);
        let text = extract_text_from_pptx(pptx, "deck.pptx").unwrap();
        assert_eq!(text, "Intro\n\nMarket\n\nAsk");
    }

    #[test]
    fn test_garbage_archive_rejected() {
        let result = extract_text_from_docx(std::io::Cursor::new(b"not a zip".to_vec()), "x.docx");
        assert!(matches!(result, Err(IngestionError::Malformed { .. })));
    }

    #[test]
    fn test_garbage_pdf_rejected() {
        let result = extract_text_from_pdf_bytes(b"not a pdf", "upload.pdf");
        assert!(matches!(result, Err(IngestionError::PdfParse { .. })));
    }
}
