//! Text extraction for uploaded files.
//!
//! The extractor is chosen from the filename extension (case-insensitive):
//!
//! | Extension | Extractor |
//! |-----------|-----------|
//! | `.pdf` | `pdf-extract` |
//! | `.docx` | `word/document.xml` runs, one line per paragraph |
//! | `.txt`, `.md` | strict UTF-8 decode |
//!
//! Anything else is rejected. Text that is empty after trimming is rejected
//! too, so a successful extraction always yields something worth embedding.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;

use crate::error::ValidationError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    PlainText,
    Markdown,
}

impl FileKind {
    /// Resolve the format from a filename's extension.
    pub fn from_filename(filename: &str) -> Result<Self, ValidationError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pdf") => Ok(FileKind::Pdf),
            Some("docx") => Ok(FileKind::Docx),
            Some("txt") => Ok(FileKind::PlainText),
            Some("md") => Ok(FileKind::Markdown),
            Some(other) => Err(ValidationError::UnsupportedFileType {
                extension: format!(".{}", other),
            }),
            None => Err(ValidationError::UnsupportedFileType {
                extension: filename.to_string(),
            }),
        }
    }

    fn extract(self, bytes: &[u8]) -> Result<String, ValidationError> {
        match self {
            FileKind::Pdf => extract_pdf(bytes),
            FileKind::Docx => extract_docx(bytes),
            FileKind::PlainText | FileKind::Markdown => extract_utf8(bytes),
        }
    }
}

/// Extract plain text from `bytes`, choosing the extractor from `filename`.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ValidationError> {
    let kind = FileKind::from_filename(filename)?;
    let text = kind.extract(bytes)?;
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(text)
}

fn extract_utf8(bytes: &[u8]) -> Result<String, ValidationError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ValidationError::InvalidUtf8)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ValidationError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ValidationError::UnreadableDocument {
        kind: "PDF",
        reason: e.to_string(),
    })
}

fn ooxml_error(reason: impl ToString) -> ValidationError {
    ValidationError::UnreadableDocument {
        kind: "DOCX",
        reason: reason.to_string(),
    }
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ValidationError> {
    let entry = archive.by_name(name).map_err(ooxml_error)?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(ooxml_error)?;
    if out.len() as u64 >= max_bytes {
        return Err(ooxml_error(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ValidationError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_error)?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_paragraphs(&doc_xml)
}

/// Collect `<w:t>` run text, ending each `<w:p>` paragraph with a newline.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ValidationError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(ooxml_error)?;
                out.push_str(&text);
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
