#![allow(missing_docs, clippy::missing_docs_in_private_items)]
//! Text extraction from PDF editorials.

use lopdf::{Dictionary, Document};

use super::*;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct PdfContent {
  pub metadata: PdfMetadata,
  pub pages:    Vec<PageContent>,
}

impl PdfContent {
  /// Text of every page in page order, separated by blank lines.
  pub fn text(&self) -> String {
    self
      .pages
      .iter()
      .map(|page| page.text.trim())
      .filter(|text| !text.is_empty())
      .collect::<Vec<_>>()
      .join("\n\n")
  }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct PdfMetadata {
  pub title:   Option<String>,
  pub author:  Option<String>,
  pub subject: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct PageContent {
  pub page_number: u32,
  pub text:        String,
}

/// Whether the bytes start with the PDF magic header.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
  let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
  bytes[start..].starts_with(b"%PDF-")
}

#[derive(Default)]
pub struct PdfAnalyzer;

impl PdfAnalyzer {
  pub fn new() -> Self { Self }

  /// Loads a document from memory and extracts its metadata and per-page text.
  ///
  /// Pages whose text cannot be decoded are logged and left empty; a document with no
  /// decodable page at all is a [`EditorialError::Parsing`] error.
  pub fn analyze(&self, bytes: &[u8]) -> Result<PdfContent> {
    let doc = Document::load_mem(bytes)?;
    if doc.is_encrypted() {
      return Err(EditorialError::Parsing("PDF is encrypted".into()));
    }

    let metadata = self.extract_metadata(&doc);
    let mut pages = Vec::new();
    let mut failures = 0;
    for page_number in doc.get_pages().keys().copied() {
      let text = match doc.extract_text(&[page_number]) {
        Ok(text) => text,
        Err(e) => {
          warn!(page_number, error = %e, "Could not extract text from PDF page");
          failures += 1;
          String::new()
        },
      };
      pages.push(PageContent { page_number, text });
    }

    if !pages.is_empty() && failures == pages.len() {
      return Err(EditorialError::Parsing("no PDF page could be decoded".into()));
    }
    debug!(pages = pages.len(), failures, "Analyzed PDF");
    Ok(PdfContent { metadata, pages })
  }

  fn extract_metadata(&self, doc: &Document) -> PdfMetadata {
    let info = doc
      .trailer
      .get(b"Info")
      .and_then(|o| o.as_reference())
      .and_then(|reference| doc.get_object(reference))
      .and_then(|obj| obj.as_dict());

    match info {
      Ok(info) => PdfMetadata {
        title:   self.get_text_from_dict(info, "Title"),
        author:  self.get_text_from_dict(info, "Author"),
        subject: self.get_text_from_dict(info, "Subject"),
      },
      Err(_) => PdfMetadata::default(),
    }
  }

  fn get_text_from_dict(&self, dict: &Dictionary, key: &str) -> Option<String> {
    let bytes = dict.get(key.as_bytes()).ok()?.as_str().ok()?;
    let text = if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
      let (cow, ..) = encoding_rs::UTF_16BE.decode(utf16);
      cow.into_owned()
    } else {
      String::from_utf8_lossy(bytes).into_owned()
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
  }
}
