//! PDF文本提取与标题识别

mod classify;
mod document;
mod source;

#[cfg(test)]
pub(crate) mod fixtures;

pub use classify::HeadingClassifier;
pub use document::{Bookmark, PDF_MAGIC, PdfDocument, PdfInfo, PdfPage, decode_pdf_string, is_pdf};
pub use source::{PdfSource, TextBlock};
