//! Extraction adapter implementations.

pub mod docx;
pub mod pdf_text;

pub use docx::DocxAdapter;
pub use pdf_text::PdfTextAdapter;
