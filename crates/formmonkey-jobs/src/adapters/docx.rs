//! DOCX extraction adapter built on `docx-rs`.

use std::sync::Arc;

use async_trait::async_trait;
use docx_rs::{
    read_docx, DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild, Table,
    TableCellContent, TableChild, TableRowChild,
};
use tracing::trace;

use formmonkey_core::defaults::{CELL_SEPARATOR, DOCX_PROGRESS_EVERY};
use formmonkey_core::{
    DocumentFormat, Error, ExtractedText, ExtractionAdapter, ProgressSink, Result,
};

/// Adapter for extracting text from Word documents.
///
/// Paragraphs become lines. Table cells are joined with `" | "` and rows
/// with newlines. Parsing runs on the blocking pool.
pub struct DocxAdapter;

fn run_text(run: &Run) -> String {
    run.children
        .iter()
        .filter_map(|rc| match rc {
            RunChild::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect()
}

/// Text of paragraph content, including runs nested in hyperlinks and
/// tracked insertions.
fn children_text(children: &[ParagraphChild]) -> String {
    children
        .iter()
        .map(|child| match child {
            ParagraphChild::Run(run) => run_text(run),
            ParagraphChild::Hyperlink(link) => children_text(&link.children),
            ParagraphChild::Insert(insert) => insert
                .children
                .iter()
                .filter_map(|ic| match ic {
                    InsertChild::Run(run) => Some(run_text(run)),
                    _ => None,
                })
                .collect(),
            _ => String::new(),
        })
        .collect()
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    children_text(&paragraph.children)
}

fn table_text(table: &Table) -> String {
    table
        .rows
        .iter()
        .map(|TableChild::TableRow(row)| {
            row.cells
                .iter()
                .map(|TableRowChild::TableCell(cell)| {
                    cell.children
                        .iter()
                        .filter_map(|content| match content {
                            TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                            TableCellContent::Table(t) => Some(table_text(t)),
                            _ => None,
                        })
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
                .join(CELL_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a DOCX body into text, reporting progress every
/// `DOCX_PROGRESS_EVERY` body elements.
fn extract_blocking(data: &[u8], progress: &dyn ProgressSink) -> Result<ExtractedText> {
    let docx = read_docx(data).map_err(|e| Error::extraction("parsing DOCX", e))?;
    let children = &docx.document.children;
    let total = children.len();
    progress.report(0, total, Some("Reading document body"));

    let mut parts: Vec<String> = Vec::new();
    for (index, child) in children.iter().enumerate() {
        let text = match child {
            DocumentChild::Paragraph(p) => paragraph_text(p),
            DocumentChild::Table(t) => table_text(t),
            _ => String::new(),
        };
        if !text.is_empty() {
            parts.push(text);
        }

        let done = index + 1;
        if done % DOCX_PROGRESS_EVERY == 0 && done < total {
            if progress.is_cancelled() {
                return Err(Error::Internal("extraction cancelled".to_string()));
            }
            trace!(done, total, "DOCX progress");
            progress.report(
                done,
                total,
                Some(&format!("Processed {} of {} elements", done, total)),
            );
        }
    }

    progress.report(total, total, Some("Document body read"));
    Ok(ExtractedText {
        text: parts.join("\n"),
        unit_count: total,
    })
}

#[async_trait]
impl ExtractionAdapter for DocxAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    async fn extract(
        &self,
        data: Vec<u8>,
        filename: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ExtractedText> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot extract text from empty DOCX data".to_string(),
            ));
        }

        // DOCX is a ZIP container
        if !data.starts_with(b"PK") {
            return Err(Error::InvalidInput(format!(
                "File '{}' is not a valid DOCX (missing ZIP header)",
                filename
            )));
        }

        tokio::task::spawn_blocking(move || extract_blocking(&data, progress.as_ref()))
            .await
            .map_err(|e| Error::extraction("DOCX parser task", e))?
    }

    async fn health_check(&self) -> Result<bool> {
        // Pure Rust parser, no external tool to check.
        Ok(true)
    }

    fn name(&self) -> &str {
        "docx"
    }
}
