//! PDF extraction adapter. Extracts text with `pdftotext` (poppler-utils).

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use formmonkey_core::defaults::{
    EXTRACTION_CMD_TIMEOUT_SECS, LARGE_PDF_PAGE_THRESHOLD, PAGE_SEPARATOR, PDF_BATCH_PAGES,
};
use formmonkey_core::{
    DocumentFormat, Error, ExtractedText, ExtractionAdapter, ProgressSink, Result,
};

/// Adapter for extracting text from PDF files using `pdftotext`.
///
/// Pages are extracted one `pdftotext` call at a time so progress can be
/// reported per page; documents above `LARGE_PDF_PAGE_THRESHOLD` pages are
/// extracted in `PDF_BATCH_PAGES` batches instead. Pages are joined with a
/// form feed. Each external command is guarded by a timeout.
pub struct PdfTextAdapter;

/// Read the page count from `pdfinfo` output.
fn parse_page_count(output: &str) -> Option<usize> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("pages") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Split `pdftotext` output into pages. poppler ends every page with a form
/// feed.
fn split_pages(output: &str) -> Vec<String> {
    let body = output.strip_suffix(PAGE_SEPARATOR).unwrap_or(output);
    body.split(PAGE_SEPARATOR).map(str::to_string).collect()
}

/// Page ranges (1-based, inclusive) to extract for a document.
fn page_ranges(pages: usize) -> Vec<(usize, usize)> {
    let step = if pages > LARGE_PDF_PAGE_THRESHOLD {
        PDF_BATCH_PAGES
    } else {
        1
    };
    (1..=pages)
        .step_by(step)
        .map(|start| (start, (start + step - 1).min(pages)))
        .collect()
}

/// Run a command with a timeout, returning stdout as a string.
///
/// Timeouts and non-zero exits are extraction errors naming the program.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|elapsed| {
            Error::extraction(
                format!("{} timed out after {}s", program, timeout_secs),
                elapsed,
            )
        })?
        .map_err(|e| Error::extraction(format!("spawning {}", program), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(Error::extraction(
            format!("{} failed ({})", program, output.status),
            stderr,
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn cancelled() -> Error {
    Error::Internal("extraction cancelled".to_string())
}

#[async_trait]
impl ExtractionAdapter for PdfTextAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    async fn extract(
        &self,
        data: Vec<u8>,
        filename: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ExtractedText> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }

        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::InvalidInput(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }

        // pdftotext reads from a file path
        let mut tmpfile = NamedTempFile::new()?;
        tmpfile.write_all(&data)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let pages = match run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await
        {
            Ok(output) => parse_page_count(&output).unwrap_or(0),
            Err(e) => {
                warn!(filename, error = %e, "pdfinfo failed, extracting without page count");
                0
            }
        };

        if pages == 0 {
            // Page count unknown: one pass over the whole document.
            progress.report(0, 1, Some("Extracting document"));
            let output = run_cmd_with_timeout(
                Command::new("pdftotext").arg(&tmp_path).arg("-"),
                EXTRACTION_CMD_TIMEOUT_SECS,
            )
            .await?;
            let page_texts = split_pages(&output);
            progress.report(1, 1, Some("Extracted document"));
            return Ok(ExtractedText {
                unit_count: page_texts.len(),
                text: page_texts.join(&PAGE_SEPARATOR.to_string()),
            });
        }

        debug!(filename, pages, "Extracting PDF text");
        progress.report(0, pages, Some(&format!("Extracting page 1 of {}", pages)));

        let mut page_texts: Vec<String> = Vec::with_capacity(pages);
        for (start, end) in page_ranges(pages) {
            if progress.is_cancelled() {
                return Err(cancelled());
            }
            let chunk = run_cmd_with_timeout(
                Command::new("pdftotext")
                    .arg("-f")
                    .arg(start.to_string())
                    .arg("-l")
                    .arg(end.to_string())
                    .arg(&tmp_path)
                    .arg("-"),
                EXTRACTION_CMD_TIMEOUT_SECS,
            )
            .await?;

            let mut chunk_pages = split_pages(&chunk);
            // Pad or trim so page numbering stays aligned with the document.
            chunk_pages.resize(end - start + 1, String::new());
            page_texts.extend(chunk_pages);

            trace!(filename, start, end, "Extracted page range");
            progress.report(
                end,
                pages,
                Some(&format!("Extracted page {} of {}", end, pages)),
            );
        }

        Ok(ExtractedText {
            text: page_texts.join(&PAGE_SEPARATOR.to_string()),
            unit_count: pages,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pdftotext").arg("-v").output().await {
            Ok(output) => {
                // pdftotext -v prints version to stderr and exits with 0 or 99
                // depending on the version. Both indicate the binary exists.
                Ok(output.status.success() || output.status.code() == Some(99))
            }
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formmonkey_core::NoopProgress;
    use std::sync::Mutex;

    /// Minimal valid PDF containing the text "Hello World".
    const HELLO_PDF: &[u8] = b"%PDF-1.0
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj

2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj

3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
   /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>
endobj

4 0 obj
<< /Length 44 >>
stream
BT /F1 12 Tf 100 700 Td (Hello World) Tj ET
endstream
endobj

5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000266 00000 n
0000000360 00000 n

trailer
<< /Size 6 /Root 1 0 R >>
startxref
434
%%EOF";

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(usize, usize)>>);

    impl ProgressSink for Recorder {
        fn report(&self, done: usize, total: usize, _message: Option<&str>) {
            self.0.lock().unwrap().push((done, total));
        }
    }

    #[test]
    fn test_pdf_text_format_and_name() {
        assert_eq!(PdfTextAdapter.format(), DocumentFormat::Pdf);
        assert_eq!(PdfTextAdapter.name(), "pdf_text");
    }

    #[tokio::test]
    async fn test_pdf_text_health_check() {
        // Passes whether or not pdftotext is installed
        assert!(PdfTextAdapter.health_check().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout_names_the_program() {
        let err = run_cmd_with_timeout(Command::new("sleep").arg("5"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }), "{}", err);
        assert!(err.to_string().contains("sleep timed out after 1s"), "{}", err);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failure_is_extraction_error() {
        let err = run_cmd_with_timeout(Command::new("false").arg("x"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }), "{}", err);
        assert!(err.to_string().contains("false failed"), "{}", err);
    }

    #[tokio::test]
    async fn test_pdf_text_empty_input() {
        let err = PdfTextAdapter
            .extract(Vec::new(), "empty.pdf", Arc::new(NoopProgress))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"), "{}", err);
    }

    #[tokio::test]
    async fn test_pdf_text_invalid_pdf() {
        let err = PdfTextAdapter
            .extract(b"not a pdf at all".to_vec(), "bad.pdf", Arc::new(NoopProgress))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a valid PDF"), "{}", err);
    }

    #[tokio::test]
    async fn test_pdf_text_extraction_reports_pages() {
        if !PdfTextAdapter.health_check().await.unwrap_or(false) {
            eprintln!("Skipping test_pdf_text_extraction_reports_pages: pdftotext not installed");
            return;
        }

        let recorder = Arc::new(Recorder::default());
        let extracted = PdfTextAdapter
            .extract(HELLO_PDF.to_vec(), "hello.pdf", recorder.clone())
            .await
            .unwrap();
        assert!(extracted.text.contains("Hello World"), "{}", extracted.text);
        assert_eq!(extracted.unit_count, 1);
        assert!(!extracted.text.contains(PAGE_SEPARATOR));

        let ticks = recorder.0.lock().unwrap().clone();
        assert_eq!(ticks.first(), Some(&(0, 1)));
        assert_eq!(ticks.last(), Some(&(1, 1)));
    }

    #[test]
    fn test_parse_page_count() {
        let pdfinfo_output = "\
Title:          Lease
Producer:       pdfTeX-1.40.25
Pages:          42
Page size:      612 x 792 pts (letter)
";
        assert_eq!(parse_page_count(pdfinfo_output), Some(42));
        assert_eq!(parse_page_count(""), None);
        assert_eq!(parse_page_count("Pages: many"), None);
    }

    #[test]
    fn test_split_pages_drops_trailing_form_feed() {
        assert_eq!(split_pages("one\x0ctwo\x0c"), vec!["one", "two"]);
        assert_eq!(split_pages("single"), vec!["single"]);
        assert_eq!(split_pages("\x0c"), vec![""]);
    }

    #[test]
    fn test_page_ranges_small_document_is_per_page() {
        assert_eq!(page_ranges(3), vec![(1, 1), (2, 2), (3, 3)]);
        assert!(page_ranges(0).is_empty());
    }

    #[test]
    fn test_page_ranges_large_document_is_batched() {
        let ranges = page_ranges(LARGE_PDF_PAGE_THRESHOLD + 10);
        assert_eq!(ranges.first(), Some(&(1, PDF_BATCH_PAGES)));
        assert_eq!(
            ranges.last().map(|r| r.1),
            Some(LARGE_PDF_PAGE_THRESHOLD + 10)
        );
        let covered: usize = ranges.iter().map(|(s, e)| e - s + 1).sum();
        assert_eq!(covered, LARGE_PDF_PAGE_THRESHOLD + 10);
    }
}
