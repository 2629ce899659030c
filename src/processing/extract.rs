//! Text extraction for uploaded files.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::types::{ExtractionError, Upload};

/// Extraction path chosen for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Parse with the PDF text extractor.
    Pdf,
    /// Run OCR over an image.
    Image,
    /// Decode the bytes as UTF-8 text.
    Text,
}

impl DocumentKind {
    /// Classify an upload by content type, falling back to the file extension when the type
    /// is missing or generic.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Self {
        let essence = content_type
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty() && value != "application/octet-stream");

        match essence {
            Some(kind) => Self::from_mime(&kind),
            None => file_name
                .and_then(|name| Path::new(name).extension())
                .and_then(|ext| ext.to_str())
                .map(|ext| Self::from_extension(&ext.to_ascii_lowercase()))
                .unwrap_or(Self::Text),
        }
    }

    fn from_mime(mime: &str) -> Self {
        if mime == "application/pdf" {
            Self::Pdf
        } else if mime.starts_with("image/") {
            Self::Image
        } else {
            Self::Text
        }
    }

    fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" => Self::Pdf,
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp" => Self::Image,
            _ => Self::Text,
        }
    }
}

/// Pull plain text out of an uploaded file.
pub async fn extract_text(upload: Upload, ocr_command: &str) -> Result<String, ExtractionError> {
    let kind = DocumentKind::detect(upload.content_type.as_deref(), upload.file_name.as_deref());
    tracing::debug!(
        ?kind,
        bytes = upload.bytes.len(),
        file_name = ?upload.file_name,
        "Extracting upload text"
    );
    match kind {
        DocumentKind::Pdf => extract_pdf(upload.bytes).await,
        DocumentKind::Image => run_ocr(ocr_command, &upload.bytes).await,
        DocumentKind::Text => Ok(decode_text(&upload.bytes)),
    }
}

/// Lossy UTF-8 decode that drops invalid sequences instead of substituting them.
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

async fn extract_pdf(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|err| ExtractionError::Pdf(format!("extraction task failed: {err}")))?
        .map_err(|err| ExtractionError::Pdf(err.to_string()))
}

async fn run_ocr(command: &str, image: &[u8]) -> Result<String, ExtractionError> {
    let mut child = Command::new(command)
        .args(["stdin", "stdout"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| ExtractionError::Ocr(format!("failed to start '{command}': {err}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(image).await?;
        stdin.shutdown().await?;
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractionError::Ocr(format!(
            "'{command}' exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(decode_text(&output.stdout))
}
