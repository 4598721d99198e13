// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-pdf
//!
//! 7501 batch PDF post-processing.
//!
//! Two jobs: shrink the portal's enormous batch PDFs with Ghostscript
//! before upload, and read back the two figures the reconciliation needs —
//! how many entries the document contains and the summed "Total duty &
//! fees" amount. Compression failures are never fatal; the original bytes
//! are kept.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use lopdf::Document;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Errors from PDF post-processing.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The bytes were not a loadable PDF.
    #[error("failed to load PDF")]
    Load(#[source] lopdf::Error),

    /// Temp-file plumbing around the compression subprocess failed.
    #[error("pdf io failed")]
    Io(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// What happened to the bytes during compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// Ghostscript succeeded.
    Compressed {
        /// Input size in bytes.
        original: u64,
        /// Output size in bytes.
        compressed: u64,
    },
    /// Ghostscript was unavailable or failed; the original bytes stand.
    Fallback {
        /// Why compression did not happen.
        reason: String,
    },
}

/// Ghostscript invocation for aggressive recompression: PDF 1.4, `/screen`
/// preset, color/gray/mono downsampled to 150 DPI bicubic, sRGB.
fn ghostscript_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-sDEVICE=pdfwrite".to_string(),
        "-dCompatibilityLevel=1.4".to_string(),
        "-dPDFSETTINGS=/screen".to_string(),
        "-dNOPAUSE".to_string(),
        "-dQUIET".to_string(),
        "-dBATCH".to_string(),
        "-dColorImageResolution=150".to_string(),
        "-dGrayImageResolution=150".to_string(),
        "-dMonoImageResolution=150".to_string(),
        "-dColorImageDownsampleType=/Bicubic".to_string(),
        "-dGrayImageDownsampleType=/Bicubic".to_string(),
        "-dColorConversionStrategy=/sRGB".to_string(),
        "-dProcessColorModel=/DeviceRGB".to_string(),
        format!("-sOutputFile={}", output.display()),
        input.display().to_string(),
    ]
}

/// Compress PDF bytes through Ghostscript.
///
/// Returns the resulting bytes plus what happened. Every failure mode —
/// missing binary, non-zero exit, timeout, unreadable output — falls back
/// to the input bytes.
///
/// # Errors
///
/// Returns [`PdfError::Io`] only when the temp files for the subprocess
/// cannot be created at all.
pub async fn compress_bytes(
    bytes: &[u8],
    timeout: Duration,
) -> Result<(Vec<u8>, CompressionOutcome), PdfError> {
    let dir = tempfile::tempdir().map_err(PdfError::Io)?;
    let input = dir.path().join("original.pdf");
    let output = dir.path().join("compressed.pdf");
    tokio::fs::write(&input, bytes).await.map_err(PdfError::Io)?;

    let fallback = |reason: String| {
        warn!(target: "drx.pdf", %reason, "compression fell back to original bytes");
        (bytes.to_vec(), CompressionOutcome::Fallback { reason })
    };

    let mut command = Command::new("gs");
    command.args(ghostscript_args(&input, &output));
    command.kill_on_drop(true);

    let run = tokio::time::timeout(timeout, command.output()).await;
    let result = match run {
        Err(_) => {
            return Ok(fallback(format!(
                "ghostscript timed out after {}s",
                timeout.as_secs()
            )));
        }
        Ok(Err(e)) => return Ok(fallback(format!("ghostscript not runnable: {e}"))),
        Ok(Ok(output)) => output,
    };

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Ok(fallback(format!(
            "ghostscript exited with {}: {}",
            result.status,
            stderr.trim()
        )));
    }

    match tokio::fs::read(&output).await {
        Ok(compressed) if !compressed.is_empty() => {
            let original = bytes.len() as u64;
            let size = compressed.len() as u64;
            info!(
                target: "drx.pdf",
                original,
                compressed = size,
                reduction_pct = ((original.saturating_sub(size)) as f64 / original.max(1) as f64) * 100.0,
                "pdf compressed"
            );
            Ok((
                compressed,
                CompressionOutcome::Compressed {
                    original,
                    compressed: size,
                },
            ))
        }
        Ok(_) => Ok(fallback("ghostscript produced an empty file".to_string())),
        Err(e) => Ok(fallback(format!("compressed output unreadable: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// The two figures read back from a batch PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfFigures {
    /// Distinct entry identifiers found in the document.
    pub entry_count: u64,
    /// Sum of every "Total duty & fees" amount.
    pub total_duty: f64,
}

fn entry_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Entry numbers render as filer code, 7-digit serial, check digit.
    RE.get_or_init(|| Regex::new(r"\b[A-Z0-9]{3}-\d{7}-\d\b").expect("static regex"))
}

fn duty_fees_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)total\s+duty\s*&\s*fees[^0-9$]{0,40}\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)")
            .expect("static regex")
    })
}

/// Extract the reconciled figures from PDF bytes.
///
/// Text is read page by page; pages whose text cannot be decoded are
/// skipped. Both figures are reported even when zero — the caller decides
/// whether zero deserves a warning.
///
/// # Errors
///
/// Returns [`PdfError::Load`] when the bytes are not a PDF at all.
pub fn extract_figures(bytes: &[u8]) -> Result<PdfFigures, PdfError> {
    let document = Document::load_mem(bytes).map_err(PdfError::Load)?;

    let mut entry_numbers: BTreeSet<String> = BTreeSet::new();
    let mut total_duty = 0.0f64;
    let mut unreadable_pages = 0usize;

    for (page_number, _) in document.get_pages() {
        let text = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                debug!(target: "drx.pdf", page = page_number, error = %e, "page text unreadable");
                unreadable_pages += 1;
                continue;
            }
        };
        for m in entry_number_re().find_iter(&text) {
            entry_numbers.insert(m.as_str().to_string());
        }
        for captures in duty_fees_re().captures_iter(&text) {
            let raw = captures[1].replace(',', "");
            total_duty += raw.parse::<f64>().unwrap_or(0.0);
        }
    }

    if unreadable_pages > 0 {
        warn!(target: "drx.pdf", unreadable_pages, "some pages yielded no text");
    }
    info!(
        target: "drx.pdf",
        entries = entry_numbers.len(),
        total_duty,
        "figures extracted from batch pdf"
    );
    Ok(PdfFigures {
        entry_count: entry_numbers.len() as u64,
        total_duty,
    })
}
