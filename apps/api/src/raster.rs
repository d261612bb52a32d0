//! First-page PDF rasterization.
//!
//! `PdftoppmRasterizer` shells out to poppler's `pdftoppm`; the PDF is written
//! to a scratch directory that is removed when the call returns.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdftoppm exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("pdftoppm produced no image")]
    NoOutput,
}

/// A PNG rendering of a document's first page.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub file_name: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    async fn first_page_png(&self, pdf: &[u8], file_stem: &str) -> Result<RasterImage, RasterError>;
}

/// `cv.final.pdf` -> `cv.final`; names without an extension pass through.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

pub struct PdftoppmRasterizer {
    binary: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            dpi,
        }
    }
}

#[async_trait]
impl PdfRasterizer for PdftoppmRasterizer {
    async fn first_page_png(&self, pdf: &[u8], file_stem: &str) -> Result<RasterImage, RasterError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.pdf");
        let output_prefix = scratch.path().join("page");
        tokio::fs::write(&input, pdf).await?;

        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-singlefile")
            .args(["-f", "1", "-l", "1"])
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&input)
            .arg(&output_prefix)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RasterError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let png_path = output_prefix.with_extension("png");
        let bytes = match tokio::fs::read(&png_path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(RasterError::NoOutput),
        };
        debug!("Rasterized first page: {} bytes at {} dpi", bytes.len(), self.dpi);

        Ok(RasterImage {
            file_name: format!("{file_stem}.png"),
            bytes: Bytes::from(bytes),
        })
    }
}
