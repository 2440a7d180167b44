//! Text extraction from scanned documents.
//!
//! A [`PageRasterizer`] turns the original file into one image per page and
//! an [`OcrBackend`] reads each image. Only the rasterization step can fail
//! the whole document; a page the backend cannot read is replaced by
//! [`OCR_PAGE_FAILED_MARKER`].

use crate::config::OcrSettings;
use crate::error::TransformError;
use crate::handler::Transformer;
use async_trait::async_trait;
use docflow_core::{DocumentContent, OCR_PAGE_FAILED_MARKER};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document produced no pages")]
    NoPages,
}

/// One rendered page, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub page_number: u32,
    pub png: Vec<u8>,
}

/// Converts a binary document into page images, in page order.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, document: &[u8]) -> Result<Vec<PageImage>, OcrError>;
}

/// Reads the text of a single page image.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn recognize(&self, page: &PageImage) -> Result<String, OcrError>;
}

pub struct OcrTransformer {
    rasterizer: Arc<dyn PageRasterizer>,
    backend: Arc<dyn OcrBackend>,
}

impl OcrTransformer {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, backend: Arc<dyn OcrBackend>) -> Self {
        OcrTransformer {
            rasterizer,
            backend,
        }
    }

    /// Command-line engines configured from `settings`.
    pub fn from_settings(settings: &OcrSettings) -> Self {
        OcrTransformer::new(
            Arc::new(PdftoppmRasterizer::new(&settings.pdftoppm_path, settings.dpi)),
            Arc::new(TesseractBackend::new(
                &settings.tesseract_path,
                &settings.language,
            )),
        )
    }
}

#[async_trait]
impl Transformer for OcrTransformer {
    async fn transform(&self, content: &DocumentContent) -> Result<String, TransformError> {
        let DocumentContent::Binary {
            storage_path,
            bytes,
        } = content
        else {
            return Err(TransformError::UnsupportedContent {
                expected: "binary",
                actual: content.variant_name(),
            });
        };

        let pages = self
            .rasterizer
            .rasterize(bytes)
            .await
            .map_err(|e| TransformError::Rasterize(e.to_string()))?;

        if pages.is_empty() {
            return Err(TransformError::Rasterize(OcrError::NoPages.to_string()));
        }

        debug!(storage_path = %storage_path, pages = pages.len(), "Running OCR");

        let mut texts = Vec::with_capacity(pages.len());
        for page in &pages {
            match self.backend.recognize(page).await {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!(
                        storage_path = %storage_path,
                        page = page.page_number,
                        error = %e,
                        "OCR failed for page"
                    );
                    texts.push(OCR_PAGE_FAILED_MARKER.to_string());
                }
            }
        }

        Ok(texts.join("\n"))
    }
}

/// Renders PDF pages with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>, dpi: u32) -> Self {
        PdftoppmRasterizer {
            program: program.into(),
            dpi,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, document: &[u8]) -> Result<Vec<PageImage>, OcrError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("document.pdf");
        tokio::fs::write(&input, document).await?;

        let prefix = workdir.path().join("page");
        let mut command = Command::new(&self.program);
        command
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&input)
            .arg(&prefix);
        run(&self.program, &mut command).await?;

        let mut rendered: Vec<(u32, PathBuf)> = Vec::new();
        let mut entries = tokio::fs::read_dir(workdir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(page_number) = page_number(&path) {
                rendered.push((page_number, path));
            }
        }
        rendered.sort_by_key(|(page_number, _)| *page_number);

        let mut pages = Vec::with_capacity(rendered.len());
        for (page_number, path) in rendered {
            pages.push(PageImage {
                page_number,
                png: tokio::fs::read(&path).await?,
            });
        }
        Ok(pages)
    }
}

/// Page number from a `pdftoppm` output name such as `page-07.png`.
fn page_number(path: &Path) -> Option<u32> {
    if path.extension()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (prefix, number) = stem.rsplit_once('-')?;
    if prefix != "page" {
        return None;
    }
    number.parse().ok()
}

/// Reads page images with the `tesseract` CLI.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    program: String,
    language: String,
}

impl TesseractBackend {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        TesseractBackend {
            program: program.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    async fn recognize(&self, page: &PageImage) -> Result<String, OcrError> {
        let workdir = tempfile::tempdir()?;
        let image = workdir.path().join(format!("page-{}.png", page.page_number));
        tokio::fs::write(&image, &page.png).await?;

        let mut command = Command::new(&self.program);
        command
            .arg(&image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language);
        let output = run(&self.program, &mut command).await?;

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

async fn run(program: &str, command: &mut Command) -> Result<Output, OcrError> {
    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| OcrError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(OcrError::CommandFailed {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}
