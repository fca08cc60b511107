//! Document-to-PDF conversion through a headless rendering engine.
//!
//! Each render launches a fresh engine process and tears it down afterwards;
//! there is no pooling, so concurrent workers never share engine state. The
//! concurrency cap in the dispatcher is what keeps the number of live engine
//! processes bounded.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::RendererConfig;

/// Monotonic counter for unique scratch-file names within one process.
static RENDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Errors from converting a receipt document to PDF.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine exceeded its wall-clock budget and was killed.
    /// Never retried: render timeouts are not transient network errors.
    #[error("pdf render timed out after {0:?}")]
    Timeout(Duration),

    /// The engine could not be launched or its scratch files handled.
    #[error("pdf engine error: {0}")]
    Engine(#[from] std::io::Error),

    /// The engine exited unsuccessfully.
    #[error("pdf engine exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// Converts rendered receipt HTML into PDF bytes.
#[async_trait]
pub trait ReceiptRenderer: Send + Sync {
    /// Render `html` to a PDF.
    async fn render(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

/// Renderer backed by a headless Chromium binary.
///
/// Page format (A4) and background printing are fixed by the receipt
/// template's print stylesheet, not per-call parameters.
pub struct ChromiumRenderer {
    chromium_path: PathBuf,
    /// Content-load and PDF budgets, summed: a process-based engine cannot
    /// observe the two phases separately.
    deadline: Duration,
}

impl ChromiumRenderer {
    /// Create a renderer from configuration.
    #[must_use]
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            chromium_path: config.chromium_path.clone(),
            deadline: config.load_timeout + config.pdf_timeout,
        }
    }
}

#[async_trait]
impl ReceiptRenderer for ChromiumRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let seq = RENDER_SEQ.fetch_add(1, Ordering::Relaxed);
        let stem = format!("paperslip-receipt-{}-{seq}", std::process::id());
        let html_path = std::env::temp_dir().join(format!("{stem}.html"));
        let pdf_path = std::env::temp_dir().join(format!("{stem}.pdf"));

        tokio::fs::write(&html_path, html).await?;

        let result = self.print_to_pdf(&html_path, &pdf_path).await;

        // Scratch files are best-effort cleanup; a leftover in tmp is not
        // worth failing the dispatch over.
        let _ = tokio::fs::remove_file(&html_path).await;
        let _ = tokio::fs::remove_file(&pdf_path).await;

        result
    }
}

impl ChromiumRenderer {
    async fn print_to_pdf(
        &self,
        html_path: &std::path::Path,
        pdf_path: &std::path::Path,
    ) -> Result<Vec<u8>, RenderError> {
        let mut child = Command::new(&self.chromium_path)
            .arg("--headless")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .arg(format!("file://{}", html_path.display()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let status = match tokio::time::timeout(self.deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                tracing::warn!(deadline = ?self.deadline, "pdf render exceeded budget, engine killed");
                return Err(RenderError::Timeout(self.deadline));
            }
        };

        if !status.success() {
            return Err(RenderError::Failed(status));
        }

        Ok(tokio::fs::read(pdf_path).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_is_sum_of_budgets() {
        let renderer = ChromiumRenderer::new(&RendererConfig {
            chromium_path: PathBuf::from("/usr/bin/chromium"),
            load_timeout: Duration::from_secs(3),
            pdf_timeout: Duration::from_secs(3),
        });
        assert_eq!(renderer.deadline, Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_missing_engine_is_engine_error() {
        let renderer = ChromiumRenderer::new(&RendererConfig {
            chromium_path: PathBuf::from("/nonexistent/chromium-binary"),
            load_timeout: Duration::from_secs(1),
            pdf_timeout: Duration::from_secs(1),
        });

        let err = renderer.render("<html></html>").await.unwrap_err();
        assert!(matches!(err, RenderError::Engine(_)));
    }
}
