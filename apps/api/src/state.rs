use std::sync::Arc;

use crate::analysis::retry::RetryPolicy;
use crate::config::Config;
use crate::llm_client::FeedbackProvider;
use crate::raster::PdfRasterizer;
use crate::storage::{FileStore, KvStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Résumé records per user namespace, plus sessions.
    pub kv: Arc<dyn KvStore>,
    pub files: Arc<dyn FileStore>,
    /// Pluggable feedback source. Default: LlmClient against the Messages API.
    pub feedback: Arc<dyn FeedbackProvider>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
    pub retry: RetryPolicy,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// In-memory stores with the given feedback and rasterizer doubles.
    pub fn for_tests(
        feedback: Arc<dyn FeedbackProvider>,
        rasterizer: Arc<dyn PdfRasterizer>,
    ) -> Self {
        use crate::storage::memory::{MemoryFiles, MemoryKv};

        AppState {
            kv: Arc::new(MemoryKv::new()),
            files: Arc::new(MemoryFiles::new()),
            feedback,
            rasterizer,
            retry: RetryPolicy::default(),
            config: Config::for_tests(),
        }
    }
}
