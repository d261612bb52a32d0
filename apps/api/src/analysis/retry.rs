use std::time::Duration;

use tracing::warn;

use crate::analysis::Progress;
use crate::llm_client::{ChatResponse, FeedbackProvider, LlmError};

/// Attempt bound and fixed delay for the feedback call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Calls the provider up to `policy.max_attempts` times, sleeping
/// `policy.backoff` between attempts. Returns the last error once the bound
/// is exhausted.
pub async fn request_feedback_with_retry(
    provider: &dyn FeedbackProvider,
    pdf: &[u8],
    prompt: &str,
    policy: RetryPolicy,
    progress: &mut Progress,
) -> Result<ChatResponse, LlmError> {
    let mut failures = 0;
    loop {
        match provider.feedback(pdf, prompt).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                failures += 1;
                warn!("AI analysis attempt {failures} failed: {e}");
                if failures >= policy.max_attempts {
                    return Err(e);
                }
                progress.status(format!(
                    "Analysis failed, retrying... ({failures}/{})",
                    policy.max_attempts
                ));
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}
