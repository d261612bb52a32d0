// Upload / analysis pipeline.
// Implements: PDF upload, first-page rasterization, placeholder record,
// AI feedback with bounded retry, response cleaning and parsing.
// All AI calls go through llm_client::FeedbackProvider.

pub mod handlers;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod retry;

use tracing::info;

/// User-facing status lines emitted while a flow runs.
#[derive(Debug, Default)]
pub struct Progress {
    lines: Vec<String>,
}

impl Progress {
    pub fn status(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{line}");
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
