//! Self-contained HTML report generation for a feedback object.
//!
//! The template lives in `templates/report.html` and is compiled into the
//! binary. Tera autoescapes `.html` templates, so model-written tip text can
//! never inject markup into the exported document.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use crate::models::feedback::{Feedback, Tip};

const TEMPLATE_NAME: &str = "report.html";
const TEMPLATE: &str = include_str!("../templates/report.html");

/// Delay before the print dialog opens in the print variant.
pub const PRINT_DELAY: Duration = Duration::from_millis(500);
/// Delay after printing before the window closes itself.
pub const CLOSE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// A plain document saved as a file.
    Download,
    /// The same document, printing itself once loaded and then closing.
    Print,
}

#[derive(Serialize)]
struct CategoryView<'a> {
    name: &'a str,
    score: u32,
}

#[derive(Serialize)]
struct TipView<'a> {
    good: bool,
    tip: &'a str,
    explanation: Option<&'a str>,
}

#[derive(Serialize)]
struct SectionView<'a> {
    title: &'static str,
    tips: Vec<TipView<'a>>,
}

#[derive(Serialize)]
struct ReportView<'a> {
    overall_score: u32,
    ats_score: u32,
    categories: Vec<CategoryView<'a>>,
    sections: Vec<SectionView<'a>>,
    generated_on: String,
    auto_print: bool,
    print_delay_ms: u64,
    close_delay_ms: u64,
}

fn tip_views(tips: &[Tip]) -> Vec<TipView<'_>> {
    tips.iter()
        .map(|t| TipView {
            good: t.kind.is_good(),
            tip: &t.tip,
            explanation: t.explanation.as_deref().filter(|e| !e.is_empty()),
        })
        .collect()
}

/// Renders the report document for `feedback`.
pub fn generate_report_html(
    feedback: &Feedback,
    generated_on: NaiveDate,
    mode: ReportMode,
) -> Result<String, ReportError> {
    let view = ReportView {
        overall_score: feedback.overall_score,
        ats_score: feedback.ats.score,
        categories: feedback
            .categories()
            .into_iter()
            .map(|(name, category)| CategoryView {
                name,
                score: category.score,
            })
            .collect(),
        sections: vec![
            SectionView {
                title: "Content Recommendations:",
                tips: tip_views(&feedback.content.tips),
            },
            SectionView {
                title: "Structure Recommendations:",
                tips: tip_views(&feedback.structure.tips),
            },
            SectionView {
                title: "ATS Optimization:",
                tips: feedback
                    .ats
                    .tips
                    .iter()
                    .map(|t| TipView {
                        good: t.kind.is_good(),
                        tip: &t.tip,
                        explanation: None,
                    })
                    .collect(),
            },
        ],
        generated_on: generated_on.format("%B %-d, %Y").to_string(),
        auto_print: mode == ReportMode::Print,
        print_delay_ms: PRINT_DELAY.as_millis() as u64,
        close_delay_ms: CLOSE_DELAY.as_millis() as u64,
    };

    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
    let context = Context::from_serialize(&view)?;
    Ok(tera.render(TEMPLATE_NAME, &context)?)
}

/// `Resume_Analysis_Report_<YYYY-MM-DD>.html`
pub fn report_file_name(date: NaiveDate) -> String {
    format!("Resume_Analysis_Report_{}.html", date.format("%Y-%m-%d"))
}

/// `Resume_Image_<YYYY-MM-DD>.png`
pub fn image_file_name(date: NaiveDate) -> String {
    format!("Resume_Image_{}.png", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feedback::fixtures::sample_feedback;
    use crate::models::feedback::TipKind;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn render(feedback: &Feedback, mode: ReportMode) -> String {
        generate_report_html(feedback, date(), mode).unwrap()
    }

    /// Counts whole rendered score cells, so `5/100` never matches inside `65/100`.
    fn score_cells(html: &str, score: u32) -> usize {
        html.matches(&format!(">{score}/100<")).count()
    }

    fn assert_each_score_rendered_once(feedback: &Feedback) {
        let html = render(feedback, ReportMode::Download);
        let mut scores = vec![feedback.overall_score, feedback.ats.score];
        scores.extend(feedback.categories().iter().map(|(_, c)| c.score));
        for score in scores {
            assert_eq!(score_cells(&html, score), 1, "score {score}/100");
        }
    }

    #[test]
    fn test_each_score_appears_exactly_once() {
        assert_each_score_rendered_once(&sample_feedback());
    }

    #[test]
    fn test_scores_that_share_digits_are_counted_separately() {
        let mut feedback = sample_feedback();
        feedback.overall_score = 5;
        feedback.ats.score = 65;
        feedback.skills.score = 55;
        assert_each_score_rendered_once(&feedback);
    }

    #[test]
    fn test_is_self_contained_document() {
        let html = render(&sample_feedback(), ReportMode::Download);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<style>"));
        assert!(!html.contains("<link"));
        assert!(!html.contains("<script"));
        assert!(html.contains("Report generated on October 16, 2026"));
    }

    #[test]
    fn test_tips_are_rendered_with_kind_markers() {
        let html = render(&sample_feedback(), ReportMode::Download);
        assert!(html.contains("Quantified impact"));
        assert!(html.contains("Quantified impact is a strength."));
        assert!(html.contains("Add keywords from the job description"));
        assert!(html.contains("tip tip-good"));
        assert!(html.contains("tip tip-improve"));
        // Tone and skills tips are shown on screen only, not in the report.
        assert!(!html.contains("Confident voice"));
    }

    #[test]
    fn test_model_text_is_escaped() {
        let mut feedback = sample_feedback();
        feedback.content.tips[0].tip = "<script>alert(1)</script>".to_string();
        feedback.content.tips[0].kind = TipKind::Good;
        let html = render(&feedback, ReportMode::Download);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_print_mode_schedules_print_and_close() {
        let feedback = sample_feedback();
        let html = render(&feedback, ReportMode::Print);
        assert!(html.contains("window.print()"));
        assert!(html.contains("window.close()"));
        assert!(html.contains("}, 500);"));
        assert!(html.contains("}, 1000);"));
        assert_eq!(score_cells(&html, feedback.overall_score), 1);
    }

    #[test]
    fn test_file_names_carry_iso_date() {
        assert_eq!(report_file_name(date()), "Resume_Analysis_Report_2026-10-16.html");
        assert_eq!(image_file_name(date()), "Resume_Image_2026-10-16.png");
    }
}
