//! The structured evaluation returned by the AI feedback service.
//!
//! Field names follow the JSON the model is instructed to produce
//! (`overallScore`, `ATS`, `toneAndStyle`, ...), so records written by earlier
//! clients deserialize unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_SCORE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

impl TipKind {
    pub fn is_good(self) -> bool {
        matches!(self, TipKind::Good)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// ATS tips carry no explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsTip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFeedback {
    pub score: u32,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsFeedback {
    pub score: u32,
    #[serde(default)]
    pub tips: Vec<AtsTip>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: u32,
    #[serde(rename = "ATS")]
    pub ats: AtsFeedback,
    pub tone_and_style: CategoryFeedback,
    pub content: CategoryFeedback,
    pub structure: CategoryFeedback,
    pub skills: CategoryFeedback,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{field} score {score} is outside 0..=100")]
pub struct ScoreOutOfRange {
    pub field: &'static str,
    pub score: u32,
}

impl Feedback {
    /// The four scored categories in display order.
    pub fn categories(&self) -> [(&'static str, &CategoryFeedback); 4] {
        [
            ("Tone & Style", &self.tone_and_style),
            ("Content", &self.content),
            ("Structure", &self.structure),
            ("Skills", &self.skills),
        ]
    }

    /// Checks that every score lies in `[0, 100]`.
    pub fn validate(&self) -> Result<(), ScoreOutOfRange> {
        let scores = [
            ("overallScore", self.overall_score),
            ("ATS", self.ats.score),
            ("toneAndStyle", self.tone_and_style.score),
            ("content", self.content.score),
            ("structure", self.structure.score),
            ("skills", self.skills.score),
        ];
        match scores.into_iter().find(|(_, score)| *score > MAX_SCORE) {
            Some((field, score)) => Err(ScoreOutOfRange { field, score }),
            None => Ok(()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_feedback;
    use super::*;

    #[test]
    fn test_deserializes_model_field_names() {
        let json = r#"{
            "overallScore": 70,
            "ATS": { "score": 60, "tips": [{ "type": "improve", "tip": "Use keywords" }] },
            "toneAndStyle": { "score": 80, "tips": [{ "type": "good", "tip": "Clear", "explanation": "Reads well" }] },
            "content": { "score": 65, "tips": [] },
            "structure": { "score": 75, "tips": [] },
            "skills": { "score": 50, "tips": [] }
        }"#;
        let feedback: Feedback = serde_json::from_str(json).unwrap();
        assert_eq!(feedback.overall_score, 70);
        assert_eq!(feedback.ats.tips[0].kind, TipKind::Improve);
        assert_eq!(
            feedback.tone_and_style.tips[0].explanation.as_deref(),
            Some("Reads well")
        );
    }

    #[test]
    fn test_serializes_ats_key_uppercase() {
        let value = serde_json::to_value(sample_feedback()).unwrap();
        assert!(value.get("ATS").is_some());
        assert!(value.get("overallScore").is_some());
        assert!(value.get("toneAndStyle").is_some());
    }

    #[test]
    fn test_partial_feedback_is_rejected() {
        let json = r#"{ "overallScore": 70, "ATS": { "score": 60, "tips": [] } }"#;
        assert!(serde_json::from_str::<Feedback>(json).is_err());
    }

    #[test]
    fn test_unknown_tip_type_is_rejected() {
        let json = r#"{ "type": "neutral", "tip": "Hmm" }"#;
        assert!(serde_json::from_str::<Tip>(json).is_err());
    }

    #[test]
    fn test_validate_accepts_bounds() {
        let mut feedback = sample_feedback();
        feedback.overall_score = 0;
        feedback.skills.score = 100;
        assert!(feedback.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_score_above_100() {
        let mut feedback = sample_feedback();
        feedback.structure.score = 101;
        let err = feedback.validate().unwrap_err();
        assert_eq!(err.field, "structure");
        assert_eq!(err.score, 101);
    }

    #[test]
    fn test_negative_score_fails_to_parse() {
        let json = r#"{ "score": -5, "tips": [] }"#;
        assert!(serde_json::from_str::<CategoryFeedback>(json).is_err());
    }

    #[test]
    fn test_categories_display_order() {
        let feedback = sample_feedback();
        let names: Vec<_> = feedback.categories().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["Tone & Style", "Content", "Structure", "Skills"]);
    }
}
