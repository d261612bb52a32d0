use serde::{Deserialize, Serialize};

use crate::models::feedback::Feedback;

pub const RESUME_KEY_PREFIX: &str = "resume:";

/// A stored résumé and its evaluation.
///
/// `feedback` is `None` between the placeholder write and the arrival of the
/// parsed evaluation. On the wire the placeholder is an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: String,
    pub resume_path: String,
    pub image_path: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(with = "feedback_slot")]
    pub feedback: Option<Feedback>,
}

impl ResumeRecord {
    pub fn key(id: &str) -> String {
        format!("{RESUME_KEY_PREFIX}{id}")
    }

    pub fn list_pattern() -> String {
        format!("{RESUME_KEY_PREFIX}*")
    }

    pub fn display_title(&self) -> &str {
        if !self.company_name.trim().is_empty() {
            &self.company_name
        } else if !self.job_title.trim().is_empty() {
            &self.job_title
        } else {
            "Resume"
        }
    }
}

/// Serde adapter for the feedback field: `""` <-> `None`, object <-> `Some`.
/// Anything else (a non-empty string, a partial object) is rejected.
mod feedback_slot {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::models::feedback::Feedback;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slot {
        Placeholder(String),
        Ready(Box<Feedback>),
    }

    pub fn serialize<S: Serializer>(value: &Option<Feedback>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(feedback) => feedback.serialize(s),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Feedback>, D::Error> {
        match Slot::deserialize(d)? {
            Slot::Placeholder(s) if s.is_empty() => Ok(None),
            Slot::Placeholder(s) => Err(D::Error::custom(format!(
                "feedback must be empty or a feedback object, got string '{s}'"
            ))),
            Slot::Ready(feedback) => Ok(Some(*feedback)),
        }
    }
}
