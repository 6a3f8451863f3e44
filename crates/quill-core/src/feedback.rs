use serde::{Deserialize, Serialize};

/// A single problem found in a checked sentence.
///
/// `kind`, `position` and `severity` are produced by the classifier and kept
/// as free-form strings on the wire (typical values: kind in
/// grammar/spelling/punctuation/structure, severity in high/medium/low).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub position: String,
    pub message: String,
    #[serde(default)]
    pub severity: String,
}

/// A suggested correction for part of a checked sentence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Correction {
    #[serde(rename = "type")]
    pub kind: String,
    pub original: String,
    pub corrected: String,
    #[serde(default)]
    pub explanation: String,
}

/// Result of checking a single sentence for completeness and grammar.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SentenceFeedback {
    pub is_complete: bool,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub suggestions: Vec<Correction>,
    pub overall_score: f64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polished_sentence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polished_explanation: Option<String>,
}

impl SentenceFeedback {
    /// Neutral "assume correct" result used when the upstream response
    /// cannot be interpreted. The checker degrades rather than raises.
    pub fn neutral(explanation: impl Into<String>) -> Self {
        Self {
            is_complete: true,
            issues: Vec::new(),
            suggestions: Vec::new(),
            overall_score: 1.0,
            explanation: explanation.into(),
            polished_sentence: None,
            polished_explanation: None,
        }
    }
}

/// Result of a single-word spelling check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WordCheck {
    pub is_correct: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    pub confidence: f64,
}

impl WordCheck {
    pub fn neutral(explanation: impl Into<String>) -> Self {
        Self {
            is_correct: true,
            suggestions: Vec::new(),
            explanation: explanation.into(),
            confidence: 0.0,
        }
    }
}

/// Writing proficiency estimate attached to an improvement report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyLevel {
    Beginner,
    Intermediate,
    Advanced,
    /// The advisory engine could not judge the text.
    #[default]
    Unknown,
}

/// A whole-text rewrite suggestion from the advisory engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImprovementSuggestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub original: String,
    pub suggestion: String,
    #[serde(default)]
    pub explanation: String,
}

/// Whole-text analysis from the advisory engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImprovementReport {
    pub overall_assessment: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<ImprovementSuggestion>,
    #[serde(default)]
    pub level: ProficiencyLevel,
    pub score: f64,
}

impl ImprovementReport {
    pub fn neutral(assessment: impl Into<String>) -> Self {
        Self {
            overall_assessment: assessment.into(),
            strengths: Vec::new(),
            areas_for_improvement: Vec::new(),
            suggestions: Vec::new(),
            level: ProficiencyLevel::Unknown,
            score: 0.0,
        }
    }
}
