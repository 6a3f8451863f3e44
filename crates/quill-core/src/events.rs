use serde::{Deserialize, Serialize};

use crate::feedback::{Correction, ImprovementReport, Issue, SentenceFeedback};

/// Inbound messages from a writing-assistant client.
///
/// Closed enumeration with exhaustive matching in the protocol handler; a
/// frame with an unrecognized `type` deserializes to `Unknown` and is
/// ignored on the wire.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartSession,
    TextUpdate {
        #[serde(default)]
        text: String,
    },
    RequestImprovement {
        #[serde(default)]
        text: String,
    },
    Ping,
    #[serde(other)]
    Unknown,
}

/// Outbound events sent to a writing-assistant client, one JSON object per
/// text frame, tagged by `type`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        message: String,
    },
    SessionStarted {
        message: String,
    },
    Analyzing {
        sentence: String,
    },
    Feedback {
        sentence: String,
        is_complete: bool,
        issues: Vec<Issue>,
        suggestions: Vec<Correction>,
        score: f64,
        explanation: String,
        polished_sentence: String,
        polished_explanation: String,
    },
    Error {
        message: String,
    },
    Improvement {
        data: ImprovementReport,
    },
    Pong,
}

impl ServerEvent {
    /// Build a `feedback` event from a classifier result. The classifier's
    /// `overall_score` becomes `score` on the wire; absent polish fields
    /// are sent as empty strings.
    pub fn feedback(sentence: impl Into<String>, fb: SentenceFeedback) -> Self {
        Self::Feedback {
            sentence: sentence.into(),
            is_complete: fb.is_complete,
            issues: fb.issues,
            suggestions: fb.suggestions,
            score: fb.overall_score,
            explanation: fb.explanation,
            polished_sentence: fb.polished_sentence.unwrap_or_default(),
            polished_explanation: fb.polished_explanation.unwrap_or_default(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::SessionStarted { .. } => "session_started",
            Self::Analyzing { .. } => "analyzing",
            Self::Feedback { .. } => "feedback",
            Self::Error { .. } => "error",
            Self::Improvement { .. } => "improvement",
            Self::Pong => "pong",
        }
    }
}
