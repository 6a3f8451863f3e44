use async_trait::async_trait;

use crate::errors::CheckerError;
use crate::feedback::{ImprovementReport, SentenceFeedback, WordCheck};

/// External collaborator that scores individual sentences and words.
///
/// Implementations degrade gracefully on uninterpretable upstream output
/// (returning the neutral result) and reserve `Err` for transport-level
/// faults; the protocol handler converts those into per-connection `error`
/// events and never tears down the connection.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn check_sentence(
        &self,
        sentence: &str,
        full_text: Option<&str>,
    ) -> Result<SentenceFeedback, CheckerError>;

    async fn check_word(
        &self,
        word: &str,
        context: Option<&str>,
    ) -> Result<WordCheck, CheckerError>;
}

/// External collaborator giving whole-text improvement suggestions, with the
/// same degrade-gracefully contract as [`TextClassifier`].
#[async_trait]
pub trait AdvisoryEngine: Send + Sync {
    async fn improve_text(&self, text: &str) -> Result<ImprovementReport, CheckerError>;
}

/// Both collaborator roles behind one object, as served by a single
/// chat-completions backend.
pub trait WritingChecker: TextClassifier + AdvisoryEngine {}

impl<T: TextClassifier + AdvisoryEngine> WritingChecker for T {}
