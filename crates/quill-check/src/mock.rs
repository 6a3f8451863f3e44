use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use quill_core::checker::{AdvisoryEngine, TextClassifier};
use quill_core::errors::CheckerError;
use quill_core::feedback::{ImprovementReport, SentenceFeedback, WordCheck};

/// One pre-programmed reply for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockReply<T> {
    Ok(T),
    Err(CheckerError),
    /// Wait a duration, then return the inner reply.
    Delayed(Duration, Box<MockReply<T>>),
}

impl<T: Clone> MockReply<T> {
    async fn resolve(self) -> Result<T, CheckerError> {
        let mut current = self;
        loop {
            match current {
                MockReply::Ok(value) => return Ok(value),
                MockReply::Err(e) => return Err(e),
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    current = *inner;
                }
            }
        }
    }
}

/// Checker that returns pre-programmed replies in sequence, per method.
/// An exhausted queue is an error so tests notice unexpected extra calls.
#[derive(Default)]
pub struct MockChecker {
    sentence_replies: Mutex<VecDeque<MockReply<SentenceFeedback>>>,
    word_replies: Mutex<VecDeque<MockReply<WordCheck>>>,
    improve_replies: Mutex<VecDeque<MockReply<ImprovementReport>>>,
    calls: AtomicUsize,
}

impl MockChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sentence(self, feedback: SentenceFeedback) -> Self {
        self.sentence_replies
            .lock()
            .push_back(MockReply::Ok(feedback));
        self
    }

    pub fn with_sentence_error(self, error: CheckerError) -> Self {
        self.sentence_replies.lock().push_back(MockReply::Err(error));
        self
    }

    pub fn with_delayed_sentence(self, delay: Duration, feedback: SentenceFeedback) -> Self {
        self.sentence_replies
            .lock()
            .push_back(MockReply::Delayed(delay, Box::new(MockReply::Ok(feedback))));
        self
    }

    pub fn with_word(self, check: WordCheck) -> Self {
        self.word_replies.lock().push_back(MockReply::Ok(check));
        self
    }

    pub fn with_improvement(self, report: ImprovementReport) -> Self {
        self.improve_replies.lock().push_back(MockReply::Ok(report));
        self
    }

    pub fn with_improvement_error(self, error: CheckerError) -> Self {
        self.improve_replies.lock().push_back(MockReply::Err(error));
        self
    }

    /// Total calls across all three methods.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn next<T>(&self, queue: &Mutex<VecDeque<MockReply<T>>>) -> Result<MockReply<T>, CheckerError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        queue.lock().pop_front().ok_or_else(|| {
            CheckerError::InvalidRequest("MockChecker: no reply configured for this call".into())
        })
    }
}

#[async_trait]
impl TextClassifier for MockChecker {
    async fn check_sentence(
        &self,
        _sentence: &str,
        _full_text: Option<&str>,
    ) -> Result<SentenceFeedback, CheckerError> {
        self.next(&self.sentence_replies)?.resolve().await
    }

    async fn check_word(
        &self,
        _word: &str,
        _context: Option<&str>,
    ) -> Result<WordCheck, CheckerError> {
        self.next(&self.word_replies)?.resolve().await
    }
}

#[async_trait]
impl AdvisoryEngine for MockChecker {
    async fn improve_text(&self, _text: &str) -> Result<ImprovementReport, CheckerError> {
        self.next(&self.improve_replies)?.resolve().await
    }
}
