use crate::segmenter::segment;

/// Mutable per-connection writing-assistant state.
///
/// Created when the connection registers, mutated only by that connection's
/// protocol handler, and dropped on disconnect.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    /// Full accumulated buffer; each `text_update` replaces it wholesale.
    pub current_text: String,
    /// Most recently segmented-and-dispatched sentence, for de-duplication.
    pub last_sentence: String,
    pub session_started: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.session_started = true;
    }

    /// Replace the buffer with the client's latest full text and return the
    /// newest completed sentence, if it differs from the one last dispatched.
    /// `None` means nothing new to analyze — either no sentence is complete
    /// yet, or the newest one was already sent to the classifier.
    pub fn apply_update(&mut self, text: &str) -> Option<String> {
        text.clone_into(&mut self.current_text);

        let sentences = segment(&self.current_text);
        let newest = sentences.last()?;
        if *newest == self.last_sentence {
            return None;
        }
        self.last_sentence.clone_from(newest);
        Some(newest.clone())
    }
}
