/// Sentence terminators: ASCII and full-width terminal punctuation.
const TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

pub fn is_terminator(c: char) -> bool {
    TERMINATORS.contains(&c)
}

/// Split an accumulated text buffer into the completed sentences found so far.
///
/// A boundary is a maximal run of terminator characters; each sentence is the
/// text preceding a boundary run plus the run itself, whitespace-trimmed.
/// Trailing text with no terminator is an in-progress sentence and is never
/// emitted. Runs with no preceding text are discarded.
///
/// Pure and deterministic — the whole buffer is re-scanned on every call, so
/// callers diff against previous output to detect newly completed sentences.
pub fn segment(buffer: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut run = String::new();

    for c in buffer.chars() {
        if is_terminator(c) {
            run.push(c);
        } else {
            if !run.is_empty() {
                flush(&mut sentences, &mut current, &mut run);
            }
            current.push(c);
        }
    }
    if !run.is_empty() {
        flush(&mut sentences, &mut current, &mut run);
    }

    sentences
}

fn flush(sentences: &mut Vec<String>, current: &mut String, run: &mut String) {
    if !current.trim().is_empty() {
        let mut sentence = std::mem::take(current);
        sentence.push_str(run);
        sentences.push(sentence.trim().to_string());
    } else {
        current.clear();
    }
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sentence() {
        assert_eq!(segment("Hello world."), vec!["Hello world."]);
    }

    #[test]
    fn multiple_sentences_mixed_terminators() {
        assert_eq!(segment("Hi! How are you?"), vec!["Hi!", "How are you?"]);
    }

    #[test]
    fn no_punctuation_yields_nothing() {
        assert!(segment("no punctuation here").is_empty());
    }

    #[test]
    fn trailing_whitespace_trimmed() {
        assert_eq!(segment("One. "), vec!["One."]);
    }

    #[test]
    fn in_progress_tail_not_emitted() {
        assert_eq!(segment("Done. And then"), vec!["Done."]);
    }

    #[test]
    fn boundary_run_kept_with_sentence() {
        assert_eq!(segment("Really?! Yes."), vec!["Really?!", "Yes."]);
        assert_eq!(segment("Wait..."), vec!["Wait..."]);
    }

    #[test]
    fn leading_boundary_discarded() {
        assert_eq!(segment(".. Hello."), vec!["Hello."]);
        assert!(segment("...").is_empty());
    }

    #[test]
    fn fullwidth_terminators() {
        assert_eq!(segment("你好。再见！"), vec!["你好。", "再见！"]);
    }

    #[test]
    fn unterminated_suffix_does_not_change_output() {
        let base = "First. Second! Third?";
        let extended = format!("{base} and some more typing");
        assert_eq!(segment(base), segment(&extended));
    }

    #[test]
    fn empty_buffer() {
        assert!(segment("").is_empty());
    }
}
