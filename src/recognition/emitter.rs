/// Sends only the part of a growing partial transcript the client has not
/// seen yet.
///
/// The cursor counts characters (Unicode scalar values), so multi-byte
/// text is never split mid-character.
#[derive(Debug, Clone, Default)]
pub struct IncrementalTextEmitter {
    sent_chars: usize,
}

impl IncrementalTextEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the unsent suffix of `text`, or `None` if nothing new.
    ///
    /// A recognizer revision that shortens the text clamps the cursor to the
    /// new length instead of slicing out of bounds.
    pub fn advance(&mut self, text: &str) -> Option<String> {
        let total = text.chars().count();
        let cursor = self.sent_chars.min(total);
        self.sent_chars = total;

        if cursor == total {
            return None;
        }

        Some(text.chars().skip(cursor).collect())
    }

    pub fn sent_chars(&self) -> usize {
        self.sent_chars
    }

    /// Start over for a new utterance
    pub fn reset(&mut self) {
        self.sent_chars = 0;
    }
}
