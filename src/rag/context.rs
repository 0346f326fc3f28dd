/// Characters of retrieved text kept on a persisted assistant message.
pub const CONTEXT_EXCERPT_CHARS: usize = 200;

pub const ELLIPSIS: &str = "...";

const PASSAGE_SEPARATOR: &str = "\n\n";

/// Ordered passages returned for one retrieval query.
///
/// An empty context means the search ran and found nothing; a search that could
/// not run is a [`RetrievalError`](super::RetrievalError) instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    passages: Vec<String>,
}

impl RetrievedContext {
    pub fn new(passages: Vec<String>) -> Self {
        Self { passages }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Passages in rank order, separated by a blank line.
    pub fn joined(&self) -> String {
        self.passages.join(PASSAGE_SEPARATOR)
    }

    /// The joined text cut to [`CONTEXT_EXCERPT_CHARS`] plus [`ELLIPSIS`] when longer.
    pub fn excerpt(&self) -> String {
        truncate_with_ellipsis(&self.joined(), CONTEXT_EXCERPT_CHARS)
    }
}

pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}
