use std::sync::Arc;
use std::time::Duration;

use crate::history::Message;
use crate::llm::{GenerateRequest, LlmProvider};

use super::prompt::PromptTemplate;

/// Rewrites at or below this many characters are treated as degenerate.
pub const MIN_REWRITE_CHARS: usize = 5;

const QUOTE_PAIRS: [(char, char); 5] = [
    ('"', '"'),
    ('\'', '\''),
    ('`', '`'),
    ('\u{201C}', '\u{201D}'),
    ('\u{2018}', '\u{2019}'),
];

/// Turns a context-dependent follow-up into a standalone retrieval query.
///
/// Best effort: every failure path returns the follow-up unchanged.
pub struct QueryRewriter {
    llm: Arc<dyn LlmProvider>,
    prompt: PromptTemplate,
    timeout: Duration,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>, prompt: PromptTemplate, timeout: Duration) -> Self {
        Self {
            llm,
            prompt,
            timeout,
        }
    }

    pub async fn rewrite(&self, history: &[Message], follow_up: &str) -> String {
        if history.is_empty() {
            return follow_up.to_string();
        }

        let transcript = format_history(history);
        let prompt = match self
            .prompt
            .render(&[("history", transcript.as_str()), ("question", follow_up)])
        {
            Ok(prompt) => prompt,
            Err(err) => {
                tracing::warn!("Rewrite prompt failed to render, using original query: {}", err);
                return follow_up.to_string();
            }
        };

        let request = GenerateRequest::new(prompt).with_temperature(Some(0.0));
        let raw = match self.llm.generate(request, self.timeout).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    timed_out = err.is_timeout(),
                    "Query rewrite failed, using original query: {}",
                    err
                );
                return follow_up.to_string();
            }
        };

        let cleaned = clean_rewrite(&raw);
        if cleaned.chars().count() <= MIN_REWRITE_CHARS {
            tracing::warn!(rewrite = %cleaned, "Query rewrite too short, using original query");
            return follow_up.to_string();
        }

        tracing::debug!(original = %follow_up, rewritten = %cleaned, "Query rewritten");
        cleaned
    }
}

/// `role: content` lines, oldest first.
pub fn format_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|msg| format!("{}: {}", msg.role.as_str(), msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trims whitespace and at most one layer of enclosing quotes.
pub fn clean_rewrite(raw: &str) -> String {
    let trimmed = raw.trim();
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmProvider};

    fn history() -> Vec<Message> {
        vec![
            Message::user("What is the NEFT limit?"),
            Message::assistant("₹10 lakh per day.", "ctx", "What is the NEFT limit?"),
        ]
    }

    fn rewriter(mock: MockLlmProvider) -> QueryRewriter {
        QueryRewriter::new(
            Arc::new(mock),
            PromptTemplate::rewrite(None).unwrap(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn empty_history_skips_the_model() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate().times(0);

        let out = rewriter(mock).rewrite(&[], "How do I reset my PIN?").await;

        assert_eq!(out, "How do I reset my PIN?");
    }

    #[tokio::test]
    async fn uses_history_and_zero_temperature() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate()
            .withf(|req, timeout| {
                req.temperature == Some(0.0)
                    && *timeout == Duration::from_secs(30)
                    && req.prompt.contains("user: What is the NEFT limit?\nassistant: ₹10 lakh per day.")
                    && req.prompt.contains("Latest question: and for RTGS?")
            })
            .times(1)
            .returning(|_, _| Ok("  \"What is the RTGS limit?\"\n".to_string()));

        let out = rewriter(mock).rewrite(&history(), "and for RTGS?").await;

        assert_eq!(out, "What is the RTGS limit?");
    }

    #[tokio::test]
    async fn model_error_falls_back_to_follow_up() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _| Err(LlmError::Request("connection refused".into())));

        let out = rewriter(mock).rewrite(&history(), "and for RTGS?").await;

        assert_eq!(out, "and for RTGS?");
    }

    #[tokio::test]
    async fn timeout_falls_back_to_follow_up() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate()
            .returning(|_, t| Err(LlmError::Timeout(t)));

        let out = rewriter(mock).rewrite(&history(), "and for RTGS?").await;

        assert_eq!(out, "and for RTGS?");
    }

    #[tokio::test]
    async fn short_rewrite_falls_back_to_follow_up() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate()
            .returning(|_, _| Ok(" \"RTGS\" ".to_string()));

        let out = rewriter(mock).rewrite(&history(), "and for RTGS?").await;

        assert_eq!(out, "and for RTGS?");
    }

    #[tokio::test]
    async fn exactly_five_characters_falls_back() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate().returning(|_, _| Ok("\"RTGS?\"".to_string()));

        let out = rewriter(mock).rewrite(&history(), "and for RTGS?").await;

        assert_eq!(out, "and for RTGS?");
    }

    #[tokio::test]
    async fn length_is_counted_in_characters() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate().returning(|_, _| Ok("₹₹₹₹₹".to_string()));

        let out = rewriter(mock).rewrite(&history(), "and for RTGS?").await;

        assert_eq!(out, "and for RTGS?");
    }

    #[tokio::test]
    async fn six_characters_is_accepted() {
        let mut mock = MockLlmProvider::new();
        mock.expect_generate().returning(|_, _| Ok("RTGS?!".to_string()));

        let out = rewriter(mock).rewrite(&history(), "and for RTGS?").await;

        assert_eq!(out, "RTGS?!");
    }

    #[test]
    fn clean_strips_one_layer_of_quotes() {
        assert_eq!(clean_rewrite("  'It's fine'  "), "It's fine");
        assert_eq!(clean_rewrite("\u{201C}smart quotes\u{201D}"), "smart quotes");
        assert_eq!(clean_rewrite("\"\"double\"\""), "\"double\"");
        assert_eq!(clean_rewrite("\"unbalanced"), "\"unbalanced");
        assert_eq!(clean_rewrite("plain"), "plain");
    }

    #[test]
    fn history_lines_are_role_prefixed() {
        let lines = format_history(&[Message::user("a"), Message::system("b")]);
        assert_eq!(lines, "user: a\nsystem: b");
    }
}
