//! The conversational core: typed prompts, follow-up rewriting and the
//! retrieve-then-generate pipeline that answers one chat turn.

mod pipeline;
mod prompt;
mod rewriter;

pub use pipeline::{
    ChatError, ChatTurn, GenerationOutcome, PipelineOptions, RagPipeline, EMPTY_QUERY_MESSAGE,
    GENERATION_FAILURE_REPLY, GENERATION_TIMEOUT_REPLY,
};
pub use prompt::{
    PromptError, PromptTemplate, ANSWER_SLOTS, ANSWER_TEMPLATE, OUT_OF_SCOPE_REPLY,
    REWRITE_SLOTS, REWRITE_TEMPLATE,
};
pub use rewriter::{clean_rewrite, format_history, QueryRewriter, MIN_REWRITE_CHARS};
