// Cadence — Knowledge Module
//
// Tier-tagged music education corpus, role-gated search, and the assistant
// flow that answers questions with the caller's own language model key.

mod corpus;
mod error;
mod llm;
mod retriever;

pub use corpus::{KnowledgeBase, KnowledgeItem};
pub use error::{KnowledgeError, UpstreamError};
pub use llm::{LanguageModel, OpenAiChatModel, Prompt, DEFAULT_SYSTEM_PROMPT};
pub use retriever::{
    Answer, AnswerOutcome, KnowledgeRetriever, RetrieverSettings, DEFAULT_MODEL_CREDENTIAL,
    TRUNCATION_MARKER,
};
