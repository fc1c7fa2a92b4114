// Cadence — Knowledge Retriever
//
// Role-gated search over the corpus and the `answer` flow that feeds the
// permitted knowledge to a language model using the caller's own API key.
//
// `answer` is the one place in the crate that turns failures into text: a
// missing model credential or a failed model call produces a fixed,
// user-facing message instead of failing the assistant turn. Crypto and
// validation failures still propagate.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::access::{AccessPolicyResolver, RoleSet};
use crate::store::{CredentialVault, StoreError};

use super::corpus::{KnowledgeBase, KnowledgeItem};
use super::llm::{LanguageModel, Prompt, DEFAULT_SYSTEM_PROMPT};
use super::UpstreamError;

/// Credential name the model key is stored under.
pub const DEFAULT_MODEL_CREDENTIAL: &str = "llm-api";

/// Appended when `truncate_context` cuts a context block.
pub const TRUNCATION_MARKER: &str = "\n[context truncated]";

const NO_CONTEXT: &str = "No matching knowledge base entries.";

/// Knobs for the `answer` flow.
#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub credential_name: String,
    pub timeout: Duration,
    pub max_context_chars: usize,
    pub system_prompt: String,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            credential_name: DEFAULT_MODEL_CREDENTIAL.to_string(),
            timeout: Duration::from_secs(30),
            max_context_chars: 12_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Generated,
    MissingCredential,
    UpstreamFailed,
}

impl AnswerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOutcome::Generated => "generated",
            AnswerOutcome::MissingCredential => "missing_credential",
            AnswerOutcome::UpstreamFailed => "upstream_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub outcome: AnswerOutcome,
    /// Ids of the knowledge items placed in the model context.
    pub sources: Vec<String>,
}

pub struct KnowledgeRetriever {
    corpus: Arc<KnowledgeBase>,
    resolver: AccessPolicyResolver,
    vault: Arc<CredentialVault>,
    model: Arc<dyn LanguageModel>,
    settings: RetrieverSettings,
}

impl KnowledgeRetriever {
    pub fn new(
        corpus: Arc<KnowledgeBase>,
        vault: Arc<CredentialVault>,
        model: Arc<dyn LanguageModel>,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            corpus,
            resolver: AccessPolicyResolver::new(),
            vault,
            model,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// Items the roles may read whose title, content or category contains the
    /// query (case-insensitive). The query is matched as given, surrounding
    /// whitespace included. A blank query returns every permitted item.
    pub fn search(&self, query: &str, roles: &RoleSet) -> Vec<KnowledgeItem> {
        let tiers = self.resolver.resolve_tiers(roles);
        let blank = query.trim().is_empty();
        let needle = query.to_lowercase();

        self.corpus
            .items()
            .iter()
            .filter(|item| tiers.contains(&item.tier))
            .filter(|item| blank || item.matches(&needle))
            .cloned()
            .collect()
    }

    /// Render items as a prompt context block. No size limit is applied here;
    /// callers must bound the result (see `truncate_context`) before sending
    /// it to a model.
    pub fn build_context(items: &[KnowledgeItem]) -> String {
        items
            .iter()
            .map(|item| {
                format!(
                    "### {}\nTier: {} | Category: {}\n{}",
                    item.title, item.tier, item.category, item.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Cut `context` to at most `max_chars` characters plus a marker.
    pub fn truncate_context(context: &str, max_chars: usize) -> String {
        match context.char_indices().nth(max_chars) {
            None => context.to_string(),
            Some((byte_idx, _)) => format!("{}{}", &context[..byte_idx], TRUNCATION_MARKER),
        }
    }

    fn missing_credential_text(&self, items: &[KnowledgeItem]) -> String {
        let mut text = format!(
            "The AI assistant is not set up for your account yet. Store your language model \
             API key under the credential name \"{}\" and ask again.",
            self.settings.credential_name
        );
        if !items.is_empty() {
            text.push_str("\n\nMeanwhile, these knowledge base entries match your question:");
            for item in items {
                text.push_str("\n- ");
                text.push_str(&item.title);
            }
        }
        text
    }

    fn upstream_failure_text() -> String {
        "The AI assistant could not produce an answer right now. Please try again in a few \
         minutes."
            .to_string()
    }

    /// Search, build bounded context, fetch the owner's model key, and ask the
    /// model. Holds no lock while the model call is in flight.
    pub async fn answer(
        &self,
        query: &str,
        roles: &RoleSet,
        owner_id: &str,
    ) -> Result<Answer, StoreError> {
        let items = self.search(query, roles);
        let sources: Vec<String> = items.iter().map(|i| i.id.clone()).collect();

        let context = if items.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            Self::truncate_context(&Self::build_context(&items), self.settings.max_context_chars)
        };

        let api_key = match self.vault.get(owner_id, &self.settings.credential_name) {
            Ok(key) => key,
            Err(StoreError::NotFound { .. }) => {
                tracing::info!(owner = %owner_id, "No model credential, returning setup instructions");
                return Ok(Answer {
                    text: self.missing_credential_text(&items),
                    outcome: AnswerOutcome::MissingCredential,
                    sources,
                });
            }
            Err(e) => return Err(e),
        };

        let prompt = Prompt {
            system: self.settings.system_prompt.clone(),
            context,
            question: query.to_string(),
        };

        let result = tokio::time::timeout(
            self.settings.timeout,
            self.model.complete(api_key.as_str(), &prompt),
        )
        .await
        .unwrap_or(Err(UpstreamError::Timeout(self.settings.timeout)));
        drop(api_key);

        match result {
            Ok(text) => Ok(Answer {
                text,
                outcome: AnswerOutcome::Generated,
                sources,
            }),
            Err(e) => {
                tracing::warn!(owner = %owner_id, error = %e, "Model call failed");
                Ok(Answer {
                    text: Self::upstream_failure_text(),
                    outcome: AnswerOutcome::UpstreamFailed,
                    sources,
                })
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
