// Cadence — MCP Server Implementation
//
// Uses the rmcp crate (official Rust MCP SDK) to expose the knowledge
// assistant to MCP clients over stdio. A session is bound to the owner and
// roles given on `cadence serve`; tools never take an owner argument, so a
// client cannot reach another owner's data. Every call goes through the
// shared `Gateway` and is audit-recorded there.

use std::future::Future;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::*;
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router};
use rmcp::{ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};

use crate::error::CadenceError;
use crate::service::{Caller, Gateway};

// ─── Tool Parameter Types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SearchKnowledgeParams {
    /// Words to look for in titles, content and categories. Empty returns
    /// every entry the session may read.
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct AskAssistantParams {
    /// The question for the music education assistant
    pub question: String,
}

// ─── Server State ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CadenceServer {
    gateway: Arc<Gateway>,
    caller: Caller,
    tool_router: ToolRouter<Self>,
}

impl CadenceServer {
    pub fn new(gateway: Arc<Gateway>, caller: Caller) -> Self {
        Self {
            gateway,
            caller,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_mcp_error(context: &str, err: CadenceError) -> McpError {
    if err.is_validation() {
        McpError::invalid_params(format!("{}: {}", context, err), None)
    } else {
        McpError::internal_error(format!("{}: {}", context, err), None)
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))
}

// ─── Tool Definitions ────────────────────────────────────────────────────────

#[tool_router]
impl CadenceServer {
    #[tool(description = "Search the music education knowledge base. Results are limited to \
                          what the session's roles may read.")]
    async fn search_knowledge(
        &self,
        params: Parameters<SearchKnowledgeParams>,
    ) -> Result<CallToolResult, McpError> {
        let items = self
            .gateway
            .search_knowledge(&self.caller, &params.0.query)
            .map_err(|e| to_mcp_error("Search failed", e))?;

        if items.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(
                "No matching knowledge base entries.".to_string(),
            )]));
        }

        let text = items
            .iter()
            .map(|item| {
                format!(
                    "[{}] {} ({} | {})\n{}",
                    item.id, item.title, item.tier, item.category, item.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Answer a question from the permitted knowledge using the session
    /// owner's own language model key.
    #[tool(description = "Ask the music education assistant a question. Uses the API key \
                          stored under the 'llm-api' credential.")]
    async fn ask_assistant(
        &self,
        params: Parameters<AskAssistantParams>,
    ) -> Result<CallToolResult, McpError> {
        let answer = self
            .gateway
            .ask(&self.caller, &params.0.question)
            .await
            .map_err(|e| to_mcp_error("Assistant failed", e))?;

        Ok(CallToolResult::success(vec![Content::text(answer.text)]))
    }

    /// List the session owner's credentials. Metadata only.
    #[tool(description = "List stored credential names and timestamps (never secrets)")]
    async fn list_credentials(&self) -> Result<CallToolResult, McpError> {
        let summaries = self
            .gateway
            .list_credentials(&self.caller)
            .map_err(|e| to_mcp_error("Failed to list credentials", e))?;

        Ok(CallToolResult::success(vec![Content::text(to_pretty_json(
            &summaries,
        )?)]))
    }

    #[tool(description = "Summarize recent tool usage for this session's owner")]
    async fn usage_summary(&self) -> Result<CallToolResult, McpError> {
        let summary = self
            .gateway
            .usage_summary(&self.caller)
            .map_err(|e| to_mcp_error("Failed to summarize usage", e))?;

        Ok(CallToolResult::success(vec![Content::text(to_pretty_json(
            &summary,
        )?)]))
    }
}

// ─── ServerHandler ───────────────────────────────────────────────────────────

#[tool_handler]
impl ServerHandler for CadenceServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Cadence: knowledge assistant for a music teaching studio. Search the \
                 role-gated knowledge base and ask questions answered with your own \
                 language model key."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
