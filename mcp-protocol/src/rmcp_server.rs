//! Thin RMCP wiring: one `#[tool]` per exposed operation, each deserializing
//! its typed request, delegating to [`ToolDispatcher`], and wrapping the
//! JSON envelope it returns as a text content block. The envelope already
//! carries `ok`/`error` — an `Err(McpError)` here is reserved for malformed
//! protocol-level input, never an ordinary business-rule rejection.

use std::future::Future;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};

use crate::config_cache::ConfigCache;
use crate::dispatcher::ToolDispatcher;
use crate::params::*;

#[derive(Clone)]
pub struct WorkItemServer {
    dispatcher: Arc<ToolDispatcher>,
    tool_router: ToolRouter<Self>,
}

impl WorkItemServer {
    pub fn new(store: Arc<dyn work_item_core::store::Store>, config: Arc<ConfigCache>) -> Self {
        Self {
            dispatcher: Arc::new(ToolDispatcher::new(store, config)),
            tool_router: Self::tool_router(),
        }
    }
}

fn envelope_to_result(envelope: serde_json::Value) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string(&envelope)
        .map_err(|e| McpError::internal_error(format!("failed to encode response: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl WorkItemServer {
    #[tool(description = "Create, update, or delete work items, singly or in batch")]
    async fn manage_items(&self, Parameters(params): Parameters<ManageItemsParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.manage_items(params).await)
    }

    #[tool(description = "Fetch a work item by id, search by filter, or get a tree overview")]
    async fn query_items(&self, Parameters(params): Parameters<QueryItemsParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.query_items(params).await)
    }

    #[tool(description = "Upsert or delete a note attached to a work item")]
    async fn manage_notes(&self, Parameters(params): Parameters<ManageNotesParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.manage_notes(params).await)
    }

    #[tool(description = "List a work item's notes alongside the notes its schema still expects")]
    async fn query_notes(&self, Parameters(params): Parameters<QueryNotesParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.query_notes(params).await)
    }

    #[tool(description = "Create or delete dependency edges between work items, or expand a shortcut pattern")]
    async fn manage_dependencies(
        &self,
        Parameters(params): Parameters<ManageDependenciesParams>,
    ) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.manage_dependencies(params).await)
    }

    #[tool(description = "List a work item's direct dependency edges, or walk the full chain")]
    async fn query_dependencies(
        &self,
        Parameters(params): Parameters<QueryDependenciesParams>,
    ) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.query_dependencies(params).await)
    }

    #[tool(description = "Fire a workflow trigger on a work item, cascading into its ancestors, singly or in batch")]
    async fn advance_item(&self, Parameters(params): Parameters<AdvanceItemParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.advance_item(params).await)
    }

    #[tool(description = "Recommend the next status for a work item, optionally against hypothetical status or tags")]
    async fn get_next_status(&self, Parameters(params): Parameters<GetNextStatusParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.get_next_status(params).await)
    }

    #[tool(description = "Fetch item, session, or server-health context for an agent resuming work")]
    async fn get_context(&self, Parameters(params): Parameters<GetContextParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.get_context(params).await)
    }

    #[tool(description = "Find the next queued work item, optionally filtered by tag")]
    async fn get_next_item(&self, Parameters(params): Parameters<GetNextItemParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.get_next_item(params).await)
    }

    #[tool(description = "List work items that are on hold or waiting on unresolved dependencies")]
    async fn get_blocked_items(&self, Parameters(params): Parameters<GetBlockedItemsParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.get_blocked_items(params).await)
    }

    #[tool(description = "Create a whole tree of work items, notes, and dependencies in one call")]
    async fn create_work_tree(&self, Parameters(params): Parameters<CreateWorkTreeParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.create_work_tree(params).await)
    }

    #[tool(description = "Drive an entire work tree to completion or cancellation, leaves first")]
    async fn complete_tree(&self, Parameters(params): Parameters<CompleteTreeParams>) -> Result<CallToolResult, McpError> {
        envelope_to_result(self.dispatcher.complete_tree(params).await)
    }
}

#[tool_handler]
impl ServerHandler for WorkItemServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Hierarchical work-item management over MCP: items, notes, dependencies, \
                 and a role-based workflow engine with upward cascade."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
