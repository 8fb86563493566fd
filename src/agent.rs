// IDE Agent Gateway - Agent Loop
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Drives the model <-> tool conversation for one request.
// AwaitingModel -> ExecutingTools -> ... -> Summarizing? -> Done(reason)
// The tool-call budget is never exceeded; tool failures go back to the model.

use crate::error::SessionError;
use crate::gateway::Gateway;
use crate::model::{ContentBlock, Message, ModelClient, Role, ToolInvocation};
use crate::prompt;
use crate::session::Session;
use crate::tools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

const NATURAL_FALLBACK: &str = "IDE agent completed successfully.";
const EXIT_FALLBACK: &str = "Agent completed the task using exit tool.";
const BUDGET_FALLBACK: &str = "Reached the maximum number of tool calls.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    NaturalCompletion,
    ExitTool,
    MaxToolCalls,
    Error,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub final_message: String,
    pub tool_calls_used: usize,
    pub reason: TerminationReason,
    pub error: Option<String>,
}

/// Caller-facing result of an agent request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub message: String,
    pub tool_calls_used: usize,
    pub completion_reason: TerminationReason,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolInvocation>),
    Summarizing,
    Done(TerminationReason),
}

pub struct Agent {
    model: Arc<dyn ModelClient>,
    gateway: Arc<Gateway>,
    max_tool_calls: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn ModelClient>, gateway: Arc<Gateway>, max_tool_calls: usize) -> Self {
        Self { model, gateway, max_tool_calls }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Run the loop for one request against an already resolved session
    pub async fn run(&self, request: &str, session: &Session) -> AgentOutcome {
        log::info!("Agent start: session={} budget={}", session.id, self.max_tool_calls);

        let ctx = session.load_context();
        let system = prompt::system_prompt(&ctx);
        let catalog = tools::catalog();
        let mut messages = vec![Message::user_text(prompt::user_prompt(request, &session.codebase, &ctx))];

        let mut used = 0usize;
        let mut last_text = String::new();
        let mut exit_summary: Option<String> = None;
        let mut error: Option<String> = None;
        let mut state = LoopState::AwaitingModel;

        let reason = loop {
            state = match state {
                LoopState::AwaitingModel => match self.model.complete(&system, &messages, &catalog).await {
                    Err(e) => {
                        log::error!("Model call failed: {}", e);
                        error = Some(e.to_string());
                        LoopState::Done(TerminationReason::Error)
                    }
                    Ok(reply) => {
                        if !reply.text.trim().is_empty() {
                            last_text = reply.text.clone();
                        }
                        if reply.tool_calls.is_empty() {
                            LoopState::Done(TerminationReason::NaturalCompletion)
                        } else {
                            messages.push(reply.to_message());
                            LoopState::ExecutingTools(reply.tool_calls)
                        }
                    }
                },

                LoopState::ExecutingTools(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    let mut exited = false;
                    for call in &calls {
                        if exited {
                            results.push(tools::ToolResult::skipped(&call.id, &call.name, "agent already exited"));
                            continue;
                        }
                        if used >= self.max_tool_calls {
                            results.push(tools::ToolResult::skipped(&call.id, &call.name, "tool call budget exhausted"));
                            continue;
                        }
                        used += 1;
                        log::info!("Calling tool {} (call #{})", call.name, used);
                        let result = self.gateway.execute(&call.id, &call.name, &call.input, session).await;
                        if call.name == "exit_tool" {
                            exited = true;
                            exit_summary = summary_argument(&call.input);
                        }
                        results.push(result);
                    }

                    messages.push(Message {
                        role: Role::User,
                        content: results
                            .iter()
                            .map(|r| ContentBlock::ToolResult {
                                tool_use_id: r.invocation_id.clone(),
                                content: r.render(),
                                is_error: !r.success,
                            })
                            .collect(),
                    });

                    if exited {
                        LoopState::Done(TerminationReason::ExitTool)
                    } else if used >= self.max_tool_calls {
                        log::warn!("Maximum tool calls ({}) reached", self.max_tool_calls);
                        LoopState::Summarizing
                    } else {
                        LoopState::AwaitingModel
                    }
                }

                LoopState::Summarizing => {
                    messages.push(Message::user_text(prompt::SUMMARY_REQUEST));
                    match self.model.complete(&system, &messages, &[]).await {
                        Ok(reply) if !reply.text.trim().is_empty() => last_text = reply.text,
                        Ok(_) => {}
                        Err(e) => log::error!("Summary call failed: {}", e),
                    }
                    LoopState::Done(TerminationReason::MaxToolCalls)
                }

                LoopState::Done(reason) => break reason,
            };
        };

        let final_message = match reason {
            TerminationReason::ExitTool => exit_summary.unwrap_or_else(|| EXIT_FALLBACK.to_string()),
            TerminationReason::MaxToolCalls => non_empty_or(last_text, BUDGET_FALLBACK),
            TerminationReason::NaturalCompletion => non_empty_or(last_text, NATURAL_FALLBACK),
            TerminationReason::Error => format!(
                "Error in IDE agent: {}",
                error.as_deref().unwrap_or("unknown error")
            ),
        };

        log::info!("Agent done: session={} reason={:?} tool_calls={}", session.id, reason, used);
        AgentOutcome { final_message, tool_calls_used: used, reason, error }
    }

    /// Resolve the session, run, and shape the response
    pub async fn handle(&self, query: &str, session_id: &str, artifacts_root: &Path) -> AgentResponse {
        let storage = self.gateway.storage().map(|s| s.as_ref());
        let session = match Session::resolve(session_id, artifacts_root, storage) {
            Ok(s) => s,
            Err(e) => return session_failure(session_id, &e),
        };

        let outcome = self.run(query, &session).await;
        AgentResponse::from_outcome(&session.id, outcome)
    }
}

impl AgentResponse {
    pub fn from_outcome(session_id: &str, outcome: AgentOutcome) -> Self {
        Self {
            success: outcome.reason != TerminationReason::Error,
            message: outcome.final_message,
            tool_calls_used: outcome.tool_calls_used,
            completion_reason: outcome.reason,
            session_id: session_id.to_string(),
            error: outcome.error,
        }
    }
}

fn summary_argument(input: &Value) -> Option<String> {
    input
        .get("summary")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.trim().is_empty() { fallback.to_string() } else { text }
}

pub fn session_failure(session_id: &str, err: &SessionError) -> AgentResponse {
    log::error!("Session {} unavailable: {}", session_id, err);
    AgentResponse {
        success: false,
        message: format!("Error in IDE agent: {}", err),
        tool_calls_used: 0,
        completion_reason: TerminationReason::Error,
        session_id: session_id.to_string(),
        error: Some(err.to_string()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
