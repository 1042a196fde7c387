//! Translate OCI GenAI chat responses into OpenAI Chat Completion responses.
//!
//! Both backend result shapes (COHERE `text`, GENERIC `choices`) collapse into
//! a single assistant choice. Usage numbers come from the backend and are
//! never trusted to fit in a sum.

use chrono::Utc;
use uuid::Uuid;

use super::oci_types::{BackendChatResponse, BackendUsage};
use super::openai_types::{ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage};

const UNKNOWN_MODEL: &str = "unknown";

/// Translate an OCI chat response into an OpenAI Chat Completion response.
/// Pure apart from the fresh id and timestamp; `original_model` is what the client asked for.
pub fn oci_to_openai(resp: &BackendChatResponse, original_model: &str) -> ChatCompletionResponse {
    let result = &resp.chat_response;

    let model = [original_model, resp.model_id.as_str()]
        .into_iter()
        .find(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_MODEL);

    ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content: result.generated_text(),
            },
            finish_reason: map_finish_reason(result.finish_reason_code()).to_string(),
        }],
        usage: map_usage(&result.usage),
    }
}

/// Map an OCI finish reason to OpenAI's `finish_reason`. Total: anything
/// unrecognised is a normal `stop`.
#[must_use]
pub fn map_finish_reason(reason: &str) -> &'static str {
    match reason {
        "MAX_TOKENS" | "length" => "length",
        "CONTENT_FILTER" | "content_filter" => "content_filter",
        _ => "stop",
    }
}

/// Copy token usage, recomputing the total when the backend left it at zero.
#[must_use]
pub fn map_usage(usage: &BackendUsage) -> ChatUsage {
    let total_tokens = if usage.total_tokens == 0 {
        usage.prompt_tokens.saturating_add(usage.completion_tokens)
    } else {
        usage.total_tokens
    };

    ChatUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens,
    }
}

fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}
