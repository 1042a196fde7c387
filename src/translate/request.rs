//! Translate OpenAI Chat Completions requests into OCI GenAI chat requests.
//!
//! OCI accepts two chat payload shapes. The COHERE shape holds the last message
//! out as `message` and sends everything before it as `chatHistory`; the GENERIC
//! shape sends every message, in order, as content blocks. Which one a request
//! gets is decided by an [`ApiFormatPolicy`].
//!
//! Role mapping is lenient: any role containing `user`
//! (case-insensitive) is the user, everything else is the model's side. A role
//! of `"SuperUser"` maps to `USER`; `"system"` maps to `CHATBOT` / `ASSISTANT`.

use serde::{Deserialize, Serialize};

use super::oci_types::{
    BackendChatPayload, BackendChatRequest, ChatFormat, CohereHistoryEntry, CohereRole,
    ContentBlock, GenericMessage, GenericRole, ServingMode,
};
use super::openai_types::{ChatCompletionRequest, ChatMessage};

/// Which backend payload shape to emit for a given model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormatPolicy {
    /// COHERE when the model name contains `cohere` (case-insensitive), else GENERIC.
    #[default]
    Auto,
    /// Always COHERE.
    Cohere,
    /// Always GENERIC.
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Cohere,
    Generic,
}

impl ApiFormatPolicy {
    #[must_use]
    pub fn select(self, model: &str) -> ApiFormat {
        match self {
            Self::Cohere => ApiFormat::Cohere,
            Self::Generic => ApiFormat::Generic,
            Self::Auto if contains_ignore_case(model, "cohere") => ApiFormat::Cohere,
            Self::Auto => ApiFormat::Generic,
        }
    }
}

/// Translate an OpenAI chat request into an OCI `ChatDetails` body.
/// Pure and total: the compartment always comes from configuration, never from the caller.
pub fn openai_to_oci(
    req: &ChatCompletionRequest,
    compartment_id: &str,
    policy: ApiFormatPolicy,
) -> BackendChatRequest {
    let format = if req.messages.is_empty() {
        ChatFormat::Cohere {
            message: String::new(),
            chat_history: Vec::new(),
        }
    } else {
        match policy.select(&req.model) {
            ApiFormat::Cohere => cohere_format(&req.messages),
            ApiFormat::Generic => generic_format(&req.messages),
        }
    };

    BackendChatRequest {
        compartment_id: compartment_id.to_string(),
        serving_mode: ServingMode::on_demand(req.model.clone()),
        chat_request: BackendChatPayload {
            format,
            max_tokens: req.max_tokens,
            temperature: req.temperature.map(f64::from),
            top_p: req.top_p.map(f64::from),
            frequency_penalty: req.frequency_penalty.map(f64::from),
            presence_penalty: req.presence_penalty.map(f64::from),
            stop_sequences: req
                .stop
                .clone()
                .map(super::openai_types::StopSequences::into_vec)
                .unwrap_or_default(),
            seed: req.seed,
            is_stream: false,
        },
    }
}

fn cohere_format(messages: &[ChatMessage]) -> ChatFormat {
    let (current, history) = match messages.split_last() {
        Some(split) => split,
        None => {
            return ChatFormat::Cohere {
                message: String::new(),
                chat_history: Vec::new(),
            }
        }
    };

    let chat_history = history
        .iter()
        .map(|msg| CohereHistoryEntry {
            role: if is_user_role(&msg.role) {
                CohereRole::User
            } else {
                CohereRole::Chatbot
            },
            message: msg.text_content(),
        })
        .collect();

    ChatFormat::Cohere {
        message: current.text_content(),
        chat_history,
    }
}

fn generic_format(messages: &[ChatMessage]) -> ChatFormat {
    let messages = messages
        .iter()
        .map(|msg| GenericMessage {
            role: if is_user_role(&msg.role) {
                GenericRole::User
            } else {
                GenericRole::Assistant
            },
            content: vec![ContentBlock::Text {
                text: msg.text_content(),
            }],
        })
        .collect();

    ChatFormat::Generic { messages }
}

fn is_user_role(role: &str) -> bool {
    contains_ignore_case(role, "user")
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
