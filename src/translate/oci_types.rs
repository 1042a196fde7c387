//! Type definitions for the OCI Generative AI inference API (`20231130`).
//!
//! Requests are what we send TO the backend (`POST /20231130/actions/chat`);
//! responses are what the backend sends back, including `GET /20231130/models`.

use serde::{Deserialize, Serialize};

pub const ON_DEMAND: &str = "ON_DEMAND";

// ---------------------------------------------------------------------------
// Request types (what we send TO the backend)
// ---------------------------------------------------------------------------

/// `ChatDetails` in OCI terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendChatRequest {
    pub compartment_id: String,
    pub serving_mode: ServingMode,
    pub chat_request: BackendChatPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingMode {
    pub model_id: String,
    pub serving_type: String,
}

impl ServingMode {
    pub fn on_demand(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            serving_type: ON_DEMAND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendChatPayload {
    #[serde(flatten)]
    pub format: ChatFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default)]
    pub is_stream: bool,
}

/// The two chat payload shapes, discriminated by `apiFormat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "apiFormat")]
pub enum ChatFormat {
    /// Flat current message plus history.
    #[serde(rename = "COHERE", rename_all = "camelCase")]
    Cohere {
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        chat_history: Vec<CohereHistoryEntry>,
    },
    /// Ordered message list with content blocks.
    #[serde(rename = "GENERIC")]
    Generic { messages: Vec<GenericMessage> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CohereRole {
    User,
    Chatbot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereHistoryEntry {
    pub role: CohereRole,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenericRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericMessage {
    pub role: GenericRole,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "TEXT")]
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

// ---------------------------------------------------------------------------
// Chat response (what the backend sends back)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendChatResponse {
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub model_version: String,
    #[serde(default)]
    pub chat_response: BackendChatResult,
}

/// Union of the COHERE and GENERIC result shapes. COHERE fills `text` and
/// `finish_reason`; GENERIC fills `choices`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendChatResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<GenericChoice>,
    #[serde(default)]
    pub usage: BackendUsage,
}

impl BackendChatResult {
    /// Generated text, whichever shape the backend answered in.
    #[must_use]
    pub fn generated_text(&self) -> String {
        if let Some(ref text) = self.text {
            return text.clone();
        }
        self.choices
            .first()
            .map(|c| {
                c.message
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        ContentBlock::Unsupported => None,
                    })
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn finish_reason_code(&self) -> &str {
        self.finish_reason
            .as_deref()
            .or_else(|| self.choices.first().and_then(|c| c.finish_reason.as_deref()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericChoice {
    #[serde(default)]
    pub index: u32,
    pub message: GenericChoiceMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericChoiceMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Models listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendModel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub lifecycle_state: String,
    #[serde(default)]
    pub time_created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendModelsListing {
    #[serde(default)]
    pub items: Vec<BackendModel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cohere_payload_shape() {
        let req = BackendChatRequest {
            compartment_id: "ocid1.compartment.oc1..aaaa".to_string(),
            serving_mode: ServingMode::on_demand("cohere.command-r-plus"),
            chat_request: BackendChatPayload {
                format: ChatFormat::Cohere {
                    message: "How are you?".to_string(),
                    chat_history: vec![CohereHistoryEntry {
                        role: CohereRole::User,
                        message: "Hi".to_string(),
                    }],
                },
                max_tokens: Some(100),
                temperature: None,
                top_p: None,
                frequency_penalty: None,
                presence_penalty: None,
                stop_sequences: Vec::new(),
                seed: None,
                is_stream: false,
            },
        };

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "compartmentId": "ocid1.compartment.oc1..aaaa",
                "servingMode": {"modelId": "cohere.command-r-plus", "servingType": "ON_DEMAND"},
                "chatRequest": {
                    "apiFormat": "COHERE",
                    "message": "How are you?",
                    "chatHistory": [{"role": "USER", "message": "Hi"}],
                    "maxTokens": 100,
                    "isStream": false
                }
            })
        );
    }

    #[test]
    fn test_generic_payload_shape() {
        let payload = BackendChatPayload {
            format: ChatFormat::Generic {
                messages: vec![GenericMessage {
                    role: GenericRole::Assistant,
                    content: vec![ContentBlock::Text {
                        text: "Hello".to_string(),
                    }],
                }],
            },
            max_tokens: None,
            temperature: Some(0.5),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: vec!["END".to_string()],
            seed: None,
            is_stream: false,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["apiFormat"], "GENERIC");
        assert_eq!(value["messages"][0]["role"], "ASSISTANT");
        assert_eq!(value["messages"][0]["content"][0]["type"], "TEXT");
        assert_eq!(value["messages"][0]["content"][0]["text"], "Hello");
        assert_eq!(value["temperature"], 0.5);
        assert_eq!(value["stopSequences"], json!(["END"]));
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_cohere_response_text() {
        let resp: BackendChatResponse = serde_json::from_value(json!({
            "modelId": "cohere.command-r-plus",
            "modelVersion": "1.2",
            "chatResponse": {
                "apiFormat": "COHERE",
                "text": "Hello! How can I help you?",
                "finishReason": "COMPLETE",
                "usage": {"promptTokens": 10, "completionTokens": 6, "totalTokens": 16}
            }
        }))
        .unwrap();

        assert_eq!(resp.chat_response.generated_text(), "Hello! How can I help you?");
        assert_eq!(resp.chat_response.finish_reason_code(), "COMPLETE");
        assert_eq!(resp.chat_response.usage.total_tokens, 16);
    }

    #[test]
    fn test_generic_response_text() {
        let resp: BackendChatResponse = serde_json::from_value(json!({
            "modelId": "meta.llama-3.3-70b-instruct",
            "chatResponse": {
                "apiFormat": "GENERIC",
                "timeCreated": "2025-01-01T00:00:00Z",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "ASSISTANT",
                        "content": [{"type": "TEXT", "text": "Hi "}, {"type": "TEXT", "text": "there"}]
                    },
                    "finishReason": "stop"
                }]
            }
        }))
        .unwrap();

        assert_eq!(resp.chat_response.generated_text(), "Hi there");
        assert_eq!(resp.chat_response.finish_reason_code(), "stop");
        assert_eq!(resp.chat_response.usage.prompt_tokens, 0);
    }

    #[test]
    fn test_models_listing_ignores_unknown_fields() {
        let listing: BackendModelsListing = serde_json::from_value(json!({
            "items": [{
                "id": "ocid1.generativeaimodel.oc1.iad.xyz",
                "displayName": "cohere.command-r-plus",
                "vendor": "cohere",
                "capabilities": ["CHAT"],
                "lifecycleState": "ACTIVE",
                "timeCreated": "2024-05-01T12:00:00.000Z",
                "isLongTermSupported": true,
                "freeformTags": {}
            }]
        }))
        .unwrap();

        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].display_name, "cohere.command-r-plus");
    }
}
