//! Translate the OCI model catalogue into an OpenAI `/models` listing.
//!
//! Only `ACTIVE` models are ever listed. On top of that a [`ModelPredicate`]
//! decides which vendors or models the client gets to see; the configured
//! [`ModelFilter`] is the stock implementation, and any `Fn(&BackendModel) -> bool`
//! works too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::oci_types::{BackendModel, BackendModelsListing};
use super::openai_types::{ModelsListing, OpenAIModel};

pub const ACTIVE: &str = "ACTIVE";

pub trait ModelPredicate: Send + Sync {
    fn include(&self, model: &BackendModel) -> bool;
}

impl<F> ModelPredicate for F
where
    F: Fn(&BackendModel) -> bool + Send + Sync,
{
    fn include(&self, model: &BackendModel) -> bool {
        self(model)
    }
}

/// Inclusion filter selectable from config (`[models.filter]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelFilter {
    /// Only these vendors (case-insensitive).
    VendorAllowlist { vendors: Vec<String> },
    /// Every vendor except these (case-insensitive).
    VendorDenylist { vendors: Vec<String> },
    /// Only models with exactly these display names.
    DisplayNames { names: Vec<String> },
    /// Only models advertising this capability tag.
    Capability {
        #[serde(default = "default_capability")]
        capability: String,
    },
    /// No extra filtering beyond `ACTIVE`.
    All,
}

fn default_capability() -> String {
    "CHAT".to_string()
}

impl Default for ModelFilter {
    fn default() -> Self {
        Self::VendorAllowlist {
            vendors: vec!["cohere".to_string(), "meta".to_string(), "xai".to_string()],
        }
    }
}

impl ModelPredicate for ModelFilter {
    fn include(&self, model: &BackendModel) -> bool {
        match self {
            Self::VendorAllowlist { vendors } => {
                vendors.iter().any(|v| v.eq_ignore_ascii_case(&model.vendor))
            }
            Self::VendorDenylist { vendors } => {
                !vendors.iter().any(|v| v.eq_ignore_ascii_case(&model.vendor))
            }
            Self::DisplayNames { names } => names.iter().any(|n| *n == model.display_name),
            Self::Capability { capability } => model
                .capabilities
                .iter()
                .any(|c| c.eq_ignore_ascii_case(capability)),
            Self::All => true,
        }
    }
}

/// Build the OpenAI listing, keeping backend order.
pub fn oci_models_to_openai(
    listing: &BackendModelsListing,
    filter: &dyn ModelPredicate,
) -> ModelsListing {
    let data = listing
        .items
        .iter()
        .filter(|m| m.lifecycle_state == ACTIVE && filter.include(m))
        .map(|m| OpenAIModel {
            id: m.display_name.clone(),
            object: "model".to_string(),
            created: parse_created(&m.time_created),
            owned_by: m.vendor.clone(),
        })
        .collect();

    ModelsListing {
        object: "list".to_string(),
        data,
    }
}

/// Epoch seconds from an RFC 3339 timestamp; "now" if it does not parse.
fn parse_created(time_created: &str) -> i64 {
    DateTime::parse_from_rfc3339(time_created)
        .map(|t| t.timestamp())
        .unwrap_or_else(|_| Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, vendor: &str, state: &str, capabilities: &[&str]) -> BackendModel {
        BackendModel {
            id: format!("ocid1.generativeaimodel.oc1.iad.{name}"),
            display_name: name.to_string(),
            vendor: vendor.to_string(),
            capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
            lifecycle_state: state.to_string(),
            time_created: "2023-01-01T00:00:00Z".to_string(),
            version: None,
        }
    }

    fn catalogue() -> BackendModelsListing {
        BackendModelsListing {
            items: vec![
                model("cohere.command-r-plus", "cohere", "ACTIVE", &["CHAT"]),
                model("meta.llama-3.3-70b-instruct", "meta", "ACTIVE", &["CHAT"]),
                model("cohere.embed-english-v3.0", "cohere", "ACTIVE", &["TEXT_EMBEDDINGS"]),
                model("openai.gpt-oss-120b", "openai", "ACTIVE", &["CHAT"]),
                model("cohere.command", "cohere", "DELETED", &["CHAT"]),
            ],
        }
    }

    fn ids(listing: &ModelsListing) -> Vec<&str> {
        listing.data.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_default_vendor_allowlist() {
        let result = oci_models_to_openai(&catalogue(), &ModelFilter::default());

        assert_eq!(result.object, "list");
        assert_eq!(
            ids(&result),
            vec![
                "cohere.command-r-plus",
                "meta.llama-3.3-70b-instruct",
                "cohere.embed-english-v3.0"
            ]
        );
        assert_eq!(result.data[0].object, "model");
        assert_eq!(result.data[0].owned_by, "cohere");
        assert_eq!(result.data[0].created, 1_672_531_200);
    }

    #[test]
    fn test_capability_filter() {
        let filter = ModelFilter::Capability {
            capability: "CHAT".to_string(),
        };
        let result = oci_models_to_openai(&catalogue(), &filter);
        assert_eq!(
            ids(&result),
            vec![
                "cohere.command-r-plus",
                "meta.llama-3.3-70b-instruct",
                "openai.gpt-oss-120b"
            ]
        );
    }

    #[test]
    fn test_denylist_and_display_names() {
        let deny = ModelFilter::VendorDenylist {
            vendors: vec!["COHERE".to_string()],
        };
        assert_eq!(
            ids(&oci_models_to_openai(&catalogue(), &deny)),
            vec!["meta.llama-3.3-70b-instruct", "openai.gpt-oss-120b"]
        );

        let names = ModelFilter::DisplayNames {
            names: vec!["openai.gpt-oss-120b".to_string(), "cohere.command".to_string()],
        };
        // cohere.command is not ACTIVE and stays hidden
        assert_eq!(
            ids(&oci_models_to_openai(&catalogue(), &names)),
            vec!["openai.gpt-oss-120b"]
        );
    }

    #[test]
    fn test_closure_predicate() {
        let only_meta = |m: &BackendModel| m.vendor == "meta";
        let result = oci_models_to_openai(&catalogue(), &only_meta);
        assert_eq!(ids(&result), vec!["meta.llama-3.3-70b-instruct"]);
    }

    #[test]
    fn test_unparseable_timestamp_falls_back_to_now() {
        let mut m = model("xai.grok-3", "xai", "ACTIVE", &["CHAT"]);
        m.time_created = "yesterday".to_string();
        let before = Utc::now().timestamp();

        let result = oci_models_to_openai(&BackendModelsListing { items: vec![m] }, &ModelFilter::All);

        assert_eq!(result.data.len(), 1);
        assert!(result.data[0].created >= before);
    }

    #[test]
    fn test_filter_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            filter: ModelFilter,
        }

        let w: Wrapper = toml::from_str(
            r#"
[filter]
kind = "capability"
"#,
        )
        .unwrap();
        assert_eq!(
            w.filter,
            ModelFilter::Capability {
                capability: "CHAT".to_string()
            }
        );
    }
}
