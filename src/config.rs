use crate::error::{ProxyError, Result};
use crate::realms::{genai_host, RealmPreset, DEFAULT_REALM};
use crate::translate::models::ModelFilter;
use crate::translate::request::ApiFormatPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub oci: OciConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            oci: OciConfig::default(),
            translation: TranslationConfig::default(),
            models: ModelsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OciConfig {
    #[serde(default)]
    pub compartment_id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Where the forwarder sends rewritten requests instead of the public
    /// endpoint, e.g. a local request-signing sidecar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
}

impl Default for OciConfig {
    fn default() -> Self {
        Self {
            compartment_id: String::new(),
            region: String::new(),
            realm: default_realm(),
            domain: None,
            upstream_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub api_format: ApiFormatPolicy,
    #[serde(default = "default_reencode")]
    pub reencode_responses: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_format: ApiFormatPolicy::default(),
            reencode_responses: default_reencode(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub filter: ModelFilter,
}

fn default_port() -> u16 {
    4223
}

fn default_realm() -> String {
    DEFAULT_REALM.to_string()
}

fn default_reencode() -> bool {
    true
}

impl ProxyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        let candidates = config_search_paths();
        for candidate in &candidates {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        Err(ProxyError::config(format!(
            "No config file found. Searched: {}. Pass --region and --compartment-id or create one",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Reject configs the interceptor cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.oci.compartment_id.trim().is_empty() {
            return Err(ProxyError::config(
                "compartment_id is required and cannot be empty",
            ));
        }
        if self.oci.region.trim().is_empty() {
            return Err(ProxyError::config("region is required and cannot be empty"));
        }

        let host = self.backend_host()?;
        if host.parse::<axum::http::uri::Authority>().is_err() {
            return Err(ProxyError::config(format!(
                "Backend host '{host}' is not a valid hostname; check region and domain"
            )));
        }

        if let Some(ref upstream) = self.oci.upstream_url {
            url::Url::parse(upstream).map_err(|e| {
                ProxyError::config(format!("Invalid upstream_url '{upstream}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Resolve the backend domain (explicit override or realm preset).
    pub fn effective_domain(&self) -> Result<String> {
        if let Some(ref domain) = self.oci.domain {
            return Ok(domain.trim_matches('.').to_string());
        }

        let preset = RealmPreset::from_name(&self.oci.realm).ok_or_else(|| {
            ProxyError::config(format!(
                "Unknown realm '{}' and no domain configured. Known realms: {}",
                self.oci.realm,
                RealmPreset::all()
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        Ok(preset.domain.to_string())
    }

    /// `generativeai.<region>.<domain>`
    pub fn backend_host(&self) -> Result<String> {
        Ok(genai_host(self.oci.region.trim(), &self.effective_domain()?))
    }
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("oci-openai-proxy.toml"));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("oci-openai-proxy")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("oci-openai-proxy").join("config.toml"));
        }
        if let Some(home) = dirs_path() {
            paths.push(home.join(".config").join("oci-openai-proxy").join("config.toml"));
        }
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(".oci-openai-proxy.toml"));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
