//! Error types for the proxy.
//!
//! Only two kinds ever reach a human: `Config` (fatal at startup) and
//! `InvalidRequest` (a 400 for the caller). Everything raised while translating
//! a successful backend response is swallowed by the interceptor's fail-open path.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("Translation error: {message}")]
    Translation { message: String },

    #[error("Failed to {action} {encoding} body: {source}")]
    Codec {
        action: &'static str,
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream {
            message: msg.into(),
        }
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation {
            message: msg.into(),
        }
    }

    /// Status to use when this error has to be rendered for the caller.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } | Self::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OpenAI error `type` string matching [`ProxyError::status`].
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::Upstream { .. } | Self::Http(_) => "upstream_error",
            _ => "server_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::invalid_request("bad json").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::upstream("connection refused").status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::translation("oops").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ProxyError::invalid_request("x").error_type(), "invalid_request_error");
    }

    #[test]
    fn test_codec_error_message() {
        let err = ProxyError::Codec {
            action: "decompress",
            encoding: "gzip",
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt deflate stream"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to decompress gzip body: corrupt deflate stream"
        );
    }
}
