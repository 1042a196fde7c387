//! Request interception: decide what to translate, rewrite it for OCI, capture
//! the downstream answer and translate it back.
//!
//! Only two routes are touched:
//!
//! | Inbound                        | Downstream                                  |
//! |--------------------------------|---------------------------------------------|
//! | `POST …/chat/completions`      | `POST https://<host>/20231130/actions/chat` |
//! | `GET  …/models`                | `GET  https://<host>/20231130/models?…`     |
//!
//! Everything else goes to the downstream handler untouched. The downstream
//! response is buffered into a [`CapturedResponse`] and only a `200` is
//! translated. If translating a `200` fails for any reason the captured
//! response is relayed as-is (fail open).

use std::future::Future;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{
    CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING,
};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::form_urlencoded;

use crate::codec::{self, ContentEncoding};
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogLevel, SharedLogger};
use crate::translate::models::{oci_models_to_openai, ModelPredicate};
use crate::translate::oci_types::{BackendChatResponse, BackendModelsListing};
use crate::translate::openai_types::{ChatCompletionRequest, ChatErrorResponse};
use crate::translate::request::{openai_to_oci, ApiFormatPolicy};
use crate::translate::response::oci_to_openai;

pub const CHAT_PATH: &str = "/20231130/actions/chat";
pub const MODELS_PATH: &str = "/20231130/models";

const COMPARTMENT_PARAM: &str = "compartmentId";
const CAPABILITY_PARAM: &str = "capability";
const DEFAULT_CAPABILITY: &str = "CHAT";
const COMPONENT: &str = "interceptor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ChatCompletions,
    Models,
    Passthrough,
}

impl Route {
    #[must_use]
    pub fn classify(method: &Method, path: &str) -> Self {
        if *method == Method::POST && path.ends_with("/chat/completions") {
            Self::ChatCompletions
        } else if *method == Method::GET && path.ends_with("/models") {
            Self::Models
        } else {
            Self::Passthrough
        }
    }
}

/// A downstream response held in memory until we decide what to do with it.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedResponse {
    pub async fn capture(response: Response) -> Result<Self> {
        let (parts, body) = response.into_parts();
        let body = to_bytes(body, usize::MAX).await.map_err(|e| {
            ProxyError::upstream(format!("Failed to read downstream response body: {e}"))
        })?;

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    #[must_use]
    pub fn encoding(&self) -> ContentEncoding {
        ContentEncoding::from_headers(&self.headers)
    }
}

impl IntoResponse for CapturedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Read-only translation state shared by every request.
pub struct Interceptor {
    compartment_id: String,
    host: String,
    host_header: HeaderValue,
    api_format: ApiFormatPolicy,
    model_filter: Box<dyn ModelPredicate>,
    reencode: bool,
    logger: SharedLogger,
}

impl Interceptor {
    /// Validates `config` first; an interceptor never exists without a
    /// compartment and region.
    pub fn new(config: &ProxyConfig, logger: SharedLogger) -> Result<Self> {
        config.validate()?;

        let host = config.backend_host()?;
        let host_header = HeaderValue::from_str(&host)
            .map_err(|e| ProxyError::config(format!("Invalid backend host '{host}': {e}")))?;

        Ok(Self {
            compartment_id: config.oci.compartment_id.trim().to_string(),
            host,
            host_header,
            api_format: config.translation.api_format,
            model_filter: Box::new(config.models.filter.clone()),
            reencode: config.translation.reencode_responses,
            logger,
        })
    }

    /// Replace the configured model filter with a custom predicate.
    #[must_use]
    pub fn with_model_filter(mut self, filter: impl ModelPredicate + 'static) -> Self {
        self.model_filter = Box::new(filter);
        self
    }

    #[must_use]
    pub fn backend_host(&self) -> &str {
        &self.host
    }

    /// Handle one inbound request. `downstream` performs the real call and is
    /// invoked at most once.
    pub async fn handle<F, Fut>(&self, req: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        match Route::classify(req.method(), req.uri().path()) {
            Route::ChatCompletions => self.handle_chat(req, downstream).await,
            Route::Models => self.handle_models(req, downstream).await,
            Route::Passthrough => {
                self.logger.debug(
                    COMPONENT,
                    format!("Passing through {} {}", req.method(), req.uri().path()),
                );
                downstream(req).await
            }
        }
    }

    async fn handle_chat<F, Fut>(&self, req: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let (mut parts, body) = req.into_parts();

        let openai_req = match read_chat_request(body).await {
            Ok(r) => r,
            Err(e) => {
                self.logger
                    .error(COMPONENT, format!("Failed to parse request: {e}"));
                return error_response(&e);
            }
        };

        if openai_req.stream == Some(true) {
            self.logger.warn(
                COMPONENT,
                "Streaming requested but not supported; answering with a single response",
            );
        }

        let oci_req = openai_to_oci(&openai_req, &self.compartment_id, self.api_format);
        let oci_body = match serde_json::to_vec(&oci_req) {
            Ok(b) => b,
            Err(e) => return error_response(&e.into()),
        };

        if let Err(e) = self.rewrite_destination(&mut parts, CHAT_PATH, None) {
            return error_response(&e);
        }
        // The new body is plain and fully buffered; the caller's framing no longer applies.
        parts.headers.remove(TRANSFER_ENCODING);
        parts.headers.remove(CONTENT_ENCODING);
        parts
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(oci_body.len()));

        self.logger.info(
            COMPONENT,
            format!(
                "POST {} model={} messages={}",
                parts.uri,
                openai_req.model,
                openai_req.messages.len()
            ),
        );

        let response = downstream(Request::from_parts(parts, Body::from(oci_body))).await;
        let captured = match CapturedResponse::capture(response).await {
            Ok(c) => c,
            Err(e) => {
                self.logger.error(COMPONENT, e.to_string());
                return error_response(&e);
            }
        };

        let model = openai_req.model;
        self.relay_or_translate("chat", captured, |oci: BackendChatResponse| {
            let resp = oci_to_openai(&oci, &model);
            self.logger.info(
                COMPONENT,
                format!(
                    "Completed: model={} prompt={} completion={} tokens",
                    resp.model, resp.usage.prompt_tokens, resp.usage.completion_tokens
                ),
            );
            resp
        })
    }

    async fn handle_models<F, Fut>(&self, req: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let (mut parts, body) = req.into_parts();

        let query = models_query(parts.uri.query(), &self.compartment_id);
        if let Err(e) = self.rewrite_destination(&mut parts, MODELS_PATH, Some(&query)) {
            return error_response(&e);
        }

        self.logger.info(COMPONENT, format!("GET {}", parts.uri));

        let response = downstream(Request::from_parts(parts, body)).await;
        let captured = match CapturedResponse::capture(response).await {
            Ok(c) => c,
            Err(e) => {
                self.logger.error(COMPONENT, e.to_string());
                return error_response(&e);
            }
        };

        self.relay_or_translate("models", captured, |listing: BackendModelsListing| {
            oci_models_to_openai(&listing, self.model_filter.as_ref())
        })
    }

    fn rewrite_destination(&self, parts: &mut Parts, path: &str, query: Option<&str>) -> Result<()> {
        let path_and_query = match query {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.to_string(),
        };

        parts.uri = Uri::builder()
            .scheme("https")
            .authority(self.host.as_str())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ProxyError::translation(format!("Failed to build backend URI: {e}")))?;

        parts.headers.insert(HOST, self.host_header.clone());
        parts
            .headers
            .entry(CONTENT_TYPE)
            .or_insert_with(|| HeaderValue::from_static("application/json"));

        Ok(())
    }

    /// Non-200 is relayed verbatim; a 200 is translated, or relayed verbatim
    /// if translation fails.
    fn relay_or_translate<T, U>(
        &self,
        route: &str,
        captured: CapturedResponse,
        translate: impl FnOnce(T) -> U,
    ) -> Response
    where
        T: DeserializeOwned,
        U: Serialize,
    {
        if captured.status != StatusCode::OK {
            self.logger.warn(
                COMPONENT,
                format!(
                    "Backend returned {} for {route}; relaying unmodified",
                    captured.status
                ),
            );
            return captured.into_response();
        }

        match self.translate_success(&captured, translate) {
            Ok(response) => response,
            Err(e) => {
                self.logger.log_with_context(
                    LogLevel::Error,
                    COMPONENT,
                    format!("Failed to translate {route} response, relaying original: {e}"),
                    serde_json::json!({
                        "status": captured.status.as_u16(),
                        "body_len": captured.body.len(),
                        "content_encoding": format!("{:?}", captured.encoding()),
                    }),
                );
                captured.into_response()
            }
        }
    }

    fn translate_success<T, U>(
        &self,
        captured: &CapturedResponse,
        translate: impl FnOnce(T) -> U,
    ) -> Result<Response>
    where
        T: DeserializeOwned,
        U: Serialize,
    {
        let encoding = captured.encoding();
        if let ContentEncoding::Unknown(ref value) = encoding {
            self.logger.warn(
                COMPONENT,
                format!("Unexpected Content-Encoding '{value}', treating body as uncompressed"),
            );
        }

        let raw = codec::decode(&captured.body, &encoding)?;
        let parsed: T = serde_json::from_slice(&raw).map_err(|e| {
            ProxyError::translation(format!(
                "Failed to parse backend response: {e}. Body: {}",
                truncate(&String::from_utf8_lossy(&raw), 300)
            ))
        })?;
        let json = serde_json::to_vec(&translate(parsed))?;

        let mut headers = captured.headers.clone();
        let body = if self.reencode {
            codec::encode(&json, &encoding)?
        } else {
            if encoding.is_supported() {
                headers.remove(CONTENT_ENCODING);
            }
            Bytes::from(json)
        };

        headers.remove(TRANSFER_ENCODING);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        Ok(CapturedResponse {
            status: StatusCode::OK,
            headers,
            body,
        }
        .into_response())
    }
}

/// `axum` middleware entry point; use with `axum::middleware::from_fn_with_state`.
pub async fn intercept(
    State(interceptor): State<Arc<Interceptor>>,
    req: Request,
    next: Next,
) -> Response {
    interceptor.handle(req, |req| next.run(req)).await
}

async fn read_chat_request(body: Body) -> Result<ChatCompletionRequest> {
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::invalid_request(format!("Failed to read request body: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ProxyError::invalid_request(format!("Invalid request body: {e}")))
}

/// Caller query with `capability` defaulted and `compartmentId` forced from config.
fn models_query(original: Option<&str>, compartment_id: &str) -> String {
    let mut params: Vec<(String, String)> = original
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .filter(|(k, _)| k != COMPARTMENT_PARAM)
                .collect()
        })
        .unwrap_or_default();

    if !params.iter().any(|(k, _)| k == CAPABILITY_PARAM) {
        params.push((CAPABILITY_PARAM.to_string(), DEFAULT_CAPABILITY.to_string()));
    }
    params.push((COMPARTMENT_PARAM.to_string(), compartment_id.to_string()));

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

fn error_response(err: &ProxyError) -> Response {
    let body = ChatErrorResponse::new(err.error_type(), err.to_string());
    (err.status(), Json(body)).into_response()
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OciConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn interceptor() -> Interceptor {
        let config = ProxyConfig {
            oci: OciConfig {
                compartment_id: "test-compartment-id".to_string(),
                region: "us-ashburn-1".to_string(),
                ..OciConfig::default()
            },
            ..ProxyConfig::default()
        };
        Interceptor::new(&config, SharedLogger::in_memory()).unwrap()
    }

    #[test]
    fn test_route_classification() {
        assert_eq!(
            Route::classify(&Method::POST, "/v1/chat/completions"),
            Route::ChatCompletions
        );
        assert_eq!(
            Route::classify(&Method::POST, "/chat/completions"),
            Route::ChatCompletions
        );
        assert_eq!(Route::classify(&Method::GET, "/v1/models"), Route::Models);
        assert_eq!(
            Route::classify(&Method::GET, "/v1/chat/completions"),
            Route::Passthrough
        );
        assert_eq!(Route::classify(&Method::POST, "/v1/models"), Route::Passthrough);
        assert_eq!(
            Route::classify(&Method::GET, "/v1/models/cohere.command-r"),
            Route::Passthrough
        );
        assert_eq!(
            Route::classify(&Method::OPTIONS, "/v1/chat/completions"),
            Route::Passthrough
        );
    }

    #[test]
    fn test_models_query_defaults() {
        assert_eq!(
            models_query(None, "ocid1.compartment.oc1..x"),
            "capability=CHAT&compartmentId=ocid1.compartment.oc1..x"
        );
    }

    #[test]
    fn test_models_query_preserves_caller_params() {
        let q = models_query(
            Some("limit=5&capability=TEXT_EMBEDDINGS&compartmentId=evil&vendor=meta"),
            "mine",
        );
        assert_eq!(
            q,
            "limit=5&capability=TEXT_EMBEDDINGS&vendor=meta&compartmentId=mine"
        );
    }

    #[test]
    fn test_new_rejects_missing_settings() {
        let config = ProxyConfig::default();
        assert!(Interceptor::new(&config, SharedLogger::in_memory()).is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_passthrough_is_untouched() {
        let interceptor = interceptor();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let req = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/v1/foo?x=1")
            .body(Body::from("payload"))
            .unwrap();

        let response = interceptor
            .handle(req, |req| async move {
                let (parts, body) = req.into_parts();
                let body = to_bytes(body, usize::MAX).await.unwrap();
                *seen_clone.lock().unwrap() = Some((parts.uri.to_string(), body));
                (StatusCode::IM_A_TEAPOT, "short and stout").into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let (uri, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(uri, "/v1/foo?x=1");
        assert_eq!(&body[..], b"payload");
    }

    #[tokio::test]
    async fn test_bad_chat_body_is_not_forwarded() {
        let interceptor = interceptor();
        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/v1/chat/completions")
            .body(Body::from("{not json"))
            .unwrap();

        let called = AtomicBool::new(false);
        let response = interceptor
            .handle(req, |_req| {
                called.store(true, Ordering::SeqCst);
                async { StatusCode::OK.into_response() }
            })
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!called.load(Ordering::SeqCst));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let err: ChatErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error.error_type, "invalid_request_error");
    }
}
