//! The real downstream: sends whatever the interceptor hands over to the OCI
//! endpoint (or a configured sidecar) and returns the reply unmodified.
//!
//! Bodies are buffered in both directions. `reqwest` is built without its
//! decompression features so a compressed reply reaches the interceptor with
//! its `Content-Encoding` intact.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use url::Url;

use crate::error::{ProxyError, Result};
use crate::server::AppState;
use crate::translate::openai_types::ChatErrorResponse;

const COMPONENT: &str = "forward";

/// Hop-by-hop headers never cross the proxy in either direction.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn should_forward_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !HOP_BY_HOP_HEADERS.contains(&lower.as_str())
}

/// Router fallback that performs the outbound call.
pub async fn forward_upstream(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match send(&state, req).await {
        Ok(response) => response,
        Err(e) => {
            state.logger.error(COMPONENT, e.to_string());
            let body = ChatErrorResponse::new(e.error_type(), e.to_string());
            (e.status(), Json(body)).into_response()
        }
    }
}

async fn send(state: &AppState, req: Request) -> Result<Response> {
    let (parts, body) = req.into_parts();

    let upstream = state.config.oci.upstream_url.as_deref();
    let url = destination(&parts.uri, upstream, state.interceptor.backend_host())?;
    let body = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::invalid_request(format!("Failed to read request body: {e}")))?;

    // Host is recomputed by reqwest from the URL, except for a sidecar that
    // signs on behalf of the real backend host.
    let keep_host = upstream.is_some();
    let headers = filter_headers(&parts.headers, |name| {
        should_forward_header(name)
            && name != "content-length"
            && (keep_host || name != "host")
    });

    state.logger.debug(COMPONENT, format!("{} {url}", parts.method));

    let response = state
        .client
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let headers = filter_headers(response.headers(), should_forward_header);
    let body = response.bytes().await?;

    state.logger.debug(
        COMPONENT,
        format!("Response: status={} len={}", status, body.len()),
    );

    let mut out = Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    Ok(out)
}

/// Sidecar origin first, then an absolute request URI, then the backend host.
fn destination(uri: &Uri, upstream: Option<&str>, backend_host: &str) -> Result<Url> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    let url = if let Some(upstream) = upstream {
        Url::parse(upstream).and_then(|base| base.join(path_and_query))
    } else if uri.scheme().is_some() && uri.authority().is_some() {
        Url::parse(&uri.to_string())
    } else {
        Url::parse(&format!("https://{backend_host}{path_and_query}"))
    };

    url.map_err(|e| ProxyError::upstream(format!("Cannot build destination URL for {uri}: {e}")))
}

fn filter_headers(headers: &HeaderMap, keep: impl Fn(&str) -> bool) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if keep(name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}
