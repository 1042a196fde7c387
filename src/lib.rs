pub mod codec;
pub mod config;
pub mod error;
pub mod forward;
pub mod interceptor;
pub mod logging;
pub mod realms;
pub mod server;
pub mod translate;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use interceptor::{intercept, CapturedResponse, Interceptor, Route};
pub use logging::SharedLogger;
pub use server::{build_router, with_interceptor, AppState};
