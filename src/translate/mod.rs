//! API translation between `OpenAI` and OCI Generative AI formats.
//!
//! The core of the proxy: converts chat requests, chat responses and model
//! listings between the two API formats. All translation functions are pure
//! (no I/O).

pub mod models;
pub mod oci_types;
pub mod openai_types;
pub mod request;
pub mod response;
