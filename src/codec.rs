//! Content-Encoding aware body codec.
//!
//! Captured backend bodies are decoded before translation and the translated
//! body is encoded again with the same scheme, so a `Content-Encoding` header
//! copied through from the backend stays truthful. Only `gzip` and `deflate`
//! are understood; anything else passes through untouched.

use std::io::{Read, Write};

use axum::http::header::CONTENT_ENCODING;
use axum::http::HeaderMap;
use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{ProxyError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
    Unknown(String),
}

impl ContentEncoding {
    /// Parse a `Content-Encoding` value. Absent or empty means identity.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        let value = value.map(str::trim).unwrap_or_default();
        match value.to_ascii_lowercase().as_str() {
            "" | "identity" => Self::Identity,
            "gzip" | "x-gzip" => Self::Gzip,
            "deflate" => Self::Deflate,
            _ => Self::Unknown(value.to_string()),
        }
    }

    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::parse(
            headers
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok()),
        )
    }

    /// Whether this crate can actually transform bodies in this encoding.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// Decompress `body` according to `encoding`.
pub fn decode(body: &Bytes, encoding: &ContentEncoding) -> Result<Bytes> {
    match encoding {
        ContentEncoding::Identity | ContentEncoding::Unknown(_) => Ok(body.clone()),
        // Too short to carry a gzip header, so not actually compressed.
        ContentEncoding::Gzip if body.len() < 2 => Ok(body.clone()),
        ContentEncoding::Gzip => read_all(GzDecoder::new(&body[..]), "gzip"),
        ContentEncoding::Deflate => decode_deflate(body),
    }
}

/// Compress `body` according to `encoding`. Inverse of [`decode`].
pub fn encode(body: &[u8], encoding: &ContentEncoding) -> Result<Bytes> {
    match encoding {
        ContentEncoding::Identity | ContentEncoding::Unknown(_) => {
            Ok(Bytes::copy_from_slice(body))
        }
        ContentEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(body)
                .map_err(|e| codec_error("compress", "gzip", e))?;
            let out = encoder
                .finish()
                .map_err(|e| codec_error("compress", "gzip", e))?;
            Ok(Bytes::from(out))
        }
        ContentEncoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(body)
                .map_err(|e| codec_error("compress", "deflate", e))?;
            let out = encoder
                .finish()
                .map_err(|e| codec_error("compress", "deflate", e))?;
            Ok(Bytes::from(out))
        }
    }
}

/// HTTP `deflate` is zlib-wrapped, but plenty of servers send raw DEFLATE.
/// Accept both.
fn decode_deflate(body: &Bytes) -> Result<Bytes> {
    if looks_like_zlib(body) {
        if let Ok(out) = read_all(ZlibDecoder::new(&body[..]), "deflate") {
            return Ok(out);
        }
    }
    read_all(DeflateDecoder::new(&body[..]), "deflate")
}

fn looks_like_zlib(body: &[u8]) -> bool {
    match body {
        [cmf, flg, ..] => (cmf & 0x0f) == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

fn read_all(mut reader: impl Read, encoding: &'static str) -> Result<Bytes> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|e| codec_error("decompress", encoding, e))?;
    Ok(Bytes::from(out))
}

fn codec_error(action: &'static str, encoding: &'static str, source: std::io::Error) -> ProxyError {
    ProxyError::Codec {
        action,
        encoding,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;

    const JSON: &[u8] = br#"{"object":"list","data":[]}"#;

    #[test]
    fn test_parse_header_values() {
        assert_eq!(ContentEncoding::parse(None), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::parse(Some("")), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::parse(Some(" GZIP ")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::parse(Some("deflate")), ContentEncoding::Deflate);
        assert_eq!(
            ContentEncoding::parse(Some("br")),
            ContentEncoding::Unknown("br".to_string())
        );
        assert!(!ContentEncoding::parse(Some("gzip, br")).is_supported());
    }

    #[test]
    fn test_gzip_roundtrip() {
        let compressed = encode(JSON, &ContentEncoding::Gzip).unwrap();
        assert_ne!(&compressed[..], JSON);
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);

        let decoded = decode(&compressed, &ContentEncoding::Gzip).unwrap();
        assert_eq!(&decoded[..], JSON);
    }

    #[test]
    fn test_deflate_roundtrip() {
        let compressed = encode(JSON, &ContentEncoding::Deflate).unwrap();
        let decoded = decode(&compressed, &ContentEncoding::Deflate).unwrap();
        assert_eq!(&decoded[..], JSON);
    }

    #[test]
    fn test_raw_deflate_accepted() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(JSON).unwrap();
        let raw = Bytes::from(encoder.finish().unwrap());

        let decoded = decode(&raw, &ContentEncoding::Deflate).unwrap();
        assert_eq!(&decoded[..], JSON);
    }

    #[test]
    fn test_short_gzip_body_passes_through() {
        let empty = Bytes::new();
        assert_eq!(decode(&empty, &ContentEncoding::Gzip).unwrap(), empty);

        let one = Bytes::from_static(b"{");
        assert_eq!(decode(&one, &ContentEncoding::Gzip).unwrap(), one);
    }

    #[test]
    fn test_unknown_encoding_is_noop() {
        let body = Bytes::from_static(JSON);
        let br = ContentEncoding::Unknown("br".to_string());
        assert_eq!(decode(&body, &br).unwrap(), body);
        assert_eq!(encode(JSON, &br).unwrap(), body);
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let garbage = Bytes::from_static(b"\x1f\x8bthis is not gzip");
        let err = decode(&garbage, &ContentEncoding::Gzip).unwrap_err();
        assert!(matches!(err, ProxyError::Codec { encoding: "gzip", .. }));
    }
}
