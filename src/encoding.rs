//! Body encoders and content negotiation.
//!
//! The set of encoders is fixed: JSON, plain text and URL-encoded forms. An
//! [`Encoders`] registry chooses among the ones an application enables by
//! reading the request's `Accept` header; `Accept-Charset` is negotiated
//! separately into a [`Charset`] and handed to [`Encoder::encode`].
//!
//! Negotiation never fails. A missing, empty, malformed or unsatisfiable
//! `Accept` header yields the registry's default encoder so a response can
//! always be built.

use std::cmp::Ordering;

use bytes::Bytes;
use mime::Mime;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BoxError, Error};

/// A body serializer for one media type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoder {
    /// `application/json`, always UTF-8.
    Json,
    /// `text/plain`. Strings are written verbatim, other values as their JSON text.
    Text,
    /// `application/x-www-form-urlencoded`.
    Form,
}

impl Encoder {
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }

    /// Serializes `value`. Deterministic for identical input and charset.
    pub fn encode<T>(self, charset: Charset, value: &T) -> Result<Bytes, Error>
    where
        T: Serialize + ?Sized,
    {
        let encode_err = |source: BoxError| Error::Encode { media_type: self.media_type(), source };

        match self {
            Self::Json => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| encode_err(e.into())),
            Self::Text => {
                let text = match serde_json::to_value(value).map_err(|e| encode_err(e.into()))? {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                charset.encode(&text).map_err(|c| {
                    encode_err(format!("character {c:?} cannot be represented in {}", charset.as_str()).into())
                })
            }
            Self::Form => serde_urlencoded::to_string(value)
                .map(Bytes::from)
                .map_err(|e| encode_err(e.into())),
        }
    }

    /// Deserializes a request body. Text bodies must be UTF-8.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, Error> {
        let decode_err = |source: BoxError| Error::Decode { media_type: self.media_type(), source };

        match self {
            Self::Json => serde_json::from_slice(bytes).map_err(|e| decode_err(e.into())),
            Self::Text => {
                let text = std::str::from_utf8(bytes).map_err(|e| decode_err(e.into()))?;
                T::deserialize(serde_json::Value::String(text.to_owned()))
                    .map_err(|e| decode_err(e.into()))
            }
            Self::Form => serde_urlencoded::from_bytes(bytes).map_err(|e| decode_err(e.into())),
        }
    }

    fn matches(self, range: &Mime) -> bool {
        if range.type_() == mime::STAR {
            return range.subtype() == mime::STAR;
        }
        let (ty, subtype) = self.media_type().split_once('/').unwrap_or_default();
        range.type_() == ty && (range.subtype() == mime::STAR || range.subtype() == subtype)
    }
}

/// The encoders an application supports, plus the one used when negotiation
/// finds nothing better.
///
/// Immutable once the server starts; shared by every connection.
#[derive(Clone, Debug)]
pub struct Encoders {
    supported: Vec<Encoder>,
    default: Encoder,
}

impl Encoders {
    /// A registry containing only `default`.
    pub fn new(default: Encoder) -> Self {
        Self { supported: vec![default], default }
    }

    /// Adds an encoder. Earlier registrations win ties under a wildcard range.
    pub fn with(mut self, encoder: Encoder) -> Self {
        if !self.supported.contains(&encoder) {
            self.supported.push(encoder);
        }
        self
    }

    pub fn default_encoder(&self) -> Encoder {
        self.default
    }

    pub fn supports(&self, encoder: Encoder) -> bool {
        self.supported.contains(&encoder)
    }

    /// Picks the encoder for a response given the request's `Accept` header.
    ///
    /// Media ranges are tried in descending `q` order (header order breaks
    /// ties); `q=0` ranges are ignored. `*/*` selects the default encoder.
    pub fn accepted_encoder(&self, accept: Option<&str>) -> Encoder {
        for range in ranked(accept.unwrap_or_default()) {
            if range.type_() == mime::STAR && range.subtype() == mime::STAR {
                return self.default;
            }
            if let Some(&encoder) = self.supported.iter().find(|e| e.matches(&range)) {
                return encoder;
            }
        }
        self.default
    }

    /// Picks the decoder for a request body from its `Content-Type`.
    pub fn for_content_type(&self, content_type: Option<&str>) -> Encoder {
        content_type
            .and_then(|ct| ct.parse::<Mime>().ok())
            .and_then(|ct| {
                self.supported
                    .iter()
                    .copied()
                    .find(|e| e.media_type() == ct.essence_str())
            })
            .unwrap_or(self.default)
    }
}

/// JSON by default, with text and forms available on request.
impl Default for Encoders {
    fn default() -> Self {
        Self::new(Encoder::Json).with(Encoder::Text).with(Encoder::Form)
    }
}

/// Character set applied by [`Encoder::Text`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Charset {
    #[default]
    Utf8,
    /// ISO-8859-1.
    Latin1,
}

impl Charset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
        }
    }

    /// Picks a charset from an `Accept-Charset` header, UTF-8 when nothing
    /// supported is listed.
    pub fn negotiate(accept_charset: Option<&str>) -> Self {
        let mut candidates: Vec<(&str, f32)> = accept_charset
            .unwrap_or_default()
            .split(',')
            .filter_map(|item| {
                let mut parts = item.split(';');
                let name = parts.next()?.trim();
                let q = quality(parts);
                (!name.is_empty() && q > 0.0).then_some((name, q))
            })
            .collect();
        candidates.sort_by(|a, b| by_quality(a.1, b.1));

        candidates
            .into_iter()
            .find_map(|(name, _)| match name.to_ascii_lowercase().as_str() {
                "*" | "utf-8" | "utf8" => Some(Self::Utf8),
                "iso-8859-1" | "latin1" => Some(Self::Latin1),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Returns the first unrepresentable character on failure.
    fn encode(self, text: &str) -> Result<Bytes, char> {
        match self {
            Self::Utf8 => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| c))
                .collect::<Result<Vec<u8>, char>>()
                .map(Bytes::from),
        }
    }
}

/// Parses an `Accept` header into media ranges, best first.
fn ranked(accept: &str) -> Vec<Mime> {
    let mut ranges: Vec<(Mime, f32)> = accept
        .split(',')
        .filter_map(|item| item.trim().parse::<Mime>().ok())
        .map(|m| {
            let q = m
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            (m, q)
        })
        .filter(|(_, q)| *q > 0.0)
        .collect();
    ranges.sort_by(|a, b| by_quality(a.1, b.1));
    ranges.into_iter().map(|(m, _)| m).collect()
}

fn quality<'a>(params: impl Iterator<Item = &'a str>) -> f32 {
    params
        .filter_map(|p| p.trim().strip_prefix("q="))
        .find_map(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0)
}

/// Descending by quality; `sort_by` is stable so equal weights keep header order.
fn by_quality(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}
