//! Path patterns.
//!
//! A pattern is a `/`-separated list of segments. Each segment is either a
//! literal, matched verbatim, or a `{name}` variable that binds exactly one
//! path segment. Anything else the radix tree would treat specially (catch-all
//! `{*rest}`, braces inside a literal, `{a}{b}`) is rejected here so a pattern
//! always means what it reads as.

use crate::error::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed, validated path pattern.
#[derive(Clone, Debug)]
pub(crate) struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub(crate) fn parse(raw: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidRoute {
            pattern: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(invalid("pattern must start with `/`"));
        };

        let mut segments = Vec::new();
        for part in rest.split('/') {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => {
                    if name.is_empty() {
                        return Err(invalid("variable name is empty"));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(invalid("variable names may only contain [A-Za-z0-9_]"));
                    }
                    if segments.iter().any(|s| matches!(s, Segment::Variable(n) if n == name)) {
                        return Err(invalid("duplicate variable name"));
                    }
                    Segment::Variable(name.to_owned())
                }
                None if part.contains(['{', '}']) => {
                    return Err(invalid("braces are only allowed around a whole segment"));
                }
                None => Segment::Literal(part.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self { raw: raw.to_owned(), segments })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable names in declaration order.
    pub(crate) fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}
