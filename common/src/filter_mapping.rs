// Servlet-style filter mapping predicates
//
// Pattern shapes follow the servlet specification:
// `*` and `/*` match everything, `/prefix/*` matches a path prefix,
// `*.ext` matches by extension, anything else must match exactly.

use crate::models::FilterMapping;
use tracing::debug;

/// Shape of a url-pattern once parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    /// `*` or `/*`
    Any,
    /// `/admin/*`, holding `/admin`
    Prefix(String),
    /// `*.jsp`, holding `jsp`
    Extension(String),
    Exact,
}

/// A parsed url-pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    raw: String,
    kind: PatternKind,
}

impl UrlPattern {
    pub fn parse(pattern: &str) -> Self {
        let kind = if pattern == "*" || pattern == "/*" {
            PatternKind::Any
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            PatternKind::Prefix(prefix.to_string())
        } else if let Some(extension) = pattern.strip_prefix("*.") {
            PatternKind::Extension(extension.to_string())
        } else {
            PatternKind::Exact
        };

        Self {
            raw: pattern.to_string(),
            kind,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    /// Match a context-relative request path
    pub fn matches(&self, request_path: &str) -> bool {
        if self.raw == request_path {
            return true;
        }

        match &self.kind {
            PatternKind::Any => true,
            PatternKind::Prefix(prefix) => prefix_matches(prefix, request_path),
            PatternKind::Extension(extension) => extension_matches(extension, request_path),
            PatternKind::Exact => false,
        }
    }
}

fn prefix_matches(prefix: &str, request_path: &str) -> bool {
    match request_path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn extension_matches(extension: &str, request_path: &str) -> bool {
    let (Some(slash), Some(period)) = (request_path.rfind('/'), request_path.rfind('.')) else {
        return false;
    };

    if period < slash || period == request_path.len() - 1 {
        return false;
    }

    &request_path[period + 1..] == extension
}

/// Return true if the context-relative `request_path` matches `pattern`.
///
/// An absent pattern never matches.
pub fn url_pattern_matches(pattern: Option<&str>, request_path: &str) -> bool {
    let Some(pattern) = pattern else {
        return false;
    };

    debug!(
        request_path = request_path,
        pattern = pattern,
        "Checking URL against pattern"
    );

    UrlPattern::parse(pattern).matches(request_path)
}

/// Return true if `servlet_name` is matched by `pattern` (exact or `*`).
pub fn servlet_name_matches(pattern: &str, servlet_name: Option<&str>) -> bool {
    let Some(servlet_name) = servlet_name else {
        return false;
    };

    debug!(
        servlet_name = servlet_name,
        pattern = pattern,
        "Checking servlet against pattern"
    );

    pattern == "*" || servlet_name == pattern
}

/// Return true if the mapping passes for `request_path`.
///
/// Servlet-name entries are checked against the request path itself, the same
/// way the module filter chain has always evaluated them.
pub fn filter_mapping_passes(mapping: &FilterMapping, request_path: Option<&str>) -> bool {
    let Some(request_path) = request_path else {
        return false;
    };

    mapping
        .url_patterns
        .iter()
        .any(|pattern| url_pattern_matches(Some(pattern), request_path))
        || mapping
            .servlet_names
            .iter()
            .any(|pattern| servlet_name_matches(pattern, Some(request_path)))
}

/// Request-dispatch entry point
#[inline]
pub fn should_apply_filter(mapping: &FilterMapping, request_path: &str) -> bool {
    filter_mapping_passes(mapping, Some(request_path))
}
