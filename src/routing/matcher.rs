//! Route matching predicates.
//!
//! # Responsibilities
//! - Match `:path` against prefix, exact path or regex rules
//! - Match request headers (presence, exact value, regex value)
//! - Combine header conditions with AND semantics
//! - Rewrite the matched portion of a path
//!
//! # Design Decisions
//! - Regexes are compiled once at build time; an invalid pattern fails the build
//! - Regexes must match the whole (query-stripped) path, not a substring
//! - Prefix rules see the full path, query included
//! - Exact path rules ignore the query string

use regex::{Regex, RegexBuilder};

use crate::config::route::{HeaderMatcherDoc, RouteMatchDoc};
use crate::http::headers::strip_query;
use crate::http::HeaderMap;
use crate::routing::error::{RouteError, RouteResult};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request headers match this condition.
    fn matches(&self, headers: &HeaderMap) -> bool;
}

/// Compile `pattern` so that it only matches whole inputs.
pub fn compile_full_match(pattern: &str, case_insensitive: bool) -> RouteResult<Regex> {
    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|source| RouteError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })
}

/// Path predicate of a route entry.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Prefix { prefix: String, case_sensitive: bool },
    Path { path: String, case_sensitive: bool },
    Regex { regex: Regex },
}

impl PathMatcher {
    /// Build from a route match document. Exactly one kind must be set.
    pub fn from_doc(doc: &RouteMatchDoc, vhost: &str) -> RouteResult<Self> {
        let case_sensitive = doc.case_sensitive.unwrap_or(true);
        match (&doc.prefix, &doc.path, &doc.regex) {
            (Some(prefix), None, None) => Ok(PathMatcher::Prefix {
                prefix: prefix.clone(),
                case_sensitive,
            }),
            (None, Some(path), None) => Ok(PathMatcher::Path {
                path: path.clone(),
                case_sensitive,
            }),
            (None, None, Some(pattern)) => Ok(PathMatcher::Regex {
                regex: compile_full_match(pattern, !case_sensitive)?,
            }),
            _ => Err(RouteError::AmbiguousMatch {
                vhost: vhost.to_string(),
            }),
        }
    }

    pub fn matches_path(&self, path: &str) -> bool {
        match self {
            PathMatcher::Prefix {
                prefix,
                case_sensitive,
            } => match path.get(..prefix.len()) {
                Some(head) if *case_sensitive => head == prefix,
                Some(head) => head.eq_ignore_ascii_case(prefix),
                None => false,
            },
            PathMatcher::Path {
                path: expected,
                case_sensitive,
            } => {
                let actual = strip_query(path);
                if *case_sensitive {
                    actual == expected
                } else {
                    actual.eq_ignore_ascii_case(expected)
                }
            }
            PathMatcher::Regex { regex } => regex.is_match(strip_query(path)),
        }
    }

    /// Replace the matched portion of `path` with `replacement`.
    ///
    /// Prefix rules substitute the prefix; exact rules substitute the path;
    /// regex rules substitute the whole path, expanding `$1`-style group
    /// references. The query string is always carried over.
    pub fn rewrite(&self, path: &str, replacement: &str) -> String {
        match self {
            PathMatcher::Prefix { prefix, .. } => {
                let rest = path.get(prefix.len()..).unwrap_or("");
                format!("{}{}", replacement, rest)
            }
            PathMatcher::Path { .. } => {
                let query = &path[strip_query(path).len()..];
                format!("{}{}", replacement, query)
            }
            PathMatcher::Regex { regex } => {
                let stripped = strip_query(path);
                let query = &path[stripped.len()..];
                let mut rewritten = String::new();
                match regex.captures(stripped) {
                    Some(caps) => caps.expand(replacement, &mut rewritten),
                    None => rewritten.push_str(replacement),
                }
                rewritten.push_str(query);
                rewritten
            }
        }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, headers: &HeaderMap) -> bool {
        headers
            .path()
            .map(|path| self.matches_path(path))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
enum HeaderValueMatch {
    Present,
    Exact(String),
    Regex(Regex),
}

/// Matches a single request header.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: String,
    value: HeaderValueMatch,
}

impl HeaderMatcher {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            value: HeaderValueMatch::Present,
        }
    }

    pub fn exact(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            value: HeaderValueMatch::Exact(value.into()),
        }
    }

    pub fn from_doc(doc: &HeaderMatcherDoc) -> RouteResult<Self> {
        match (&doc.value, doc.regex.unwrap_or(false)) {
            (None, _) => Ok(Self::present(&doc.name)),
            (Some(value), false) if value.is_empty() => Ok(Self::present(&doc.name)),
            (Some(value), false) => Ok(Self::exact(&doc.name, value)),
            (Some(pattern), true) => Ok(Self {
                name: doc.name.to_ascii_lowercase(),
                value: HeaderValueMatch::Regex(compile_full_match(pattern, false)?),
            }),
        }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, headers: &HeaderMap) -> bool {
        match (headers.get(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), HeaderValueMatch::Present) => true,
            (Some(actual), HeaderValueMatch::Exact(expected)) => actual == expected,
            (Some(actual), HeaderValueMatch::Regex(regex)) => regex.is_match(actual),
        }
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// AND of every header constraint in `docs`.
    pub fn from_header_docs(docs: &[HeaderMatcherDoc]) -> RouteResult<Self> {
        let matchers = docs
            .iter()
            .map(|doc| HeaderMatcher::from_doc(doc).map(|m| Box::new(m) as Box<dyn Matcher>))
            .collect::<RouteResult<Vec<_>>>()?;
        Ok(Self::new(matchers))
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, headers: &HeaderMap) -> bool {
        self.matchers.iter().all(|m| m.matches(headers))
    }
}
