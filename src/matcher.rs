//! Request matchers used to select which policy applies to a request.
//!
//! Path patterns use Ant-style syntax:
//!
//! | Token    | Matches                                   |
//! |----------|-------------------------------------------|
//! | `?`      | exactly one character within a segment    |
//! | `*`      | zero or more characters within a segment  |
//! | `**`     | zero or more whole segments               |
//! | `{name}` | one or more characters within a segment   |
//!
//! Empty path segments are ignored, so `/admin/` and `//admin` are matched
//! like `/admin`.

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::error::Error;
use crate::request::{DispatcherType, Request};

/// Decides whether a rule applies to a request.
pub trait RequestMatcher: Send + Sync {
    /// True if the request matches.
    fn matches(&self, request: &Request) -> bool;
}

impl<F> RequestMatcher for F
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn matches(&self, request: &Request) -> bool {
        self(request)
    }
}

/// Matches every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyRequestMatcher;

impl RequestMatcher for AnyRequestMatcher {
    fn matches(&self, _request: &Request) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(Vec<char>),
    AnyChar,
    AnySequence,
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard(Vec<Token>),
    AnySegments,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self, Error> {
        if raw == "**" {
            return Ok(Segment::AnySegments);
        }
        if raw.contains("**") {
            return Err(Error::Configuration(format!(
                "'**' must be a whole path segment in pattern '{pattern}'"
            )));
        }
        if !raw.contains(['*', '?', '{', '}']) {
            return Ok(Segment::Literal(raw.to_string()));
        }

        let mut tokens = Vec::new();
        let mut literal = Vec::new();
        let mut chars = raw.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '*' | '?' | '{' => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    match ch {
                        '*' => tokens.push(Token::AnySequence),
                        '?' => tokens.push(Token::AnyChar),
                        _ => {
                            let mut name = String::new();
                            let mut closed = false;
                            for c in chars.by_ref() {
                                if c == '}' {
                                    closed = true;
                                    break;
                                }
                                name.push(c);
                            }
                            let valid = closed
                                && !name.is_empty()
                                && name.chars().all(|c| c.is_alphanumeric() || c == '_');
                            if !valid {
                                return Err(Error::Configuration(format!(
                                    "invalid path variable in pattern '{pattern}'"
                                )));
                            }
                            tokens.push(Token::Variable(name));
                        }
                    }
                }
                '}' => {
                    return Err(Error::Configuration(format!(
                        "unbalanced '}}' in pattern '{pattern}'"
                    )))
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Ok(Segment::Wildcard(tokens))
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Wildcard(tokens) => {
                let chars: Vec<char> = segment.chars().collect();
                match_tokens(tokens, &chars)
            }
            Segment::AnySegments => true,
        }
    }
}

// Both matchers advance the set of reachable input positions one pattern
// element at a time: O(pattern × input).
fn match_tokens(tokens: &[Token], s: &[char]) -> bool {
    let mut reach = vec![false; s.len() + 1];
    reach[0] = true;
    for token in tokens {
        let mut next = vec![false; s.len() + 1];
        match token {
            Token::Literal(lit) => {
                for i in (0..=s.len()).filter(|&i| reach[i]) {
                    if s[i..].starts_with(lit) {
                        next[i + lit.len()] = true;
                    }
                }
            }
            Token::AnyChar => {
                for i in (0..s.len()).filter(|&i| reach[i]) {
                    next[i + 1] = true;
                }
            }
            Token::AnySequence => {
                let mut seen = false;
                for (i, slot) in next.iter_mut().enumerate() {
                    seen |= reach[i];
                    *slot = seen;
                }
            }
            Token::Variable(_) => {
                let mut seen = false;
                for (i, slot) in next.iter_mut().enumerate() {
                    *slot = seen;
                    seen |= reach[i];
                }
            }
        }
        if !next.contains(&true) {
            return false;
        }
        reach = next;
    }
    reach[s.len()]
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    let mut reach = vec![false; path.len() + 1];
    reach[0] = true;
    for segment in pattern {
        let mut next = vec![false; path.len() + 1];
        match segment {
            Segment::AnySegments => {
                let mut seen = false;
                for (i, slot) in next.iter_mut().enumerate() {
                    seen |= reach[i];
                    *slot = seen;
                }
            }
            _ => {
                for i in (0..path.len()).filter(|&i| reach[i]) {
                    next[i + 1] = segment.matches(path[i]);
                }
            }
        }
        if !next.contains(&true) {
            return false;
        }
        reach = next;
    }
    reach[path.len()]
}

/// A compiled Ant-style path pattern.
///
/// # Examples
///
/// ```
/// use request_authz::PathPattern;
///
/// let pattern = PathPattern::parse("/users/{id}/**").unwrap();
/// assert!(pattern.matches("/users/42"));
/// assert!(pattern.matches("/users/42/orders/7"));
/// assert!(!pattern.matches("/users"));
///
/// assert!(PathPattern::parse("users").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the pattern does not start with
    /// `/`, uses `**` inside a segment, or has a malformed `{variable}`.
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        if !pattern.starts_with('/') {
            return Err(Error::Configuration(format!(
                "path pattern '{pattern}' must start with '/'"
            )));
        }
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| Segment::parse(s, pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// True if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }

    /// Names of the `{variable}` segments, in order.
    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Wildcard(tokens) => Some(tokens),
                _ => None,
            })
            .flatten()
            .filter_map(|t| match t {
                Token::Variable(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Matches a path pattern, optionally restricted to one method.
#[derive(Debug, Clone)]
pub struct PathPatternMatcher {
    pattern: PathPattern,
    method: Option<Method>,
}

impl PathPatternMatcher {
    /// Matcher for `pattern` on any method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid pattern.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            method: None,
        })
    }

    /// Restricts the matcher to `method`.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// The compiled pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }
}

impl RequestMatcher for PathPatternMatcher {
    fn matches(&self, request: &Request) -> bool {
        if let Some(method) = &self.method {
            if method != request.method() {
                return false;
            }
        }
        self.pattern.matches(request.path())
    }
}

/// Matches requests that arrived through one of the given dispatcher types.
#[derive(Debug, Clone)]
pub struct DispatcherTypeMatcher {
    types: Vec<DispatcherType>,
}

impl DispatcherTypeMatcher {
    /// Creates a matcher for the given dispatcher types.
    pub fn new(types: impl IntoIterator<Item = DispatcherType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }
}

impl RequestMatcher for DispatcherTypeMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.types.contains(&request.dispatcher_type())
    }
}

/// Matches when every delegate matches.
#[derive(Clone)]
pub struct AndRequestMatcher {
    matchers: Vec<Arc<dyn RequestMatcher>>,
}

impl AndRequestMatcher {
    /// Combines matchers.
    pub fn new(matchers: Vec<Arc<dyn RequestMatcher>>) -> Self {
        Self { matchers }
    }
}

impl RequestMatcher for AndRequestMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.matchers.iter().all(|m| m.matches(request))
    }
}

/// Matches when any delegate matches.
#[derive(Clone)]
pub struct OrRequestMatcher {
    matchers: Vec<Arc<dyn RequestMatcher>>,
}

impl OrRequestMatcher {
    /// Combines matchers.
    pub fn new(matchers: Vec<Arc<dyn RequestMatcher>>) -> Self {
        Self { matchers }
    }
}

impl RequestMatcher for OrRequestMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.matchers.iter().any(|m| m.matches(request))
    }
}

/// Inverts a matcher.
#[derive(Clone)]
pub struct NegatedRequestMatcher {
    inner: Arc<dyn RequestMatcher>,
}

impl NegatedRequestMatcher {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn RequestMatcher>) -> Self {
        Self { inner }
    }
}

impl RequestMatcher for NegatedRequestMatcher {
    fn matches(&self, request: &Request) -> bool {
        !self.inner.matches(request)
    }
}
