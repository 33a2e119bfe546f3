//! Route identities and their text syntax.
//!
//! A route is written either as a literal URL or as `/BODY/FLAGS`, where the
//! body runs to the last slash and FLAGS is up to four characters from
//! `i`, `m`, `x`, `o`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::routing::matcher::{LiteralMatcher, Matcher, PatternFlags, PatternMatcher};

const MAX_FLAGS: usize = 4;

/// Route text that could not be turned into an identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("pattern '{0}' has no closing '/'")]
    Unterminated(String),

    #[error("too many pattern options '{0}' (at most 4)")]
    TooManyFlags(String),

    #[error("invalid pattern option character '{0}'")]
    InvalidFlag(char),

    #[error("invalid pattern: {0}")]
    Regex(String),
}

/// What a handler is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteIdentity {
    Literal(LiteralMatcher),
    Pattern(PatternMatcher),
}

impl RouteIdentity {
    pub fn literal(url: impl Into<String>) -> Self {
        RouteIdentity::Literal(LiteralMatcher::new(url))
    }

    pub fn pattern(body: impl Into<String>, flags: PatternFlags) -> Result<Self, RouteError> {
        PatternMatcher::new(body, flags)
            .map(RouteIdentity::Pattern)
            .map_err(|e| RouteError::Regex(e.to_string()))
    }

    /// Parse route text as typed by the operator.
    pub fn parse(text: &str) -> Result<Self, RouteError> {
        let Some(rest) = text.strip_prefix('/') else {
            return Ok(Self::literal(text));
        };
        let (body, options) = rest
            .rsplit_once('/')
            .ok_or_else(|| RouteError::Unterminated(text.to_string()))?;

        if options.chars().count() > MAX_FLAGS {
            return Err(RouteError::TooManyFlags(options.to_string()));
        }
        let mut flags = PatternFlags::default();
        for c in options.chars() {
            if !flags.set(c) {
                return Err(RouteError::InvalidFlag(c));
            }
        }
        Self::pattern(body, flags)
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, RouteIdentity::Pattern(_))
    }
}

impl Matcher for RouteIdentity {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            RouteIdentity::Literal(m) => m.matches(candidate),
            RouteIdentity::Pattern(m) => m.matches(candidate),
        }
    }
}

impl FromStr for RouteIdentity {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RouteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteIdentity::Literal(m) => f.write_str(m.as_str()),
            RouteIdentity::Pattern(m) => write!(f, "/{}/{}", m.body(), m.flags()),
        }
    }
}
