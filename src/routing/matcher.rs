//! Route matching logic.
//!
//! # Responsibilities
//! - Match a literal route (exact string equality)
//! - Match a pattern route (regex covering the whole candidate)
//! - Produce the default-port variant of a request URL
//!
//! # Design Decisions
//! - Literal matching is case-sensitive; the operator writes the URL they mean
//! - Patterns are anchored at both ends, so `/a\.com/` never matches `xa.com`
//! - `^` and `$` always match at line boundaries; `m` lets `.` cross lines

use std::borrow::Cow;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::http::HttpService;

/// Trait for matching candidate URLs.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the candidate URL matches this route.
    fn matches(&self, candidate: &str) -> bool;
}

/// Matches one exact URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralMatcher {
    url: String,
}

impl LiteralMatcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Matcher for LiteralMatcher {
    fn matches(&self, candidate: &str) -> bool {
        self.url == candidate
    }
}

/// Pattern options, written after the closing slash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PatternFlags {
    /// `i`
    pub case_insensitive: bool,
    /// `m`
    pub multiline: bool,
    /// `x`
    pub extended: bool,
    /// `o`; patterns are always compiled once, kept for display.
    pub once: bool,
}

impl PatternFlags {
    /// Set the flag named by `c`. Returns false for an unknown character.
    pub fn set(&mut self, c: char) -> bool {
        match c {
            'i' => self.case_insensitive = true,
            'm' => self.multiline = true,
            'x' => self.extended = true,
            'o' => self.once = true,
            _ => return false,
        }
        true
    }
}

impl fmt::Display for PatternFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, c) in [
            (self.case_insensitive, 'i'),
            (self.multiline, 'm'),
            (self.extended, 'x'),
            (self.once, 'o'),
        ] {
            if on {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Matches URLs against a compiled regex.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    body: String,
    flags: PatternFlags,
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(body: impl Into<String>, flags: PatternFlags) -> Result<Self, regex::Error> {
        let body = body.into();
        // A trailing newline keeps an `x`-mode comment from swallowing the anchor.
        let anchored = if flags.extended {
            format!("\\A(?:{body}\n)\\z")
        } else {
            format!("\\A(?:{body})\\z")
        };
        let regex = RegexBuilder::new(&anchored)
            .case_insensitive(flags.case_insensitive)
            .dot_matches_new_line(flags.multiline)
            .ignore_whitespace(flags.extended)
            .multi_line(true)
            .build()?;
        Ok(Self { body, flags, regex })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn flags(&self) -> PatternFlags {
        self.flags
    }
}

impl Matcher for PatternMatcher {
    fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

impl PartialEq for PatternMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body && self.flags == other.flags
    }
}

impl Eq for PatternMatcher {}

/// The URL itself, then its form without an explicit default port.
///
/// `https://h:443/p` also yields `https://h/p`; `http://h:80/p` also yields
/// `http://h/p`. Other ports yield only the original.
pub fn url_candidates(url: &str) -> Vec<Cow<'_, str>> {
    let mut candidates = vec![Cow::Borrowed(url)];
    if let Some(stripped) = strip_default_port(url) {
        candidates.push(Cow::Owned(stripped));
    }
    candidates
}

fn strip_default_port(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let default = HttpService::default_port(&scheme.to_ascii_lowercase())?;
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let (host, port) = authority.rsplit_once(':')?;
    if port.parse::<u16>().ok()? != default {
        return None;
    }
    Some(format!("{scheme}://{host}{tail}"))
}
