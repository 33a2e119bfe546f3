//! Request parsing.
//!
//! # Responsibilities
//! - Split the request line into method, target and version
//! - Rebuild the absolute URL from the target and the service descriptor
//! - Collect headers (case preserved, last duplicate wins)
//! - Extract URL, form-body and cookie parameters
//!
//! # Design Decisions
//! - The URL always carries an explicit port, so route lookup can try the
//!   default-port variant on its own
//! - Cookies are read from every Cookie line before headers are collapsed

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::http::{head_lines, split_head, split_header, HttpService, ParseError};

/// Where a request parameter was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Url,
    Body,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub kind: ParamKind,
}

/// A request materialized from its raw bytes.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub url: String,
    pub version: String,
    pub headers: BTreeMap<String, String>,
    pub parameters: Vec<Parameter>,
    pub body: Vec<u8>,
}

impl ParsedRequest {
    pub fn parse(raw: &[u8], service: &HttpService) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }
        let (head, body) = split_head(raw);
        let mut lines = head_lines(head).into_iter();
        let request_line = lines.next().unwrap_or_default();

        let mut parts = request_line.split_whitespace();
        let (method, target) = match (parts.next(), parts.next()) {
            (Some(m), Some(t)) => (m.to_string(), t.to_string()),
            _ => return Err(ParseError::RequestLine(request_line)),
        };
        let version = parts.next().unwrap_or("HTTP/1.1").to_string();

        let path_and_query = origin_form(&target);
        let url = format!("{}{}", service, path_and_query);

        let mut headers = BTreeMap::new();
        let mut parameters = Vec::new();
        let mut form_body = false;

        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = split_header(&line);
            if name.eq_ignore_ascii_case("cookie") {
                parameters.extend(parse_cookies(&value));
            }
            if name.eq_ignore_ascii_case("content-type") {
                form_body = value
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded");
            }
            headers.insert(name, value);
        }

        if let Some((_, query)) = path_and_query.split_once('?') {
            parameters.extend(parse_form(query.as_bytes(), ParamKind::Url));
        }
        if form_body {
            parameters.extend(parse_form(body, ParamKind::Body));
        }

        Ok(Self {
            method,
            url,
            version,
            headers,
            parameters,
            body: body.to_vec(),
        })
    }

    /// Cookie parameters by name, last occurrence wins.
    pub fn cookies(&self) -> BTreeMap<String, String> {
        self.params_where(|kind| kind == ParamKind::Cookie)
    }

    /// URL and body parameters by name, last occurrence wins.
    pub fn query_and_form(&self) -> BTreeMap<String, String> {
        self.params_where(|kind| kind != ParamKind::Cookie)
    }

    fn params_where(&self, keep: impl Fn(ParamKind) -> bool) -> BTreeMap<String, String> {
        self.parameters
            .iter()
            .filter(|p| keep(p.kind))
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }
}

/// Reduce an absolute-form target (as sent to a proxy) to path and query.
fn origin_form(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        if let Ok(url) = url::Url::parse(target) {
            let mut out = url.path().to_string();
            if let Some(query) = url.query() {
                out.push('?');
                out.push_str(query);
            }
            return out;
        }
    }
    if target.starts_with('/') {
        target.to_string()
    } else {
        format!("/{target}")
    }
}

fn parse_form(input: &[u8], kind: ParamKind) -> impl Iterator<Item = Parameter> + '_ {
    form_urlencoded::parse(input).map(move |(name, value)| Parameter {
        name: name.into_owned(),
        value: value.into_owned(),
        kind,
    })
}

fn parse_cookies(value: &str) -> impl Iterator<Item = Parameter> + '_ {
    value
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            Parameter {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
                kind: ParamKind::Cookie,
            }
        })
}
