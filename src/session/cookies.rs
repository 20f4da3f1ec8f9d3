//! Session cookie jar
//!
//! Cookies are merged from every response's `Set-Cookie` headers, last write
//! wins per name, and nothing is ever evicted during a run.

use std::collections::BTreeMap;

use cookie::Cookie;
use serde::{Deserialize, Serialize};

/// Stored value and the attributes it arrived with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    /// Cookie value
    pub value: String,
    /// `Domain` attribute, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// `Path` attribute, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `Secure` flag
    #[serde(default)]
    pub secure: bool,
    /// `HttpOnly` flag
    #[serde(default)]
    pub http_only: bool,
}

impl CookieRecord {
    fn from_cookie(cookie: &Cookie<'_>) -> Self {
        Self {
            value: cookie.value().to_string(),
            domain: cookie.domain().map(str::to_string),
            path: cookie.path().map(str::to_string),
            secure: cookie.secure().unwrap_or(false),
            http_only: cookie.http_only().unwrap_or(false),
        }
    }
}

/// Name → latest cookie
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: BTreeMap<String, CookieRecord>,
}

impl CookieJar {
    /// Empty jar
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one `Set-Cookie` header value
    ///
    /// Returns `None` for values the cookie grammar rejects.
    #[must_use]
    pub fn parse_set_cookie(header: &str) -> Option<(String, CookieRecord)> {
        match Cookie::parse(header) {
            Ok(cookie) if !cookie.name().is_empty() => {
                Some((cookie.name().to_string(), CookieRecord::from_cookie(&cookie)))
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unparsable Set-Cookie header");
                None
            }
        }
    }

    /// Insert or overwrite one cookie
    pub fn insert(&mut self, name: impl Into<String>, record: CookieRecord) {
        let _ = self.cookies.insert(name.into(), record);
    }

    /// Merge a batch of `Set-Cookie` header values, in order
    ///
    /// Returns how many cookies were applied.
    pub fn merge_set_cookies<'a, I>(&mut self, headers: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut applied = 0;
        for (name, record) in headers.into_iter().filter_map(Self::parse_set_cookie) {
            self.insert(name, record);
            applied += 1;
        }
        applied
    }

    /// Merge another jar into this one; entries in `other` win
    pub fn merge(&mut self, other: &Self) {
        for (name, record) in &other.cookies {
            self.insert(name.clone(), record.clone());
        }
    }

    /// Current value for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|record| record.value.as_str())
    }

    /// Full record for `name`
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&CookieRecord> {
        self.cookies.get(name)
    }

    /// Number of stored cookies
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the jar is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterate `(name, value)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies
            .iter()
            .map(|(name, record)| (name.as_str(), record.value.as_str()))
    }

    /// Render the jar as a request `Cookie` header, or `None` when empty
    #[must_use]
    pub fn to_header_value(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
