//! Cache key derivation.
//!
//! Keys look like `cache:{METHOD}:{PATH}?a=1&b=2`. Parameters are sorted by
//! name (then value) so that logically identical requests collide no matter
//! how the client ordered them. `%`, `&` and `=` are percent-escaped in names
//! and values so a value can never forge a parameter boundary.

use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// The request fields a key generator may look at.
pub struct KeyRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Vec<(String, String)>,
    pub headers: &'a HeaderMap,
    /// Present only when the generator asked for it.
    pub body: Option<&'a [u8]>,
}

impl<'a> KeyRequest<'a> {
    /// `None` when the query string cannot be decoded.
    pub fn new(
        method: &'a Method,
        uri: &'a Uri,
        headers: &'a HeaderMap,
        body: Option<&'a [u8]>,
    ) -> Option<Self> {
        let Query(query) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
        Some(Self {
            method,
            path: uri.path(),
            query,
            headers,
            body,
        })
    }
}

/// Derives a cache key from a request.
pub trait KeyGenerator: Send + Sync {
    /// `None` means the request cannot be keyed and must bypass the cache.
    fn generate(&self, request: &KeyRequest<'_>) -> Option<String>;

    /// Whether `generate` needs the buffered request body.
    fn needs_body(&self) -> bool {
        false
    }
}

/// Build `cache:{METHOD}:{PATH}` plus the sorted, escaped parameters.
pub fn cache_key(method: &Method, path: &str, params: &[(String, String)]) -> String {
    let mut key = format!("cache:{}:{}", method.as_str(), path);

    if !params.is_empty() {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        key.push('?');
        key.push_str(&join_pairs(sorted.into_iter()));
    }

    key
}

fn join_pairs<'a>(pairs: impl Iterator<Item = &'a (String, String)>) -> String {
    pairs
        .map(|(name, value)| format!("{}={}", escape(name), escape(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn escape(raw: &str) -> String {
    raw.replace('%', "%25")
        .replace('&', "%26")
        .replace('=', "%3D")
}

pub(crate) fn normalize_headers<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = names
        .into_iter()
        .map(|h| h.as_ref().to_ascii_lowercase())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Append `|h:name=value&...` for the allow-listed headers that are present.
pub(crate) fn fold_headers(key: &mut String, headers: &HeaderMap, allow: &[String]) {
    let varied: Vec<(String, String)> = allow
        .iter()
        .filter_map(|name| {
            let value = headers.get(name.as_str())?.to_str().ok()?;
            Some((name.clone(), value.to_string()))
        })
        .collect();
    if !varied.is_empty() {
        key.push_str("|h:");
        key.push_str(&join_pairs(varied.iter()));
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Method, path and sorted query string.
///
/// In extended mode the key also folds in a SHA-256 digest of the body and
/// the values of an explicit header allow-list. No other header is read.
#[derive(Debug, Clone, Default)]
pub struct StandardKeyGenerator {
    include_body: bool,
    vary_headers: Vec<String>,
}

impl StandardKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body digest plus the listed headers (names are case-insensitive).
    pub fn extended<I, S>(vary_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            include_body: true,
            vary_headers: normalize_headers(vary_headers),
        }
    }
}

impl KeyGenerator for StandardKeyGenerator {
    fn generate(&self, request: &KeyRequest<'_>) -> Option<String> {
        let mut key = cache_key(request.method, request.path, &request.query);

        fold_headers(&mut key, request.headers, &self.vary_headers);

        if self.include_body {
            if let Some(body) = request.body.filter(|b| !b.is_empty()) {
                key.push_str("|b:");
                key.push_str(&sha256_hex(body));
            }
        }

        Some(key)
    }

    fn needs_body(&self) -> bool {
        self.include_body
    }
}
