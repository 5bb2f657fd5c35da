//! CGI environment context.
//!
//! The hosting server passes request metadata in environment
//! variables. Everything here reads from an explicit `CgiEnv`
//! instead of the process environment, so tests can build one
//! from literal pairs.
//!
//! Ref: https://tools.ietf.org/html/rfc3875 section 4.1
//
use std::collections::HashMap;

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const HTTP_COOKIE: &str = "HTTP_COOKIE";
pub const SCRIPT_FILENAME: &str = "SCRIPT_FILENAME";
/// Prefix of request header variables.
const HTTP_PREFIX: &str = "HTTP_";

/// Read-only view of the CGI environment variables.
#[derive(Debug, Clone, Default)]
pub struct CgiEnv {
    vars: HashMap<String, String>,
}

impl CgiEnv {
    /// Snapshot of the current process environment.
    /// Variables that are not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        Self::from_map(std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect())
    }

    /// From the map handed over by the process gateway.
    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// From literal pairs. Mostly for tests.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::from_map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Get one variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|s| s.as_str())
    }

    /// All variables, sorted by name.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut kvs: Vec<(&str, &str)> = self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        kvs.sort_by(|a, b| a.0.cmp(b.0));
        kvs
    }

    /// Request headers.
    ///
    /// CGI puts HTTP headers in HTTP_* variables. CONTENT_TYPE and
    /// CONTENT_LENGTH have no prefix but are headers too.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::default();
        for (k, v) in self.vars.iter() {
            if let Some(name) = k.strip_prefix(HTTP_PREFIX) {
                if !name.is_empty() {
                    headers.insert(&name.replace('_', "-"), v);
                }
            } else if k == CONTENT_TYPE || k == CONTENT_LENGTH {
                headers.insert(&k.replace('_', "-"), v);
            }
        }
        headers
    }
}

/// Request headers, looked up case-insensitively.
///
/// Names are stored in canonical form, "X-Forwarded-For".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    map: HashMap<String, String>,
}

impl HeaderMap {
    /// Put header into canonical capitalization.
    pub fn normalize_name(name: &str) -> String {
        name.split('-')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.map.insert(Self::normalize_name(name), value.to_string());
    }

    /// Any capitalization works. Use hyphens, not underscores.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&Self::normalize_name(name)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sorted by name, for display.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut kvs: Vec<(&str, &str)> = self.map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        kvs.sort_by(|a, b| a.0.cmp(b.0));
        kvs
    }
}

#[test]
fn header_extraction() {
    let env = CgiEnv::from_pairs([
        ("HTTP_USER_AGENT", "curl/8.0"),
        ("HTTP_X_FORWARDED_FOR", "10.0.0.1"),
        ("CONTENT_TYPE", "text/plain"),
        ("SERVER_NAME", "localhost"),
        ("HTTP_", "nameless"),
    ]);
    let headers = env.headers();
    assert_eq!(headers.len(), 3);
    assert_eq!(headers.get("User-Agent"), Some("curl/8.0"));
    assert_eq!(headers.get("user-agent"), Some("curl/8.0"));
    assert_eq!(headers.get("X-FORWARDED-FOR"), Some("10.0.0.1"));
    assert_eq!(headers.get("content-type"), Some("text/plain"));
    assert_eq!(headers.get("Server-Name"), None);
    assert_eq!(headers.sorted()[0], ("Content-Type", "text/plain"));
}

#[test]
fn env_lookup() {
    let env = CgiEnv::from_pairs([("QUERY_STRING", "a=1"), ("REQUEST_METHOD", "GET")]);
    assert_eq!(env.get(QUERY_STRING), Some("a=1"));
    assert_eq!(env.get(CONTENT_LENGTH), None);
    assert_eq!(env.sorted(), vec![("QUERY_STRING", "a=1"), ("REQUEST_METHOD", "GET")]);
}

#[test]
fn env_from_process() {
    let env = CgiEnv::from_process();
    assert_eq!(env.get("PATH").map(String::from), std::env::var("PATH").ok());
}
