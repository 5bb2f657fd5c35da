//! CGI request, built from the environment and standard input.
//
use crate::cgienv::{CONTENT_LENGTH, CONTENT_TYPE, HTTP_COOKIE, QUERY_STRING, REQUEST_METHOD, SCRIPT_FILENAME};
use crate::{BoundedReader, CgiEnv, CgiError, FormParams, HeaderMap, parse_cookie_header};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// Content type of an urlencoded form submission.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// HTTP request method. Anything unrecognized passes through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
    Other(String),
}

impl Method {
    /// Never fails. Unknown methods are kept as given.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Other(s) => s.as_str(),
        }
    }

    /// For handlers that only accept some methods.
    /// The parser itself never rejects a method.
    pub fn require_one_of(&self, allowed: &[Method]) -> Result<(), CgiError> {
        if allowed.contains(self) {
            Ok(())
        } else {
            log::info!("Method {} not in {:?}", self, allowed);
            Err(CgiError::UnsupportedMethod(self.as_str().to_string()))
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse CONTENT_LENGTH. Must be a non-negative integer.
pub fn parse_content_length(s: &str) -> Result<usize, CgiError> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| CgiError::MalformedContentLength(s.to_string()))
}

/// One CGI request.
#[derive(Debug)]
pub struct CgiRequest {
    pub method: Method,
    /// Raw QUERY_STRING, empty if absent.
    pub query_string: String,
    pub query_params: FormParams,
    /// Declared body length. 0 if absent or malformed.
    pub content_length: usize,
    pub content_type: Option<String>,
    /// Exactly `content_length` bytes, or empty if no body was read.
    pub body: Vec<u8>,
    pub cookies: HashMap<String, String>,
    pub headers: HeaderMap,
    pub script_filename: Option<String>,
    /// All the variables the request came from.
    pub env: CgiEnv,
    /// Decoded on first use.
    body_params: OnceCell<FormParams>,
}

impl CgiRequest {
    /// Build the request from the environment, reading the body from `instream`.
    ///
    /// The body is read when the method is POST or a nonzero length is
    /// declared. Fails only if the body ends early or the read fails.
    pub fn parse(env: &CgiEnv, instream: impl Read) -> Result<CgiRequest, CgiError> {
        let method = env.get(REQUEST_METHOD).map(Method::parse).unwrap_or(Method::Get);
        let query_string = env.get(QUERY_STRING).unwrap_or("").to_string();
        let query_params = FormParams::parse(query_string.as_bytes());
        let content_length = match env.get(CONTENT_LENGTH) {
            Some(s) if !s.trim().is_empty() => parse_content_length(s).unwrap_or_else(|e| {
                log::warn!("{}. Using 0.", e);
                0
            }),
            _ => 0,
        };
        let body = if method == Method::Post || content_length > 0 {
            BoundedReader::new(instream, content_length).read_body()?
        } else {
            Vec::new()
        };
        let cookies = env.get(HTTP_COOKIE).map(parse_cookie_header).unwrap_or_default();
        let request = CgiRequest {
            method,
            query_string,
            query_params,
            content_length,
            content_type: env.get(CONTENT_TYPE).map(|s| s.to_string()),
            body,
            cookies,
            headers: env.headers(),
            script_filename: env.get(SCRIPT_FILENAME).map(|s| s.to_string()),
            env: env.clone(),
            body_params: OnceCell::new(),
        };
        log::info!(
            "Request: {} query {:?}, {} body bytes, {} cookies",
            request.method,
            request.query_string,
            request.body.len(),
            request.cookies.len()
        );
        Ok(request)
    }

    /// True if the body should be decoded as form data.
    /// No declared content type is taken as a form, which is what browsers send.
    pub fn is_form_urlencoded(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(ct) => ct
                .split(';')
                .next()
                .map(|mime| mime.trim().eq_ignore_ascii_case(FORM_URLENCODED))
                .unwrap_or(false),
        }
    }

    /// Form parameters from the body. Empty if the body isn't a form.
    pub fn body_params(&self) -> &FormParams {
        self.body_params.get_or_init(|| {
            if self.is_form_urlencoded() {
                FormParams::parse(&self.body)
            } else {
                FormParams::default()
            }
        })
    }

    /// Body as text. Invalid UTF-8 is replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }
}

#[test]
fn post_form_body() {
    use std::io::Cursor;
    let env = CgiEnv::from_pairs([("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "14")]);
    let req = CgiRequest::parse(&env, Cursor::new(b"a=1&b=hello%21".to_vec())).expect("parse failed");
    assert_eq!(req.method, Method::Post);
    assert_eq!(req.content_length, 14);
    assert_eq!(req.body, b"a=1&b=hello%21");
    assert_eq!(req.body_params().get_all("a"), ["1"]);
    assert_eq!(req.body_params().get_all("b"), ["hello!"]);
    //  Raw bytes still there after decoding.
    assert_eq!(req.body_text(), "a=1&b=hello%21");
}

#[test]
fn declared_length_shorter_than_stream() {
    use std::io::Cursor;
    //  Only the declared bytes are read.
    let env = CgiEnv::from_pairs([("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "13")]);
    let req = CgiRequest::parse(&env, Cursor::new(b"a=1&b=hello%21".to_vec())).expect("parse failed");
    assert_eq!(req.body, b"a=1&b=hello%2");
    assert_eq!(req.body_params().get_first("a"), Some("1"));
}

#[test]
fn empty_get() {
    use std::io::Cursor;
    let req = CgiRequest::parse(&CgiEnv::default(), Cursor::new(Vec::new())).expect("parse failed");
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.query_string, "");
    assert!(req.query_params.is_empty());
    assert_eq!(req.content_length, 0);
    assert!(req.body.is_empty());
    assert!(req.body_params().is_empty());
    assert!(req.cookies.is_empty());
    assert!(req.script_filename.is_none());
}

#[test]
fn malformed_content_length_is_zero() {
    use std::io::Cursor;
    for bad in ["abc", "-5", "12x", "1.5", ""] {
        let env = CgiEnv::from_pairs([("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", bad)]);
        //  Stream has data, but nothing is read.
        let req = CgiRequest::parse(&env, Cursor::new(b"ignored".to_vec())).expect("parse failed");
        assert_eq!(req.content_length, 0, "CONTENT_LENGTH {:?}", bad);
        assert!(req.body.is_empty());
    }
    assert!(matches!(parse_content_length("abc"), Err(CgiError::MalformedContentLength(_))));
    assert_eq!(parse_content_length(" 42 ").expect("valid length"), 42);
}

#[test]
fn incomplete_body() {
    use std::io::Cursor;
    let env = CgiEnv::from_pairs([("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "100")]);
    match CgiRequest::parse(&env, Cursor::new(b"short".to_vec())) {
        Err(CgiError::IncompleteBody { expected: 100, received: 5 }) => {}
        other => panic!("Expected IncompleteBody, got {:?}", other),
    }
}

#[test]
fn any_method_with_length_reads_body() {
    use std::io::Cursor;
    let env = CgiEnv::from_pairs([
        ("REQUEST_METHOD", "BREW"),
        ("CONTENT_LENGTH", "3"),
        ("CONTENT_TYPE", "text/plain"),
    ]);
    let req = CgiRequest::parse(&env, Cursor::new(b"tea".to_vec())).expect("parse failed");
    assert_eq!(req.method, Method::Other("BREW".to_string()));
    assert_eq!(req.method.to_string(), "BREW");
    assert_eq!(req.body, b"tea");
    //  Not a form. Raw bytes only.
    assert!(!req.is_form_urlencoded());
    assert!(req.body_params().is_empty());
}

#[test]
fn query_cookies_headers() {
    use std::io::Cursor;
    let env = CgiEnv::from_pairs([
        ("REQUEST_METHOD", "GET"),
        ("QUERY_STRING", "x=1&x=2&y=a+b"),
        ("HTTP_COOKIE", "name=Bob; foo=bar"),
        ("HTTP_ACCEPT_LANGUAGE", "en"),
        ("SCRIPT_FILENAME", "/var/www/cgi-bin/test.cgi"),
        ("CONTENT_TYPE", "application/x-www-form-urlencoded; charset=UTF-8"),
    ]);
    let req = CgiRequest::parse(&env, Cursor::new(Vec::new())).expect("parse failed");
    assert_eq!(req.query_params.get_all("x"), ["1", "2"]);
    assert_eq!(req.query_params.get_first("y"), Some("a b"));
    assert_eq!(req.cookie("name"), Some("Bob"));
    assert_eq!(req.cookie("foo"), Some("bar"));
    assert_eq!(req.headers.get("accept-language"), Some("en"));
    assert_eq!(req.script_filename.as_deref(), Some("/var/www/cgi-bin/test.cgi"));
    assert!(req.is_form_urlencoded());
}

#[test]
fn method_policy_is_opt_in() {
    assert!(Method::Get.require_one_of(&[Method::Get, Method::Post]).is_ok());
    match Method::Delete.require_one_of(&[Method::Get]) {
        Err(CgiError::UnsupportedMethod(m)) => assert_eq!(m, "DELETE"),
        other => panic!("Expected UnsupportedMethod, got {:?}", other),
    }
}
