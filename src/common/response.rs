//! CGI response, and the writer that puts it on standard output.
//!
//! What a CGI response looks like:
//!
//! ```text
//! Status: 404 Not Found\r\n              (only if not 200)
//! Content-Type: text/html\r\n
//! Set-Cookie: name=Bob; Path=/; Max-Age=3600\r\n
//! \r\n
//! <html> ...
//! ```
//!
//! The server adds the HTTP status line and transport framing.
//! Content-Length is not added here unless the caller sets it.
//
use crate::{CgiError, SetCookie};
use std::io::Write;

/// Reason phrase for a status code.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        411 => "Length Required",
        413 => "Content Too Large",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Response built by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct CgiResponse {
    pub status: u16,
    /// In output order.
    pub headers: Vec<(String, String)>,
    pub set_cookies: Vec<SetCookie>,
    pub body: Vec<u8>,
}

impl Default for CgiResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            set_cookies: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl CgiResponse {
    /// Empty 200 response, no headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Response with a Content-Type.
    pub fn with_content_type(content_type: &str) -> Self {
        let mut response = Self::new();
        response.set_header("Content-Type", content_type);
        response
    }

    pub fn html() -> Self {
        Self::with_content_type("text/html; charset=utf-8")
    }

    pub fn text() -> Self {
        Self::with_content_type("text/plain; charset=utf-8")
    }

    /// Plain text error response. Never has an empty body.
    pub fn error(status: u16, msg: &str) -> Self {
        let mut response = Self::text();
        response.status = status;
        let msg = if msg.trim().is_empty() { reason_phrase(status) } else { msg };
        response.push_str(&format!("{} {}\n{}\n", status, reason_phrase(status), msg));
        response
    }

    /// Add a header, after any existing ones.
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// Replace any headers of this name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.add_header(name, value);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn add_cookie(&mut self, cookie: SetCookie) {
        self.set_cookies.push(cookie);
    }

    pub fn push_str(&mut self, s: &str) {
        self.body.extend_from_slice(s.as_bytes());
    }

    pub fn push_bytes(&mut self, b: &[u8]) {
        self.body.extend_from_slice(b);
    }
}

/// Where one invocation's output stands. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriterState {
    /// Nothing set or written.
    Unstarted,
    /// Status or headers set, nothing written.
    HeadersPending,
    /// Header block and separator written.
    HeadersSent,
    /// Some body written.
    BodyWritten,
    /// Flushed. No more output.
    Closed,
}

/// Writes one response to the output stream.
///
/// Headers are held until the header block goes out. After that,
/// header changes fail with `HeadersAlreadySent`. Bytes already
/// handed to the server can't be taken back.
pub struct ResponseWriter<W: Write> {
    out: W,
    state: WriterState,
    status: u16,
    headers: Vec<(String, String)>,
    set_cookies: Vec<SetCookie>,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: WriterState::Unstarted,
            status: 200,
            headers: Vec::new(),
            set_cookies: Vec::new(),
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn headers_sent(&self) -> bool {
        self.state >= WriterState::HeadersSent
    }

    /// Give the output stream back.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Move to HeadersPending, or fail if the header block is gone.
    fn begin_headers(&mut self) -> Result<(), CgiError> {
        match self.state {
            WriterState::Unstarted | WriterState::HeadersPending => {
                self.state = WriterState::HeadersPending;
                Ok(())
            }
            _ => {
                log::error!("Attempt to change headers in state {:?}", self.state);
                Err(CgiError::HeadersAlreadySent)
            }
        }
    }

    /// CR or LF would end the header line early.
    fn check_header_text(s: &str) -> Result<(), CgiError> {
        if s.contains(['\r', '\n']) {
            Err(CgiError::InvalidHeader(s.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn set_status(&mut self, status: u16) -> Result<(), CgiError> {
        self.begin_headers()?;
        self.status = status;
        Ok(())
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), CgiError> {
        self.begin_headers()?;
        Self::check_header_text(name)?;
        Self::check_header_text(value)?;
        if name.is_empty() || name.contains(':') {
            return Err(CgiError::InvalidHeader(name.to_string()));
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    pub fn add_cookie(&mut self, cookie: SetCookie) -> Result<(), CgiError> {
        self.begin_headers()?;
        Self::check_header_text(&cookie.to_header_value())?;
        self.set_cookies.push(cookie);
        Ok(())
    }

    /// Write the header block and the blank separator line.
    ///
    /// Fails without writing anything if there is no Content-Type,
    /// so the caller can still send a different response.
    pub fn send_headers(&mut self) -> Result<(), CgiError> {
        self.begin_headers()?;
        if !self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Content-Type")) {
            return Err(CgiError::MissingContentType);
        }
        //  Assemble the whole block, so it goes out in one write.
        let mut block = String::new();
        if self.status != 200 {
            block.push_str(&format!("Status: {} {}\r\n", self.status, reason_phrase(self.status)));
        }
        for (name, value) in &self.headers {
            block.push_str(&format!("{}: {}\r\n", name, value));
        }
        for cookie in &self.set_cookies {
            block.push_str(&format!("Set-Cookie: {}\r\n", cookie.to_header_value()));
        }
        block.push_str("\r\n");
        log::debug!("Response header block: {:?}", block);
        self.state = WriterState::HeadersSent;
        self.out.write_all(block.as_bytes())?;
        Ok(())
    }

    /// Write body bytes. Sends the header block first if needed.
    pub fn write_body(&mut self, b: &[u8]) -> Result<(), CgiError> {
        match self.state {
            WriterState::Unstarted | WriterState::HeadersPending => self.send_headers()?,
            WriterState::HeadersSent | WriterState::BodyWritten => {}
            WriterState::Closed => return Err(CgiError::HeadersAlreadySent),
        }
        self.out.write_all(b)?;
        self.state = WriterState::BodyWritten;
        Ok(())
    }

    /// Take status, headers, cookies, and body from `response` and write it all.
    pub fn send(&mut self, response: &CgiResponse) -> Result<(), CgiError> {
        self.set_status(response.status)?;
        for (name, value) in &response.headers {
            self.add_header(name, value)?;
        }
        for cookie in &response.set_cookies {
            self.add_cookie(cookie.clone())?;
        }
        self.send_headers()?;
        if !response.body.is_empty() {
            self.write_body(&response.body)?;
        }
        Ok(())
    }

    /// Flush. Nothing more can be written.
    pub fn close(&mut self) -> Result<(), CgiError> {
        if self.state != WriterState::Closed {
            self.out.flush()?;
            self.state = WriterState::Closed;
        }
        Ok(())
    }
}

/// Write a complete response, exactly once.
pub fn write_response<W: Write + ?Sized>(out: &mut W, response: &CgiResponse) -> Result<(), CgiError> {
    let mut writer = ResponseWriter::new(out);
    writer.send(response)?;
    writer.close()
}

#[test]
fn write_simple_response() {
    let mut response = CgiResponse::html();
    response.push_str("<p>Hello</p>");
    let mut out = Vec::new();
    write_response(&mut out, &response).expect("write failed");
    assert_eq!(
        String::from_utf8(out).expect("not UTF-8"),
        "Content-Type: text/html; charset=utf-8\r\n\r\n<p>Hello</p>"
    );
}

#[test]
fn write_status_headers_cookies() {
    let mut response = CgiResponse::text();
    response.status = 404;
    response.add_header("X-Test", "yes");
    response.add_cookie(SetCookie::new("name", "Bob").with_path("/").with_max_age(3600));
    response.push_str("gone\n");
    let mut out = Vec::new();
    write_response(&mut out, &response).expect("write failed");
    assert_eq!(
        String::from_utf8(out).expect("not UTF-8"),
        "Status: 404 Not Found\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         X-Test: yes\r\n\
         Set-Cookie: name=Bob; Path=/; Max-Age=3600\r\n\
         \r\n\
         gone\n"
    );
}

#[test]
fn header_after_send_fails() {
    let mut writer = ResponseWriter::new(Vec::new());
    assert_eq!(writer.state(), WriterState::Unstarted);
    writer.add_header("Content-Type", "text/plain").expect("add failed");
    assert_eq!(writer.state(), WriterState::HeadersPending);
    writer.send_headers().expect("send failed");
    assert!(writer.headers_sent());
    assert!(matches!(writer.add_header("X-Late", "1"), Err(CgiError::HeadersAlreadySent)));
    assert!(matches!(writer.set_status(500), Err(CgiError::HeadersAlreadySent)));
    assert!(matches!(writer.add_cookie(SetCookie::new("a", "b")), Err(CgiError::HeadersAlreadySent)));
    assert!(matches!(writer.send_headers(), Err(CgiError::HeadersAlreadySent)));
    writer.write_body(b"one ").expect("body failed");
    writer.write_body(b"two").expect("body failed");
    assert_eq!(writer.state(), WriterState::BodyWritten);
    writer.close().expect("close failed");
    assert_eq!(writer.state(), WriterState::Closed);
    assert!(writer.write_body(b"three").is_err());
    let out = String::from_utf8(writer.into_inner()).expect("not UTF-8");
    assert_eq!(out, "Content-Type: text/plain\r\n\r\none two");
}

#[test]
fn missing_content_type_writes_nothing() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.add_header("X-Only", "1").expect("add failed");
    assert!(matches!(writer.write_body(b"body"), Err(CgiError::MissingContentType)));
    //  Still pending. A fallback can go out.
    assert_eq!(writer.state(), WriterState::HeadersPending);
    assert!(writer.into_inner().is_empty());
}

#[test]
fn header_injection_rejected() {
    let mut writer = ResponseWriter::new(Vec::new());
    assert!(matches!(
        writer.add_header("X-Evil", "a\r\nSet-Cookie: owned=1"),
        Err(CgiError::InvalidHeader(_))
    ));
    assert!(matches!(writer.add_header("Bad:Name", "x"), Err(CgiError::InvalidHeader(_))));
    assert!(matches!(
        writer.add_cookie(SetCookie::new("n", "v").with_path("/\r\nX: y")),
        Err(CgiError::InvalidHeader(_))
    ));
}

#[test]
fn error_response_never_empty() {
    for msg in ["Division by zero", "", "   "] {
        let response = CgiResponse::error(500, msg);
        assert_eq!(response.status, 500);
        assert_eq!(response.header("content-type"), Some("text/plain; charset=utf-8"));
        assert!(!response.body.is_empty());
        let mut out = Vec::new();
        write_response(&mut out, &response).expect("write failed");
        let out = String::from_utf8(out).expect("not UTF-8");
        assert!(out.starts_with("Status: 500 Internal Server Error\r\nContent-Type: text/plain"));
        assert!(out.contains("\r\n\r\n500 Internal Server Error\n"));
    }
}

#[test]
fn set_header_replaces() {
    let mut response = CgiResponse::html();
    response.set_header("content-type", "application/json");
    assert_eq!(response.headers.len(), 1);
    assert_eq!(response.header("Content-Type"), Some("application/json"));
}
