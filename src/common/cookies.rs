//! Cookies. Parsing of the HTTP_COOKIE request variable, and
//! Set-Cookie specifications for responses.
//
use std::collections::HashMap;

/// Parse a Cookie header.
///
/// Segments are `;`-separated `name=value`. Segments without `=` or
/// with an empty name are skipped. If a name repeats, the last one wins.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for segment in header.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((name, value)) = segment.split_once('=') else {
            log::debug!("Skipping malformed cookie segment {:?}", segment);
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        cookies.insert(name.to_string(), unquote(value.trim()));
    }
    cookies
}

/// Cookie values may be sent as a quoted string. Inside the quotes,
/// `\ooo` is an octal byte and `\c` is `c`.
fn unquote(value: &str) -> String {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return value.to_string();
    }
    let inner = &value.as_bytes()[1..value.len() - 1];
    let mut bytes = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] != b'\\' || i + 1 == inner.len() {
            bytes.push(inner[i]);
            i += 1;
            continue;
        }
        let octal = inner
            .get(i + 1..i + 4)
            .and_then(|d| std::str::from_utf8(d).ok())
            .filter(|d| d.bytes().all(|b| (b'0'..=b'7').contains(&b)))
            .and_then(|d| u8::from_str_radix(d, 8).ok());
        match octal {
            Some(b) => {
                bytes.push(b);
                i += 4;
            }
            None => {
                bytes.push(inner[i + 1]);
                i += 2;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// One Set-Cookie specification.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    /// Lifetime, in seconds.
    pub max_age: Option<i64>,
}

impl SetCookie {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: None,
            max_age: None,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Header value: `name=value; Path=<path>; Max-Age=<seconds>`.
    ///
    /// Values that can't appear bare in a cookie are quoted. Inside the
    /// quotes `"` and `\` are backslash-escaped, and `;`, `,`, control
    /// characters and non-ASCII bytes become `\ooo` octal escapes.
    /// `parse_cookie_header` reads this back to the same value.
    pub fn to_header_value(&self) -> String {
        let mut s = format!("{}={}", self.name, Self::quote_if_needed(&self.value));
        if let Some(path) = &self.path {
            s.push_str(&format!("; Path={}", path));
        }
        if let Some(max_age) = self.max_age {
            s.push_str(&format!("; Max-Age={}", max_age));
        }
        s
    }

    /// RFC 6265 cookie-octet, or a quoted string.
    fn quote_if_needed(value: &str) -> String {
        let bare = value
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\'));
        if bare {
            value.to_string()
        } else {
            let mut quoted = String::with_capacity(value.len() + 2);
            quoted.push('"');
            for b in value.bytes() {
                match b {
                    b'"' | b'\\' => {
                        quoted.push('\\');
                        quoted.push(b as char);
                    }
                    b';' | b',' => quoted.push_str(&format!("\\{:03o}", b)),
                    b' '..=b'~' => quoted.push(b as char),
                    _ => quoted.push_str(&format!("\\{:03o}", b)),
                }
            }
            quoted.push('"');
            quoted
        }
    }
}

#[test]
fn parse_cookies() {
    let cookies = parse_cookie_header("name=Bob; foo=bar");
    assert_eq!(cookies.len(), 2);
    assert_eq!(cookies.get("name").map(|s| s.as_str()), Some("Bob"));
    assert_eq!(cookies.get("foo").map(|s| s.as_str()), Some("bar"));
}

#[test]
fn parse_cookies_malformed() {
    let cookies = parse_cookie_header(" ; junk; a=1;=nameless; b = \"two words\" ;a=2; c=x=y;");
    assert_eq!(cookies.len(), 3);
    assert_eq!(cookies.get("a").map(|s| s.as_str()), Some("2"));
    assert_eq!(cookies.get("b").map(|s| s.as_str()), Some("two words"));
    assert_eq!(cookies.get("c").map(|s| s.as_str()), Some("x=y"));
    assert!(parse_cookie_header("").is_empty());
}

#[test]
fn set_cookie_serialization() {
    let cookie = SetCookie::new("name", "Bob").with_path("/").with_max_age(3600);
    assert_eq!(cookie.to_header_value(), "name=Bob; Path=/; Max-Age=3600");
    assert_eq!(SetCookie::new("k", "v").to_header_value(), "k=v");
    assert_eq!(
        SetCookie::new("name", "Jane \"J\" Doe").to_header_value(),
        r#"name="Jane \"J\" Doe""#
    );
}

#[test]
fn set_cookie_reads_back() {
    let awkward = [
        "Jane \"J\" Doe",
        r"back\slash",
        "a;b, c",
        "Zoë Müller",
        "line\r\nSet-Cookie: x=1",
        r#"\101 not octal"#,
    ];
    for original in awkward {
        let mut value = original.to_string();
        //  Stored back on every visit. Must not drift.
        for _ in 0..3 {
            let header = SetCookie::new("name", &value).with_path("/").to_header_value();
            assert!(header.is_ascii(), "{:?}", header);
            assert!(!header.contains(['\r', '\n']), "{:?}", header);
            let (cookie, attrs) = header.split_once("; Path=").expect("no path");
            assert_eq!(attrs, "/");
            let cookies = parse_cookie_header(&format!("{}; other=1", cookie));
            value = cookies.get("name").cloned().expect("cookie lost");
            assert_eq!(value, original);
            assert_eq!(cookies.get("other").map(|s| s.as_str()), Some("1"));
        }
    }
    assert_eq!(SetCookie::new("n", "a;b").to_header_value(), r#"n="a\073b""#);
    assert_eq!(SetCookie::new("n", "é").to_header_value(), r#"n="\303\251""#);
}
