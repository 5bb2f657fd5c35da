//! Greeting -- CGI diagnostic responder.
//!
//! Greets the caller by name. The name comes from the query string,
//! else a POSTed form, else the "name" cookie, else "stranger".
//! The name is stored back in the cookie for an hour.
//!
//! Exercises query and form decoding, cookies in both directions,
//! and escaping of everything shown.
//
#![forbid(unsafe_code)]
use anyhow::Error;
use cgiadapter::{CgiRequest, CgiResponse, Handler, SetCookie, Settings};
use cgiadapter::{escape_html, logger};
use outer_cgi::IO;
use std::collections::{BTreeMap, HashMap};

/// Cookie holding the name.
const NAME_COOKIE: &str = "name";
/// Cookie lifetime, seconds.
const NAME_COOKIE_MAX_AGE: i64 = 3600;
/// Used when nobody said who they are.
const DEFAULT_NAME: &str = "stranger";

const FORMS: &str = r#"<h2>Try it</h2>
<form method="post">
  <label>Your name: <input type="text" name="name"></label>
  <input type="submit" value="Submit via POST">
</form>
<form method="get">
  <label>Your name: <input type="text" name="name"></label>
  <input type="submit" value="Submit via GET">
</form>
"#;

///  Our handler
struct Greeting {}

impl Greeting {
    /// Who to greet. Empty values don't count.
    fn resolve_name(request: &CgiRequest) -> String {
        [
            request.query_params.get_first("name"),
            request.body_params().get_first("name"),
            request.cookie(NAME_COOKIE),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_NAME)
        .to_string()
    }
}

impl Handler for Greeting {
    fn handle(&mut self, request: &CgiRequest, response: &mut CgiResponse) -> Result<(), Error> {
        let name = Self::resolve_name(request);
        log::info!("Greeting {:?}", name);
        //  Sorted, so the page is the same every time.
        let cookies: BTreeMap<&String, &String> = request.cookies.iter().collect();
        let query_json = serde_json::to_string(&request.query_params)?;
        let body_json = serde_json::to_string(request.body_params())?;
        let cookies_json = serde_json::to_string(&cookies)?;

        *response = CgiResponse::html();
        response.add_cookie(
            SetCookie::new(NAME_COOKIE, &name)
                .with_path("/")
                .with_max_age(NAME_COOKIE_MAX_AGE),
        );
        response.push_str("<!DOCTYPE html>\n");
        response.push_str("<html><head><title>CGI Demo</title></head><body>\n");
        response.push_str(&format!("<h1>Hello, {}!</h1>\n", escape_html(&name)));
        response.push_str("<p>This page shows how the request reached the responder.</p>\n");
        response.push_str("<h2>Request Details</h2>\n<ul>\n");
        response.push_str(&format!("<li>Method: {}</li>\n", escape_html(request.method.as_str())));
        response.push_str(&format!("<li>Query params: {}</li>\n", escape_html(&query_json)));
        response.push_str(&format!("<li>POST params: {}</li>\n", escape_html(&body_json)));
        response.push_str(&format!("<li>Cookies: {}</li>\n", escape_html(&cookies_json)));
        response.push_str("</ul>\n");
        response.push_str(FORMS);
        response.push_str("</body></html>\n");
        Ok(())
    }
}

fn handler(io: &mut dyn IO, env: HashMap<String, String>) -> anyhow::Result<i32> {
    cgiadapter::serve(io, env, &mut Greeting {})
}

/// Main program
pub fn main() {
    logger(&Settings::load());
    outer_cgi::main(|_| {}, handler)
}

#[cfg(test)]
fn run_greeting(pairs: &[(&str, &str)], body: &[u8]) -> String {
    use cgiadapter::CgiEnv;
    use std::io::Cursor;
    let env = CgiEnv::from_pairs(pairs.iter().copied());
    let mut out = Vec::new();
    let code = cgiadapter::run(&env, Cursor::new(body.to_vec()), &mut out, &mut Greeting {}).expect("run failed");
    assert_eq!(code, 0);
    String::from_utf8(out).expect("not UTF-8")
}

#[test]
fn greeting_name_sources() {
    //  Query first
    let out = run_greeting(
        &[("REQUEST_METHOD", "GET"), ("QUERY_STRING", "name=Ann"), ("HTTP_COOKIE", "name=Bob")],
        b"",
    );
    assert!(out.contains("<h1>Hello, Ann!</h1>"));
    assert!(out.contains("Set-Cookie: name=Ann; Path=/; Max-Age=3600\r\n"));
    //  Then POSTed form
    let out = run_greeting(
        &[
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_LENGTH", "13"),
            ("CONTENT_TYPE", "application/x-www-form-urlencoded"),
            ("HTTP_COOKIE", "name=Bob"),
        ],
        b"name=Cara+Lee",
    );
    assert!(out.contains("<h1>Hello, Cara Lee!</h1>"));
    assert!(out.contains(r#"<li>POST params: {&quot;name&quot;:[&quot;Cara Lee&quot;]}</li>"#));
    //  Then cookie
    let out = run_greeting(&[("HTTP_COOKIE", "name=Bob; foo=bar")], b"");
    assert!(out.contains("<h1>Hello, Bob!</h1>"));
    assert!(out.contains(r#"<li>Cookies: {&quot;foo&quot;:&quot;bar&quot;,&quot;name&quot;:&quot;Bob&quot;}</li>"#));
    //  Then nobody
    let out = run_greeting(&[("QUERY_STRING", "name=")], b"");
    assert!(out.contains("<h1>Hello, stranger!</h1>"));
    assert!(out.contains("<li>Method: GET</li>"));
}

#[test]
fn greeting_escapes_name() {
    let out = run_greeting(&[("QUERY_STRING", "name=%3Cscript%3Ealert(1)%3C%2Fscript%3E")], b"");
    let (_, body) = out.split_once("\r\n\r\n").expect("no header block");
    assert!(body.contains("<h1>Hello, &lt;script&gt;alert(1)&lt;/script&gt;!</h1>"));
    assert!(!body.contains("<script>"));
}
