//! Post echo -- CGI diagnostic responder.
//!
//! Reports, as plain text, what arrived: method, declared length,
//! query string, and the POST body both raw and decoded.
//! Useful for checking how a server passes bodies and lengths,
//! including chunked uploads the server has to de-chunk first.
//
#![forbid(unsafe_code)]
use anyhow::Error;
use cgiadapter::{CgiRequest, CgiResponse, Handler, Method, Settings};
use cgiadapter::logger;
use outer_cgi::IO;
use std::collections::HashMap;

///  Our handler
struct PostEcho {}

impl Handler for PostEcho {
    fn handle(&mut self, request: &CgiRequest, response: &mut CgiResponse) -> Result<(), Error> {
        *response = CgiResponse::text();
        let mut s = String::new();
        s.push_str(&format!("Method: {}\n", request.method));
        s.push_str(&format!("Query string: {}\n", request.query_string));
        s.push_str(&format!("Query parameters: {}\n", serde_json::to_string(&request.query_params)?));
        s.push_str(&format!("Content-Length: {}\n", request.content_length));
        s.push_str(&format!(
            "Content-Type: {}\n",
            request.content_type.as_deref().unwrap_or("(none)")
        ));
        if let Some(script) = &request.script_filename {
            s.push_str(&format!("Script: {}\n", script));
        }
        if request.method == Method::Post && !request.body.is_empty() {
            s.push_str(&format!("Body received: {}\n", request.body_text()));
            s.push_str(&format!("Body length: {}\n", request.body.len()));
            s.push_str(&format!("Body parameters: {}\n", serde_json::to_string(request.body_params())?));
        } else if !request.body.is_empty() {
            s.push_str(&format!("Body received ({} request): {}\n", request.method, request.body_text()));
            s.push_str(&format!("Body length: {}\n", request.body.len()));
        } else {
            s.push_str("No POST body received\n");
        }
        log::debug!("Echo: {}", s);
        response.push_str(&s);
        Ok(())
    }
}

fn handler(io: &mut dyn IO, env: HashMap<String, String>) -> anyhow::Result<i32> {
    cgiadapter::serve(io, env, &mut PostEcho {})
}

/// Main program
pub fn main() {
    logger(&Settings::load());
    outer_cgi::main(|_| {}, handler)
}

#[cfg(test)]
fn run_echo(pairs: &[(&str, &str)], body: &[u8]) -> (i32, String) {
    use cgiadapter::CgiEnv;
    use std::io::Cursor;
    let env = CgiEnv::from_pairs(pairs.iter().copied());
    let mut out = Vec::new();
    let code = cgiadapter::run(&env, Cursor::new(body.to_vec()), &mut out, &mut PostEcho {}).expect("run failed");
    (code, String::from_utf8(out).expect("not UTF-8"))
}

#[test]
fn echo_post_form() {
    let (code, out) = run_echo(
        &[("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "14"), ("QUERY_STRING", "q=1")],
        b"a=1&b=hello%21",
    );
    assert_eq!(code, 0);
    assert_eq!(
        out,
        "Content-Type: text/plain; charset=utf-8\r\n\r\n\
         Method: POST\n\
         Query string: q=1\n\
         Query parameters: {\"q\":[\"1\"]}\n\
         Content-Length: 14\n\
         Content-Type: (none)\n\
         Body received: a=1&b=hello%21\n\
         Body length: 14\n\
         Body parameters: {\"a\":[\"1\"],\"b\":[\"hello!\"]}\n"
    );
}

#[test]
fn echo_without_body() {
    //  Malformed length is 0, nothing read, no error.
    let (code, out) = run_echo(&[("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "lots")], b"ignored");
    assert_eq!(code, 0);
    assert!(out.contains("Content-Length: 0\n"));
    assert!(out.contains("No POST body received\n"));
    let (code, out) = run_echo(&[], b"");
    assert_eq!(code, 0);
    assert!(out.contains("Method: GET\n"));
    assert!(out.contains("No POST body received\n"));
}

#[test]
fn echo_short_body() {
    let (code, out) = run_echo(&[("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "20")], b"too short");
    assert_eq!(code, 1);
    assert!(out.starts_with("Status: 400 Bad Request\r\n"));
    assert!(out.contains("expected 20 bytes, received 9"));
}
