//! Handler trait and the per-invocation driver.
//!
//! One CGI invocation is one process and one request:
//! parse the request, call the handler, write the response once.
//! Whatever goes wrong, the server gets a parseable response.
//!
//! Normal usage, from a responder's main:
//!
//! ```text
//! fn handler(io: &mut dyn outer_cgi::IO, env: HashMap<String, String>) -> anyhow::Result<i32> {
//!     cgiadapter::serve(io, env, &mut MyHandler)
//! }
//!
//! pub fn main() {
//!     outer_cgi::main(|_| {}, handler)
//! }
//! ```
//
use crate::{CgiEnv, CgiError, CgiRequest, CgiResponse, ResponseWriter};
use anyhow::Error;
use outer_cgi::IO;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Trait for callback
pub trait Handler {
    /// Fill in `response` for `request`. An error becomes a 500
    /// response, or the error's own status if it is a `CgiError`.
    fn handle(&mut self, request: &CgiRequest, response: &mut CgiResponse) -> Result<(), Error>;
}

/// Error response for a handler failure.
fn failure_response(e: &Error) -> CgiResponse {
    match e.downcast_ref::<CgiError>() {
        Some(cgi_err) => CgiResponse::error(cgi_err.status(), &cgi_err.to_string()),
        None => CgiResponse::error(500, &format!("Problem processing request: {}", e)),
    }
}

/// Call the handler. Panics are turned into errors, since a panic
/// would otherwise leave the server with no response at all.
fn call_handler<T: Handler>(handler: &mut T, request: &CgiRequest) -> (CgiResponse, i32) {
    let mut response = CgiResponse::new();
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(request, &mut response)));
    match outcome {
        Ok(Ok(())) => (response, 0),
        Ok(Err(e)) => {
            log::error!("Handler failed: {:?}", e);
            (failure_response(&e), 1)
        }
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("Handler panicked: {}", msg);
            (CgiResponse::error(500, &format!("Handler failed: {}", msg)), 1)
        }
    }
}

/// Handle an already parsed (or failed) request and write the response.
///
/// Returns the process exit code: 0 if all went well, 1 if the
/// invocation failed but an error response went out.
pub fn dispatch<W: Write + ?Sized, T: Handler>(
    parsed: Result<CgiRequest, CgiError>,
    out: &mut W,
    handler: &mut T,
) -> Result<i32, Error> {
    let (response, exit_code) = match parsed {
        Ok(request) => call_handler(handler, &request),
        Err(e) => {
            log::error!("Bad request: {}", e);
            (CgiResponse::error(e.status(), &e.to_string()), 1)
        }
    };
    let mut writer = ResponseWriter::new(&mut *out);
    let send_result = writer.send(&response).and_then(|_| writer.close());
    let headers_sent = writer.headers_sent();
    drop(writer);
    match send_result {
        Ok(()) => Ok(exit_code),
        Err(CgiError::Io(e)) => {
            //  Output is gone. Nothing more can be said to the server.
            log::error!("Unable to write response: {:?}", e);
            Err(e.into())
        }
        Err(e) if !headers_sent => {
            //  Nothing written yet. Replace with a minimal error response.
            log::error!("Response rejected: {}", e);
            let fallback = CgiResponse::error(500, &format!("Invalid response from handler: {}", e));
            crate::write_response(out, &fallback)?;
            Ok(1)
        }
        Err(e) => {
            //  Header block already out. Best effort note in the body.
            log::error!("Response failed after headers sent: {}", e);
            out.write_all(format!("\nError: {}\n", e).as_bytes())?;
            out.flush()?;
            Ok(1)
        }
    }
}

/// Parse the request from `env` and `instream`, handle it, write to `out`.
pub fn run<W: Write + ?Sized, T: Handler>(
    env: &CgiEnv,
    instream: impl Read,
    out: &mut W,
    handler: &mut T,
) -> Result<i32, Error> {
    let parsed = CgiRequest::parse(env, instream);
    dispatch(parsed, out, handler)
}

/// Entry for `outer_cgi::main` handlers. `io` carries both the
/// request body and the response.
pub fn serve<T: Handler>(io: &mut dyn IO, env: HashMap<String, String>, handler: &mut T) -> Result<i32, Error> {
    let env = CgiEnv::from_map(env);
    let parsed = CgiRequest::parse(&env, &mut *io);
    dispatch(parsed, io, handler)
}

#[test]
fn dispatch_ok_and_failures() {
    use anyhow::anyhow;
    use std::io::Cursor;
    crate::test_logger();
    struct TestHandler {
        calls: usize,
    }
    impl Handler for TestHandler {
        fn handle(&mut self, request: &CgiRequest, response: &mut CgiResponse) -> Result<(), Error> {
            self.calls += 1;
            match request.query_params.get_first("mode") {
                Some("fail") => Err(anyhow!("Division by zero")),
                Some("panic") => panic!("handler blew up"),
                Some("nocontenttype") => {
                    response.push_str("body without type");
                    Ok(())
                }
                Some("method") => {
                    request.method.require_one_of(&[crate::Method::Post])?;
                    Ok(())
                }
                _ => {
                    *response = CgiResponse::text();
                    response.push_str(&format!("method={}", request.method));
                    Ok(())
                }
            }
        }
    }
    let mut handler = TestHandler { calls: 0 };
    let run_query = |handler: &mut TestHandler, q: &str| -> (i32, String) {
        let env = CgiEnv::from_pairs([("REQUEST_METHOD", "GET"), ("QUERY_STRING", q)]);
        let mut out = Vec::new();
        let code = run(&env, Cursor::new(Vec::new()), &mut out, handler).expect("run failed");
        (code, String::from_utf8(out).expect("not UTF-8"))
    };
    let (code, out) = run_query(&mut handler, "");
    assert_eq!(code, 0);
    assert_eq!(out, "Content-Type: text/plain; charset=utf-8\r\n\r\nmethod=GET");

    let (code, out) = run_query(&mut handler, "mode=fail");
    assert_eq!(code, 1);
    assert!(out.starts_with("Status: 500 Internal Server Error\r\nContent-Type: text/plain"));
    assert!(out.contains("Division by zero"));

    let (code, out) = run_query(&mut handler, "mode=panic");
    assert_eq!(code, 1);
    assert!(out.starts_with("Status: 500 Internal Server Error\r\n"));
    assert!(out.contains("handler blew up"));

    let (code, out) = run_query(&mut handler, "mode=nocontenttype");
    assert_eq!(code, 1);
    assert!(out.starts_with("Status: 500 Internal Server Error\r\nContent-Type: text/plain"));
    assert!(!out.contains("body without type"));

    let (code, out) = run_query(&mut handler, "mode=method");
    assert_eq!(code, 1);
    assert!(out.starts_with("Status: 405 Method Not Allowed\r\n"));
    assert_eq!(handler.calls, 5);
}

#[test]
fn dispatch_incomplete_body() {
    use std::io::Cursor;
    struct NeverCalled;
    impl Handler for NeverCalled {
        fn handle(&mut self, _request: &CgiRequest, _response: &mut CgiResponse) -> Result<(), Error> {
            panic!("handler should not run on a bad request");
        }
    }
    let env = CgiEnv::from_pairs([("REQUEST_METHOD", "POST"), ("CONTENT_LENGTH", "50")]);
    let mut out = Vec::new();
    let code = run(&env, Cursor::new(b"a=1".to_vec()), &mut out, &mut NeverCalled).expect("run failed");
    assert_eq!(code, 1);
    let out = String::from_utf8(out).expect("not UTF-8");
    assert!(out.starts_with("Status: 400 Bad Request\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n"));
    assert!(out.contains("expected 50 bytes, received 3"));
}
