//! Calculator -- CGI diagnostic responder.
//!
//! Renders a form with two numbers and an operation, and the result
//! of the last submission. Exercises query decoding and HTML escaping.
//!
//! Requests:
//!
//!     calculator.cgi?a=NNN&b=NNN&op=add|sub|mul|div
//!
//! Bad input is shown as an error message in a normal 200 page.
//
#![forbid(unsafe_code)]
use anyhow::{Error, anyhow};
use cgiadapter::{CgiRequest, CgiResponse, Handler, Settings};
use cgiadapter::{escape_html, logger};
use outer_cgi::IO;
use std::collections::HashMap;

const FORM: &str = r#"<form method="get">
  <input type="text" name="a" placeholder="Number 1">
  <input type="text" name="b" placeholder="Number 2">
  <select name="op">
    <option value="add">+</option>
    <option value="sub">-</option>
    <option value="mul">*</option>
    <option value="div">/</option>
  </select>
  <input type="submit" value="Compute">
</form>
"#;

/// Outcome of one calculation
enum Outcome {
    Value(f64),
    /// Input was understood but can't be computed.
    Refused(&'static str),
}

/// Do the arithmetic. Number format errors are errors.
fn compute(a: &str, b: &str, op: &str) -> Result<Outcome, Error> {
    let a: f64 = a
        .trim()
        .parse()
        .map_err(|e| anyhow!("could not convert {:?} to a number: {}", a, e))?;
    let b: f64 = b
        .trim()
        .parse()
        .map_err(|e| anyhow!("could not convert {:?} to a number: {}", b, e))?;
    Ok(match op {
        "add" => Outcome::Value(a + b),
        "sub" => Outcome::Value(a - b),
        "mul" => Outcome::Value(a * b),
        "div" if b == 0.0 => Outcome::Refused("Error: divide by zero"),
        "div" => Outcome::Value(a / b),
        _ => Outcome::Refused("Invalid operation"),
    })
}

///  Our handler
struct Calculator {}

impl Calculator {
    /// Parameter from the query, or else from a POSTed form.
    fn param<'a>(request: &'a CgiRequest, name: &str) -> Option<&'a str> {
        request
            .query_params
            .get_first(name)
            .or_else(|| request.body_params().get_first(name))
            .filter(|s| !s.is_empty())
    }

    /// Result line text, if all three parameters were given.
    fn result_text(request: &CgiRequest) -> Option<String> {
        let a = Self::param(request, "a")?;
        let b = Self::param(request, "b")?;
        let op = Self::param(request, "op")?;
        log::info!("Compute {} {} {}", a, op, b);
        Some(match compute(a, b, op) {
            Ok(Outcome::Value(v)) => v.to_string(),
            Ok(Outcome::Refused(msg)) => msg.to_string(),
            Err(e) => format!("Error: {}", e),
        })
    }
}

impl Handler for Calculator {
    fn handle(&mut self, request: &CgiRequest, response: &mut CgiResponse) -> Result<(), Error> {
        *response = CgiResponse::html();
        response.push_str("<!DOCTYPE html>\n");
        response.push_str("<html><head><title>CGI Calculator</title></head><body>\n");
        response.push_str("<h1>Simple Calculator</h1>\n");
        response.push_str(FORM);
        if let Some(result) = Self::result_text(request) {
            response.push_str(&format!("<h2>Result: {}</h2>\n", escape_html(&result)));
        }
        response.push_str("</body></html>\n");
        Ok(())
    }
}

fn handler(io: &mut dyn IO, env: HashMap<String, String>) -> anyhow::Result<i32> {
    cgiadapter::serve(io, env, &mut Calculator {})
}

/// Main program
pub fn main() {
    logger(&Settings::load());
    outer_cgi::main(|_| {}, handler)
}

#[cfg(test)]
fn run_calculator(query: &str) -> String {
    use cgiadapter::CgiEnv;
    use std::io::Cursor;
    let env = CgiEnv::from_pairs([("REQUEST_METHOD", "GET"), ("QUERY_STRING", query)]);
    let mut out = Vec::new();
    let code = cgiadapter::run(&env, Cursor::new(Vec::new()), &mut out, &mut Calculator {}).expect("run failed");
    assert_eq!(code, 0);
    String::from_utf8(out).expect("not UTF-8")
}

#[test]
fn calculator_results() {
    let out = run_calculator("a=6&b=7&op=mul");
    assert!(out.starts_with("Content-Type: text/html; charset=utf-8\r\n\r\n<!DOCTYPE html>"));
    assert!(out.contains("<h2>Result: 42</h2>"));
    assert!(run_calculator("a=1.5&b=2&op=add").contains("<h2>Result: 3.5</h2>"));
    assert!(run_calculator("a=1&b=4&op=div").contains("<h2>Result: 0.25</h2>"));
    assert!(run_calculator("a=1&b=0&op=div").contains("<h2>Result: Error: divide by zero</h2>"));
    assert!(run_calculator("a=1&b=2&op=pow").contains("<h2>Result: Invalid operation</h2>"));
    //  Nothing submitted yet. Form only.
    let out = run_calculator("");
    assert!(out.contains("<form method=\"get\">"));
    assert!(!out.contains("Result:"));
}

#[test]
fn calculator_escapes_bad_input() {
    let out = run_calculator("a=%3Cscript%3E&b=1&op=add");
    assert!(out.contains("Error: could not convert &quot;&lt;script&gt;&quot; to a number"));
    assert!(!out.contains("<script>"));
}
