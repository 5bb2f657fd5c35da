//! Environment dump -- CGI diagnostic responder.
//!
//! Shows every variable the server passed, as an HTML table,
//! plus the request headers and the working directory.
#![forbid(unsafe_code)]
use anyhow::Error;
use cgiadapter::{CgiRequest, CgiResponse, Handler, Settings};
use cgiadapter::{escape_html, logger};
use outer_cgi::IO;
use std::collections::HashMap;

struct EnvDump {}

impl Handler for EnvDump {
    fn handle(&mut self, request: &CgiRequest, response: &mut CgiResponse) -> Result<(), Error> {
        let cwd = std::env::current_dir()?;
        *response = CgiResponse::html();
        response.push_str("<html><body>\n<h1>CGI Environment Variables</h1>\n");
        response.push_str("<table border='1'>\n<tr><th>Variable</th><th>Value</th></tr>\n");
        for (k, v) in request.env.sorted() {
            response.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>\n", escape_html(k), escape_html(v)));
        }
        response.push_str("</table>\n");
        response.push_str("<h2>Request Headers:</h2>\n<ul>\n");
        for (k, v) in request.headers.sorted() {
            response.push_str(&format!("<li>{}: {}</li>\n", escape_html(k), escape_html(v)));
        }
        response.push_str("</ul>\n");
        response.push_str("<h2>Working Directory:</h2>\n");
        response.push_str(&format!("<p>{}</p>\n", escape_html(&cwd.to_string_lossy())));
        response.push_str("</body></html>\n");
        Ok(())
    }
}

fn handler(io: &mut dyn IO, env: HashMap<String, String>) -> anyhow::Result<i32> {
    cgiadapter::serve(io, env, &mut EnvDump {})
}

/// Main program
pub fn main() {
    logger(&Settings::load());
    outer_cgi::main(|_| {}, handler)
}

#[test]
fn env_table_sorted_and_escaped() {
    use cgiadapter::CgiEnv;
    use std::io::Cursor;
    let env = CgiEnv::from_pairs([
        ("SERVER_SOFTWARE", "test/1.0"),
        ("HTTP_USER_AGENT", "<bot>"),
        ("REQUEST_METHOD", "GET"),
    ]);
    let mut out = Vec::new();
    let code = cgiadapter::run(&env, Cursor::new(Vec::new()), &mut out, &mut EnvDump {}).expect("run failed");
    assert_eq!(code, 0);
    let out = String::from_utf8(out).expect("not UTF-8");
    let ua = out.find("<tr><td>HTTP_USER_AGENT</td><td>&lt;bot&gt;</td></tr>").expect("no HTTP_USER_AGENT row");
    let method = out.find("<tr><td>REQUEST_METHOD</td>").expect("no REQUEST_METHOD row");
    let software = out.find("<tr><td>SERVER_SOFTWARE</td>").expect("no SERVER_SOFTWARE row");
    assert!(ua < method && method < software);
    assert!(out.contains("<li>User-Agent: &lt;bot&gt;</li>"));
    assert!(out.contains("<h2>Working Directory:</h2>"));
}
