//! Minimal CGI request/response adapter, shared by the diagnostic responders
mod boundedreader;
mod cgienv;
mod cookies;
mod dispatch;
mod error;
mod escape;
mod formparams;
mod logger;
mod request;
mod response;
mod settings;
mod testlogger;

pub use boundedreader::BoundedReader;
pub use cgienv::{CgiEnv, HeaderMap};
pub use cgienv::{CONTENT_LENGTH, CONTENT_TYPE, HTTP_COOKIE, QUERY_STRING, REQUEST_METHOD, SCRIPT_FILENAME};
pub use cookies::{SetCookie, parse_cookie_header};
pub use dispatch::{Handler, dispatch, run, serve};
pub use error::CgiError;
pub use escape::escape_html;
pub use formparams::FormParams;
pub use logger::logger;
pub use request::{CgiRequest, FORM_URLENCODED, Method, parse_content_length};
pub use response::{CgiResponse, ResponseWriter, WriterState, reason_phrase, write_response};
pub use settings::{SETTINGS_FILE, Settings};
pub use testlogger::test_logger;
