//! Working directory check -- CGI diagnostic responder.
//!
//! CGI servers are expected to run a script with its own directory
//! as the working directory, so relative paths like "./config.txt"
//! work. This reports whether that holds on this server:
//!
//! - working directory vs. the directory of SCRIPT_FILENAME
//! - can a file be created, and removed, in the working directory
//! - does a file next to the script exist (`?probe=NAME`, default test.py)
//
#![forbid(unsafe_code)]
use anyhow::Error;
use cgiadapter::{CgiRequest, CgiResponse, Handler, Settings};
use cgiadapter::logger;
use outer_cgi::IO;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sibling file looked for if no probe is given.
const DEFAULT_PROBE: &str = "test.py";
/// Makes scratch file names unique within the process.
static SCRATCH_SEQ: AtomicUsize = AtomicUsize::new(0);

struct WorkDirCheck {
    /// Where the create/remove test writes. The working directory when deployed.
    scratch_dir: PathBuf,
}

impl WorkDirCheck {
    /// Directory holding the script, if the server said where the script is.
    fn script_dir(request: &CgiRequest) -> Option<PathBuf> {
        let dir = Path::new(request.script_filename.as_deref()?).parent()?;
        Some(std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()))
    }

    /// Try a write in `dir`. Cleans up after itself.
    fn try_create_file(dir: &Path) -> String {
        let name = dir.join(format!(
            "cgi_test_file_{}_{}.txt",
            std::process::id(),
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        match std::fs::write(&name, "test") {
            Ok(()) => {
                let cleanup = match std::fs::remove_file(&name) {
                    Ok(()) => String::new(),
                    Err(e) => format!(" (but could not remove it: {})", e),
                };
                format!("SUCCESS: Created file in current working directory{}", cleanup)
            }
            Err(e) => format!("FAILED to create file in current directory: {}", e),
        }
    }

    /// Probe name must be a plain file name. No path tricks.
    fn probe_name(request: &CgiRequest) -> Result<&str, String> {
        let probe = request.query_params.get_first("probe").unwrap_or(DEFAULT_PROBE);
        let mut components = Path::new(probe).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Ok(probe),
            _ => Err(format!("Refusing probe {:?}: not a plain file name", probe)),
        }
    }

    fn report(&self, request: &CgiRequest) -> Result<String, Error> {
        let cwd = std::env::current_dir()?;
        let cwd = std::fs::canonicalize(&cwd).unwrap_or(cwd);
        let mut s = String::from("=== CGI Directory Test ===\n");
        s.push_str(&format!("Current working directory: {}\n", cwd.display()));
        let script_dir = Self::script_dir(request);
        match &script_dir {
            Some(dir) => {
                s.push_str(&format!("Script directory: {}\n\n", dir.display()));
                if *dir == cwd {
                    s.push_str("CORRECT: CGI is running from the script's directory\n");
                    s.push_str("Relative paths like './config.txt' will work as expected\n");
                } else {
                    s.push_str("INCORRECT: CGI is NOT running from the script's directory\n");
                    s.push_str("Relative paths won't work as developers expect\n");
                }
            }
            None => s.push_str("Script directory: unknown, no SCRIPT_FILENAME\n"),
        }
        s.push('\n');
        s.push_str(&Self::try_create_file(&self.scratch_dir));
        s.push_str("\n\n");
        match Self::probe_name(request) {
            Ok(probe) => {
                if let Some(dir) = &script_dir {
                    let path = dir.join(probe);
                    s.push_str(&format!("Looking for {} in script directory: {}\n", probe, path.display()));
                    s.push_str(&format!("File exists: {}\n", path.exists()));
                }
                s.push_str(&format!(
                    "Can access './{}' from current directory: {}\n",
                    probe,
                    Path::new(".").join(probe).exists()
                ));
            }
            Err(msg) => {
                log::warn!("{}", msg);
                s.push_str(&msg);
                s.push('\n');
            }
        }
        Ok(s)
    }
}

impl Handler for WorkDirCheck {
    fn handle(&mut self, request: &CgiRequest, response: &mut CgiResponse) -> Result<(), Error> {
        let report = self.report(request)?;
        *response = CgiResponse::text();
        response.push_str(&report);
        Ok(())
    }
}

fn handler(io: &mut dyn IO, env: HashMap<String, String>) -> anyhow::Result<i32> {
    let mut check = WorkDirCheck {
        scratch_dir: PathBuf::from("."),
    };
    cgiadapter::serve(io, env, &mut check)
}

/// Main program
pub fn main() {
    logger(&Settings::load());
    outer_cgi::main(|_| {}, handler)
}

/// Scratch files go in `scratch_dir`, not where cargo test runs.
#[cfg(test)]
fn run_check(scratch_dir: &Path, pairs: &[(&str, &str)]) -> String {
    use cgiadapter::CgiEnv;
    use std::io::Cursor;
    let env = CgiEnv::from_pairs(pairs.iter().copied());
    let mut check = WorkDirCheck {
        scratch_dir: scratch_dir.to_path_buf(),
    };
    let mut out = Vec::new();
    let code = cgiadapter::run(&env, Cursor::new(Vec::new()), &mut out, &mut check).expect("run failed");
    assert_eq!(code, 0);
    String::from_utf8(out).expect("not UTF-8")
}

#[test]
fn workdir_report() {
    //  Script lives in a temp directory, not the working directory of cargo test.
    let dir = std::env::temp_dir().join(format!("cgidiag-workdir-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("Unable to create test directory");
    std::fs::write(dir.join("probe.txt"), "x").expect("Unable to write probe file");
    let script = dir.join("workdir.cgi");
    let script = script.to_str().expect("temp dir not UTF-8");
    let scratch = dir.join("scratch");
    std::fs::create_dir_all(&scratch).expect("Unable to create scratch directory");
    let out = run_check(&scratch, &[("SCRIPT_FILENAME", script), ("QUERY_STRING", "probe=probe.txt")]);
    assert!(out.starts_with("Content-Type: text/plain; charset=utf-8\r\n\r\n=== CGI Directory Test ===\n"));
    assert!(out.contains("INCORRECT: CGI is NOT running from the script's directory"));
    assert!(out.contains("SUCCESS: Created file in current working directory\n"));
    assert!(out.contains("File exists: true\n"));
    //  Scratch file was written there, and removed.
    let leftovers = std::fs::read_dir(&scratch).expect("Unable to list scratch directory").count();
    assert_eq!(leftovers, 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn workdir_rejects_path_probe() {
    let dir = std::env::temp_dir().join(format!("cgidiag-workdir-probe-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("Unable to create test directory");
    let out = run_check(&dir, &[("QUERY_STRING", "probe=../../etc/passwd")]);
    assert!(out.contains("Script directory: unknown, no SCRIPT_FILENAME"));
    assert!(out.contains("Refusing probe \"../../etc/passwd\": not a plain file name"));
    let _ = std::fs::remove_dir_all(&dir);
}
