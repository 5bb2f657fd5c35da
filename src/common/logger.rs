//! Logging for responders.
//!
//! Standard output belongs to the response, so the log never goes there.
//! It goes to the configured file, or to standard error, which the web
//! server puts in its error log.
//
use crate::Settings;
use std::fs::File;

/// Start logging for one invocation.
pub fn logger(settings: &Settings) {
    let dir_ok = match settings.log_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir).is_ok(),
        _ => true,
    };
    let file = if dir_ok { File::create(&settings.log_file).ok() } else { None };
    match file {
        Some(file) => {
            let _ = simplelog::CombinedLogger::init(vec![simplelog::WriteLogger::new(
                settings.log_level,
                simplelog::Config::default(),
                file,
            )]);
            log::info!("Logging to {:?}", settings.log_file); // where the log is going
        }
        None => {
            let _ = simplelog::CombinedLogger::init(vec![simplelog::WriteLogger::new(
                settings.log_level,
                simplelog::Config::default(),
                std::io::stderr(),
            )]);
            log::warn!("Unable to create log file {:?}, logging to stderr", settings.log_file);
        }
    }
}
