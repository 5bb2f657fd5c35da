//! settings -- optional configuration for the diagnostic responders.
//!
//! The settings file is searched for in the working directory and then
//! in parent directories, so it can be placed above the web root, where
//! the web server can't serve it. It contains lines of
//!
//! ```text
//! LOG_FILE=logs/cgidiag.txt
//! LOG_LEVEL=debug
//! ```
//!
//! Both are optional. No file at all means defaults.
//
use anyhow::{Error, anyhow};
use envie::Envie;
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Settings file name.
pub const SETTINGS_FILE: &str = "cgidiag.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Where the log goes. Relative to the working directory.
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("logs/cgidiag.txt"),
            log_level: LevelFilter::Info,
        }
    }
}

impl Settings {
    /// Find settings file, starting at `start` and going up the tree.
    pub fn find_settings_file(start: &Path, filename: &str) -> Option<PathBuf> {
        let mut dir = Some(start);
        // Go up the tree. Prevent runaway.
        for _ in 0..100 {
            let wd = dir?;
            let candidate = wd.join(filename);
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = wd.parent();
        }
        log::warn!("Gave up looking for {:?} above {:?}", filename, start);
        None
    }

    /// Load from one file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Settings path {:?} is not UTF-8", path))?;
        let vars = Envie::load_with_path(path_str)
            .map_err(|e| anyhow!("Unable to read settings file {:?}: {}", path, e))?;
        let mut settings = Self::default();
        if let Some(log_file) = vars.get("LOG_FILE") {
            let log_file = log_file.trim();
            if !log_file.is_empty() {
                settings.log_file = PathBuf::from(log_file);
            }
        }
        if let Some(level) = vars.get("LOG_LEVEL") {
            settings.log_level = LevelFilter::from_str(level.trim())
                .map_err(|_| anyhow!("Invalid LOG_LEVEL {:?} in {:?}", level, path))?;
        }
        Ok(settings)
    }

    /// Settings for this invocation. Problems are reported on
    /// standard error and defaults used. Logging isn't up yet.
    pub fn load() -> Self {
        let start = match std::env::current_dir() {
            Ok(wd) => wd,
            Err(e) => {
                eprintln!("No working directory, using default settings: {}", e);
                return Self::default();
            }
        };
        match Self::find_settings_file(&start, SETTINGS_FILE) {
            Some(path) => Self::from_file(&path).unwrap_or_else(|e| {
                eprintln!("{:?}. Using default settings.", e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[test]
fn settings_from_parent_directory() {
    let root = std::env::temp_dir().join(format!("cgidiag-settings-{}", std::process::id()));
    let nested = root.join("www").join("cgi-bin");
    std::fs::create_dir_all(&nested).expect("Unable to create test directories");
    std::fs::write(root.join(SETTINGS_FILE), "LOG_FILE=/tmp/diag.log\nLOG_LEVEL=debug\n")
        .expect("Unable to write settings file");
    let found = Settings::find_settings_file(&nested, SETTINGS_FILE).expect("Settings file not found");
    assert_eq!(found, root.join(SETTINGS_FILE));
    let settings = Settings::from_file(&found).expect("Settings file misparsed");
    assert_eq!(settings.log_file, PathBuf::from("/tmp/diag.log"));
    assert_eq!(settings.log_level, LevelFilter::Debug);
    assert!(Settings::find_settings_file(&nested, "no-such-settings-file.txt").is_none());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn settings_bad_level() {
    let dir = std::env::temp_dir().join(format!("cgidiag-badlevel-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("Unable to create test directory");
    let path = dir.join(SETTINGS_FILE);
    std::fs::write(&path, "LOG_LEVEL=loud\n").expect("Unable to write settings file");
    assert!(Settings::from_file(&path).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}
