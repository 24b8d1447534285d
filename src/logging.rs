//! Logger setup.
//!
//! The TUI owns the terminal, so the binary logs to `rustytodos.log` in the
//! data directory. Integration tests log to the terminal instead.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{ColorChoice, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};

pub const LOG_FILE: &str = "rustytodos.log";

/// Installs the file logger under `dir` and returns the log file path.
/// A logger that is already installed is kept.
pub fn initialize(dir: &Path, level: LevelFilter) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE);
    let file = File::create(&path)?;
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();
    let _ = WriteLogger::init(level, config, file);
    Ok(path)
}

/// Debug-level terminal logging for tests. Safe to call from every test.
pub fn initialize_for_tests() {
    let _ = TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lands_in_the_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = initialize(&dir.path().join("logs"), LevelFilter::Info).unwrap();
        assert!(path.ends_with(LOG_FILE));
        assert!(path.exists());
    }
}
