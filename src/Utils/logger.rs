//! Global logger set up for the solvers: terminal output, optionally mirrored into a file.
use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// log_<date>_<time>.txt in the given directory
pub fn log_file_name(dir: &Path) -> PathBuf {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    dir.join(format!("log_{}.txt", date_and_time))
}

/// Installs the global logger. Returns `Ok(false)` when a logger was already installed,
/// in which case the existing one keeps working and nothing changes.
pub fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> io::Result<bool> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path)?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    Ok(CombinedLogger::init(loggers).is_ok())
}
