use super::config::LoggingToml;
use crate::error::TaskError;
use log::{error, LevelFilter};
use simplelog::{Config, WriteLogger};
use std::fs::{create_dir_all, File};

/// Create the log file and pick the level from the config
pub fn setup_logging(config: &LoggingToml) -> Result<(File, LevelFilter), TaskError> {
    if let Err(err) = create_dir_all(&config.path) {
        error!("[taskmaster] Could not create log directory {}: {err:?}", config.path);
        return Err(TaskError::LogFile);
    }

    let log_file = match File::create(format!("{}/taskmaster.log", config.path.as_str())) {
        Ok(result) => result,
        Err(_err) => return Err(TaskError::LogFile),
    };

    let log_level = match config.level.as_str() {
        "error" => LevelFilter::Error,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        _ => LevelFilter::Warn,
    };

    Ok((log_file, log_level))
}

/// Send log output to the configured file. Ignored if a logger is already installed
pub fn init_logging(config: &LoggingToml) -> Result<(), TaskError> {
    let (log_file, level) = setup_logging(config)?;
    let _ = WriteLogger::init(level, Config::default(), log_file);
    Ok(())
}
