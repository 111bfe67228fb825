use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Logger that writes to a rolling file and optionally echoes to stderr.
/// The daemon has no terminal UI, so stderr is only used in verbose runs.
struct DaemonLogger {
    file_writer: Arc<Mutex<RollingFileAppender>>,
    file_level: LevelFilter,
    stderr_level: LevelFilter,
}

impl Log for DaemonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.file_level || metadata.level() <= self.stderr_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = format!("{}", record.args());
        let level = record.level();
        let timestamp = chrono::Local::now();

        if level <= self.file_level {
            if let Ok(mut writer) = self.file_writer.lock() {
                let _ = writeln!(
                    writer,
                    "{} [{}] {}",
                    timestamp.format("%Y-%m-%d %H:%M:%S"),
                    level,
                    message
                );
            }
        }

        if level <= self.stderr_level {
            eprintln!(
                "{} [{}] {}",
                timestamp.format("%H:%M:%S"),
                level,
                message
            );
        }
    }

    fn flush(&self) {
        // RollingFileAppender handles flushing automatically
    }
}

/// Parse log level string to LevelFilter
pub fn parse_level(level_str: &str) -> LevelFilter {
    match level_str.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info, // Default to info
    }
}

/// Initialize file logging (daily rotation, keep 3 files). `verbose` also
/// echoes debug output to stderr. Falls back to env_logger on stderr when the
/// log file cannot be created.
pub fn init_logger(log_file_path: PathBuf, file_level: &str, verbose: bool) -> Result<()> {
    let file_level = parse_level(file_level);
    let stderr_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Off
    };

    match build_file_appender(&log_file_path) {
        Ok(file_appender) => {
            let logger = DaemonLogger {
                file_writer: Arc::new(Mutex::new(file_appender)),
                file_level,
                stderr_level,
            };
            let max_level = file_level.max(stderr_level);
            log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
            log::set_max_level(max_level);
        }
        Err(e) => {
            env_logger::Builder::new()
                .filter_level(file_level.max(stderr_level))
                .try_init()
                .context("Failed to set fallback logger")?;
            log::warn!("file logging unavailable ({:#}), logging to stderr", e);
        }
    }

    Ok(())
}

fn build_file_appender(log_file_path: &PathBuf) -> Result<RollingFileAppender> {
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(3)
        .filename_prefix(
            log_file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("clipkeep"),
        )
        .filename_suffix(
            log_file_path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("log"),
        )
        .build(
            log_file_path
                .parent()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path"))?,
        )
        .context("Failed to create rotating file appender")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("error"), LevelFilter::Error);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("Debug"), LevelFilter::Debug);
        assert_eq!(parse_level("trace"), LevelFilter::Trace);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }
}
