use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub const LOG_FILE: &str = "darktide-order.log";

/// Appends every record to the log file; warnings and errors also go to stderr.
struct FileLogger {
    path: PathBuf,
    level: LevelFilter,
    lock: Mutex<()>,
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        if record.level() <= Level::Warn {
            eprintln!("{}: {message}", level_label(record.level()).to_lowercase());
        }
        let _guard = self.lock.lock();
        let _ = append_log_file(&self.path, record.level(), &message);
    }

    fn flush(&self) {}
}

pub fn init(data_dir: &Path, verbose: bool) -> Result<()> {
    fs::create_dir_all(data_dir).context("create app data dir")?;
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let logger = FileLogger {
        path: data_dir.join(LOG_FILE),
        level,
        lock: Mutex::new(()),
    };
    log::set_boxed_logger(Box::new(logger)).context("install logger")?;
    log::set_max_level(level);
    Ok(())
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn append_log_file(path: &Path, level: Level, message: &str) -> std::io::Result<()> {
    let label = level_label(level);
    let stamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "[{label}] {stamp} {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_labelled_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOG_FILE);

        append_log_file(&path, Level::Info, "wrote 3 mod(s)").unwrap();
        append_log_file(&path, Level::Warn, "dtkit-patch exited with 1").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[INFO] "));
        assert!(lines[0].ends_with(" wrote 3 mod(s)"));
        assert!(lines[1].starts_with("[WARN] "));
    }
}
