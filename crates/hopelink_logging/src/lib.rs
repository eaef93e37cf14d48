//! Shared logging setup for HopeLink binaries.
//!
//! Logs go to two places: a size-rotated file under `~/.hopelink/logs`
//! (always at the configured filter level) and stderr (quieter unless
//! `verbose` is set). `HOPELINK_HOME` overrides the home directory, which
//! the tests rely on.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "hopelink=info,hopelink_protocol=info";
const KEPT_LOG_FILES: usize = 4;
const MAX_LOG_BYTES: u64 = 8 * 1024 * 1024;

/// Logging options for a HopeLink binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a rotated file writer plus stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to create log directory")?;
    let sink = LogSink::open(log_dir, config.app_name)
        .context("Failed to open rotated log file")?;

    // EnvFilter is not Clone; build one per layer.
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let file_filter = env_filter();
    let console_filter = if config.verbose {
        env_filter()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(sink)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

/// The HopeLink home directory: `~/.hopelink`, or `HOPELINK_HOME` if set.
pub fn hopelink_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("HOPELINK_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".hopelink")
}

/// The logs directory: `~/.hopelink/logs`.
pub fn logs_dir() -> PathBuf {
    hopelink_home().join("logs")
}

/// Create the logs directory if missing and return it.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Append-only log file that rotates once it passes `MAX_LOG_BYTES`.
///
/// Rotation shifts `name.log` to `name.log.1`, `name.log.1` to
/// `name.log.2`, and so on, dropping anything past `KEPT_LOG_FILES`.
struct RotatedFile {
    dir: PathBuf,
    stem: String,
    file: File,
    written: u64,
}

impl RotatedFile {
    fn open(dir: PathBuf, stem: String) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{stem}.log"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        let mut rotated = Self {
            dir,
            stem,
            file,
            written,
        };
        if rotated.written >= MAX_LOG_BYTES {
            rotated.rotate()?;
        }
        Ok(rotated)
    }

    fn slot(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.dir.join(format!("{}.log", self.stem))
        } else {
            self.dir.join(format!("{}.log.{}", self.stem, index))
        }
    }

    fn rotate(&mut self) -> io::Result<()> {
        let _ = self.file.flush();

        let oldest = self.slot(KEPT_LOG_FILES);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (0..KEPT_LOG_FILES).rev() {
            let src = self.slot(index);
            if src.exists() {
                fs::rename(&src, self.slot(index + 1))?;
            }
        }

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.slot(0))?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > MAX_LOG_BYTES {
            self.rotate()?;
        }
        let bytes = self.file.write(buf)?;
        self.written += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable `MakeWriter` handle over one shared [`RotatedFile`].
#[derive(Clone)]
struct LogSink {
    inner: Arc<Mutex<RotatedFile>>,
}

impl LogSink {
    fn open(dir: PathBuf, app_name: &str) -> Result<Self> {
        let stem: String = app_name
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        let file = RotatedFile::open(dir, stem)
            .with_context(|| format!("Failed to open log file for {app_name}"))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

struct LogSinkGuard {
    inner: Arc<Mutex<RotatedFile>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogSink {
    type Writer = LogSinkGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogSinkGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for LogSinkGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink lock poisoned"))?
            .flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_shifts_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RotatedFile::open(dir.path().to_path_buf(), "engine".into()).unwrap();
        log.write_all(b"first generation\n").unwrap();
        log.rotate().unwrap();
        log.write_all(b"second generation\n").unwrap();
        log.rotate().unwrap();

        assert!(dir.path().join("engine.log").exists());
        let gen1 = fs::read_to_string(dir.path().join("engine.log.1")).unwrap();
        let gen2 = fs::read_to_string(dir.path().join("engine.log.2")).unwrap();
        assert_eq!(gen1, "second generation\n");
        assert_eq!(gen2, "first generation\n");
    }

    #[test]
    fn test_rotation_drops_oldest_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RotatedFile::open(dir.path().to_path_buf(), "engine".into()).unwrap();
        for round in 0..=KEPT_LOG_FILES + 1 {
            log.write_all(format!("round {round}\n").as_bytes()).unwrap();
            log.rotate().unwrap();
        }
        assert!(dir.path().join(format!("engine.log.{KEPT_LOG_FILES}")).exists());
        assert!(!dir
            .path()
            .join(format!("engine.log.{}", KEPT_LOG_FILES + 1))
            .exists());
    }

    #[test]
    fn test_sink_sanitizes_app_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path().to_path_buf(), "hopelink chat").unwrap();
        drop(sink);
        assert!(dir.path().join("hopelink_chat.log").exists());
    }
}
