//! Size-rotating file writer for the logger

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use crate::logger::config::{FileConfig, RotationConfig};
use crate::logger::error::LoggerError;

/// File writer with size-based rotation.
///
/// `scheduler.log` rotates to `scheduler.log.1`, `.1` shifts to `.2`, and so on
/// up to `max_files`; the oldest file is removed.
pub struct RotatingFileWriter {
    state: Arc<Mutex<WriterState>>,
}

struct WriterState {
    file: BufWriter<File>,
    path: PathBuf,
    current_size: u64,
    rotation: RotationConfig,
    /// Set after a write failure; subsequent lines go to stderr
    fallback_mode: bool,
}

impl RotatingFileWriter {
    pub fn new(config: &FileConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = open_log_file(&config.path, config.append)?;
        let current_size = if config.append {
            std::fs::metadata(&config.path).map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            state: Arc::new(Mutex::new(WriterState {
                file,
                path: config.path.clone(),
                current_size,
                rotation: config.rotation.clone(),
                fallback_mode: false,
            })),
        })
    }

    /// Whether the writer gave up on the file and is writing to stderr
    pub fn is_in_fallback_mode(&self) -> bool {
        self.state.lock().map(|s| s.fallback_mode).unwrap_or(false)
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriterGuard {
            state: self.state.clone(),
        }
    }
}

pub struct RotatingWriterGuard {
    state: Arc<Mutex<WriterState>>,
}

impl Write for RotatingWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire writer lock"))?;

        if state.fallback_mode {
            return io::stderr().write(buf);
        }

        if state.current_size > 0 && state.current_size + buf.len() as u64 > state.rotation.max_size
        {
            if let Err(e) = state.rotate() {
                return state.fall_back(buf, io::Error::other(e.to_string()));
            }
        }

        match state.file.write(buf) {
            Ok(written) => {
                state.current_size += written as u64;
                Ok(written)
            }
            Err(e) => state.fall_back(buf, e),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire writer lock"))?;

        if state.fallback_mode {
            return io::stderr().flush();
        }

        state.file.flush()
    }
}

impl Drop for RotatingWriterGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.file.flush();
        }
    }
}

impl WriterState {
    fn rotate(&mut self) -> Result<(), LoggerError> {
        self.file.flush()?;

        let oldest = rotated_path(&self.path, self.rotation.max_files);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }

        for index in (1..self.rotation.max_files).rev() {
            let from = rotated_path(&self.path, index);
            if from.exists() {
                std::fs::rename(&from, rotated_path(&self.path, index + 1))?;
            }
        }

        std::fs::rename(&self.path, rotated_path(&self.path, 1)).map_err(|e| {
            LoggerError::rotation(format!("cannot rotate {}: {}", self.path.display(), e))
        })?;

        self.file = open_log_file(&self.path, false)?;
        self.current_size = 0;
        Ok(())
    }

    fn fall_back(&mut self, buf: &[u8], error: io::Error) -> io::Result<usize> {
        self.fallback_mode = true;
        eprintln!("[Logger] File write failed, falling back to stderr: {}", error);
        io::stderr().write(buf)
    }
}

pub(crate) fn rotated_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

fn open_log_file(path: &Path, append: bool) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;

    Ok(BufWriter::new(file))
}
