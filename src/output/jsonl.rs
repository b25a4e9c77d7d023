//! Line-delimited JSON sink

use crate::output::traits::{Sink, SinkResult};
use crate::state::UrlResult;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

enum Target {
    File { path: PathBuf, writer: BufWriter<File> },
    Stdout(io::Stdout),
    Memory(Vec<u8>),
}

/// Writes one JSON object per line, flushed per record
pub struct JsonlSink {
    target: Target,
    written: u64,
    failed: bool,
}

impl JsonlSink {
    /// Opens `path`, appending unless `truncate` is set
    pub fn create(path: &Path, truncate: bool) -> SinkResult<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path)?;
        Ok(Self::with_target(Target::File {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        }))
    }

    pub fn stdout() -> Self {
        Self::with_target(Target::Stdout(io::stdout()))
    }

    /// Buffers records in memory; used by tests
    pub fn in_memory() -> Self {
        Self::with_target(Target::Memory(Vec::new()))
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            written: 0,
            failed: false,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Contents written so far, for the in-memory target
    pub fn contents(&self) -> Option<&[u8]> {
        match &self.target {
            Target::Memory(buf) => Some(buf),
            _ => None,
        }
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        match &mut self.target {
            Target::File { writer, .. } => {
                writer.write_all(line)?;
                writer.write_all(b"\n")?;
                writer.flush()
            }
            Target::Stdout(out) => {
                let mut lock = out.lock();
                lock.write_all(line)?;
                lock.write_all(b"\n")?;
                lock.flush()
            }
            Target::Memory(buf) => {
                buf.extend_from_slice(line);
                buf.push(b'\n');
                Ok(())
            }
        }
    }
}

impl Sink for JsonlSink {
    fn write(&mut self, result: &UrlResult) -> SinkResult<()> {
        let line = serde_json::to_vec(result)?;
        if let Err(e) = self.write_line(&line) {
            self.failed = true;
            return Err(e.into());
        }
        self.written += 1;
        Ok(())
    }

    fn healthy(&mut self) -> bool {
        if self.failed {
            return false;
        }
        match &self.target {
            // Catches the file being removed or its volume going away
            Target::File { path, writer } => {
                writer.get_ref().metadata().is_ok() && path.exists()
            }
            Target::Stdout(_) | Target::Memory(_) => true,
        }
    }

    fn flush(&mut self) -> SinkResult<()> {
        match &mut self.target {
            Target::File { writer, .. } => writer.flush()?,
            Target::Stdout(out) => out.flush()?,
            Target::Memory(_) => {}
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.target {
            Target::File { path, .. } => path.display().to_string(),
            Target::Stdout(_) => "stdout".to_string(),
            Target::Memory(_) => "memory".to_string(),
        }
    }
}
