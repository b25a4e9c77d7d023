//! Line-oriented checkpoint file
//!
//! One original URL per line, appended and flushed per completion. A torn
//! final line from a crash is ignored on load, so its URL is simply
//! processed again.

use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct FileCheckpoint {
    path: PathBuf,
    file: File,
    fsync: bool,
    appended: u64,
}

impl FileCheckpoint {
    /// Opens (or creates) the checkpoint at `path` for appending
    ///
    /// A torn final line left by a crash is terminated before the first new
    /// entry, so that entry starts on its own line.
    ///
    /// # Arguments
    ///
    /// * `path` - Checkpoint file location
    /// * `fresh` - Discard any existing content first
    /// * `fsync` - Sync file data to disk after every append
    ///
    /// # Returns
    ///
    /// * `Ok(FileCheckpoint)` - Checkpoint ready for appends
    /// * `Err(StorageError)` - The file could not be opened or repaired
    pub fn open(path: &Path, fresh: bool, fsync: bool) -> StorageResult<Self> {
        let io_err = |source| StorageError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut options = OpenOptions::new();
        options.create(true);
        if fresh {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let mut file = options.open(path).map_err(io_err)?;

        if fresh {
            tracing::info!("Starting with an empty checkpoint at {}", path.display());
        } else if has_torn_tail(path).map_err(io_err)? {
            tracing::warn!(
                "Terminating incomplete final line in checkpoint {}",
                path.display()
            );
            file.write_all(b"\n").map_err(io_err)?;
            file.flush().map_err(io_err)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            fsync,
            appended: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// True if the file is non-empty and its last byte is not a newline
fn has_torn_tail(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Reads a checkpoint without opening it for writing
pub fn load_checkpoint(path: &Path) -> StorageResult<HashSet<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let mut completed = HashSet::new();
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut line_no = 0;

    loop {
        line.clear();
        let read = match reader.read_line(&mut line) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StorageError::Corrupt(line_no + 1))
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        if read == 0 {
            break;
        }
        line_no += 1;

        // No newline means the write was torn mid-line
        if !line.ends_with('\n') {
            tracing::warn!(
                "Ignoring incomplete final checkpoint line {} in {}",
                line_no,
                path.display()
            );
            break;
        }

        let url = line.trim();
        if !url.is_empty() {
            completed.insert(url.to_string());
        }
    }

    Ok(completed)
}

impl CheckpointStore for FileCheckpoint {
    fn load(&self) -> StorageResult<HashSet<String>> {
        load_checkpoint(&self.path)
    }

    fn append(&mut self, original_url: &str) -> StorageResult<()> {
        writeln!(self.file, "{}", original_url).map_err(|e| self.io_err(e))?;
        self.file.flush().map_err(|e| self.io_err(e))?;
        if self.fsync {
            self.file.sync_data().map_err(|e| self.io_err(e))?;
        }
        self.appended += 1;
        Ok(())
    }

    fn appended(&self) -> u64 {
        self.appended
    }
}
