//! File batcher: merges delimited text files into size-bounded upload chunks.
//!
//! Each input's first line is its header. Record lines from every input are
//! appended to the active chunk, which gets a header the first time it is
//! written to. A chunk is sealed right after the append that pushes it past
//! the size limit, so records are never split.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

/// Default chunk size limit in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 90_000_000;

/// Default file name prefix for written chunks.
pub const DEFAULT_CHUNK_PREFIX: &str = "batch";

/// Resolve the files to read.
///
/// A file is returned as-is. A directory yields the files matching
/// `pattern` anywhere beneath it, or its direct child files when no pattern
/// is given. Results are sorted.
pub fn enumerate_inputs(path: &Path, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        return Err(Error::new(ErrorKind::InvalidPath(format!(
            "{} is not a file or directory",
            path.display()
        ))));
    }

    let mut files = match pattern {
        Some(pattern) => {
            glob::Pattern::new(pattern)?;
            let full = format!(
                "{}/**/{}",
                glob::Pattern::escape(&path.to_string_lossy()),
                pattern
            );
            let mut files = Vec::new();
            for entry in glob::glob(&full)? {
                let entry = entry?;
                if entry.is_file() {
                    files.push(entry);
                }
            }
            files
        }
        None => {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(path)? {
                let entry = entry?.path();
                if entry.is_file() {
                    files.push(entry);
                }
            }
            files
        }
    };

    files.sort();
    files.dedup();
    debug!(path = %path.display(), count = files.len(), "Enumerated input files");
    Ok(files)
}

/// A sealed upload chunk: one header line followed by record lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    data: Vec<u8>,
    records: usize,
}

impl Chunk {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Size in bytes, header included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of record lines, header excluded.
    pub fn records(&self) -> usize {
        self.records
    }
}

/// Iterator over the chunks produced from a list of input files.
///
/// Created by [`combine`]. Any I/O error is yielded once and ends iteration.
#[derive(Debug)]
pub struct Combiner {
    files: std::vec::IntoIter<PathBuf>,
    reader: Option<BufReader<File>>,
    header: Vec<u8>,
    size_limit: usize,
    chunk: Chunk,
    done: bool,
}

/// Lazily combine `files` into chunks no larger than `size_limit` bytes
/// except for the record that crosses the limit.
pub fn combine(files: Vec<PathBuf>, size_limit: usize) -> Combiner {
    Combiner {
        files: files.into_iter(),
        reader: None,
        header: Vec::new(),
        size_limit,
        chunk: Chunk::default(),
        done: false,
    }
}

impl Combiner {
    fn open(&mut self, path: &Path) -> Result<()> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut header = Vec::new();
        if reader.read_until(b'\n', &mut header)? == 0 {
            debug!(path = %path.display(), "Skipping empty input");
            return Ok(());
        }

        self.header = normalize_line(&header);
        self.reader = Some(reader);
        Ok(())
    }

    /// Append one record line; returns true when the chunk must be sealed.
    fn push_line(&mut self, line: &[u8]) -> bool {
        if self.chunk.is_empty() {
            self.chunk.data.extend_from_slice(&self.header);
        }
        self.chunk.data.extend_from_slice(&normalize_line(line));
        self.chunk.records += 1;
        self.chunk.len() > self.size_limit
    }

    fn seal(&mut self) -> Chunk {
        std::mem::take(&mut self.chunk)
    }
}

impl Iterator for Combiner {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let Some(reader) = self.reader.as_mut() else {
                match self.files.next() {
                    Some(path) => {
                        if let Err(err) = self.open(&path) {
                            self.done = true;
                            return Some(Err(err));
                        }
                        continue;
                    }
                    None => {
                        self.done = true;
                        if self.chunk.is_empty() {
                            return None;
                        }
                        return Some(Ok(self.seal()));
                    }
                }
            };

            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => self.reader = None,
                Ok(_) => {
                    if self.push_line(&line) {
                        return Some(Ok(self.seal()));
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}

/// Drop invalid UTF-8 and make sure the line ends with a newline.
fn normalize_line(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + 1);
    for chunk in line.utf8_chunks() {
        out.extend_from_slice(chunk.valid().as_bytes());
    }
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    out
}

/// Combine `files` and write each chunk to `{output_dir}/{prefix}_{index}.csv`.
///
/// Returns the written paths in order. On error, files already written stay
/// on disk.
pub fn write_chunks(
    files: Vec<PathBuf>,
    size_limit: usize,
    output_dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for (index, chunk) in combine(files, size_limit).enumerate() {
        let chunk = chunk?;
        let path = output_dir.join(format!("{prefix}_{index}.csv"));
        std::fs::write(&path, chunk.as_bytes())?;
        debug!(
            path = %path.display(),
            bytes = chunk.len(),
            records = chunk.records(),
            "Wrote chunk"
        );
        written.push(path);
    }
    Ok(written)
}

/// [`write_chunks`] on the blocking thread pool.
pub async fn write_chunks_blocking(
    files: Vec<PathBuf>,
    size_limit: usize,
    output_dir: PathBuf,
    prefix: String,
) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || write_chunks(files, size_limit, &output_dir, &prefix))
        .await?
}
