//! Sequential trace reader over any buffered source.

use crate::line::TraceLine;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Trace reading errors
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Underlying source failed
    #[error("Failed to read trace at line {line}: {source}")]
    Io {
        /// 1-based line number that failed
        line: usize,
        /// I/O cause
        #[source]
        source: io::Error,
    },

    /// Trace file could not be opened
    #[error("Failed to open trace {path}: {source}")]
    Open {
        /// Path that was requested
        path: String,
        /// I/O cause
        #[source]
        source: io::Error,
    },
}

/// Reads a trace one classified line at a time
pub struct TraceReader<R> {
    source: R,
    buf: String,
    /// Lines consumed so far
    position: usize,
}

impl<R: BufRead> TraceReader<R> {
    /// Create a reader over a buffered source
    #[must_use]
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: String::new(),
            position: 0,
        }
    }

    /// Read the next line
    ///
    /// # Errors
    ///
    /// Returns error if the underlying source fails
    pub fn next_line(&mut self) -> Result<Option<TraceLine>, TraceError> {
        self.buf.clear();
        let read = self.source.read_line(&mut self.buf).map_err(|source| TraceError::Io {
            line: self.position + 1,
            source,
        })?;
        if read == 0 {
            return Ok(None);
        }
        self.position += 1;
        Ok(Some(TraceLine::parse(&self.buf)))
    }

    /// Number of lines consumed so far
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

impl TraceReader<Box<dyn BufRead>> {
    /// Open a trace file, or standard input when `path` is `-`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        if path == Path::new("-") {
            tracing::debug!("reading trace from stdin");
            return Ok(Self::new(Box::new(BufReader::new(io::stdin()))));
        }
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "reading trace");
        Ok(Self::new(Box::new(BufReader::new(file))))
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceLine, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
