//! # Decompressor / Parser
//!
//! Streams cached files into [`EdgeRecord`]s.
//!
//! Grammar, one record per line:
//!
//! ```text
//! source <ws> destination [<ws> weight]
//! ```
//!
//! - gzip input is detected by its magic bytes and decompressed on the fly;
//!   nothing is materialized in memory beyond one line
//! - the first non-blank line of each file is a header if it starts with
//!   `#` or its third column is not numeric
//! - blank lines and later `#` lines are ignored
//! - anything else that does not match is malformed: fatal in
//!   [`ParseMode::Strict`], counted and skipped in [`ParseMode::Lenient`]
//!
//! Records are produced exactly once per line, in file order. No
//! deduplication happens here.

use crate::cancel::CancellationToken;
use crate::primitives::{CANCEL_CHECK_INTERVAL, GZIP_MAGIC};
use crate::{EdgeRecord, GraphError, NodeId, ParseMode};
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

// =============================================================================
// PARSE STATISTICS
// =============================================================================

/// Counters collected while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Lines read, including skipped ones.
    pub lines: u64,
    /// Records yielded.
    pub records: u64,
    /// Lines skipped as malformed (lenient mode).
    pub malformed_lines: u64,
    /// Header lines skipped.
    pub header_skipped: u64,
}

// =============================================================================
// READER SETUP
// =============================================================================

/// Open `path`, decompressing transparently when it starts with the gzip magic.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>, GraphError> {
    let file = File::open(path).map_err(|e| GraphError::storage(path, &e))?;
    wrap_reader(BufReader::new(file), path)
}

fn wrap_reader<R: BufRead + Send + 'static>(
    mut reader: R,
    path: &Path,
) -> Result<Box<dyn BufRead + Send>, GraphError> {
    let head = reader.fill_buf().map_err(|e| GraphError::storage(path, &e))?;
    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Map an I/O error raised while reading. Decoder failures mean the file
/// content is bad, not the disk.
fn read_error(path: &Path, line: u64, err: &std::io::Error) -> GraphError {
    match err.kind() {
        ErrorKind::InvalidData | ErrorKind::InvalidInput | ErrorKind::UnexpectedEof => {
            GraphError::MalformedInput {
                path: path.to_path_buf(),
                line,
                reason: format!("corrupt compressed stream: {err}"),
            }
        }
        _ => GraphError::storage(path, err),
    }
}

enum Source {
    Path(PathBuf),
    Reader(PathBuf, Box<dyn BufRead + Send>),
}

struct OpenFile {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
    line: u64,
    seen_content: bool,
}

// =============================================================================
// EDGE STREAM
// =============================================================================

/// Lazy, finite, non-restartable sequence of edge records over one or more
/// files.
///
/// After the first error the stream is fused and yields `None`.
pub struct EdgeStream {
    pending: VecDeque<Source>,
    current: Option<OpenFile>,
    mode: ParseMode,
    cancel: CancellationToken,
    stats: ParseStats,
    buffer: Vec<u8>,
    failed: bool,
}

enum Line {
    Record(EdgeRecord),
    Skip,
}

impl EdgeStream {
    /// Stream over `paths`, opened one after another.
    #[must_use]
    pub fn open(paths: &[PathBuf], mode: ParseMode) -> Self {
        Self::with_sources(paths.iter().cloned().map(Source::Path).collect(), mode)
    }

    /// Stream over an already open reader; `label` names it in errors.
    /// Gzip input is detected as for files.
    pub fn from_reader<R: BufRead + Send + 'static>(
        reader: R,
        label: impl Into<PathBuf>,
        mode: ParseMode,
    ) -> Result<Self, GraphError> {
        let label = label.into();
        let reader = wrap_reader(reader, &label)?;
        Ok(Self::with_sources(
            VecDeque::from([Source::Reader(label, reader)]),
            mode,
        ))
    }

    fn with_sources(pending: VecDeque<Source>, mode: ParseMode) -> Self {
        Self {
            pending,
            current: None,
            mode,
            cancel: CancellationToken::new(),
            stats: ParseStats::default(),
            buffer: Vec::with_capacity(256),
            failed: false,
        }
    }

    /// Honour `cancel` every [`CANCEL_CHECK_INTERVAL`] records.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    #[must_use]
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    fn fail(&mut self, err: GraphError) -> Option<Result<EdgeRecord, GraphError>> {
        self.failed = true;
        self.current = None;
        self.pending.clear();
        Some(Err(err))
    }

    /// Advance to the next readable file. `Ok(false)` when exhausted.
    fn open_next(&mut self) -> Result<bool, GraphError> {
        let Some(source) = self.pending.pop_front() else {
            return Ok(false);
        };
        let (path, reader) = match source {
            Source::Path(path) => {
                let reader = open_reader(&path)?;
                (path, reader)
            }
            Source::Reader(path, reader) => (path, reader),
        };
        tracing::debug!(path = %path.display(), "parsing");
        self.current = Some(OpenFile {
            path,
            reader,
            line: 0,
            seen_content: false,
        });
        Ok(true)
    }

    fn classify(&mut self, file_path: &Path, line_no: u64, first: bool) -> Result<Line, GraphError> {
        let Ok(text) = std::str::from_utf8(&self.buffer) else {
            return self.malformed(file_path, line_no, "line is not valid UTF-8".to_string());
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(Line::Skip);
        }
        if text.starts_with('#') {
            if first {
                self.stats.header_skipped += 1;
            }
            return Ok(Line::Skip);
        }

        let fields: Vec<&str> = text.split_whitespace().collect();
        match fields.as_slice() {
            [source, destination] => Ok(Line::Record(EdgeRecord::new(
                *source,
                *destination,
                None,
            ))),
            [source, destination, weight] => match weight.parse::<f64>() {
                Ok(w) if w.is_finite() => Ok(Line::Record(EdgeRecord::new(
                    *source,
                    *destination,
                    Some(w),
                ))),
                _ if first => {
                    tracing::debug!(path = %file_path.display(), header = text, "skipping header");
                    self.stats.header_skipped += 1;
                    Ok(Line::Skip)
                }
                _ => self.malformed(file_path, line_no, format!("invalid weight '{weight}'")),
            },
            other => self.malformed(
                file_path,
                line_no,
                format!("expected 2 or 3 fields, found {}", other.len()),
            ),
        }
    }

    fn malformed(&mut self, path: &Path, line: u64, reason: String) -> Result<Line, GraphError> {
        match self.mode {
            ParseMode::Strict => Err(GraphError::MalformedInput {
                path: path.to_path_buf(),
                line,
                reason,
            }),
            ParseMode::Lenient => {
                tracing::warn!(path = %path.display(), line, reason = %reason, "skipping malformed line");
                self.stats.malformed_lines += 1;
                Ok(Line::Skip)
            }
        }
    }
}

impl Iterator for EdgeStream {
    type Item = Result<EdgeRecord, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if self.current.is_none() {
                match self.open_next() {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return self.fail(e),
                }
            }
            let Some(file) = self.current.as_mut() else {
                return None;
            };

            self.buffer.clear();
            let read = file.reader.read_until(b'\n', &mut self.buffer);
            let read = match read {
                Ok(n) => n,
                Err(e) => {
                    let err = read_error(&file.path, file.line.saturating_add(1), &e);
                    return self.fail(err);
                }
            };
            if read == 0 {
                self.current = None;
                continue;
            }

            file.line += 1;
            let line_no = file.line;
            let path = file.path.clone();
            let first = !file.seen_content && !self.buffer.iter().all(u8::is_ascii_whitespace);
            if first {
                file.seen_content = true;
            }
            self.stats.lines += 1;

            match self.classify(&path, line_no, first) {
                Ok(Line::Skip) => {}
                Ok(Line::Record(record)) => {
                    self.stats.records += 1;
                    if self.stats.records % CANCEL_CHECK_INTERVAL == 0 {
                        if let Err(e) = self.cancel.check() {
                            return self.fail(e);
                        }
                    }
                    return Some(Ok(record));
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}

// =============================================================================
// NODE METADATA
// =============================================================================

/// Annotation of one node from a `protein.info` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub preferred_name: String,
    /// Protein length in amino acids, when present.
    pub size: Option<u64>,
    pub annotation: String,
}

/// Parse tab-separated `id  preferred_name  [size  [annotation]]` rows.
///
/// Only ids accepted by `keep` are returned; rows for other ids are
/// ignored. Malformed rows are counted and skipped.
pub fn parse_node_metadata(
    path: &Path,
    keep: impl Fn(&NodeId) -> bool,
) -> Result<(BTreeMap<NodeId, NodeMetadata>, ParseStats), GraphError> {
    let mut reader = open_reader(path)?;
    let mut stats = ParseStats::default();
    let mut out = BTreeMap::new();
    let mut buffer = String::new();
    let mut seen_content = false;

    loop {
        buffer.clear();
        let read = reader
            .read_line(&mut buffer)
            .map_err(|e| read_error(path, stats.lines.saturating_add(1), &e))?;
        if read == 0 {
            break;
        }
        stats.lines += 1;

        let line = buffer.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let first = !seen_content;
        seen_content = true;
        if line.starts_with('#') {
            if first {
                stats.header_skipped += 1;
            }
            continue;
        }

        let mut fields = line.split('\t');
        let (Some(id), Some(name)) = (fields.next(), fields.next()) else {
            tracing::warn!(path = %path.display(), line = stats.lines, "skipping malformed metadata row");
            stats.malformed_lines += 1;
            continue;
        };
        let size = match fields.next().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) => Some(n),
                Err(_) if first => {
                    stats.header_skipped += 1;
                    continue;
                }
                Err(_) => {
                    tracing::warn!(path = %path.display(), line = stats.lines, size = raw, "skipping metadata row with invalid size");
                    stats.malformed_lines += 1;
                    continue;
                }
            },
        };

        let id = NodeId::new(id.trim());
        if !keep(&id) {
            continue;
        }
        stats.records += 1;
        out.insert(
            id,
            NodeMetadata {
                preferred_name: name.trim().to_string(),
                size,
                annotation: fields.next().unwrap_or("").trim().to_string(),
            },
        );
    }

    Ok((out, stats))
}

// =============================================================================
// TESTS
// =============================================================================
