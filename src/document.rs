//! Document facade: one piece table plus one line index, kept in sync.
//!
//! This is the only unit the UI layer drives. All mutation is expected on
//! a single owning thread; background readers take a [`Snapshot`] and
//! compare versions to detect staleness.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Error;
use crate::line_index::LineIndex;
use crate::piece::PieceTable;
use crate::utf8;

/// A frozen copy of the document text, tagged with the edit version it
/// was taken at. Background scans run against this and discard their
/// results if the document has moved on.
pub struct Snapshot {
    pub version: u64,
    pub text: Vec<u8>,
}

pub struct Document {
    pieces: PieceTable,
    lines: LineIndex,
    path: Option<PathBuf>,
    dirty: bool,
    version: u64,
}

impl Document {
    pub fn new() -> Self {
        Self {
            pieces: PieceTable::new(),
            lines: LineIndex::new(),
            path: None,
            dirty: false,
            version: 0,
        }
    }

    /// Open a file. On failure the current document state is untouched.
    pub fn open(&mut self, path: &Path) -> Result<(), Error> {
        let mut pieces = PieceTable::new();
        pieces.load(path)?;

        let mut lines = LineIndex::new();
        lines.rebuild(&pieces);

        self.pieces = pieces;
        self.lines = lines;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        self.version += 1;
        Ok(())
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Monotonically increasing edit counter; bumped by every successful
    /// open, edit, and save.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len_bytes(&self) -> usize {
        self.pieces.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.line_count()
    }

    pub fn line_start_offset(&self, line: usize) -> usize {
        self.lines.line_start_offset(line)
    }

    /// `(start, content_end)` of a line, where `content_end` excludes the
    /// trailing line break. Cursor positions clamp into this span.
    pub fn line_span(&self, line: usize) -> (usize, usize) {
        let start = self.lines.line_start_offset(line);
        let end = if line + 1 < self.lines.line_count() {
            self.lines.line_start_offset(line + 1)
        } else {
            self.pieces.len()
        };
        let tail_start = end.saturating_sub(2).max(start);
        let tail = self.pieces.read_range(tail_start, end - tail_start);
        let mut content_end = end;
        if tail.last() == Some(&b'\n') {
            content_end -= 1;
            if tail.len() == 2 && tail[0] == b'\r' {
                content_end -= 1;
            }
        } else if tail.last() == Some(&b'\r') {
            content_end -= 1;
        }
        (start, content_end)
    }

    /// Insert `text` on `line` at global byte offset `byte_offset`,
    /// clamped into the line's span. Both structures update or neither
    /// does; this cannot fail.
    pub fn insert_text(&mut self, line: usize, byte_offset: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let (start, end) = self.line_span(line);
        let pos = byte_offset.clamp(start, end);

        self.pieces.insert(pos, text.as_bytes());
        self.lines.on_insert(&self.pieces, pos, text.as_bytes());
        self.dirty = true;
        self.version += 1;
    }

    /// Delete `byte_count` bytes starting on `line` at `byte_offset`
    /// (clamped into the line's span; the count is clamped to document
    /// end).
    pub fn delete_range(&mut self, line: usize, byte_offset: usize, byte_count: usize) {
        let (start, end) = self.line_span(line);
        let pos = byte_offset.clamp(start, end.max(start));
        let count = byte_count.min(self.pieces.len().saturating_sub(pos));
        if count == 0 {
            return;
        }

        // The index needs to see what was removed to know whether any
        // newline went with it.
        let removed = self.pieces.read_range(pos, count);
        self.pieces.delete(pos, count);
        self.lines.on_delete(&self.pieces, pos, &removed);
        self.dirty = true;
        self.version += 1;
    }

    /// The text of `line`, UTF-8 decoded (lossy on malformed bytes), with
    /// the trailing line break trimmed. Out-of-range lines are empty.
    pub fn get_line_text(&self, line: usize) -> String {
        if line >= self.lines.line_count() {
            return String::new();
        }
        let start = self.lines.line_start_offset(line);
        let end = if line + 1 < self.lines.line_count() {
            self.lines.line_start_offset(line + 1)
        } else {
            self.pieces.len()
        };
        let bytes = self.pieces.read_range(start, end - start);
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if text.ends_with('\n') {
            text.pop();
        }
        if text.ends_with('\r') {
            text.pop();
        }
        text
    }

    /// Byte length of the character at `offset`; 0 at document end.
    /// Malformed bytes step 1.
    pub fn next_char_len(&self, offset: usize) -> usize {
        let window = self.pieces.read_range(offset, 4);
        utf8::next_char_byte_len(&window, 0)
    }

    /// Byte length of the character ending just before `offset`; 0 at
    /// document start.
    pub fn prev_char_len(&self, offset: usize) -> usize {
        let offset = offset.min(self.pieces.len());
        let lookback = offset.min(4);
        let window = self.pieces.read_range(offset - lookback, lookback);
        utf8::prev_char_byte_len(&window, window.len())
    }

    /// The full document content. Used for save and snapshots.
    pub fn full_text(&self) -> Vec<u8> {
        self.pieces.build_full_text()
    }

    /// Freeze the current content for a background reader.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            text: self.pieces.build_full_text(),
        }
    }

    /// Save to the document's path. See [`Document::save_as`].
    pub fn save(&mut self) -> Result<(), Error> {
        let path = self.path.clone().ok_or(Error::NoPath)?;
        self.save_as(&path)
    }

    /// Write the full text to a temp file next to `path`, atomically
    /// replace the target, then reload so the document is backed by the
    /// new on-disk snapshot instead of the old mapping plus add buffer.
    ///
    /// The mapping must be released before the replace; if anything fails
    /// after that point the content is restored from the built text, so
    /// the document is never lost.
    pub fn save_as(&mut self, path: &Path) -> Result<(), Error> {
        let text = self.pieces.build_full_text();

        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))
            .map_err(|source| Error::Save {
                path: path.to_path_buf(),
                source,
            })?;
        tmp.write_all(&text)
            .and_then(|_| tmp.flush())
            .map_err(|source| Error::Save {
                path: path.to_path_buf(),
                source,
            })?;

        // The mapped original must be unmapped before the target file can
        // be replaced on platforms that lock mapped files.
        self.pieces.release_mapping();

        let replaced = tmp
            .persist(path)
            .map_err(|e| e.error)
            .and_then(|_| {
                let mut pieces = PieceTable::new();
                pieces.load(path).map_err(io_of)?;
                Ok(pieces)
            });

        match replaced {
            Ok(pieces) => {
                self.pieces = pieces;
                self.lines.rebuild(&self.pieces);
                self.path = Some(path.to_path_buf());
                self.dirty = false;
                self.version += 1;
                debug!("saved {} ({} bytes)", path.display(), text.len());
                Ok(())
            }
            Err(source) => {
                // Fall back to the add buffer so the user's content
                // survives the failed save.
                warn!("save of {} failed: {}", path.display(), source);
                self.pieces.restore_from_bytes(&text);
                self.lines.rebuild(&self.pieces);
                self.version += 1;
                Err(Error::Save {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

fn io_of(err: Error) -> std::io::Error {
    match err {
        Error::Open { source, .. } | Error::Save { source, .. } => source,
        Error::NoPath => std::io::Error::other("document has no backing file path"),
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
