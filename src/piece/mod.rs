//! Piece-table content model.
//!
//! The document is an ordered list of pieces, each referencing a run of
//! bytes in either the read-only memory map of the original file or the
//! append-only add buffer. Unchanged file content is never copied; edits
//! split pieces at the edit boundary and splice in references, so a
//! single keystroke costs O(pieces touched) regardless of file size.

#[cfg(test)]
mod tests;

use std::fs::File;
use std::path::Path;

use log::debug;
use memmap2::Mmap;

use crate::error::Error;

/// Which backing store a piece references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceSource {
    /// The memory-mapped original file, immutable for the buffer's lifetime.
    Original,
    /// The append-only add buffer; bytes are appended, never rewritten.
    Added,
}

/// A contiguous run of bytes from one source.
#[derive(Debug, Clone, Copy)]
pub struct Piece {
    pub source: PieceSource,
    pub start: usize,
    pub len: usize,
}

pub struct PieceTable {
    original: Option<Mmap>,
    add: Vec<u8>,
    pieces: Vec<Piece>,
    len: usize,
}

impl PieceTable {
    pub fn new() -> Self {
        Self {
            original: None,
            add: Vec::with_capacity(1024),
            pieces: Vec::new(),
            len: 0,
        }
    }

    /// Open `path` read-only, memory-map it, and initialize the piece list
    /// to a single piece spanning the whole file. Replaces any previous
    /// state; the prior mapping is released first.
    pub fn load(&mut self, path: &Path) -> Result<(), Error> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let file_len = file
            .metadata()
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len() as usize;

        self.reset();

        if file_len > 0 {
            // Mapping a zero-length file fails on some platforms; an empty
            // document simply has no pieces.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;
            self.original = Some(mmap);
            self.pieces.push(Piece {
                source: PieceSource::Original,
                start: 0,
                len: file_len,
            });
            self.len = file_len;
        }

        debug!("loaded {} ({} bytes)", path.display(), file_len);
        Ok(())
    }

    /// Clear all state but keep the add buffer's allocation.
    pub fn reset(&mut self) {
        self.original = None;
        self.add.clear();
        self.pieces.clear();
        self.len = 0;
    }

    /// Drop the original-file mapping, converting every piece that
    /// references it into add-buffer pieces first. Required before the
    /// underlying file can be atomically replaced on platforms that lock
    /// mapped files.
    pub fn release_mapping(&mut self) {
        if self.original.is_none() {
            return;
        }
        let mut migrated: Vec<Piece> = Vec::with_capacity(self.pieces.len());
        for piece in &self.pieces {
            match piece.source {
                PieceSource::Added => migrated.push(*piece),
                PieceSource::Original => {
                    let start = self.add.len();
                    let mmap = self.original.as_ref().unwrap();
                    self.add
                        .extend_from_slice(&mmap[piece.start..piece.start + piece.len]);
                    migrated.push(Piece {
                        source: PieceSource::Added,
                        start,
                        len: piece.len,
                    });
                }
            }
        }
        self.pieces = migrated;
        self.original = None;
        self.coalesce_all();
    }

    /// Replace all content with `bytes`, backed by the add buffer. Used to
    /// restore a document when a save fails after the mapping was released.
    pub fn restore_from_bytes(&mut self, bytes: &[u8]) {
        self.reset();
        if !bytes.is_empty() {
            self.add.extend_from_slice(bytes);
            self.pieces.push(Piece {
                source: PieceSource::Added,
                start: 0,
                len: bytes.len(),
            });
            self.len = bytes.len();
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Insert `bytes` at document offset `pos` (clamped to `[0, len]`).
    pub fn insert(&mut self, pos: usize, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let pos = pos.min(self.len);

        let add_start = self.add.len();
        self.add.extend_from_slice(bytes);

        let added = Piece {
            source: PieceSource::Added,
            start: add_start,
            len: bytes.len(),
        };

        if self.pieces.is_empty() {
            self.pieces.push(added);
            self.len = bytes.len();
            return;
        }

        let (idx, inner) = self.find_piece_at(pos);
        let target = self.pieces[idx];

        let mut splice: Vec<Piece> = Vec::with_capacity(3);
        if inner > 0 {
            splice.push(Piece {
                source: target.source,
                start: target.start,
                len: inner,
            });
        }
        splice.push(added);
        if inner < target.len {
            splice.push(Piece {
                source: target.source,
                start: target.start + inner,
                len: target.len - inner,
            });
        }

        self.pieces.splice(idx..idx + 1, splice);
        self.len += bytes.len();
        self.coalesce_around(idx);
    }

    /// Delete `count` bytes starting at `pos`; the range is clamped into
    /// document bounds.
    pub fn delete(&mut self, pos: usize, count: usize) {
        if count == 0 || self.len == 0 || pos >= self.len {
            return;
        }
        let end = (pos + count).min(self.len);

        // Split at both boundaries so the range covers whole pieces.
        let start_idx = self.split_at(pos);
        let end_idx = self.split_at(end);

        self.pieces.drain(start_idx..end_idx);
        self.len -= end - pos;
        self.coalesce_around(start_idx.saturating_sub(1));
    }

    /// Read up to `count` bytes starting at `pos`. Returns fewer bytes
    /// than requested only when the range runs past document end.
    pub fn read_range(&self, pos: usize, count: usize) -> Vec<u8> {
        if count == 0 || pos >= self.len {
            return Vec::new();
        }
        let end = (pos + count).min(self.len);
        let mut out = Vec::with_capacity(end - pos);

        let mut cur = 0usize;
        for piece in &self.pieces {
            let next = cur + piece.len;
            if next <= pos {
                cur = next;
                continue;
            }
            if cur >= end {
                break;
            }
            let seg_start = pos.max(cur);
            let seg_end = end.min(next);
            let skip = seg_start - cur;
            let take = seg_end - seg_start;
            out.extend_from_slice(&self.piece_bytes(piece)[skip..skip + take]);
            cur = next;
        }
        out
    }

    /// Concatenate all pieces in order. Used for save and snapshots.
    pub fn build_full_text(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for piece in &self.pieces {
            out.extend_from_slice(self.piece_bytes(piece));
        }
        out
    }

    /// Iterator over each piece's byte slice, in document order. Lets the
    /// line index stream the document without materializing it.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.pieces.iter().map(move |p| self.piece_bytes(p))
    }

    fn piece_bytes(&self, piece: &Piece) -> &[u8] {
        match piece.source {
            PieceSource::Original => {
                // A piece only references the original source while the
                // mapping is alive.
                let mmap = self
                    .original
                    .as_ref()
                    .expect("original piece without a mapping");
                &mmap[piece.start..piece.start + piece.len]
            }
            PieceSource::Added => &self.add[piece.start..piece.start + piece.len],
        }
    }

    /// Find the piece containing document offset `pos`, returning the
    /// piece index and the offset inside it. `pos == len` maps to the end
    /// of the last piece.
    fn find_piece_at(&self, pos: usize) -> (usize, usize) {
        let mut cur = 0usize;
        for (i, piece) in self.pieces.iter().enumerate() {
            let next = cur + piece.len;
            if pos < next {
                return (i, pos - cur);
            }
            cur = next;
        }
        let last = self.pieces.len() - 1;
        (last, self.pieces[last].len)
    }

    /// Ensure a piece boundary exists at `pos`; returns the index of the
    /// piece that starts at `pos` (or `pieces.len()` when `pos == len`).
    fn split_at(&mut self, pos: usize) -> usize {
        if pos >= self.len {
            return self.pieces.len();
        }
        let (idx, inner) = self.find_piece_at(pos);
        if inner == 0 {
            return idx;
        }
        let piece = self.pieces[idx];
        debug_assert!(inner < piece.len);

        self.pieces[idx] = Piece {
            source: piece.source,
            start: piece.start,
            len: inner,
        };
        self.pieces.insert(
            idx + 1,
            Piece {
                source: piece.source,
                start: piece.start + inner,
                len: piece.len - inner,
            },
        );
        idx + 1
    }

    /// Merge neighbors around `index` that reference contiguous runs of
    /// the same source. Bounds piece-list growth under sustained typing:
    /// repeated inserts at an advancing cursor collapse into one growing
    /// add piece.
    fn coalesce_around(&mut self, index: usize) {
        if self.pieces.is_empty() {
            return;
        }
        let mut i = index.min(self.pieces.len() - 1);

        while i > 0 {
            let a = self.pieces[i - 1];
            let b = self.pieces[i];
            if a.source == b.source && a.start + a.len == b.start {
                self.pieces[i - 1] = Piece {
                    source: a.source,
                    start: a.start,
                    len: a.len + b.len,
                };
                self.pieces.remove(i);
                i -= 1;
            } else {
                break;
            }
        }

        while i + 1 < self.pieces.len() {
            let a = self.pieces[i];
            let b = self.pieces[i + 1];
            if a.source == b.source && a.start + a.len == b.start {
                self.pieces[i] = Piece {
                    source: a.source,
                    start: a.start,
                    len: a.len + b.len,
                };
                self.pieces.remove(i + 1);
            } else {
                break;
            }
        }
    }

    fn coalesce_all(&mut self) {
        let mut i = 0;
        while i + 1 < self.pieces.len() {
            let a = self.pieces[i];
            let b = self.pieces[i + 1];
            if a.source == b.source && a.start + a.len == b.start {
                self.pieces[i] = Piece {
                    source: a.source,
                    start: a.start,
                    len: a.len + b.len,
                };
                self.pieces.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }

    /// Verify the tiling invariant: pieces partition `[0, len)` with no
    /// gaps, overlaps, or zero-length entries. Test support.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> bool {
        let mut total = 0usize;
        for piece in &self.pieces {
            if piece.len == 0 {
                return false;
            }
            total += piece.len;
        }
        total == self.len
    }
}

impl Default for PieceTable {
    fn default() -> Self {
        Self::new()
    }
}
