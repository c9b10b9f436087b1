//! Block-structured line index.
//!
//! The document is partitioned into blocks of roughly 128 KiB, each
//! holding the byte offsets (relative to the block start) of every line
//! start inside it. Blocks are cut only immediately after a `\n`, so a
//! block start is always a line start and always a UTF-8 boundary.
//!
//! Edits that change no line count (ordinary typing) are absorbed by a
//! Fenwick tree of signed byte deltas keyed by line number, without
//! touching block storage. Edits that add or remove newlines rescan only
//! the affected blocks from the piece table, then split or merge blocks
//! to keep them inside the size bounds.

pub mod fenwick;

use std::collections::BTreeMap;

use log::debug;

use crate::piece::PieceTable;
use fenwick::Fenwick;

pub const TARGET_BLOCK_BYTES: usize = 128 * 1024;
pub const MIN_BLOCK_BYTES: usize = 32 * 1024;
pub const MAX_BLOCK_BYTES: usize = 256 * 1024;

/// A contiguous byte range of the document plus the line starts inside
/// it. `line_starts[0]` is always 0. The final block additionally records
/// a line start equal to its byte length when the document ends with a
/// newline (the trailing empty line).
#[derive(Debug)]
struct LineBlock {
    doc_start: usize,
    byte_len: usize,
    start_line: usize,
    line_starts: Vec<u32>,
}

pub struct LineIndex {
    blocks: Vec<LineBlock>,
    fenwick: Fenwick,
    /// Same-line byte deltas not yet folded into block storage, keyed by
    /// the first line number they shift. Folded exactly before any
    /// structural change, then the Fenwick tree is reset.
    pending_lines: BTreeMap<usize, i64>,
    /// Byte-length drift per block index from the same pending edits.
    /// Block indices are stable between materializations.
    pending_block_len: BTreeMap<usize, i64>,
    line_count: usize,
    doc_len: usize,
}

impl LineIndex {
    /// An index over an empty document: one block, one line, zero bytes.
    pub fn new() -> Self {
        Self {
            blocks: vec![LineBlock {
                doc_start: 0,
                byte_len: 0,
                start_line: 0,
                line_starts: vec![0],
            }],
            fenwick: Fenwick::new(2),
            pending_lines: BTreeMap::new(),
            pending_block_len: BTreeMap::new(),
            line_count: 1,
            doc_len: 0,
        }
    }

    /// Full streaming scan of the piece table, re-partitioning the
    /// document into blocks of the target size. Used on load and as a
    /// correctness fallback.
    pub fn rebuild(&mut self, pt: &PieceTable) {
        self.blocks.clear();
        self.pending_lines.clear();
        self.pending_block_len.clear();
        self.doc_len = pt.len();

        let doc_len = pt.len();
        let mut block_start = 0usize;
        let mut start_line = 0usize;
        let mut locals: Vec<u32> = vec![0];
        let mut pos = 0usize;

        for chunk in pt.chunks() {
            for &byte in chunk {
                if byte == b'\n' {
                    let next_line_start = pos + 1;
                    let span = next_line_start - block_start;
                    if span >= TARGET_BLOCK_BYTES && next_line_start < doc_len {
                        let lines = locals.len();
                        self.blocks.push(LineBlock {
                            doc_start: block_start,
                            byte_len: span,
                            start_line,
                            line_starts: std::mem::replace(&mut locals, vec![0]),
                        });
                        start_line += lines;
                        block_start = next_line_start;
                    } else {
                        locals.push(span as u32);
                    }
                }
                pos += 1;
            }
        }

        self.blocks.push(LineBlock {
            doc_start: block_start,
            byte_len: doc_len - block_start,
            start_line,
            line_starts: locals,
        });

        self.recalc_from(0);
        self.fenwick.reset(self.line_count + 1);
        debug!(
            "line index rebuilt: {} lines in {} blocks over {} bytes",
            self.line_count,
            self.blocks.len(),
            doc_len
        );
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Byte offset of the start of `line`. Lines at or past the end clamp
    /// to the document length.
    pub fn line_start_offset(&self, line: usize) -> usize {
        if line >= self.line_count {
            return self.doc_len;
        }
        let block = &self.blocks[self.find_block_by_line(line)];
        let base = block.doc_start + block.line_starts[line - block.start_line] as usize;
        (base as i64 + self.fenwick.prefix_sum(line)) as usize
    }

    /// Greatest line whose start is at or before `offset`.
    pub fn line_containing_offset(&self, offset: usize) -> usize {
        let mut lo = 0usize;
        let mut hi = self.line_count;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.line_start_offset(mid) <= offset {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Account for an insertion of `bytes` at `offset`. The piece table
    /// must already contain the new bytes.
    pub fn on_insert(&mut self, pt: &PieceTable, offset: usize, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let offset = offset.min(self.doc_len);

        if !bytes.contains(&b'\n') {
            // Same-line length change: shift every later line by a delta,
            // never touching block storage.
            let line = self.line_containing_offset(offset);
            self.apply_same_line_delta(line, bytes.len() as i64);
            self.doc_len += bytes.len();
            return;
        }

        self.materialize();
        let bi = self.find_block_by_offset(offset);
        self.doc_len += bytes.len();
        self.blocks[bi].byte_len += bytes.len();
        self.rescan_block(pt, bi);
        self.normalize_at(bi);
        self.fenwick.reset(self.line_count + 1);
    }

    /// Account for a deletion at `offset`; `removed` is the byte content
    /// that was deleted, captured before the piece-table delete.
    pub fn on_delete(&mut self, pt: &PieceTable, offset: usize, removed: &[u8]) {
        if removed.is_empty() {
            return;
        }
        let offset = offset.min(self.doc_len);

        if !removed.contains(&b'\n') {
            let line = self.line_containing_offset(offset);
            self.apply_same_line_delta(line, -(removed.len() as i64));
            self.doc_len -= removed.len();
            return;
        }

        self.materialize();

        // Pre-delete coordinates: the deleted range may span blocks.
        let end = (offset + removed.len()).min(self.doc_len);
        let first = self.find_block_by_offset(offset);
        let mut last = self.find_block_by_offset(end.saturating_sub(1));
        // If the range ends exactly at a block boundary, the newline that
        // created that boundary is gone; fold the right neighbor in so it
        // still starts at a line start.
        if end == self.blocks[last].doc_start + self.blocks[last].byte_len
            && last + 1 < self.blocks.len()
        {
            last += 1;
        }

        let combined: usize = self.blocks[first..=last].iter().map(|b| b.byte_len).sum();
        self.blocks.drain(first + 1..=last);
        self.blocks[first].byte_len = combined - removed.len();
        self.doc_len -= removed.len();
        self.rescan_block(pt, first);
        self.normalize_at(first);
        self.fenwick.reset(self.line_count + 1);
    }

    fn apply_same_line_delta(&mut self, line: usize, delta: i64) {
        // An edit inside `line` shifts line starts from `line + 1` on.
        self.fenwick.add(line + 1, delta);
        *self.pending_lines.entry(line + 1).or_insert(0) += delta;
        let bi = self.find_block_by_line(line.min(self.line_count - 1));
        *self.pending_block_len.entry(bi).or_insert(0) += delta;
    }

    /// Fold all pending Fenwick deltas into block storage so stored
    /// offsets are exact again, then zero the tree. Cost is proportional
    /// to the block count plus the lines of blocks that saw edits.
    fn materialize(&mut self) {
        if self.pending_lines.is_empty() && self.pending_block_len.is_empty() {
            return;
        }

        let entries: Vec<(usize, i64)> =
            std::mem::take(&mut self.pending_lines).into_iter().collect();
        let mut e = 0usize;
        let mut run = 0i64;

        for block in &mut self.blocks {
            let s = block.start_line;
            let m = block.line_starts.len();

            while e < entries.len() && entries[e].0 <= s {
                run += entries[e].1;
                e += 1;
            }
            block.doc_start = (block.doc_start as i64 + run) as usize;

            if e < entries.len() && entries[e].0 < s + m {
                let mut inner = 0i64;
                for i in 0..m {
                    while e < entries.len() && entries[e].0 == s + i {
                        inner += entries[e].1;
                        e += 1;
                    }
                    if inner != 0 {
                        block.line_starts[i] = (block.line_starts[i] as i64 + inner) as u32;
                    }
                }
                run += inner;
            }
        }

        for (bi, delta) in std::mem::take(&mut self.pending_block_len) {
            let len = &mut self.blocks[bi].byte_len;
            *len = (*len as i64 + delta) as usize;
        }

        self.fenwick.reset(self.line_count + 1);
    }

    fn find_block_by_line(&self, line: usize) -> usize {
        self.blocks
            .partition_point(|b| b.start_line <= line)
            .saturating_sub(1)
    }

    /// Block containing byte `offset`. Only valid once pending deltas are
    /// materialized. `offset == doc_len` maps to the last block.
    fn find_block_by_offset(&self, offset: usize) -> usize {
        let idx = self
            .blocks
            .partition_point(|b| b.doc_start <= offset)
            .saturating_sub(1);
        idx.min(self.blocks.len() - 1)
    }

    /// Re-derive a block's line starts from current piece-table content.
    /// `doc_start` and `byte_len` must already describe the new range.
    fn rescan_block(&mut self, pt: &PieceTable, bi: usize) {
        let doc_start = self.blocks[bi].doc_start;
        let span = self.blocks[bi].byte_len;
        let data = pt.read_range(doc_start, span);
        debug_assert_eq!(data.len(), span);

        let is_tail = doc_start + span >= pt.len();
        let mut locals: Vec<u32> = vec![0];
        for (i, &byte) in data.iter().enumerate() {
            if byte == b'\n' {
                let nl = i + 1;
                // A line start at the very end of the span belongs to the
                // next block, except in the final block where it is the
                // trailing empty line.
                if nl < span || is_tail {
                    locals.push(nl as u32);
                }
            }
        }
        self.blocks[bi].line_starts = locals;
    }

    /// Restore the size bounds around block `bi` after a rescan, then
    /// renumber everything downstream.
    fn normalize_at(&mut self, bi: usize) {
        let mut from = bi;

        if self.blocks[bi].byte_len == 0 && self.blocks.len() > 1 {
            // A block that lost all its content is merged away, never
            // left as an empty shell.
            self.blocks.remove(bi);
            from = bi.min(self.blocks.len() - 1);
        } else {
            // Split oversized blocks; a split can leave either half still
            // oversized, so keep a watermark of indices to re-check.
            let mut i = bi;
            let mut watermark = bi;
            while i <= watermark {
                if self.blocks[i].byte_len > MAX_BLOCK_BYTES && self.split_block(i) {
                    watermark += 1;
                    continue;
                }
                i += 1;
            }

            // Merge an undersized block into its right neighbor while the
            // result stays within bounds.
            while self.blocks[bi].byte_len < MIN_BLOCK_BYTES
                && bi + 1 < self.blocks.len()
                && self.blocks[bi].byte_len + self.blocks[bi + 1].byte_len <= MAX_BLOCK_BYTES
            {
                self.merge_with_right(bi);
            }
        }

        self.recalc_from(from);
    }

    /// Split block `i` at the line start closest to its midpoint. Returns
    /// false when the block has no interior line start to split at (a
    /// single line larger than the block bound stays whole).
    fn split_block(&mut self, i: usize) -> bool {
        let block = &self.blocks[i];
        let target = block.byte_len / 2;

        let mut split: Option<(usize, usize)> = None; // (local index, offset)
        for (k, &local) in block.line_starts.iter().enumerate().skip(1) {
            let local = local as usize;
            if local >= block.byte_len {
                break; // trailing empty-line marker, not a cut point
            }
            match split {
                Some((_, best)) if local.abs_diff(target) >= best.abs_diff(target) => {}
                _ => split = Some((k, local)),
            }
        }
        let Some((k, cut)) = split else {
            return false;
        };

        let right_locals: Vec<u32> = block.line_starts[k..]
            .iter()
            .map(|&l| l - cut as u32)
            .collect();
        let right = LineBlock {
            doc_start: block.doc_start + cut,
            byte_len: block.byte_len - cut,
            start_line: block.start_line + k,
            line_starts: right_locals,
        };

        let block = &mut self.blocks[i];
        block.line_starts.truncate(k);
        block.byte_len = cut;
        self.blocks.insert(i + 1, right);
        true
    }

    fn merge_with_right(&mut self, i: usize) {
        let right = self.blocks.remove(i + 1);
        let block = &mut self.blocks[i];
        let shift = block.byte_len as u32;
        block
            .line_starts
            .extend(right.line_starts.iter().map(|&l| l + shift));
        block.byte_len += right.byte_len;
    }

    /// Recompute `doc_start`/`start_line` for blocks from `from` on, and
    /// refresh the cached line count.
    fn recalc_from(&mut self, from: usize) {
        let (mut doc_start, mut start_line) = if from == 0 {
            (0, 0)
        } else {
            let prev = &self.blocks[from - 1];
            (
                prev.doc_start + prev.byte_len,
                prev.start_line + prev.line_starts.len(),
            )
        };
        for block in &mut self.blocks[from..] {
            block.doc_start = doc_start;
            block.start_line = start_line;
            doc_start += block.byte_len;
            start_line += block.line_starts.len();
        }
        self.line_count = start_line;
    }
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}
