//! Line-by-line text search over a frozen document snapshot.
//!
//! Mutation stays on the owning thread; a search runs against a
//! [`Snapshot`] on a background thread, checks a cancellation flag once
//! per line, and streams hits over a channel. The caller compares the
//! snapshot's version with [`Document::version`](crate::Document::version)
//! and discards hits from a stale scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver};

use crate::document::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    /// Line number (0-indexed).
    pub line: usize,
    /// Byte column within the line.
    pub column: usize,
    /// Match length in bytes.
    pub len: usize,
}

/// Scan the snapshot for every occurrence of `needle`. Returns the hits
/// found before cancellation (checked once per line).
pub fn search(snapshot: &Snapshot, needle: &str, cancel: &AtomicBool) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    scan(snapshot, needle, cancel, |hit| {
        hits.push(hit);
        true
    });
    hits
}

/// Run the search on its own thread, streaming hits as they are found.
/// Dropping the receiver or setting `cancel` stops the scan.
pub fn spawn_search(
    snapshot: Snapshot,
    needle: String,
    cancel: Arc<AtomicBool>,
) -> (JoinHandle<()>, Receiver<SearchHit>) {
    let (tx, rx) = channel::unbounded();
    let handle = std::thread::spawn(move || {
        scan(&snapshot, &needle, &cancel, |hit| tx.send(hit).is_ok());
    });
    (handle, rx)
}

fn scan(
    snapshot: &Snapshot,
    needle: &str,
    cancel: &AtomicBool,
    mut emit: impl FnMut(SearchHit) -> bool,
) {
    if needle.is_empty() {
        return;
    }
    let needle = needle.as_bytes();

    for (line, text) in snapshot.text.split(|&b| b == b'\n').enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let mut from = 0;
        while let Some(pos) = find(&text[from..], needle) {
            let column = from + pos;
            if !emit(SearchHit {
                line,
                column,
                len: needle.len(),
            }) {
                return;
            }
            from = column + needle.len();
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_of(text: &str) -> Snapshot {
        Snapshot {
            version: 1,
            text: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_finds_hits_with_line_and_column() {
        let snap = snapshot_of("hay hay\nneedle\nmore needle here");
        let cancel = AtomicBool::new(false);
        let hits = search(&snap, "needle", &cancel);

        assert_eq!(
            hits,
            vec![
                SearchHit {
                    line: 1,
                    column: 0,
                    len: 6
                },
                SearchHit {
                    line: 2,
                    column: 5,
                    len: 6
                },
            ]
        );
    }

    #[test]
    fn test_multiple_hits_per_line() {
        let snap = snapshot_of("ab ab ab");
        let cancel = AtomicBool::new(false);
        let hits = search(&snap, "ab", &cancel);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[2].column, 6);
    }

    #[test]
    fn test_overlapping_matches_advance_past_match() {
        let snap = snapshot_of("aaaa");
        let cancel = AtomicBool::new(false);
        let hits = search(&snap, "aa", &cancel);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_empty_needle_matches_nothing() {
        let snap = snapshot_of("text");
        let cancel = AtomicBool::new(false);
        assert!(search(&snap, "", &cancel).is_empty());
    }

    #[test]
    fn test_cancellation_stops_scan() {
        let snap = snapshot_of("x\nx\nx\nx");
        let cancel = AtomicBool::new(true);
        assert!(search(&snap, "x", &cancel).is_empty());
    }

    #[test]
    fn test_spawned_search_streams_hits() {
        let snap = snapshot_of("alpha\nbeta\nalpha beta");
        let cancel = Arc::new(AtomicBool::new(false));
        let (handle, rx) = spawn_search(snap, "beta".to_string(), cancel);

        let hits: Vec<SearchHit> = rx.iter().collect();
        handle.join().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].line, 1);
        assert_eq!(hits[1].line, 2);
        assert_eq!(hits[1].column, 6);
    }
}
