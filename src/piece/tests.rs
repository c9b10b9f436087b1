use std::fs;
use std::io::Write;

use crate::piece::PieceTable;

fn table_with(text: &str) -> PieceTable {
    let mut pt = PieceTable::new();
    pt.insert(0, text.as_bytes());
    pt
}

#[test]
fn test_load_single_original_piece() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"hello\nworld\n").unwrap();
    file.flush().unwrap();

    let mut pt = PieceTable::new();
    pt.load(file.path()).unwrap();

    assert_eq!(pt.len(), 12);
    assert_eq!(pt.piece_count(), 1);
    assert_eq!(pt.build_full_text(), b"hello\nworld\n");
}

#[test]
fn test_load_empty_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut pt = PieceTable::new();
    pt.load(file.path()).unwrap();

    assert_eq!(pt.len(), 0);
    assert_eq!(pt.piece_count(), 0);
    assert!(pt.build_full_text().is_empty());
}

#[test]
fn test_load_missing_file_fails() {
    let mut pt = PieceTable::new();
    assert!(pt.load("/nonexistent/bigtext_missing".as_ref()).is_err());
}

#[test]
fn test_insert_middle_splits_piece() {
    let mut pt = table_with("hello world");
    // Content came from one coalesced add piece; inserting from a new add
    // position splits it.
    pt.insert(5, b",");
    assert_eq!(pt.build_full_text(), b"hello, world");
    assert_eq!(pt.len(), 12);
    assert!(pt.check_invariants());
}

#[test]
fn test_insert_clamps_past_end() {
    let mut pt = table_with("abc");
    pt.insert(999, b"!");
    assert_eq!(pt.build_full_text(), b"abc!");
}

#[test]
fn test_sequential_typing_coalesces() {
    let mut pt = PieceTable::new();
    for (i, b) in b"typing forward".iter().enumerate() {
        pt.insert(i, &[*b]);
    }
    assert_eq!(pt.build_full_text(), b"typing forward");
    // Forward typing appends contiguously to the add buffer, so the
    // pieces collapse into one.
    assert_eq!(pt.piece_count(), 1);
}

#[test]
fn test_delete_middle() {
    let mut pt = table_with("hello cruel world");
    pt.delete(5, 6);
    assert_eq!(pt.build_full_text(), b"hello world");
    assert_eq!(pt.len(), 11);
    assert!(pt.check_invariants());
}

#[test]
fn test_delete_clamps_range() {
    let mut pt = table_with("abc");
    pt.delete(1, 100);
    assert_eq!(pt.build_full_text(), b"a");

    // Entirely out of range is a no-op
    pt.delete(5, 3);
    assert_eq!(pt.build_full_text(), b"a");
}

#[test]
fn test_delete_everything() {
    let mut pt = table_with("abc");
    pt.delete(0, 3);
    assert_eq!(pt.len(), 0);
    assert_eq!(pt.piece_count(), 0);
    assert!(pt.check_invariants());
}

#[test]
fn test_delete_rejoins_neighbors() {
    let mut pt = table_with("abcd");
    pt.insert(2, b"XY");
    assert_eq!(pt.build_full_text(), b"abXYcd");
    pt.delete(2, 2);
    assert_eq!(pt.build_full_text(), b"abcd");
    // Removing the spliced-in piece leaves the two halves of the split
    // piece contiguous again, so they coalesce back into one.
    assert_eq!(pt.piece_count(), 1);
}

#[test]
fn test_read_range() {
    let mut pt = table_with("hello world");
    pt.insert(5, b" there,");
    assert_eq!(pt.read_range(6, 5), b"there");
    assert_eq!(pt.read_range(0, 5), b"hello");
    // Short read at document end
    assert_eq!(pt.read_range(13, 100), b"world");
    assert_eq!(pt.read_range(100, 5), b"");
}

#[test]
fn test_edits_across_original_and_add() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"one\ntwo\nthree\n").unwrap();
    file.flush().unwrap();

    let mut pt = PieceTable::new();
    pt.load(file.path()).unwrap();

    pt.insert(4, b"TWO? ");
    pt.delete(9, 4); // remove the original "two\n"
    assert_eq!(pt.build_full_text(), b"one\nTWO? three\n");
    assert!(pt.check_invariants());
}

#[test]
fn test_release_mapping_preserves_content() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"alpha\nbeta\n").unwrap();
    file.flush().unwrap();

    let mut pt = PieceTable::new();
    pt.load(file.path()).unwrap();
    pt.insert(0, b">> ");

    let before = pt.build_full_text();
    pt.release_mapping();
    assert_eq!(pt.build_full_text(), before);
    assert!(pt.check_invariants());

    // The source file can now change without affecting the table
    fs::write(file.path(), b"overwritten").unwrap();
    assert_eq!(pt.build_full_text(), before);
}

#[test]
fn test_restore_from_bytes() {
    let mut pt = table_with("old content");
    pt.restore_from_bytes(b"restored\ntext");
    assert_eq!(pt.build_full_text(), b"restored\ntext");
    assert_eq!(pt.len(), 13);
    assert!(pt.check_invariants());
}
