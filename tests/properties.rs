//! Randomized edit sequences checking the core invariants: piece tiling,
//! length bookkeeping, full-text round-trip, line-index consistency, and
//! UTF-8 boundary walks.

use proptest::prelude::*;

use bigtext::line_index::LineIndex;
use bigtext::piece::PieceTable;
use bigtext::utf8;
use bigtext::Document;

#[derive(Debug, Clone)]
enum Op {
    Insert(usize, String),
    Delete(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let text = prop_oneof![
        4 => "[a-z ]{1,8}",
        2 => "[a-z\\n]{1,8}",
        1 => "(é|あ|🦀){1,3}",
    ];
    prop_oneof![
        3 => (any::<usize>(), text).prop_map(|(pos, t)| Op::Insert(pos, t)),
        2 => (any::<usize>(), 1..24usize).prop_map(|(pos, len)| Op::Delete(pos, len)),
    ]
}

fn naive_line_starts(text: &[u8]) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, &b) in text.iter().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_edits_keep_piece_table_and_index_consistent(
        ops in prop::collection::vec(op_strategy(), 1..40)
    ) {
        let mut pt = PieceTable::new();
        let mut index = LineIndex::new();
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(pos, text) => {
                    let pos = pos % (model.len() + 1);
                    // Keep the model UTF-8-shaped: snap to a char boundary
                    let pos = snap_to_boundary(&model, pos);
                    pt.insert(pos, text.as_bytes());
                    index.on_insert(&pt, pos, text.as_bytes());
                    model.splice(pos..pos, text.bytes());
                }
                Op::Delete(pos, len) => {
                    if model.is_empty() {
                        continue;
                    }
                    let pos = snap_to_boundary(&model, pos % model.len());
                    let end = snap_to_boundary(&model, (pos + len).min(model.len()));
                    if end <= pos {
                        continue;
                    }
                    let removed = pt.read_range(pos, end - pos);
                    pt.delete(pos, end - pos);
                    index.on_delete(&pt, pos, &removed);
                    model.drain(pos..end);
                }
            }

            // Piece tiling + length invariants
            prop_assert!(pt.check_invariants());
            prop_assert_eq!(pt.len(), model.len());
            prop_assert_eq!(pt.build_full_text(), model.clone());

            // Line index agrees with a from-scratch scan
            let expected = naive_line_starts(&model);
            prop_assert_eq!(index.line_count(), expected.len());
            for (line, &start) in expected.iter().enumerate() {
                prop_assert_eq!(index.line_start_offset(line), start);
            }
            prop_assert_eq!(index.line_start_offset(expected.len()), model.len());
        }
    }

    #[test]
    fn document_lines_round_trip_against_full_text(
        ops in prop::collection::vec(op_strategy(), 1..30)
    ) {
        let mut doc = Document::new();

        for op in ops {
            match op {
                Op::Insert(pos, text) => {
                    let line = pos % doc.line_count();
                    let (start, end) = doc.line_span(line);
                    let offset = start + (pos % (end - start + 1));
                    let offset = snap_to_boundary(&doc.full_text(), offset);
                    doc.insert_text(line, offset, &text);
                }
                Op::Delete(pos, len) => {
                    let line = pos % doc.line_count();
                    let (start, _) = doc.line_span(line);
                    doc.delete_range(line, start, len);
                }
            }
        }

        // Reconstruct every line from the raw text and compare
        let text = doc.full_text();
        let decoded = String::from_utf8_lossy(&text);
        let expected: Vec<&str> = decoded.split('\n').collect();
        prop_assert_eq!(doc.line_count(), expected.len());
        for (i, want) in expected.iter().enumerate() {
            let want = want.strip_suffix('\r').unwrap_or(want);
            prop_assert_eq!(doc.get_line_text(i), want);
        }
    }

    #[test]
    fn utf8_walk_covers_any_valid_document(text in "[a-zé あ🦀\\n]{0,64}") {
        let bytes = text.as_bytes();

        let mut pos = 0usize;
        while pos < bytes.len() {
            let step = utf8::next_char_byte_len(bytes, pos);
            prop_assert!(step >= 1);
            pos += step;
        }
        prop_assert_eq!(pos, bytes.len());

        while pos > 0 {
            let step = utf8::prev_char_byte_len(bytes, pos);
            prop_assert!(step >= 1);
            pos -= step;
        }
        prop_assert_eq!(pos, 0);
    }
}

fn snap_to_boundary(bytes: &[u8], mut pos: usize) -> usize {
    while pos > 0 && pos < bytes.len() && bytes[pos] & 0b1100_0000 == 0b1000_0000 {
        pos -= 1;
    }
    pos
}
