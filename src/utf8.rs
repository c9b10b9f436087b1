//! UTF-8 boundary helpers.
//!
//! Cursor movement and deletion work in bytes, so they need to know how
//! wide the character at a given offset is. Malformed bytes classify as a
//! 1-byte step so navigation always makes progress.

/// Byte length of the character starting at `offset`, classified from the
/// lead byte. Returns 1 for malformed leads and clamps to the available
/// bytes. Returns 0 only when `offset` is at or past the end.
pub fn next_char_byte_len(bytes: &[u8], offset: usize) -> usize {
    if offset >= bytes.len() {
        return 0;
    }

    let avail = bytes.len() - offset;
    let b = bytes[offset];

    // ASCII (0xxxxxxx)
    if b & 0b1000_0000 == 0 {
        return 1;
    }
    // 110xxxxx
    if b & 0b1110_0000 == 0b1100_0000 {
        return 2.min(avail);
    }
    // 1110xxxx
    if b & 0b1111_0000 == 0b1110_0000 {
        return 3.min(avail);
    }
    // 11110xxx
    if b & 0b1111_1000 == 0b1111_0000 {
        return 4.min(avail);
    }

    // Continuation or invalid lead byte
    1
}

/// Byte length of the character ending just before `offset_exclusive`.
/// Scans backward past continuation bytes (10xxxxxx), at most 4 bytes.
/// Never returns 0 for a non-empty prefix, so backward movement cannot
/// stall on malformed input.
pub fn prev_char_byte_len(bytes: &[u8], offset_exclusive: usize) -> usize {
    let end = offset_exclusive.min(bytes.len());
    if end == 0 {
        return 0;
    }

    let mut len = 1;
    let mut pos = end - 1;
    while pos > 0 && len < 4 {
        if bytes[pos] & 0b1100_0000 != 0b1000_0000 {
            break;
        }
        len += 1;
        pos -= 1;
    }

    // If the scan ran off the front while still on continuation bytes the
    // run is malformed; the distance scanned is still a safe step.
    len
}
