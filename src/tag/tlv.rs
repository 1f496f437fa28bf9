// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Minimal BER-TLV helpers for the installation parameters.
//!
//! Tags are a single byte. Lengths are encoded as `0x00..=0x7F` in one byte, or as `0x81 LL` and
//! `0x82 LL LL` for longer values.

use byteorder::{BigEndian, ByteOrder};

const LENGTH_ONE_BYTE: u8 = 0x81;
const LENGTH_TWO_BYTES: u8 = 0x82;

/// Decodes the length field starting at `pos`.
///
/// Returns the encoded length and the width of the length field itself.
pub fn decode_length(buffer: &[u8], pos: usize) -> Option<(usize, usize)> {
    let first = *buffer.get(pos)?;
    match first {
        0x00..=0x7F => Some((first as usize, 1)),
        LENGTH_ONE_BYTE => Some((*buffer.get(pos + 1)? as usize, 2)),
        LENGTH_TWO_BYTES => {
            let field = buffer.get(pos + 1..pos + 3)?;
            Some((BigEndian::read_u16(field) as usize, 3))
        }
        _ => None,
    }
}

// Returns the total size of the TLV starting at `pos`, if it fits into the buffer.
fn entry_size(buffer: &[u8], pos: usize) -> Option<usize> {
    let (length, width) = decode_length(buffer, pos + 1)?;
    let size = 1 + width + length;
    if pos + size > buffer.len() {
        return None;
    }
    Some(size)
}

/// Checks that the buffer is a sequence of complete TLVs without trailing bytes.
pub fn is_consistent(buffer: &[u8]) -> bool {
    let mut pos = 0;
    while pos < buffer.len() {
        match entry_size(buffer, pos) {
            Some(size) => pos += size,
            None => return false,
        }
    }
    true
}

/// Returns the offset of the first TLV with the given tag.
///
/// The buffer must be consistent, see `is_consistent`.
pub fn find_tag(buffer: &[u8], tag: u8) -> Option<usize> {
    let mut pos = 0;
    while pos < buffer.len() {
        if buffer[pos] == tag {
            return Some(pos);
        }
        pos += entry_size(buffer, pos)?;
    }
    None
}

/// Returns the value of the first TLV with the given tag.
pub fn find_value(buffer: &[u8], tag: u8) -> Option<&[u8]> {
    let pos = find_tag(buffer, tag)?;
    let (length, width) = decode_length(buffer, pos + 1)?;
    let start = pos + 1 + width;
    buffer.get(start..start + length)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_length() {
        assert_eq!(decode_length(&[0x00], 0), Some((0, 1)));
        assert_eq!(decode_length(&[0x7F], 0), Some((0x7F, 1)));
        assert_eq!(decode_length(&[0x81, 0x80], 0), Some((0x80, 2)));
        assert_eq!(decode_length(&[0x82, 0x01, 0x00], 0), Some((0x100, 3)));
        assert_eq!(decode_length(&[0x12, 0x82, 0x01, 0x00], 1), Some((0x100, 3)));
    }

    #[test]
    fn test_decode_length_invalid() {
        assert_eq!(decode_length(&[], 0), None);
        assert_eq!(decode_length(&[0x80], 0), None);
        assert_eq!(decode_length(&[0x83, 0x00, 0x00, 0x01], 0), None);
        assert_eq!(decode_length(&[0x81], 0), None);
        assert_eq!(decode_length(&[0x82, 0x01], 0), None);
    }

    #[test]
    fn test_is_consistent() {
        assert!(is_consistent(&[]));
        assert!(is_consistent(&[0x80, 0x00]));
        assert!(is_consistent(&[0x81, 0x02, 0x00, 0xFF, 0x82, 0x02, 0x01, 0x00]));
        let mut long = vec![0x80, 0x81, 0x80];
        long.extend_from_slice(&[0x42; 0x80]);
        assert!(is_consistent(&long));
    }

    #[test]
    fn test_is_inconsistent() {
        // Missing length.
        assert!(!is_consistent(&[0x80]));
        // Value shorter than announced.
        assert!(!is_consistent(&[0x80, 0x03, 0x61, 0x62]));
        // Trailing byte after a complete TLV.
        assert!(!is_consistent(&[0x80, 0x01, 0x61, 0x82]));
        // Unsupported length encoding.
        assert!(!is_consistent(&[0x80, 0x84, 0x00, 0x00, 0x00, 0x01, 0x61]));
    }

    #[test]
    fn test_find_tag() {
        let buffer = [0x80, 0x01, 0x81, 0x81, 0x02, 0x00, 0xFF];
        // The value byte 0x81 of the first TLV is not mistaken for a tag.
        assert_eq!(find_tag(&buffer, 0x80), Some(0));
        assert_eq!(find_tag(&buffer, 0x81), Some(3));
        assert_eq!(find_tag(&buffer, 0x82), None);
    }

    #[test]
    fn test_find_value() {
        let buffer = [0x99, 0x00, 0x80, 0x03, 0x61, 0x62, 0x63];
        assert_eq!(find_value(&buffer, 0x80), Some(&b"abc"[..]));
        assert_eq!(find_value(&buffer, 0x99), Some(&[][..]));
        assert_eq!(find_value(&buffer, 0x81), None);
    }
}
