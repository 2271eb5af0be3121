//! JET4's "compressed UCS-2" text codec.
//!
//! Predominantly-ASCII UTF-16 text is stored at roughly half size by
//! emitting single bytes with an implicit `0x00` high byte, with an in-stream
//! `0x00` marker toggling in and out of that compressed mode. Callers strip
//! the leading `0xFF 0xFE` marker that signals a compressed column before
//! calling [`decompress`]; the marker itself is not part of the compressed
//! byte stream.

/// Expands a compressed-UCS-2 byte stream into UTF-16LE bytes.
///
/// The destination budget is `2 * src.len()` bytes, but the actual output is
/// usually shorter since most bytes expand 1:1 rather than 1:2.
pub fn decompress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() * 2);
    let mut compressed = true;
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b == 0x00 {
            compressed = !compressed;
            i += 1;
        } else if compressed {
            out.push(b);
            out.push(0x00);
            i += 1;
        } else if i + 1 < src.len() {
            out.push(src[i]);
            out.push(src[i + 1]);
            i += 2;
        } else {
            break;
        }
    }
    out
}

/// Decodes a JET4 text column into a `String`.
///
/// If `bytes` begins with the `0xFF 0xFE` compression marker, the remainder
/// is passed through [`decompress`] before being interpreted as UTF-16LE;
/// otherwise `bytes` is interpreted directly as UTF-16LE.
pub fn decode_text(bytes: &[u8]) -> String {
    let utf16le = if bytes.starts_with(&[0xFF, 0xFE]) {
        decompress(&bytes[2..])
    } else {
        bytes.to_vec()
    };
    utf16le_bytes_to_string(&utf16le)
}

fn utf16le_bytes_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decodes a JET3 text column (latin1, an explicit approximation of cp1252
/// per the format's own documentation; see `SPEC_FULL.md` Design Notes §9).
pub fn decode_latin1(bytes: &[u8]) -> String {
    let (text, _enc, _had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    text.into_owned()
}

/// Encodes an ASCII string as a compressed-UCS-2 stream with compression on
/// throughout (no embedded toggles). Used only by tests, to build the
/// round-trip fixtures called for in `SPEC_FULL.md` §8.
#[cfg(test)]
fn compress_ascii(s: &str) -> Vec<u8> {
    s.bytes().collect()
}
