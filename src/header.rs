//! Reads the JET database file header.
//!
//! Unlike the rest of the format, the header is read before a [`PageReader`]
//! exists (the page size it needs to know is itself a header field), so this
//! module takes a raw byte slice rather than a page number.
//!
//! [`PageReader`]: crate::pager::PageReader

use crate::jet::Version;

#[derive(thiserror::Error, Debug, Clone, Copy)]
pub enum Error {
    #[error("database header is too short ({0} bytes)")]
    TooShort(usize),
    #[error("unknown database version byte 0x{0:02x}")]
    UnknownVersion(u8),
}

/// The header offset of the version byte, per the JET file format.
const VERSION_OFFSET: usize = 0x14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub version: Version,
    pub page_size: u32,
}

/// Detects the JET version and page size from the first bytes of the file.
///
/// `header_bytes` must contain at least `VERSION_OFFSET + 1` bytes; the
/// caller is expected to have read (at least) the first page-size worth of
/// bytes, which is always true since even the smallest JET page size (2048)
/// comfortably covers this offset.
pub fn detect(header_bytes: &[u8]) -> Result<DatabaseConfig, Error> {
    if header_bytes.len() <= VERSION_OFFSET {
        return Err(Error::TooShort(header_bytes.len()));
    }
    let version_byte = header_bytes[VERSION_OFFSET];
    let version = match version_byte {
        0x00 => Version::Jet3,
        0x01 => Version::Jet4,
        other => return Err(Error::UnknownVersion(other)),
    };
    Ok(DatabaseConfig {
        version,
        page_size: version.descriptor().page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with_version_byte(b: u8) -> Vec<u8> {
        let mut buf = vec![0_u8; 2048];
        buf[VERSION_OFFSET] = b;
        buf
    }

    #[test]
    fn detects_jet3() {
        let cfg = detect(&header_with_version_byte(0x00)).unwrap();
        assert_eq!(cfg.version, Version::Jet3);
        assert_eq!(cfg.page_size, 2048);
    }

    #[test]
    fn detects_jet4() {
        let cfg = detect(&header_with_version_byte(0x01)).unwrap();
        assert_eq!(cfg.version, Version::Jet4);
        assert_eq!(cfg.page_size, 4096);
    }

    #[test]
    fn rejects_unknown_version_byte() {
        let err = detect(&header_with_version_byte(0x02)).unwrap_err();
        match err {
            Error::UnknownVersion(2) => {}
            other => panic!("expected UnknownVersion(2), got {:?}", other),
        }
    }

    #[test]
    fn rejects_too_short_buffer() {
        let buf = vec![0_u8; 10];
        assert!(matches!(detect(&buf), Err(Error::TooShort(10))));
    }
}
