//! The single point where version-dependent layout differences are named.
//!
//! JET3 and JET4 share almost every algorithm in this crate; they differ
//! only in page size, the width of a handful of counting fields, the width
//! of the column-name length prefix, and the text encoding used for names
//! and inline text. Rather than branch on version scattered across every
//! decoder, each decoder takes a [`Version`] and asks it for the handful of
//! facts ([`VersionDescriptor`]) that actually vary; the decode algorithms
//! themselves are written once.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// The 1997 ("Jet 3.5") format: 2048-byte pages, latin1 text.
    Jet3,
    /// The 2000-2003 ("Jet 4.0") format: 4096-byte pages, UTF-16LE text.
    Jet4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// cp1252, approximated as latin1 per the format's own documentation.
    Latin1,
    Utf16Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub page_size: u32,
    /// Width in bytes of the `columnsInRow`, `varLen`, and var-offset-table
    /// entry fields within a data page row: 1 for JET3, 2 for JET4.
    pub offset_width: usize,
    /// Width in bytes of the length prefix on a column name record: 1 for
    /// JET3 (a `u8`), 2 for JET4 (a `u16`).
    pub name_length_width: usize,
    pub text_encoding: TextEncoding,
}

impl Version {
    pub fn descriptor(self) -> VersionDescriptor {
        match self {
            Version::Jet3 => VersionDescriptor {
                page_size: 2048,
                offset_width: 1,
                name_length_width: 1,
                text_encoding: TextEncoding::Latin1,
            },
            Version::Jet4 => VersionDescriptor {
                page_size: 4096,
                offset_width: 2,
                name_length_width: 2,
                text_encoding: TextEncoding::Utf16Le,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jet3_descriptor_matches_format() {
        let d = Version::Jet3.descriptor();
        assert_eq!(d.page_size, 2048);
        assert_eq!(d.offset_width, 1);
        assert_eq!(d.text_encoding, TextEncoding::Latin1);
    }

    #[test]
    fn jet4_descriptor_matches_format() {
        let d = Version::Jet4.descriptor();
        assert_eq!(d.page_size, 4096);
        assert_eq!(d.offset_width, 2);
        assert_eq!(d.text_encoding, TextEncoding::Utf16Le);
    }
}
