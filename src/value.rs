//! Decodes a single column's raw byte slice into a [`ColumnValue`].
//!
//! Unsupported column types are never an error: per `SPEC_FULL.md` Design
//! Notes §9, partial-row usability outweighs strictness, so they decode to
//! [`ColumnValue::Unknown`].

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::jet::Version;
use crate::pager::{PageNum, PageReader};
use crate::row::ColumnValue;

const TYPE_BOOLEAN: u8 = 1;
const TYPE_BYTE: u8 = 2;
const TYPE_INT: u8 = 3;
const TYPE_LONG_INT: u8 = 4;
const TYPE_DOUBLE: u8 = 7;
const TYPE_DATETIME: u8 = 8;
const TYPE_TEXT: u8 = 10;
const TYPE_MEMO: u8 = 12;

/// Decodes a fixed or variable-length column's slice, given its type code.
///
/// Text decoding needs to know the database version to choose latin1 vs.
/// UTF-16LE.
pub fn decode_typed(bytes: &[u8], col_type: u8, version: Version) -> ColumnValue {
    match col_type {
        TYPE_BOOLEAN => ColumnValue::Bool(bytes.first().copied().unwrap_or(0) != 0),
        TYPE_BYTE => ColumnValue::Byte(bytes.first().copied().unwrap_or(0)),
        TYPE_INT => read_u16(bytes).map(ColumnValue::Int).unwrap_or(ColumnValue::Unknown),
        TYPE_LONG_INT => read_u32(bytes).map(ColumnValue::LongInt).unwrap_or(ColumnValue::Unknown),
        TYPE_DOUBLE => read_f64(bytes).map(ColumnValue::Double).unwrap_or(ColumnValue::Unknown),
        TYPE_DATETIME => read_u64(bytes).map(ColumnValue::DateTimeRaw).unwrap_or(ColumnValue::Unknown),
        TYPE_TEXT => ColumnValue::Text(decode_text(bytes, version)),
        TYPE_MEMO => ColumnValue::Unknown, // resolved via decode_memo, which needs page access.
        _ => ColumnValue::Unknown,
    }
}

fn decode_text(bytes: &[u8], version: Version) -> String {
    match version {
        Version::Jet3 => crate::unicode::decode_latin1(bytes),
        Version::Jet4 => crate::unicode::decode_text(bytes),
    }
}

fn read_u16(bytes: &[u8]) -> Option<u16> {
    Cursor::new(bytes).read_u16::<LittleEndian>().ok()
}

fn read_u32(bytes: &[u8]) -> Option<u32> {
    Cursor::new(bytes).read_u32::<LittleEndian>().ok()
}

fn read_u64(bytes: &[u8]) -> Option<u64> {
    Cursor::new(bytes).read_u64::<LittleEndian>().ok()
}

fn read_f64(bytes: &[u8]) -> Option<f64> {
    Cursor::new(bytes).read_f64::<LittleEndian>().ok()
}

/// Decodes a memo (type 12) column slice, per `SPEC_FULL.md` §4.6.
///
/// Inline memos decode directly; out-of-line ("LVAL") memos re-enter
/// [`crate::datapage`] against the referenced page to pull the backing
/// slot's bytes. Long multi-page LVAL chains are an open question in the
/// source spec and are not implemented; they yield [`ColumnValue::Unknown`].
pub fn decode_memo(
    pager: &mut PageReader,
    bytes: &[u8],
    version: Version,
) -> ColumnValue {
    if bytes.len() < 8 {
        return ColumnValue::Unknown;
    }
    let memo_len = (bytes[0] as u32) | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16);
    let memo_mask = bytes[3];
    let loc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let memo_page: PageNum = loc >> 8;
    let memo_row = (loc & 0xFF) as usize;

    match memo_mask {
        0x80 => {
            let start = 12usize.min(bytes.len());
            let end = (start + memo_len as usize).min(bytes.len());
            ColumnValue::Text(decode_text(&bytes[start..end], version))
        }
        0x40 => decode_lval(pager, memo_page, memo_row, version).unwrap_or(ColumnValue::Unknown),
        _ => ColumnValue::Unknown,
    }
}

fn decode_lval(
    pager: &mut PageReader,
    memo_page: PageNum,
    memo_row: usize,
    version: Version,
) -> Option<ColumnValue> {
    let page = pager.read(memo_page).ok()?;
    let slots = crate::datapage::read_slots(&page, version).ok()?;
    let slot = slots.get(memo_row)?;
    let bytes = crate::datapage::slot_bytes(&page, slot);
    Some(ColumnValue::Text(decode_text(bytes, version)))
}
