//! Parses a data page (page code `0x01`) into rows.
//!
//! The row-slot-offset table is factored out as [`read_slots`] /
//! [`slot_bytes`], standalone operations over a raw page buffer with no
//! dependency on [`crate::tdef::Tdef`]. [`crate::value`]'s out-of-line memo
//! path re-enters this module through those two functions to pull one slot's
//! bytes from an arbitrary page without knowing that page's schema, per
//! `SPEC_FULL.md` §4.5 and Design Notes §9.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

use crate::jet::Version;
use crate::pager::PageReader;
use crate::row::{ColumnValue, Row};
use crate::tdef::{Column, Tdef};

const DATA_PAGE_CODE: u8 = 0x01;

const OFFSET_MASK: u16 = 0x1FFF;
const DELETED_FLAG: u16 = 0x4000;
const LOOKUP_FLAG: u16 = 0x8000;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("expected data page code 0x01, found 0x{0:02x}")]
    WrongPageCode(u8),
    #[error("data page is truncated")]
    Truncated,
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Error::Truncated
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub offset: usize,
    pub next: usize,
    pub is_deleted: bool,
    pub is_lookup: bool,
}

/// Decodes the row-offset table of a data page, independent of any schema.
pub fn read_slots(page: &[u8], version: Version) -> Result<Vec<Slot>, Error> {
    if page.is_empty() || page[0] != DATA_PAGE_CODE {
        return Err(Error::WrongPageCode(page.first().copied().unwrap_or(0)));
    }
    let mut c = Cursor::new(page);
    c.seek(SeekFrom::Start(1))?; // skip
    let _free_space_in_page = c.read_u16::<LittleEndian>()?;
    let _tdef_page = c.read_u32::<LittleEndian>()?;
    if version == Version::Jet4 {
        c.seek(SeekFrom::Current(4))?;
    }
    let num_rows = c.read_u16::<LittleEndian>()?;

    let mut raw = Vec::with_capacity(num_rows as usize);
    for _ in 0..num_rows {
        raw.push(c.read_u16::<LittleEndian>()?);
    }

    let page_size = page.len();
    let mut slots = Vec::with_capacity(raw.len());
    for (i, os) in raw.iter().enumerate() {
        let offset = (os & OFFSET_MASK) as usize;
        let is_deleted = os & DELETED_FLAG != 0;
        let is_lookup = os & LOOKUP_FLAG != 0;
        let next = if i == 0 {
            page_size
        } else {
            (raw[i - 1] & OFFSET_MASK) as usize
        };
        slots.push(Slot {
            offset,
            next,
            is_deleted,
            is_lookup,
        });
    }
    Ok(slots)
}

/// Returns a slot's raw `[offset, next)` bytes.
pub fn slot_bytes<'a>(page: &'a [u8], slot: &Slot) -> &'a [u8] {
    &page[slot.offset..slot.next]
}

/// Decodes every non-deleted row on `page` against `tdef`. `pager` is used
/// only to resolve out-of-line memo ("LVAL") columns, which live on other
/// pages; ordinary rows never touch it.
pub fn decode_rows(
    pager: &mut PageReader,
    page: &[u8],
    tdef: &Tdef,
    version: Version,
) -> Result<Vec<Row>, Error> {
    let slots = read_slots(page, version)?;
    let width = version.descriptor().offset_width;

    let mut rows = Vec::new();
    for slot in &slots {
        if slot.is_deleted {
            continue;
        }
        rows.push(decode_row(pager, page, slot, width, tdef, version)?);
    }
    Ok(rows)
}

fn decode_row(
    pager: &mut PageReader,
    page: &[u8],
    slot: &Slot,
    width: usize,
    tdef: &Tdef,
    version: Version,
) -> Result<Row, Error> {
    let offset = slot.offset;
    let next = slot.next;
    if next < offset + width || next > page.len() {
        return Err(Error::Truncated);
    }

    let columns_in_row = read_width_le(page, offset, width)? as usize;
    let null_mask_size = (columns_in_row + 7) / 8;

    if next < null_mask_size || next - null_mask_size < width {
        return Err(Error::Truncated);
    }
    let null_mask = &page[next - null_mask_size..next];

    let var_len_pos = next - null_mask_size - width;
    let var_len = read_width_le(page, var_len_pos, width)? as usize;

    let var_table_len = (var_len + 1) * width;
    if var_len_pos < var_table_len {
        return Err(Error::Truncated);
    }
    let var_table_start = var_len_pos - var_table_len;

    let mut var_offsets = Vec::with_capacity(var_len + 1);
    for i in 0..(var_len + 1) {
        // Entries are stored reversed on disk; reading them back-to-front
        // restores natural ascending order.
        let pos = var_table_start + (var_len - i) * width;
        var_offsets.push(read_width_le(page, pos, width)? as usize);
    }

    let mut values = Vec::with_capacity(tdef.columns.len());
    for col in &tdef.columns {
        values.push(decode_column(
            pager,
            page,
            offset,
            width,
            col,
            &var_offsets,
            null_mask,
            version,
        )?);
    }
    Ok(Row { values })
}

fn decode_column(
    pager: &mut PageReader,
    page: &[u8],
    slot_offset: usize,
    var_len_size: usize,
    col: &Column,
    var_offsets: &[usize],
    null_mask: &[u8],
    version: Version,
) -> Result<ColumnValue, Error> {
    let is_present = null_bit(null_mask, col.number);
    if !is_present {
        return Ok(ColumnValue::Null);
    }

    let (start, length) = if col.is_fixed() {
        (
            slot_offset + col.offset_fixed as usize + var_len_size,
            col.length as usize,
        )
    } else {
        let idx = col.offset_var as usize;
        if idx >= var_offsets.len() {
            (0, 0)
        } else if idx + 1 < var_offsets.len() {
            (
                slot_offset + var_offsets[idx],
                var_offsets[idx + 1].saturating_sub(var_offsets[idx]),
            )
        } else {
            (slot_offset + var_offsets[idx], 0)
        }
    };

    if length == 0 {
        return Ok(ColumnValue::Text(String::new()));
    }

    if start + length > page.len() {
        return Err(Error::Truncated);
    }
    let slice = &page[start..start + length];
    const TYPE_MEMO: u8 = 12;
    if col.col_type == TYPE_MEMO {
        return Ok(crate::value::decode_memo(pager, slice, version));
    }
    Ok(crate::value::decode_typed(slice, col.col_type, version))
}

fn null_bit(mask: &[u8], number: u16) -> bool {
    let byte_idx = (number / 8) as usize;
    let bit_idx = number % 8;
    match mask.get(byte_idx) {
        Some(byte) => byte & (1 << bit_idx) != 0,
        None => false,
    }
}

fn read_width_le(page: &[u8], pos: usize, width: usize) -> Result<u32, Error> {
    if pos + width > page.len() {
        return Err(Error::Truncated);
    }
    Ok(match width {
        1 => page[pos] as u32,
        2 => u16::from_le_bytes([page[pos], page[pos + 1]]) as u32,
        _ => unreachable!("offset_width is always 1 or 2"),
    })
}
