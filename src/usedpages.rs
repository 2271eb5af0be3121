//! Parses a table's "used pages" map into the list of data pages it owns.
//!
//! The map page itself does not carry a page-type byte the way tdef and data
//! pages do; its shape is inferred entirely from the `mapType` byte inside
//! it, so there is no "malformed" page-code assertion here the way there is
//! in [`crate::tdef`] and [`crate::datapage`].

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::jet::Version;
use crate::pager::{PageNum, PageReader};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Pager(#[from] crate::pager::Error),
    #[error("used-pages map page is truncated")]
    Truncated,
    #[error("unknown used-pages map type {0}")]
    UnknownMapType(u8),
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Error::Truncated
    }
}

const INLINE_MAP_TYPE: u8 = 0;
const PAGED_MAP_TYPE: u8 = 1;

/// Reads the used-pages map at `map_page` and returns the data pages it
/// enumerates, in ascending order of discovery (callers may treat the
/// result as an unordered set, per `SPEC_FULL.md` §4.3).
pub fn read(pager: &mut PageReader, map_page: PageNum, version: Version) -> Result<Vec<PageNum>, Error> {
    let page = pager.read(map_page)?;
    let mut c = Cursor::new(&page[..]);

    let header_skip = match version {
        Version::Jet3 => 10,
        Version::Jet4 => 14,
    };
    c.seek(SeekFrom::Start(header_skip))?;
    let _first_page_applies = c.read_u16::<LittleEndian>()?;
    let map_type = c.read_u8()?;

    let mut body = Vec::new();
    c.read_to_end(&mut body)?;

    match map_type {
        INLINE_MAP_TYPE => Ok(read_inline_map(&body)?),
        PAGED_MAP_TYPE => read_paged_map(pager, &body),
        other => Err(Error::UnknownMapType(other)),
    }
}

fn read_inline_map(body: &[u8]) -> Result<Vec<PageNum>, Error> {
    if body.len() < 4 {
        return Err(Error::Truncated);
    }
    let page_start = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    Ok(bitmap_to_pages(&body[4..], page_start))
}

fn read_paged_map(pager: &mut PageReader, body: &[u8]) -> Result<Vec<PageNum>, Error> {
    let page_size = pager.page_size();
    let bits_per_entry = (page_size - 4) as u64 * 8;
    let mut pages = Vec::new();
    for (i, chunk) in body.chunks(4).enumerate() {
        if chunk.len() < 4 {
            break;
        }
        let page_number = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if page_number == 0 {
            continue;
        }
        let map_page = pager.read(page_number)?;
        let bitmap = &map_page[4..];
        let start = i as u64 * bits_per_entry;
        pages.extend(bitmap_to_pages(bitmap, start as u32));
    }
    Ok(pages)
}

/// Enumerates the set bits of `bitmap`, LSB-first within each byte, as page
/// numbers relative to `start`.
fn bitmap_to_pages(bitmap: &[u8], start: PageNum) -> Vec<PageNum> {
    let mut pages = Vec::new();
    for (byte_idx, byte) in bitmap.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                pages.push(start + (byte_idx as u32) * 8 + bit as u32);
            }
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn jet4_inline_map_page(page_start: u32, bitmap: &[u8]) -> Vec<u8> {
        let mut buf = vec![0_u8; 4096];
        let mut c = Cursor::new(&mut buf[..]);
        c.seek(SeekFrom::Start(14)).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap(); // firstPageApplies
        c.write_u8(INLINE_MAP_TYPE).unwrap();
        c.write_u32::<LittleEndian>(page_start).unwrap();
        c.write_all(bitmap).unwrap();
        buf
    }

    #[test]
    fn inline_map_decodes_lsb_first() {
        // bit 0 and bit 3 set -> pages (page_start+0) and (page_start+3).
        let buf = jet4_inline_map_page(100, &[0b0000_1001]);
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&buf).unwrap();
        f.flush().unwrap();
        let mut pr = PageReader::open(f.path(), 4096).unwrap();
        let pages = read(&mut pr, 0, Version::Jet4).unwrap();
        assert_eq!(pages, vec![100, 103]);
    }

    #[test]
    fn paged_map_reads_referenced_pages_and_skips_zero_entries() {
        let page_size = 64_u32;
        // Map page (page 0): header + entries pointing at pages 1 and 0 (skip).
        let mut map_page = vec![0_u8; page_size as usize];
        {
            let mut c = Cursor::new(&mut map_page[..]);
            c.seek(SeekFrom::Start(14)).unwrap();
            c.write_u16::<LittleEndian>(0).unwrap();
            c.write_u8(PAGED_MAP_TYPE).unwrap();
            c.write_u32::<LittleEndian>(1).unwrap(); // entry 0 -> page 1
            c.write_u32::<LittleEndian>(0).unwrap(); // entry 1 -> skipped
        }
        // Page 1: 4-byte header then a bitmap with bit 0 set.
        let mut data_bitmap_page = vec![0_u8; page_size as usize];
        data_bitmap_page[4] = 0b0000_0001;

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&map_page).unwrap();
        f.write_all(&data_bitmap_page).unwrap();
        f.flush().unwrap();

        let mut pr = PageReader::open(f.path(), page_size).unwrap();
        let pages = read(&mut pr, 0, Version::Jet4).unwrap();
        assert_eq!(pages, vec![0]);
    }
}
