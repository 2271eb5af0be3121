//! Parses a table-definition ("tdef") page into its schema.
//!
//! A tdef page is JET's page code `0x02`; it describes one table's columns,
//! row/used-page bookkeeping, and (for the system catalog itself) is the
//! bootstrap point the whole database is discovered from. See
//! `SPEC_FULL.md` §4.4.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::jet::Version;
use crate::pager::{PageNum, PageReader};

const TDEF_PAGE_CODE: u8 = 0x02;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Pager(#[from] crate::pager::Error),
    #[error("expected tdef page code 0x02, found 0x{0:02x}")]
    WrongPageCode(u8),
    #[error("expected 'VC' marker on a JET3 tdef page")]
    MissingVcMarker,
    #[error("tdef page is truncated")]
    Truncated,
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Error::Truncated
    }
}

/// One column's schema, as found in the tdef's column descriptor + name
/// records.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub col_type: u8,
    /// Ordinal used to index the row's null-mask bit.
    pub number: u16,
    /// Index into a row's variable-length offset table, for variable columns.
    pub offset_var: u16,
    /// Byte offset within the fixed-length area, for fixed columns.
    pub offset_fixed: u16,
    pub length: u16,
    /// Bit 0 set means the column is fixed-length.
    pub bitmask: u8,
}

impl Column {
    pub fn is_fixed(&self) -> bool {
        self.bitmask & 0x01 == 1
    }
}

#[derive(Debug, Clone)]
pub struct Tdef {
    pub num_rows: u32,
    pub num_cols: u16,
    pub num_var_cols: u16,
    pub num_real_idx: u32,
    pub used_pages_map_page: PageNum,
    pub columns: Vec<Column>,
}

/// Reads and parses the tdef at `page`, following at most one overflow hop.
pub fn read(pager: &mut PageReader, page: PageNum, version: Version) -> Result<Tdef, Error> {
    let buf = read_logical_buffer(pager, page)?;
    parse(&buf, version)
}

/// Concatenates a tdef page with its single overflow continuation, if any,
/// per `SPEC_FULL.md` §4.4 and Design Notes §9.
fn read_logical_buffer(pager: &mut PageReader, page: PageNum) -> Result<Vec<u8>, Error> {
    let mut buf = pager.read(page)?;
    if buf.is_empty() || buf[0] != TDEF_PAGE_CODE {
        return Err(Error::WrongPageCode(buf.first().copied().unwrap_or(0)));
    }

    let mut c = Cursor::new(&buf[..]);
    c.seek(SeekFrom::Start(4))?;
    let next_page = c.read_u32::<LittleEndian>()?;

    if next_page > 0 {
        let overflow = pager.read(next_page)?;
        if overflow.len() > 8 {
            buf.extend_from_slice(&overflow[8..]);
        }
    }
    Ok(buf)
}

fn parse(buf: &[u8], version: Version) -> Result<Tdef, Error> {
    let mut c = Cursor::new(buf);

    let code = c.read_u8()?;
    if code != TDEF_PAGE_CODE {
        return Err(Error::WrongPageCode(code));
    }
    c.seek(SeekFrom::Current(1))?; // skip

    match version {
        Version::Jet3 => {
            let mut marker = [0_u8; 2];
            c.read_exact(&mut marker)?;
            if &marker != b"VC" {
                return Err(Error::MissingVcMarker);
            }
        }
        Version::Jet4 => {
            let _free_space_in_page = c.read_u16::<LittleEndian>()?;
        }
    }

    let _next_page = c.read_u32::<LittleEndian>()?;
    let _tdef_len = c.read_u32::<LittleEndian>()?;

    if version == Version::Jet4 {
        c.seek(SeekFrom::Current(4))?; // skip
    }

    let num_rows = c.read_u32::<LittleEndian>()?;
    let _auto_number = c.read_u32::<LittleEndian>()?;

    if version == Version::Jet4 {
        let _auto_number_flag = c.read_u8()?;
        c.seek(SeekFrom::Current(3))?;
        let _auto_number_value = c.read_u32::<LittleEndian>()?;
        c.seek(SeekFrom::Current(8))?;
    }

    let _table_type = c.read_u8()?;
    let _max_cols = c.read_u16::<LittleEndian>()?;
    let num_var_cols = c.read_u16::<LittleEndian>()?;
    let num_cols = c.read_u16::<LittleEndian>()?;
    let _num_idx = c.read_u32::<LittleEndian>()?;
    let num_real_idx = c.read_u32::<LittleEndian>()?;

    let _used_pages_row = c.read_u8()?;
    let used_pages_map_page = read_u24(&mut c)?;
    let _free_pages_count = c.read_u32::<LittleEndian>()?;

    let idx_entry_size = match version {
        Version::Jet3 => 8,
        Version::Jet4 => 12,
    };
    c.seek(SeekFrom::Current(num_real_idx as i64 * idx_entry_size))?;

    let mut descriptors = Vec::with_capacity(num_cols as usize);
    for _ in 0..num_cols {
        descriptors.push(read_column_descriptor(&mut c, version)?);
    }

    let mut columns = Vec::with_capacity(num_cols as usize);
    for desc in descriptors {
        let name = read_column_name(&mut c, version)?;
        columns.push(Column {
            name,
            col_type: desc.col_type,
            number: desc.number,
            offset_var: desc.offset_var,
            offset_fixed: desc.offset_fixed,
            length: desc.length,
            bitmask: desc.bitmask,
        });
    }

    Ok(Tdef {
        num_rows,
        num_cols,
        num_var_cols,
        num_real_idx,
        used_pages_map_page,
        columns,
    })
}

struct ColumnDescriptor {
    col_type: u8,
    number: u16,
    offset_var: u16,
    offset_fixed: u16,
    length: u16,
    bitmask: u8,
}

fn read_column_descriptor(c: &mut Cursor<&[u8]>, version: Version) -> Result<ColumnDescriptor, Error> {
    let col_type = c.read_u8()?;
    if version == Version::Jet4 {
        c.seek(SeekFrom::Current(4))?;
    }
    let number = c.read_u16::<LittleEndian>()?;
    let offset_var = c.read_u16::<LittleEndian>()?;
    let _num = c.read_u16::<LittleEndian>()?;
    if version == Version::Jet3 {
        let _sort_order = c.read_u16::<LittleEndian>()?;
    }
    let _misc = c.read_u16::<LittleEndian>()?;
    let _misc_ext = c.read_u16::<LittleEndian>()?;
    let bitmask = c.read_u8()?;
    if version == Version::Jet4 {
        let _misc_flags = c.read_u8()?;
        c.seek(SeekFrom::Current(4))?;
    }
    let offset_fixed = c.read_u16::<LittleEndian>()?;
    let length = c.read_u16::<LittleEndian>()?;
    Ok(ColumnDescriptor {
        col_type,
        number,
        offset_var,
        offset_fixed,
        length,
        bitmask,
    })
}

fn read_column_name(c: &mut Cursor<&[u8]>, version: Version) -> Result<String, Error> {
    match version {
        Version::Jet3 => {
            let len = c.read_u8()? as usize;
            let mut bytes = vec![0_u8; len];
            c.read_exact(&mut bytes)?;
            Ok(crate::unicode::decode_latin1(&bytes))
        }
        Version::Jet4 => {
            let len = c.read_u16::<LittleEndian>()? as usize;
            let mut bytes = vec![0_u8; len];
            c.read_exact(&mut bytes)?;
            Ok(crate::unicode::decode_text(&bytes))
        }
    }
}

fn read_u24(c: &mut Cursor<&[u8]>) -> Result<u32, Error> {
    let mut bytes = [0_u8; 3];
    c.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn jet4_tdef_page(page_size: usize, num_cols: u16, columns: &[(&str, u8, u16, u16, u16, u16, u8)]) -> Vec<u8> {
        // columns tuple: (name, type, number, offset_var, misc/miscExt placeholders unused, offset_fixed, bitmask)
        let mut buf = vec![0_u8; page_size];
        let mut c = Cursor::new(&mut buf[..]);
        c.write_u8(TDEF_PAGE_CODE).unwrap();
        c.write_u8(0).unwrap(); // skip
        c.write_u16::<LittleEndian>(0).unwrap(); // freeSpaceInPage
        c.write_u32::<LittleEndian>(0).unwrap(); // nextPage
        c.write_u32::<LittleEndian>(0).unwrap(); // tdefLen
        c.write_u32::<LittleEndian>(0).unwrap(); // v4 skip
        c.write_u32::<LittleEndian>(0).unwrap(); // numRows
        c.write_u32::<LittleEndian>(0).unwrap(); // autoNumber
        c.write_u8(0).unwrap(); // autoNumberFlag
        c.write_all(&[0_u8; 3]).unwrap();
        c.write_u32::<LittleEndian>(0).unwrap(); // autoNumberValue
        c.write_all(&[0_u8; 8]).unwrap();
        c.write_u8(0).unwrap(); // tableType
        c.write_u16::<LittleEndian>(num_cols).unwrap(); // maxCols
        c.write_u16::<LittleEndian>(0).unwrap(); // numVarCols
        c.write_u16::<LittleEndian>(num_cols).unwrap(); // numCols
        c.write_u32::<LittleEndian>(0).unwrap(); // numIdx
        c.write_u32::<LittleEndian>(0).unwrap(); // numRealIdx
        c.write_u8(0).unwrap(); // usedPagesRow
        c.write_all(&[7, 0, 0]).unwrap(); // usedPagesMapPage u24 = 7
        c.write_u32::<LittleEndian>(0).unwrap(); // freePagesCount

        for (_, col_type, number, offset_var, _misc, offset_fixed, bitmask) in columns {
            c.write_u8(*col_type).unwrap();
            c.write_all(&[0_u8; 4]).unwrap();
            c.write_u16::<LittleEndian>(*number).unwrap();
            c.write_u16::<LittleEndian>(*offset_var).unwrap();
            c.write_u16::<LittleEndian>(0).unwrap(); // num
            c.write_u16::<LittleEndian>(0).unwrap(); // misc
            c.write_u16::<LittleEndian>(0).unwrap(); // miscExt
            c.write_u8(*bitmask).unwrap();
            c.write_u8(0).unwrap(); // miscFlags
            c.write_all(&[0_u8; 4]).unwrap();
            c.write_u16::<LittleEndian>(*offset_fixed).unwrap();
            c.write_u16::<LittleEndian>(4).unwrap(); // length
        }
        for (name, ..) in columns {
            let utf16: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
            c.write_u16::<LittleEndian>(utf16.len() as u16).unwrap();
            c.write_all(&utf16).unwrap();
        }
        buf
    }

    #[test]
    fn parses_jet4_tdef_with_two_columns() {
        let page_size = 4096;
        let buf = jet4_tdef_page(
            page_size,
            2,
            &[("Id", 4, 0, 0, 0, 0, 1), ("Name", 10, 1, 0, 0, 4, 0)],
        );
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&buf).unwrap();
        f.flush().unwrap();
        let mut pr = PageReader::open(f.path(), page_size as u32).unwrap();
        let tdef = read(&mut pr, 0, Version::Jet4).unwrap();
        assert_eq!(tdef.num_cols, 2);
        assert_eq!(tdef.columns.len(), 2);
        assert_eq!(tdef.columns[0].name, "Id");
        assert_eq!(tdef.columns[1].name, "Name");
        assert_eq!(tdef.used_pages_map_page, 7);
        assert!(tdef.columns[0].is_fixed());
        assert!(!tdef.columns[1].is_fixed());
    }

    #[test]
    fn wrong_page_code_is_rejected() {
        let buf = vec![0xAA_u8; 4096];
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&buf).unwrap();
        f.flush().unwrap();
        let mut pr = PageReader::open(f.path(), 4096).unwrap();
        assert!(matches!(read(&mut pr, 0, Version::Jet4), Err(Error::WrongPageCode(0xAA))));
    }

    #[test]
    fn overflow_page_is_concatenated() {
        let page_size = 4096_usize;
        // Build a tdef with enough columns that the descriptors spill past
        // one page boundary is not practical to construct by hand here;
        // instead verify the mechanical concatenation behavior directly via
        // read_logical_buffer with a trivial nextPage chain.
        let mut page0 = vec![0_u8; page_size];
        page0[0] = TDEF_PAGE_CODE;
        {
            let mut c = Cursor::new(&mut page0[..]);
            c.seek(SeekFrom::Start(4)).unwrap();
            c.write_u32::<LittleEndian>(1).unwrap(); // nextPage = 1
        }
        let mut page1 = vec![0xEE_u8; page_size];
        page1[0..8].copy_from_slice(&[0_u8; 8]); // page header, ignored

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&page0).unwrap();
        f.write_all(&page1).unwrap();
        f.flush().unwrap();

        let mut pr = PageReader::open(f.path(), page_size as u32).unwrap();
        let logical = read_logical_buffer(&mut pr, 0).unwrap();
        assert_eq!(logical.len(), page_size * 2 - 8);
        assert_eq!(&logical[page_size..], &page1[8..]);
    }
}
