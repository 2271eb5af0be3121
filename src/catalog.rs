//! Reads the system catalog (always at tdef page 2) and filters it down to
//! user-defined tables, per `SPEC_FULL.md` §4.8.

use crate::jet::Version;
use crate::pager::{PageNum, PageReader};
use crate::row::ColumnValue;
use crate::tdef::Tdef;
use crate::{datapage, tdef, usedpages};

pub const CATALOG_TDEF_PAGE: PageNum = 2;

const TYPE_MASK: u32 = 0x00FF_FFFF;
const TYPE_TABLE: u32 = 1;
const FLAGS_MASK: u32 = 0x8000_0002;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Tdef(#[from] tdef::Error),
    #[error(transparent)]
    UsedPages(#[from] usedpages::Error),
    #[error(transparent)]
    DataPage(#[from] datapage::Error),
    #[error(transparent)]
    Pager(#[from] crate::pager::Error),
    #[error("system catalog is missing a required column: {0}")]
    MissingColumn(&'static str),
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub table_name: String,
    pub tdef_page: PageNum,
}

/// Loads and filters the system catalog, returning user tables in the order
/// their catalog rows were discovered.
pub fn load(pager: &mut PageReader, version: Version) -> Result<Vec<Entry>, Error> {
    let catalog_tdef = tdef::read(pager, CATALOG_TDEF_PAGE, version)?;

    let name_idx = column_index(&catalog_tdef, "Name")?;
    let id_idx = column_index(&catalog_tdef, "Id")?;
    let type_idx = column_index(&catalog_tdef, "Type")?;
    let flags_idx = column_index(&catalog_tdef, "Flags")?;

    let pages = usedpages::read(pager, catalog_tdef.used_pages_map_page, version)?;

    let mut entries = Vec::new();
    for page_num in pages {
        let page = pager.read(page_num)?;
        let rows = datapage::decode_rows(pager, &page, &catalog_tdef, version)?;
        for row in rows {
            let type_value = as_u32(&row.values[type_idx]);
            let flags_value = as_u32(&row.values[flags_idx]);
            if type_value & TYPE_MASK != TYPE_TABLE {
                continue;
            }
            if flags_value & FLAGS_MASK != 0 {
                continue;
            }
            let table_name = as_string(&row.values[name_idx]);
            let tdef_page = as_u32(&row.values[id_idx]);
            entries.push(Entry {
                table_name,
                tdef_page,
            });
        }
    }
    Ok(entries)
}

fn column_index(tdef: &Tdef, name: &'static str) -> Result<usize, Error> {
    tdef.columns
        .iter()
        .position(|c| c.name == name)
        .ok_or(Error::MissingColumn(name))
}

fn as_u32(value: &ColumnValue) -> u32 {
    match value {
        ColumnValue::LongInt(v) => *v,
        ColumnValue::Int(v) => *v as u32,
        ColumnValue::Byte(v) => *v as u32,
        _ => 0,
    }
}

fn as_string(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Text(s) => s.clone(),
        _ => String::new(),
    }
}
