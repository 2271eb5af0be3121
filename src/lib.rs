//! A read-only reader for the legacy Microsoft Access database format (the
//! JET Engine, versions 3 and 4 — `.mdb` files from 1997 through 2003).
//!
//! Given a path to such a file, [`Database::open`] exposes the list of
//! user-defined tables, each table's column schema, and its row data as
//! typed values. Writing, index traversal, and query planning are out of
//! scope; see the crate's design notes for the full list of non-goals.

pub mod catalog;
pub mod datapage;
pub mod header;
pub mod jet;
pub mod pager;
pub mod row;
pub mod tdef;
pub mod unicode;
pub mod usedpages;
pub mod value;

use std::path::Path;

pub use jet::Version;
pub use row::{ColumnValue, Row};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Header(#[from] header::Error),
    #[error(transparent)]
    Pager(#[from] pager::Error),
    #[error(transparent)]
    Tdef(#[from] tdef::Error),
    #[error(transparent)]
    DataPage(#[from] datapage::Error),
    #[error(transparent)]
    UsedPages(#[from] usedpages::Error),
    #[error(transparent)]
    Catalog(#[from] catalog::Error),
    #[error("no table named {0:?}")]
    UnknownTable(String),
    #[error("JET3 databases are rejected by the current open policy")]
    UnsupportedVersion,
    #[error("database handle is closed")]
    Closed,
}

/// Caller-visible knobs on [`Database::open_with`]. Both are deliberate
/// design choices per `SPEC_FULL.md` Design Notes §9, not environment- or
/// config-file-driven.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Reject JET3 files with [`Error::UnsupportedVersion`] even though they
    /// decode identically to JET4 ones.
    pub reject_jet3: bool,
}

/// An open handle on a JET database file.
///
/// Owns the underlying file handle for its lifetime via an internal
/// [`pager::PageReader`]; dropping a `Database` releases it, and
/// [`Database::close`] does so early and idempotently.
pub struct Database {
    pager: Option<pager::PageReader>,
    version: Version,
    catalog: Vec<catalog::Entry>,
}

impl Database {
    /// Opens `path` with the default policy (both JET3 and JET4 accepted).
    pub fn open(path: &Path) -> Result<Self, Error> {
        Self::open_with(path, OpenOptions::default())
    }

    pub fn open_with(path: &Path, options: OpenOptions) -> Result<Self, Error> {
        let header_bytes = read_header_probe(path)?;
        let config = header::detect(&header_bytes)?;

        if options.reject_jet3 && config.version == Version::Jet3 {
            return Err(Error::UnsupportedVersion);
        }

        log::debug!("opened {:?}: version={:?} page_size={}", path, config.version, config.page_size);

        let mut pager = pager::PageReader::open(path, config.page_size)?;
        let catalog = catalog::load(&mut pager, config.version)?;
        log::debug!("catalog discovered {} user table(s)", catalog.len());

        Ok(Database {
            pager: Some(pager),
            version: config.version,
            catalog,
        })
    }

    /// Table names, in catalog discovery order.
    pub fn tables(&self) -> Vec<String> {
        self.catalog.iter().map(|e| e.table_name.clone()).collect()
    }

    /// Column names of `table`, in tdef order.
    pub fn columns(&mut self, table: &str) -> Result<Vec<String>, Error> {
        let tdef = self.table_tdef(table)?;
        Ok(tdef.columns.into_iter().map(|c| c.name).collect())
    }

    /// All non-deleted rows of `table`, across every page in its used-pages
    /// map.
    pub fn rows(&mut self, table: &str) -> Result<Vec<Row>, Error> {
        let tdef = self.table_tdef(table)?;
        let version = self.version;
        let pager = self.pager()?;

        let pages = usedpages::read(pager, tdef.used_pages_map_page, version)?;
        let mut rows = Vec::new();
        for page_num in pages {
            let page = pager.read(page_num)?;
            rows.extend(datapage::decode_rows(pager, &page, &tdef, version)?);
        }
        Ok(rows)
    }

    /// Releases the underlying file handle. Calling this more than once, or
    /// letting the `Database` simply drop, is safe.
    pub fn close(&mut self) {
        self.pager = None;
    }

    fn table_tdef(&mut self, table: &str) -> Result<tdef::Tdef, Error> {
        let entry = self
            .catalog
            .iter()
            .find(|e| e.table_name == table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?;
        let tdef_page = entry.tdef_page;
        let version = self.version;
        let pager = self.pager()?;
        Ok(tdef::read(pager, tdef_page, version)?)
    }

    fn pager(&mut self) -> Result<&mut pager::PageReader, Error> {
        self.pager.as_mut().ok_or(Error::Closed)
    }
}

/// Reads up to one JET3-sized page's worth of bytes for version detection.
/// Unlike [`pager::PageReader::read`], a short read here is not an error:
/// [`header::detect`] only needs the first `0x15` bytes, and this probe runs
/// before the real page size is known.
fn read_header_probe(path: &Path) -> Result<Vec<u8>, Error> {
    use std::io::Read;
    let probe_size = jet::Version::Jet3.descriptor().page_size as usize;
    let mut f = std::fs::File::open(path).map_err(pager::Error::Io)?;
    let mut buf = vec![0_u8; probe_size];
    let mut total = 0;
    loop {
        match f.read(&mut buf[total..]).map_err(pager::Error::Io)? {
            0 => break,
            n => total += n,
        }
    }
    buf.truncate(total);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_header_only_buffer_with_unknown_version() {
        // Mirrors SPEC_FULL.md §8 scenario 6: a 21-byte file with an unknown
        // version byte at 0x14 fails with UnknownVersion(2), surfaced as
        // Error::Header.
        let mut f = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        let mut buf = vec![0_u8; 21];
        buf[0x14] = 0x02;
        f.write_all(&buf).unwrap();
        f.flush().unwrap();

        let err = Database::open(f.path()).unwrap_err();
        match err {
            Error::Header(header::Error::UnknownVersion(2)) => {}
            other => panic!("expected UnknownVersion(2), got {:?}", other),
        }
    }
}
