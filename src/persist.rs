// used for persistence
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

use crate::construct::{CodepointHasher, CodepointId};
use crate::error::Result;

/// SQLite caps the number of bound parameters per statement (999 on older builds).
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// A raw codepoint row as it comes out of the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodepointRow {
    pub cp: CodepointId,
    pub na: Option<String>,
    pub na1: Option<String>,
    pub image: Option<String>,
}

/// A named, contiguous region of codepoints (a block or a plane).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRow {
    pub name: String,
    pub first: CodepointId,
    pub last: CodepointId,
}

impl RegionRow {
    pub fn new(name: impl Into<String>, first: CodepointId, last: CodepointId) -> Self {
        Self {
            name: name.into(),
            first,
            last,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Block,
    Plane,
}

impl RegionKind {
    fn table(&self) -> &'static str {
        match self {
            RegionKind::Block => "blocks",
            RegionKind::Plane => "planes",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegionKind::Block => write!(f, "block"),
            RegionKind::Plane => write!(f, "plane"),
        }
    }
}

pub type CodepointRows = HashMap<CodepointId, CodepointRow, CodepointHasher>;

/// Batch resolution of codepoint metadata.
///
/// Ids without a backing row are simply missing from the result. Any `Err`
/// is a hard store failure.
pub trait Store {
    fn fetch_batch(&self, ids: &[CodepointId]) -> Result<CodepointRows>;
}

/// Point queries against the block and plane tables.
///
/// Names handed to these functions are already normalized (see
/// [`crate::toolkit::normalize_name`]).
pub trait RegionStore {
    fn region_by_name(&self, kind: RegionKind, normalized: &str) -> Result<Option<RegionRow>>;
    fn region_containing(&self, kind: RegionKind, cp: CodepointId) -> Result<Option<RegionRow>>;
    fn region_enclosing(
        &self,
        kind: RegionKind,
        first: CodepointId,
        last: CodepointId,
    ) -> Result<Option<RegionRow>>;
    fn region_before(&self, kind: RegionKind, first: CodepointId) -> Result<Option<RegionRow>>;
    fn region_after(&self, kind: RegionKind, last: CodepointId) -> Result<Option<RegionRow>>;
    fn search_regions(&self, kind: RegionKind, normalized: &str) -> Result<Vec<RegionRow>>;
    fn region_names(&self, kind: RegionKind) -> Result<Vec<String>>;
    fn count_codepoints(&self, first: CodepointId, last: CodepointId) -> Result<u64>;
    fn ages_within(&self, first: CodepointId, last: CodepointId) -> Result<Vec<String>>;
    fn block_abstract(&self, normalized: &str, lang: &str) -> Result<Option<String>>;
}

// ------------- Persistence -------------
pub struct SqliteStore {
    connection: Connection,
    chunk_size: usize,
}

impl SqliteStore {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        debug!(?mode, "opening codepoint store");
        Self::from_connection(connection)
    }

    pub fn from_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists codepoints (
                cp integer not null,
                na text null,
                na1 text null,
                age text null,
                constraint referenceable_cp primary key (
                    cp
                )
            );
            create table if not exists codepoint_image (
                cp integer not null,
                image text not null,
                constraint image_of_cp primary key (
                    cp
                )
            );
            create table if not exists blocks (
                name text not null,
                first integer not null,
                last integer not null,
                constraint unique_block_name primary key (
                    name
                )
            );
            create table if not exists block_abstract (
                block text not null,
                lang text not null,
                abstract text not null,
                constraint unique_abstract_per_lang primary key (
                    block,
                    lang
                )
            );
            create table if not exists planes (
                name text not null,
                first integer not null,
                last integer not null,
                constraint unique_plane_name primary key (
                    name
                )
            );
            ",
        )?;
        Ok(Self {
            connection,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn insert_codepoint(&self, row: &CodepointRow, age: Option<&str>) -> Result<()> {
        self.connection
            .prepare_cached(
                "
                insert or replace into codepoints (
                    cp,
                    na,
                    na1,
                    age
                ) values (?, ?, ?, ?)
            ",
            )?
            .execute(params![row.cp, row.na, row.na1, age])?;
        if let Some(image) = &row.image {
            self.connection
                .prepare_cached(
                    "
                    insert or replace into codepoint_image (
                        cp,
                        image
                    ) values (?, ?)
                ",
                )?
                .execute(params![row.cp, image])?;
        }
        Ok(())
    }

    pub fn insert_region(&self, kind: RegionKind, row: &RegionRow) -> Result<()> {
        let sql = format!(
            "insert or replace into {} (name, first, last) values (?, ?, ?)",
            kind.table()
        );
        self.connection
            .prepare_cached(&sql)?
            .execute(params![row.name, row.first, row.last])?;
        Ok(())
    }

    pub fn insert_abstract(&self, block: &str, lang: &str, text: &str) -> Result<()> {
        self.connection
            .prepare_cached(
                "
                insert or replace into block_abstract (
                    block,
                    lang,
                    abstract
                ) values (?, ?, ?)
            ",
            )?
            .execute(params![block, lang, text])?;
        Ok(())
    }

    fn region_query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Option<RegionRow>> {
        let row = self
            .connection
            .prepare_cached(sql)?
            .query_row(args, |r| {
                Ok(RegionRow {
                    name: r.get(0)?,
                    first: r.get(1)?,
                    last: r.get(2)?,
                })
            })
            .optional()?;
        Ok(row)
    }
}

impl Store for SqliteStore {
    fn fetch_batch(&self, ids: &[CodepointId]) -> Result<CodepointRows> {
        let mut rows = CodepointRows::default();
        for chunk in ids.chunks(self.chunk_size) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "
                select c.cp, c.na, c.na1, i.image
                    from codepoints c
                    left join codepoint_image i
                    on i.cp = c.cp
                    where c.cp in ({placeholders})
            "
            );
            let mut statement = self.connection.prepare_cached(&sql)?;
            let mapped = statement.query_map(params_from_iter(chunk.iter()), |r| {
                Ok(CodepointRow {
                    cp: r.get(0)?,
                    na: r.get(1)?,
                    na1: r.get(2)?,
                    image: r.get(3)?,
                })
            })?;
            for row in mapped {
                let row = row?;
                rows.insert(row.cp, row);
            }
        }
        trace!(requested = ids.len(), found = rows.len(), "fetched codepoint batch");
        Ok(rows)
    }
}

impl RegionStore for SqliteStore {
    fn region_by_name(&self, kind: RegionKind, normalized: &str) -> Result<Option<RegionRow>> {
        let sql = format!(
            "
            select name, first, last
                from {}
                where replace(replace(lower(name), '_', ''), ' ', '') = ?
                limit 1
        ",
            kind.table()
        );
        self.region_query(&sql, params![normalized])
    }

    fn region_containing(&self, kind: RegionKind, cp: CodepointId) -> Result<Option<RegionRow>> {
        let sql = format!(
            "
            select name, first, last
                from {}
                where first <= ?1 and last >= ?1
                limit 1
        ",
            kind.table()
        );
        self.region_query(&sql, params![cp])
    }

    fn region_enclosing(
        &self,
        kind: RegionKind,
        first: CodepointId,
        last: CodepointId,
    ) -> Result<Option<RegionRow>> {
        let sql = format!(
            "
            select name, first, last
                from {}
                where first <= ? and last >= ?
                limit 1
        ",
            kind.table()
        );
        self.region_query(&sql, params![first, last])
    }

    fn region_before(&self, kind: RegionKind, first: CodepointId) -> Result<Option<RegionRow>> {
        let sql = format!(
            "
            select name, first, last
                from {}
                where first < ?1 and last < ?1
                order by last desc
                limit 1
        ",
            kind.table()
        );
        self.region_query(&sql, params![first])
    }

    fn region_after(&self, kind: RegionKind, last: CodepointId) -> Result<Option<RegionRow>> {
        let sql = format!(
            "
            select name, first, last
                from {}
                where first > ?1 and last > ?1
                order by first asc
                limit 1
        ",
            kind.table()
        );
        self.region_query(&sql, params![last])
    }

    fn search_regions(&self, kind: RegionKind, normalized: &str) -> Result<Vec<RegionRow>> {
        let sql = format!(
            "
            select name, first, last
                from {}
                where replace(replace(lower(name), '_', ''), ' ', '') like ?
                order by first asc
        ",
            kind.table()
        );
        let pattern = format!("%{normalized}%");
        let mut statement = self.connection.prepare_cached(&sql)?;
        let mapped = statement.query_map(params![pattern], |r| {
            Ok(RegionRow {
                name: r.get(0)?,
                first: r.get(1)?,
                last: r.get(2)?,
            })
        })?;
        let mut regions = Vec::new();
        for region in mapped {
            regions.push(region?);
        }
        Ok(regions)
    }

    fn region_names(&self, kind: RegionKind) -> Result<Vec<String>> {
        let sql = format!("select name from {} order by first asc", kind.table());
        let mut statement = self.connection.prepare_cached(&sql)?;
        let mapped = statement.query_map([], |r| r.get::<_, String>(0))?;
        let mut names = Vec::new();
        for name in mapped {
            names.push(name?);
        }
        Ok(names)
    }

    fn count_codepoints(&self, first: CodepointId, last: CodepointId) -> Result<u64> {
        let count: i64 = self
            .connection
            .prepare_cached("select count(*) from codepoints where cp >= ? and cp <= ?")?
            .query_row(params![first, last], |r| r.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn ages_within(&self, first: CodepointId, last: CodepointId) -> Result<Vec<String>> {
        let mut statement = self.connection.prepare_cached(
            "
            select age
                from codepoints
                where cp >= ? and cp <= ? and age is not null
                group by age
        ",
        )?;
        let mapped = statement.query_map(params![first, last], |r| r.get::<_, String>(0))?;
        let mut ages = Vec::new();
        for age in mapped {
            ages.push(age?);
        }
        Ok(ages)
    }

    fn block_abstract(&self, normalized: &str, lang: &str) -> Result<Option<String>> {
        let text = self
            .connection
            .prepare_cached(
                "
                select abstract
                    from block_abstract
                    where replace(replace(lower(block), '_', ''), ' ', '') = ?
                    and lang = ?
            ",
            )?
            .query_row(params![normalized, lang], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(text)
    }
}
