#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use unirange::construct::CodepointId;
use unirange::persist::{
    CodepointRow, CodepointRows, PersistenceMode, RegionKind, RegionRow, SqliteStore, Store,
};
use unirange::{Result, UnirangeError};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn named(cp: CodepointId, name: &str) -> CodepointRow {
    CodepointRow {
        cp,
        na: Some(name.to_string()),
        ..Default::default()
    }
}

/// A small slice of the Unicode database: controls, ASCII letters, a few
/// Latin-1 and Latin Extended-A characters and one emoji.
pub fn seeded_store() -> SqliteStore {
    init_tracing();
    let store = SqliteStore::new(PersistenceMode::InMemory).unwrap();
    let line_feed = CodepointRow {
        cp: 0x0A,
        na: Some(String::new()),
        na1: Some("LINE FEED (LF)".to_string()),
        image: None,
    };
    store.insert_codepoint(&line_feed, Some("1.1")).unwrap();
    store.insert_codepoint(&named(0x20, "SPACE"), Some("1.1")).unwrap();
    for (offset, letter) in ('A'..='Z').enumerate() {
        let offset = offset as CodepointId;
        store
            .insert_codepoint(&named(0x41 + offset, &format!("LATIN CAPITAL LETTER {letter}")), Some("1.1"))
            .unwrap();
        store
            .insert_codepoint(&named(0x61 + offset, &format!("LATIN SMALL LETTER {letter}")), Some("1.1"))
            .unwrap();
    }
    store.insert_codepoint(&CodepointRow { cp: 0x80, ..Default::default() }, Some("1.1")).unwrap();
    store.insert_codepoint(&named(0xE9, "LATIN SMALL LETTER E WITH ACUTE"), Some("1.1")).unwrap();
    store.insert_codepoint(&named(0x100, "LATIN CAPITAL LETTER A WITH MACRON"), Some("1.1")).unwrap();
    store.insert_codepoint(&named(0x17F, "LATIN SMALL LETTER LONG S"), Some("1.1")).unwrap();
    let grinning = CodepointRow {
        cp: 0x1F600,
        na: Some("GRINNING FACE".to_string()),
        na1: None,
        image: Some("iVBORw0KGgo".to_string()),
    };
    store.insert_codepoint(&grinning, Some("6.1")).unwrap();

    for (name, first, last) in [
        ("Basic Latin", 0x0000, 0x007F),
        ("Latin-1 Supplement", 0x0080, 0x00FF),
        ("Latin Extended-A", 0x0100, 0x017F),
        ("Combining Diacritical Marks", 0x0300, 0x036F),
        ("Emoticons", 0x1F600, 0x1F64F),
    ] {
        store.insert_region(RegionKind::Block, &RegionRow::new(name, first, last)).unwrap();
    }
    for (name, first, last) in [
        ("Basic Multilingual Plane", 0x0000, 0xFFFF),
        ("Supplementary Multilingual Plane", 0x10000, 0x1FFFF),
    ] {
        store.insert_region(RegionKind::Plane, &RegionRow::new(name, first, last)).unwrap();
    }
    store
        .insert_abstract("Basic Latin", "en", "The Basic Latin block is the first block of Unicode.")
        .unwrap();
    store
}

/// Wraps a store and records every batch request. Can be told to fail.
pub struct CountingStore<'s> {
    inner: &'s dyn Store,
    requests: RefCell<Vec<Vec<CodepointId>>>,
    failing: Cell<bool>,
}

impl<'s> CountingStore<'s> {
    pub fn new(inner: &'s dyn Store) -> Self {
        Self {
            inner,
            requests: RefCell::new(Vec::new()),
            failing: Cell::new(false),
        }
    }
    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
    /// Ids of the last request, sorted.
    pub fn last_request(&self) -> Vec<CodepointId> {
        let mut ids = self.requests.borrow().last().cloned().unwrap_or_default();
        ids.sort_unstable();
        ids
    }
    pub fn fail(&self, failing: bool) {
        self.failing.set(failing);
    }
}

impl Store for CountingStore<'_> {
    fn fetch_batch(&self, ids: &[CodepointId]) -> Result<CodepointRows> {
        self.requests.borrow_mut().push(ids.to_vec());
        if self.failing.get() {
            return Err(UnirangeError::Store("database is locked".to_string()));
        }
        self.inner.fetch_batch(ids)
    }
}
