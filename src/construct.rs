use std::sync::{Arc, Mutex};

// codepoint keyed maps and sets hash with seahash
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

// used to print out readable forms of a construct
use std::fmt;

use tracing::trace;

// our own stuff that we need
use crate::error::Result;
use crate::persist::{CodepointRow, Store};

// ------------- CodepointId -------------
pub type CodepointId = u32;

pub type CodepointHasher = BuildHasherDefault<SeaHasher>;
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

pub const MAX_CODEPOINT: CodepointId = 0x10FFFF;

const IMAGE_PREFIX: &str = "data:image/png;base64,";

// ------------- CodepointRecord -------------
#[derive(PartialEq, Eq, Debug)]
pub struct CodepointRecord {
    id: CodepointId,
    name: String,
    fallback_name: bool,
    image: String,
    owner: Option<Arc<str>>, // label of the first labelled range that resolved this record
}

impl CodepointRecord {
    pub fn new(
        id: CodepointId,
        name: String,
        fallback_name: bool,
        image: String,
        owner: Option<Arc<str>>,
    ) -> Self {
        Self {
            id,
            name,
            fallback_name,
            image,
            owner,
        }
    }
    /// Builds a record from a store row. The official name wins, then the
    /// Unicode 1 name marked with a trailing `*`, then `<control>`.
    pub fn from_row(row: &CodepointRow, owner: Option<Arc<str>>) -> Self {
        let (name, fallback_name) = match (non_empty(&row.na), non_empty(&row.na1)) {
            (Some(na), _) => (na.to_owned(), false),
            (None, Some(na1)) => (format!("{na1}*"), true),
            (None, None) => (String::from("<control>"), true),
        };
        let image = format!("{IMAGE_PREFIX}{}", row.image.as_deref().unwrap_or_default());
        Self::new(row.cp, name, fallback_name, image, owner)
    }
    pub fn id(&self) -> CodepointId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn has_fallback_name(&self) -> bool {
        self.fallback_name
    }
    pub fn image(&self) -> &str {
        &self.image
    }
    /// Label of the first labelled range that resolved this record. Records
    /// are shared between ranges, so this is not necessarily the range being
    /// traversed; [`crate::range::RangeSet::label`] names that one.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
    fn with_owner(&self, owner: Arc<str>) -> Self {
        Self::new(
            self.id,
            self.name.clone(),
            self.fallback_name,
            self.image.clone(),
            Some(owner),
        )
    }
    /// `None` for surrogates and anything beyond the Unicode range.
    pub fn character(&self) -> Option<char> {
        char::from_u32(self.id)
    }
}

impl fmt::Display for CodepointRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "U+{:04X} {}", self.id, self.name)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub type Codepoint = Arc<CodepointRecord>;

// ------------- CodepointKeeper -------------
#[derive(Debug, Default)]
pub struct CodepointKeeper {
    kept: HashMap<CodepointId, Codepoint, CodepointHasher>,
}

impl CodepointKeeper {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
        }
    }
    /// Keeps `record` unless one with the same id is kept already. A kept
    /// record without an owner is replaced when `record` carries one.
    pub fn keep(&mut self, record: CodepointRecord) -> (Codepoint, bool) {
        match self.kept.entry(record.id()) {
            Entry::Occupied(mut e) => {
                if e.get().owner.is_none() && record.owner.is_some() {
                    e.insert(Arc::new(record));
                }
                (Arc::clone(e.get()), true)
            }
            Entry::Vacant(e) => (Arc::clone(e.insert(Arc::new(record))), false),
        }
    }
    pub fn get(&self, id: CodepointId) -> Option<Codepoint> {
        self.kept.get(&id).cloned()
    }
    /// The kept record for `id`, handed over to `owner` if it has none yet.
    pub fn claim(&mut self, id: CodepointId, owner: Option<&Arc<str>>) -> Option<Codepoint> {
        let kept = self.kept.get_mut(&id)?;
        if let Some(owner) = owner.filter(|_| kept.owner.is_none()) {
            let record = kept.with_owner(Arc::clone(owner));
            *kept = Arc::new(record);
        }
        Some(Arc::clone(kept))
    }
    /// Forgets every kept record. Handles given out earlier stay valid.
    pub fn clear(&mut self) {
        self.kept.clear();
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Resolver -------------
/// Turns codepoint ids into shared records, going to the store only when needed.
///
/// Every resolved record is kept for the lifetime of the resolver, so memory
/// grows with the number of distinct ids ever resolved. Call
/// [`Resolver::clear`] or use a fresh resolver per unit of work when that
/// matters.
pub struct Resolver<'s> {
    store: &'s dyn Store,
    keeper: Arc<Mutex<CodepointKeeper>>,
}

impl<'s> Resolver<'s> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self {
            store,
            keeper: Arc::new(Mutex::new(CodepointKeeper::new())),
        }
    }
    pub fn store(&self) -> &'s dyn Store {
        self.store
    }
    pub fn keeper(&self) -> Arc<Mutex<CodepointKeeper>> {
        Arc::clone(&self.keeper)
    }
    /// Keeps a record built from `row`, or hands back the one already kept.
    pub fn adopt(&self, row: &CodepointRow, owner: Option<&Arc<str>>) -> Result<Codepoint> {
        let record = CodepointRecord::from_row(row, owner.cloned());
        let (kept, _) = self.keeper.lock()?.keep(record);
        Ok(kept)
    }
    /// Resolves a single id. A previously kept record is returned without
    /// touching the store; `Ok(None)` means the store has no such codepoint.
    pub fn resolve(&self, id: CodepointId, owner: Option<&Arc<str>>) -> Result<Option<Codepoint>> {
        if let Some(kept) = self.keeper.lock()?.claim(id, owner) {
            return Ok(Some(kept));
        }
        let rows = self.store.fetch_batch(&[id])?;
        match rows.get(&id) {
            Some(row) => Ok(Some(self.adopt(row, owner)?)),
            None => {
                trace!(id, "no codepoint in store");
                Ok(None)
            }
        }
    }
    /// Drops every kept record.
    pub fn clear(&self) -> Result<()> {
        let mut keeper = self.keeper.lock()?;
        trace!(kept = keeper.len(), "clearing kept codepoints");
        keeper.clear();
        Ok(())
    }
    /// Resolves `ids` with one batch call and returns the hits in ascending id
    /// order. An empty request never reaches the store.
    pub fn resolve_batch(
        &self,
        ids: &[CodepointId],
        owner: Option<&Arc<str>>,
    ) -> Result<Vec<(CodepointId, Codepoint)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.store.fetch_batch(ids)?;
        let mut resolved = Vec::with_capacity(rows.len());
        for (id, row) in rows.iter() {
            resolved.push((*id, self.adopt(row, owner)?));
        }
        resolved.sort_unstable_by_key(|(id, _)| *id);
        Ok(resolved)
    }
}
