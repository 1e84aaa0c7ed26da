//! Lazy, deduplicated sets of codepoints.
//!
//! A [`RangeSet`] starts out as a list of pending ids and costs nothing until
//! it is read. The first accessor resolves every pending id with one batch
//! call against the store; from then on the set works on resolved records only
//! and later additions fetch nothing but the ids it has not seen yet.
//!
//! Ordering differs per operation and callers may rely on it:
//! * materialization yields ascending ids,
//! * [`RangeSet::add`] and [`RangeSet::add_set`] insert in front of the first
//!   larger id,
//! * [`RangeSet::add_range`] appends the other set's new entries in that set's
//!   order, without re-sorting.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

// key membership of a materialized set
use roaring::RoaringBitmap;
use tracing::{debug, trace};

use crate::construct::{Codepoint, CodepointHasher, CodepointId, Resolver};
use crate::error::{Result, UnirangeError};

// ------------- RawId -------------
/// An id as handed in by a caller, before sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawId {
    Int(i64),
    Text(String),
}

impl From<CodepointId> for RawId {
    fn from(id: CodepointId) -> Self {
        RawId::Int(i64::from(id))
    }
}
impl From<i32> for RawId {
    fn from(id: i32) -> Self {
        RawId::Int(i64::from(id))
    }
}
impl From<i64> for RawId {
    fn from(id: i64) -> Self {
        RawId::Int(id)
    }
}
impl From<char> for RawId {
    fn from(c: char) -> Self {
        RawId::Int(i64::from(u32::from(c)))
    }
}
impl From<&str> for RawId {
    fn from(id: &str) -> Self {
        RawId::Text(id.to_owned())
    }
}
impl From<String> for RawId {
    fn from(id: String) -> Self {
        RawId::Text(id)
    }
}

/// Non-negative integers and plain ASCII numerals survive, anything else is
/// `None`.
pub fn sanitize(raw: &RawId) -> Option<CodepointId> {
    match raw {
        RawId::Int(n) => CodepointId::try_from(*n).ok(),
        RawId::Text(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        RawId::Text(_) => None,
    }
}

/// Counters for input that was dropped on the way in. Nothing here is an
/// error; the counters exist so tests and logs can see what was discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub dropped_ids: usize,
    pub rejected_tokens: usize,
}

// ------------- MaterializedSet -------------
#[derive(Debug, Default)]
pub struct MaterializedSet {
    entries: Vec<(CodepointId, Codepoint)>,
    keys: RoaringBitmap,
    // id -> index into `entries`
    positions: HashMap<CodepointId, usize, CodepointHasher>,
}

impl MaterializedSet {
    fn from_sorted(entries: Vec<(CodepointId, Codepoint)>) -> Self {
        let keys = entries.iter().map(|(id, _)| *id).collect();
        let mut set = Self {
            entries,
            keys,
            positions: HashMap::default(),
        };
        set.reindex_from(0);
        set
    }
    fn reindex_from(&mut self, start: usize) {
        for (index, (id, _)) in self.entries.iter().enumerate().skip(start) {
            self.positions.insert(*id, index);
        }
    }
    fn insert_ordered(&mut self, id: CodepointId, codepoint: Codepoint) {
        if self.keys.insert(id) {
            let position = self
                .entries
                .iter()
                .position(|(k, _)| *k > id)
                .unwrap_or(self.entries.len());
            self.entries.insert(position, (id, codepoint));
            self.reindex_from(position);
        }
    }
    /// Inserts ascending `incoming` entries as if each went in front of the
    /// first larger id, in a single pass. The existing entries need not be
    /// sorted: the first larger entry can only move right as ids grow.
    fn merge_ordered(&mut self, incoming: Vec<(CodepointId, Codepoint)>) {
        let incoming: Vec<_> = incoming
            .into_iter()
            .filter(|(id, _)| self.keys.insert(*id))
            .collect();
        if incoming.is_empty() {
            return;
        }
        let existing = std::mem::take(&mut self.entries);
        let mut merged = Vec::with_capacity(existing.len() + incoming.len());
        let mut incoming = incoming.into_iter().peekable();
        for entry in existing {
            while let Some(next) = incoming.next_if(|(id, _)| *id < entry.0) {
                merged.push(next);
            }
            merged.push(entry);
        }
        merged.extend(incoming);
        self.entries = merged;
        self.reindex_from(0);
    }
    fn append(&mut self, id: CodepointId, codepoint: Codepoint) {
        if self.keys.insert(id) {
            self.positions.insert(id, self.entries.len());
            self.entries.push((id, codepoint));
        }
    }
    pub fn contains(&self, id: CodepointId) -> bool {
        self.keys.contains(id)
    }
    pub fn get(&self, id: CodepointId) -> Option<&Codepoint> {
        let index = *self.positions.get(&id)?;
        self.entries.get(index).map(|(_, cp)| cp)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn first(&self) -> Option<CodepointId> {
        self.entries.first().map(|(id, _)| *id)
    }
    pub fn last(&self) -> Option<CodepointId> {
        self.entries.last().map(|(id, _)| *id)
    }
    pub fn ids(&self) -> Vec<CodepointId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            entries: &self.entries,
            position: 0,
        }
    }
}

impl<'a> IntoIterator for &'a MaterializedSet {
    type Item = (CodepointId, &'a Codepoint);
    type IntoIter = Cursor<'a>;
    fn into_iter(self) -> Cursor<'a> {
        self.cursor()
    }
}

// ------------- Cursor -------------
/// One traversal over a materialized set. Every call to
/// [`RangeSet::cursor`] hands out a fresh one, so traversals never share a
/// position.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    entries: &'a [(CodepointId, Codepoint)],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn rewind(&mut self) {
        self.position = 0;
    }
    /// Moves to the next entry and reports whether one is there.
    pub fn advance(&mut self) -> bool {
        if self.position < self.entries.len() {
            self.position += 1;
        }
        self.valid()
    }
    pub fn key(&self) -> Option<CodepointId> {
        self.entries.get(self.position).map(|(id, _)| *id)
    }
    pub fn current(&self) -> Option<&'a Codepoint> {
        self.entries.get(self.position).map(|(_, cp)| cp)
    }
    pub fn valid(&self) -> bool {
        self.position < self.entries.len()
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = (CodepointId, &'a Codepoint);
    fn next(&mut self) -> Option<Self::Item> {
        let (id, cp) = self.entries.get(self.position)?;
        self.position += 1;
        Some((*id, cp))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

// ------------- RangeSet -------------
enum State {
    Unresolved { pending: Vec<CodepointId> },
    Resolved { set: MaterializedSet },
}

pub struct RangeSet<'r> {
    resolver: &'r Resolver<'r>,
    label: Option<Arc<str>>,
    state: State,
    diagnostics: Diagnostics,
}

impl<'r> RangeSet<'r> {
    pub fn new<I>(ids: I, resolver: &'r Resolver<'r>) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RawId>,
    {
        let mut diagnostics = Diagnostics::default();
        let pending = sanitize_all(ids, &mut diagnostics);
        Self {
            resolver,
            label: None,
            state: State::Unresolved { pending },
            diagnostics,
        }
    }
    /// Like [`RangeSet::new`], but records resolved through this set carry
    /// `label` as their owning range.
    pub fn labelled<I>(ids: I, resolver: &'r Resolver<'r>, label: impl Into<Arc<str>>) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RawId>,
    {
        let mut range = Self::new(ids, resolver);
        range.label = Some(label.into());
        range
    }
    /// Every id in `first..=last`, in either direction.
    pub fn span(first: CodepointId, last: CodepointId, resolver: &'r Resolver<'r>) -> Self {
        let (low, high) = (first.min(last), first.max(last));
        Self::new(low..=high, resolver)
    }

    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }
    pub(crate) fn note_rejected_tokens(&mut self, rejected: usize) {
        self.diagnostics.rejected_tokens += rejected;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }
    pub fn is_materialized(&self) -> bool {
        matches!(self.state, State::Resolved { .. })
    }
    /// Number of ids still waiting for resolution; `None` once materialized.
    pub fn pending_len(&self) -> Option<usize> {
        match &self.state {
            State::Unresolved { pending } => Some(pending.len()),
            State::Resolved { .. } => None,
        }
    }

    fn materialize(&mut self) -> Result<&mut MaterializedSet> {
        if let State::Unresolved { pending } = &self.state {
            // a failing store leaves the set unresolved so the next call retries
            let resolved = self.resolver.resolve_batch(pending, self.label.as_ref())?;
            debug!(
                requested = pending.len(),
                resolved = resolved.len(),
                label = self.label.as_deref().unwrap_or_default(),
                "materialized range"
            );
            self.state = State::Resolved {
                set: MaterializedSet::from_sorted(resolved),
            };
        }
        match &mut self.state {
            State::Resolved { set } => Ok(set),
            State::Unresolved { .. } => Err(UnirangeError::Invariant(
                "range still unresolved after materialization".to_string(),
            )),
        }
    }

    pub fn get(&mut self) -> Result<&MaterializedSet> {
        Ok(&*self.materialize()?)
    }
    pub fn cursor(&mut self) -> Result<Cursor<'_>> {
        Ok(self.materialize()?.cursor())
    }
    pub fn len(&mut self) -> Result<usize> {
        Ok(self.materialize()?.len())
    }
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.materialize()?.is_empty())
    }
    pub fn contains(&mut self, id: CodepointId) -> Result<bool> {
        Ok(self.materialize()?.contains(id))
    }
    pub fn ids(&mut self) -> Result<Vec<CodepointId>> {
        Ok(self.materialize()?.ids())
    }
    /// First and last id in the set's current order.
    pub fn boundaries(&mut self) -> Result<Option<(CodepointId, CodepointId)>> {
        let set = self.materialize()?;
        Ok(set.first().zip(set.last()))
    }
    pub fn first(&mut self) -> Result<Option<CodepointId>> {
        Ok(self.materialize()?.first())
    }
    pub fn last(&mut self) -> Result<Option<CodepointId>> {
        Ok(self.materialize()?.last())
    }

    pub fn add(&mut self, id: impl Into<RawId>) -> Result<&mut Self> {
        let resolver = self.resolver;
        let owner = self.label.clone();
        self.materialize()?;
        let Some(id) = sanitize_one(id.into(), &mut self.diagnostics) else {
            return Ok(self);
        };
        let set = self.materialize()?;
        if !set.contains(id) {
            match resolver.resolve(id, owner.as_ref())? {
                Some(codepoint) => set.insert_ordered(id, codepoint),
                None => trace!(id, "skipping unknown codepoint"),
            }
        }
        Ok(self)
    }

    pub fn add_set<I>(&mut self, ids: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<RawId>,
    {
        let resolver = self.resolver;
        let owner = self.label.clone();
        self.materialize()?;
        let candidates = sanitize_all(ids, &mut self.diagnostics);
        let set = self.materialize()?;
        let unseen: Vec<CodepointId> = candidates
            .into_iter()
            .filter(|id| !set.contains(*id))
            .collect();
        let resolved = resolver.resolve_batch(&unseen, owner.as_ref())?;
        trace!(unseen = unseen.len(), resolved = resolved.len(), "extending range");
        set.merge_ordered(resolved);
        Ok(self)
    }

    /// Unions `other` into this set. Entries this set lacks are appended in
    /// `other`'s order; nothing is re-sorted.
    pub fn add_range(&mut self, other: &mut RangeSet<'_>) -> Result<&mut Self> {
        self.materialize()?;
        let incoming: Vec<(CodepointId, Codepoint)> = other
            .get()?
            .into_iter()
            .map(|(id, cp)| (id, Arc::clone(cp)))
            .collect();
        let set = self.materialize()?;
        for (id, codepoint) in incoming {
            set.append(id, codepoint);
        }
        Ok(self)
    }

    /// Narrows the pending window. A negative `offset` counts from the end; a
    /// missing `length` runs to the end and a negative one stops that many
    /// entries before it. Once the set is materialized this does nothing.
    ///
    /// `None` is not the same as `Some(0)`: `slice(offset, None)` keeps the
    /// whole tail, `slice(offset, Some(0))` leaves the set empty. Callers
    /// used to an empty window as the default have to pass `Some(0)`.
    pub fn slice(&mut self, offset: isize, length: Option<isize>) -> &mut Self {
        match &mut self.state {
            State::Unresolved { pending } => {
                let window = slice_window(pending.len(), offset, length);
                pending.truncate(window.end);
                pending.drain(..window.start);
            }
            State::Resolved { .. } => {
                debug!(offset, ?length, "slice after materialization has no effect");
            }
        }
        self
    }
}

impl fmt::Debug for RangeSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("RangeSet");
        s.field("label", &self.label);
        match &self.state {
            State::Unresolved { pending } => s.field("pending", &pending.len()),
            State::Resolved { set } => s.field("resolved", &set.len()),
        };
        s.field("diagnostics", &self.diagnostics).finish()
    }
}

fn sanitize_one(raw: RawId, diagnostics: &mut Diagnostics) -> Option<CodepointId> {
    let id = sanitize(&raw);
    if id.is_none() {
        diagnostics.dropped_ids += 1;
        debug!(?raw, "dropping invalid codepoint id");
    }
    id
}

// first occurrence wins
fn sanitize_all<I>(ids: I, diagnostics: &mut Diagnostics) -> Vec<CodepointId>
where
    I: IntoIterator,
    I::Item: Into<RawId>,
{
    let mut seen = HashSet::<CodepointId, CodepointHasher>::default();
    ids.into_iter()
        .filter_map(|raw| sanitize_one(raw.into(), diagnostics))
        .filter(|id| seen.insert(*id))
        .collect()
}

fn slice_window(len: usize, offset: isize, length: Option<isize>) -> std::ops::Range<usize> {
    let len = isize::try_from(len).unwrap_or(isize::MAX);
    let start = if offset < 0 {
        len.saturating_add(offset).max(0)
    } else {
        offset.min(len)
    };
    let end = match length {
        None => len,
        Some(l) if l < 0 => len.saturating_add(l),
        Some(l) => start.saturating_add(l).min(len),
    }
    .max(start);
    // both bounds are clamped to 0..=len
    start as usize..end as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::CodepointRecord;

    fn entries(ids: impl IntoIterator<Item = CodepointId>) -> Vec<(CodepointId, Codepoint)> {
        ids.into_iter()
            .map(|id| (id, Arc::new(CodepointRecord::new(id, format!("CP {id}"), false, String::new(), None))))
            .collect()
    }

    #[test]
    fn merge_interleaves_sorted_entries() {
        let mut set = MaterializedSet::from_sorted(entries((0..40_000).step_by(2)));
        set.merge_ordered(entries((1..40_000).step_by(2)));
        assert_eq!(set.len(), 40_000);
        assert_eq!(set.ids(), (0..40_000).collect::<Vec<_>>());
        for id in [0, 1, 19_999, 39_998, 39_999] {
            assert_eq!(set.get(id).map(|cp| cp.id()), Some(id));
        }
        assert!(set.get(40_000).is_none());
    }

    #[test]
    fn merge_matches_one_by_one_insertion_on_unsorted_entries() {
        let mut merged = MaterializedSet::from_sorted(entries([10, 20]));
        merged.append(5, entries([5]).remove(0).1);
        merged.append(30, entries([30]).remove(0).1);
        let mut stepwise = MaterializedSet::from_sorted(entries([10, 20]));
        stepwise.append(5, entries([5]).remove(0).1);
        stepwise.append(30, entries([30]).remove(0).1);

        let incoming = entries([3, 7, 15, 20, 25, 40]);
        for (id, cp) in entries([3, 7, 15, 25, 40]) {
            stepwise.insert_ordered(id, cp);
        }
        merged.merge_ordered(incoming);
        assert_eq!(merged.ids(), stepwise.ids());
        assert_eq!(merged.ids(), vec![3, 7, 10, 15, 20, 5, 25, 30, 40]);
        for id in merged.ids() {
            assert_eq!(merged.get(id).map(|cp| cp.id()), Some(id));
        }
    }

    #[test]
    fn ordered_insert_keeps_positions_current() {
        let mut set = MaterializedSet::from_sorted(entries([1, 3, 5]));
        set.insert_ordered(2, entries([2]).remove(0).1);
        set.insert_ordered(3, entries([3]).remove(0).1);
        assert_eq!(set.ids(), vec![1, 2, 3, 5]);
        assert_eq!(set.get(5).map(|cp| cp.id()), Some(5));
        assert_eq!(set.get(3).map(|cp| cp.id()), Some(3));
    }

    #[test]
    fn sanitize_keeps_numerals_only() {
        assert_eq!(sanitize(&RawId::from(65)), Some(65));
        assert_eq!(sanitize(&RawId::from("65")), Some(65));
        assert_eq!(sanitize(&RawId::from(-1)), None);
        assert_eq!(sanitize(&RawId::from("")), None);
        assert_eq!(sanitize(&RawId::from("6a")), None);
        assert_eq!(sanitize(&RawId::from("+65")), None);
        assert_eq!(sanitize(&RawId::from(" 65")), None);
        assert_eq!(sanitize(&RawId::from(i64::MAX)), None);
    }

    #[test]
    fn slice_window_follows_offset_and_length_rules() {
        assert_eq!(slice_window(10, 2, Some(3)), 2..5);
        assert_eq!(slice_window(10, 2, None), 2..10);
        assert_eq!(slice_window(10, -3, None), 7..10);
        assert_eq!(slice_window(10, 2, Some(-2)), 2..8);
        assert_eq!(slice_window(10, 8, Some(-5)), 8..8);
        assert_eq!(slice_window(10, 20, Some(3)), 10..10);
        assert_eq!(slice_window(10, -20, Some(2)), 0..2);
        assert_eq!(slice_window(10, 0, Some(0)), 0..0);
    }

    #[test]
    fn missing_length_keeps_the_tail_but_zero_length_keeps_nothing() {
        assert_eq!(slice_window(10, 4, None), 4..10);
        assert_eq!(slice_window(10, 4, Some(0)), 4..4);
        assert_eq!(slice_window(0, 0, None), 0..0);
    }

    #[test]
    fn sanitize_all_dedups_and_counts() {
        let mut diagnostics = Diagnostics::default();
        let ids = sanitize_all(
            vec![RawId::from(3), RawId::from("1"), RawId::from(3), RawId::from("x"), RawId::from(-4)],
            &mut diagnostics,
        );
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(diagnostics.dropped_ids, 2);
    }
}
