//! Named, contiguous regions of the codespace: Unicode blocks and planes.
//!
//! A region is opened from a [`RegionSource`]. `ByName` looks the region up
//! in the store (case, space and underscore insensitive), `ByRow` takes a row
//! that an earlier query already returned, which is how neighbours, search
//! hits and containing planes are built without a second lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::construct::{CodepointId, OtherHasher, Resolver};
use crate::error::{Result, UnirangeError};
use crate::persist::{RegionKind, RegionRow, RegionStore};
use crate::range::RangeSet;
use crate::toolkit::normalize_name;

/// Blocks without any dated codepoint are reported as this version.
pub const DEFAULT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSource {
    ByName(String),
    ByRow(RegionRow),
}

pub struct Region<'r> {
    kind: RegionKind,
    name: Arc<str>,
    limits: (CodepointId, CodepointId),
    range: RangeSet<'r>,
    resolver: &'r Resolver<'r>,
    regions: &'r dyn RegionStore,
    version: Option<String>,
    abstracts: HashMap<String, String, OtherHasher>,
}

impl<'r> Region<'r> {
    pub fn open(
        kind: RegionKind,
        source: RegionSource,
        resolver: &'r Resolver<'r>,
        regions: &'r dyn RegionStore,
    ) -> Result<Self> {
        let row = match source {
            RegionSource::ByName(name) => regions
                .region_by_name(kind, &normalize_name(&name))?
                .ok_or_else(|| UnirangeError::NotFound(format!("no {kind} named {name}")))?,
            RegionSource::ByRow(row) => row,
        };
        Ok(Self::from_row(kind, row, resolver, regions))
    }

    pub fn by_name(
        kind: RegionKind,
        name: &str,
        resolver: &'r Resolver<'r>,
        regions: &'r dyn RegionStore,
    ) -> Result<Self> {
        Self::open(kind, RegionSource::ByName(name.to_owned()), resolver, regions)
    }

    fn from_row(
        kind: RegionKind,
        row: RegionRow,
        resolver: &'r Resolver<'r>,
        regions: &'r dyn RegionStore,
    ) -> Self {
        let name: Arc<str> = Arc::from(row.name.as_str());
        let range = RangeSet::span(row.first, row.last, resolver).with_label(Arc::clone(&name));
        Self {
            kind,
            name,
            limits: (row.first, row.last),
            range,
            resolver,
            regions,
            version: None,
            abstracts: HashMap::default(),
        }
    }

    fn open_row(&self, kind: RegionKind, row: RegionRow) -> Region<'r> {
        Self::from_row(kind, row, self.resolver, self.regions)
    }

    /// The region of `kind` that contains `cp`.
    pub fn for_codepoint(
        kind: RegionKind,
        cp: CodepointId,
        resolver: &'r Resolver<'r>,
        regions: &'r dyn RegionStore,
    ) -> Result<Self> {
        let row = regions
            .region_containing(kind, cp)?
            .ok_or_else(|| UnirangeError::NotFound(format!("no {kind} contains U+{cp:04X}")))?;
        Ok(Self::from_row(kind, row, resolver, regions))
    }

    /// Regions whose normalized name contains the normalized `query`, ordered
    /// by their first codepoint.
    pub fn search(
        kind: RegionKind,
        query: &str,
        resolver: &'r Resolver<'r>,
        regions: &'r dyn RegionStore,
    ) -> Result<Vec<Self>> {
        let rows = regions.search_regions(kind, &normalize_name(query))?;
        debug!(%kind, query, hits = rows.len(), "region search");
        Ok(rows
            .into_iter()
            .map(|row| Self::from_row(kind, row, resolver, regions))
            .collect())
    }

    /// All region names of `kind`, ordered by their first codepoint.
    pub fn names(kind: RegionKind, regions: &dyn RegionStore) -> Result<Vec<String>> {
        regions.region_names(kind)
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Declared first and last codepoint. Unlike [`RangeSet::boundaries`]
    /// these need not be assigned codepoints.
    pub fn limits(&self) -> (CodepointId, CodepointId) {
        self.limits
    }
    pub fn range(&self) -> &RangeSet<'r> {
        &self.range
    }
    pub fn range_mut(&mut self) -> &mut RangeSet<'r> {
        &mut self.range
    }
    pub fn into_range(self) -> RangeSet<'r> {
        self.range
    }

    /// Number of codepoints the store knows within the limits.
    pub fn count(&self) -> Result<u64> {
        self.regions.count_codepoints(self.limits.0, self.limits.1)
    }

    /// Earliest Unicode version among the region's codepoints.
    pub fn version(&mut self) -> Result<&str> {
        if self.version.is_none() {
            let mut ages = self.regions.ages_within(self.limits.0, self.limits.1)?;
            ages.sort_by_key(|age| version_key(age));
            self.version = Some(
                ages.into_iter()
                    .next()
                    .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            );
        }
        Ok(self.version.as_deref().unwrap_or(DEFAULT_VERSION))
    }

    /// The region's abstract in `lang`, or an empty string.
    pub fn abstract_text(&mut self, lang: &str) -> Result<&str> {
        if !self.abstracts.contains_key(lang) {
            let text = self
                .regions
                .block_abstract(&normalize_name(&self.name), lang)?
                .unwrap_or_default();
            self.abstracts.insert(lang.to_owned(), text);
        }
        Ok(self.abstracts.get(lang).map(String::as_str).unwrap_or_default())
    }

    pub fn prev(&self) -> Result<Option<Region<'r>>> {
        let row = self.regions.region_before(self.kind, self.limits.0)?;
        Ok(row.map(|row| self.open_row(self.kind, row)))
    }

    pub fn next(&self) -> Result<Option<Region<'r>>> {
        let row = self.regions.region_after(self.kind, self.limits.1)?;
        Ok(row.map(|row| self.open_row(self.kind, row)))
    }

    /// The plane enclosing this region.
    pub fn plane(&self) -> Result<Region<'r>> {
        let row = self
            .regions
            .region_enclosing(RegionKind::Plane, self.limits.0, self.limits.1)?
            .ok_or_else(|| UnirangeError::NotFound(format!("no plane found for {}", self.name)))?;
        Ok(self.open_row(RegionKind::Plane, row))
    }
}

impl fmt::Display for Region<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Region<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Region")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("limits", &self.limits)
            .field("range", &self.range)
            .finish()
    }
}

// "15.1" sorts after "9.0"
fn version_key(age: &str) -> Vec<u32> {
    age.split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}
