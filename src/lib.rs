//! Unirange – lazy, deduplicated sets of Unicode codepoints backed by a metadata store.
//!
//! The crate centers on the [`range::RangeSet`]: an ordered set of codepoint
//! ids that is resolved into records only when somebody looks at it.
//! * A [`construct::CodepointId`] is a plain `u32` in `0..=0x10FFFF`.
//! * A [`construct::CodepointRecord`] holds the display name, a fallback-name
//!   flag and an image reference; records are shared as [`construct::Codepoint`]
//!   (`Arc`) handles kept by a [`construct::Resolver`].
//! * A [`range::RangeSet`] starts out with pending ids and materializes them
//!   with one batch call to a [`persist::Store`] on first access.
//!
//! ## Modules
//! * [`construct`] – Codepoint records, the keeper and the resolver.
//! * [`persist`] – The `Store` traits and the SQLite implementation.
//! * [`range`] – `RangeSet`, its materialized form and cursors.
//! * [`toolkit`] – Parsing of codepoint notations, range expressions and strings.
//! * [`region`] – Unicode blocks and planes as named ranges.
//! * [`settings`] – File and environment configuration.
//!
//! ## Input Policy
//! Malformed input never fails an operation. Unreadable tokens, negative or
//! non-numeric ids and unknown codepoints are left out and counted in
//! [`range::Diagnostics`]. Only store failures surface as errors, and a failed
//! materialization can simply be retried.
//!
//! ## Quick Start
//! ```
//! use unirange::construct::Resolver;
//! use unirange::persist::{CodepointRow, PersistenceMode, SqliteStore};
//! use unirange::toolkit::parse_range_expression;
//! let store = SqliteStore::new(PersistenceMode::InMemory).unwrap();
//! for (cp, name) in [(0x41, "LATIN CAPITAL LETTER A"), (0x43, "LATIN CAPITAL LETTER C")] {
//!     let row = CodepointRow { cp, na: Some(name.to_string()), ..Default::default() };
//!     store.insert_codepoint(&row, Some("1.1")).unwrap();
//! }
//! let resolver = Resolver::new(&store);
//! let mut range = parse_range_expression("U+0043..U+0041", &resolver);
//! assert!(!range.is_materialized());
//! assert_eq!(range.ids().unwrap(), vec![0x41, 0x43]);
//! ```

pub mod construct;
pub mod error;
pub mod persist;
pub mod range;
pub mod region;
pub mod settings;
pub mod toolkit;

pub use error::{Result, UnirangeError};
