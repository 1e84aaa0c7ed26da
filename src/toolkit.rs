use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::construct::{Codepoint, CodepointId, Resolver, MAX_CODEPOINT};
use crate::error::Result;
use crate::range::RangeSet;

/// Strings with this many scalar values or more are not decomposed at all.
pub const PARSE_STRING_MAX_LEN: usize = 256;

lazy_static! {
    // U+41, U-41, \U41, 0x41, U41 or plain 41
    static ref CODEPOINT: Regex = Regex::new(r"(?i)^(?:U[+-]|\\U|0x|U)?([0-9a-f]+)$").unwrap();
    static ref JUNK_SEPARATOR: Regex = Regex::new(r"\s*(?:,\s*)+").unwrap();
    static ref RANGE_SEPARATOR: Regex = Regex::new(r"\s*(?:-|\.\.|:)\s*").unwrap();
}

/// Lowercases `name` and strips spaces and underscores, so that
/// `"Basic_Latin"`, `"basic latin"` and `"BASICLATIN"` compare equal.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '_')
        .collect()
}

/// Reads a single codepoint notation. The whole token has to match; the
/// value itself is not checked against the codespace, only against `u32`.
pub fn parse_codepoint(token: &str) -> Option<CodepointId> {
    let captures = CODEPOINT.captures(token)?;
    let digits = captures.get(1)?.as_str();
    CodepointId::from_str_radix(digits, 16).ok()
}

/// Builds a lazy range from expressions like `U+0041..U+005A, 0x61-7A, 20`.
///
/// Comma separated junks are read independently. A junk with one token adds
/// that codepoint, two tokens add the inclusive range between them in either
/// direction, and three or more tokens add the single span from the smallest
/// to the largest readable token. Unreadable tokens are skipped. Spans are
/// cut off at the top of the codespace.
pub fn parse_range_expression<'r>(text: &str, resolver: &'r Resolver<'r>) -> RangeSet<'r> {
    let (ids, rejected) = expand_range_expression(text);
    if rejected > 0 {
        debug!(rejected, expression = text, "skipped unreadable range tokens");
    }
    let mut range = RangeSet::new(ids, resolver);
    range.note_rejected_tokens(rejected);
    range
}

fn expand_range_expression(text: &str) -> (Vec<CodepointId>, usize) {
    let mut ids = Vec::new();
    let mut rejected = 0;
    for junk in JUNK_SEPARATOR.split(text.trim()) {
        let parsed: Vec<Option<CodepointId>> =
            RANGE_SEPARATOR.split(junk).map(parse_codepoint).collect();
        rejected += parsed.iter().filter(|cp| cp.is_none()).count();
        match parsed.as_slice() {
            [] => (),
            [single] => ids.extend(*single),
            [Some(low), Some(high)] => ids.extend(span(*low.min(high), *low.max(high))),
            [_, _] => (),
            tokens => {
                let valid = tokens.iter().flatten();
                if let (Some(min), Some(max)) = (valid.clone().min(), valid.max()) {
                    ids.extend(span(*min, *max));
                }
            }
        }
    }
    (ids, rejected)
}

// empty when `low` itself lies beyond the codespace
fn span(low: CodepointId, high: CodepointId) -> std::ops::RangeInclusive<CodepointId> {
    low..=high.min(MAX_CODEPOINT)
}

/// Resolves every scalar value of `text`, left to right and keeping
/// duplicates. Scalars the store does not know are left out. Input of
/// `max_len` scalars or more yields nothing.
pub fn parse_string(text: &str, resolver: &Resolver, max_len: usize) -> Result<Vec<Codepoint>> {
    let length = text.chars().count();
    if length >= max_len {
        debug!(length, max_len, "string too long to decompose");
        return Ok(Vec::new());
    }
    let mut codepoints = Vec::with_capacity(length);
    for c in text.chars() {
        match resolver.resolve(CodepointId::from(c), None)? {
            Some(codepoint) => codepoints.push(codepoint),
            None => trace!(cp = u32::from(c), "unknown scalar skipped"),
        }
    }
    Ok(codepoints)
}
