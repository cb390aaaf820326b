//! Tag string algebra.
//!
//! Pure functions over citation tag strings: splitting the cross-file
//! envelope from the local numbering path, extracting the trailing number
//! and its prefix, and converting between compact range form (`1.1~3`) and
//! discrete form (`1.1`, `1.2`, `1.3`). Both the rewrite engine and the
//! export renderer drive their tag handling through this module.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::lazy_regex;

static TRAILING_NUMBER_RE: LazyLock<Regex> =
    lazy_regex!(r"^(.+?)(\d+)$", "trailing number pattern should compile");

/// Split a tag at the **first** occurrence of the file delimiter.
///
/// Returns `(cross_file, local)`. The local part keeps any further
/// delimiter occurrences; only one split is ever performed. A tag without
/// the delimiter has no cross-file part.
///
/// # Examples
///
/// ```
/// use mdcite::tags::split_file_citation;
///
/// assert_eq!(split_file_citation("1^2^1.1.1", "^"), (Some("1"), "2^1.1.1"));
/// assert_eq!(split_file_citation("1.2", "^"), (None, "1.2"));
/// ```
#[must_use]
pub fn split_file_citation<'a>(tag: &'a str, file_delimiter: &str) -> (Option<&'a str>, &'a str) {
    match tag.find(file_delimiter) {
        Some(pos) => (Some(&tag[..pos]), &tag[pos + file_delimiter.len()..]),
        None => (None, tag),
    }
}

/// Extract the trailing number of a tag.
///
/// Looks for the rightmost occurrence of any delimiter and parses what
/// follows it; a non-numeric remainder yields `None`. Without any delimiter
/// a trailing letter-plus-digits shape (`EQ12` → 12) is tried, and finally
/// the whole string is parsed as an integer.
#[must_use]
pub fn last_number_in_tag(tag: &str, delimiters: &[String]) -> Option<u64> {
    if let Some((pos, delim)) = rightmost_delimiter(tag, delimiters) {
        return tag[pos + delim.len()..].parse().ok();
    }
    if let Some(cap) = TRAILING_NUMBER_RE.captures(tag) {
        return cap[2].parse().ok();
    }
    tag.parse().ok()
}

/// Counterpart of [`last_number_in_tag`]: everything up to and including the
/// rightmost delimiter, or the letter prefix in the fallback case, or `""`.
#[must_use]
pub fn prefix_before_last_number<'a>(tag: &'a str, delimiters: &[String]) -> &'a str {
    if let Some((pos, delim)) = rightmost_delimiter(tag, delimiters) {
        return &tag[..pos + delim.len()];
    }
    if let Some(cap) = TRAILING_NUMBER_RE.captures(tag) {
        let prefix = cap.get(1).expect("anchored pattern always captures");
        return &tag[..prefix.end()];
    }
    ""
}

fn rightmost_delimiter<'a>(tag: &str, delimiters: &'a [String]) -> Option<(usize, &'a str)> {
    let mut best: Option<(usize, &'a str)> = None;
    for delim in delimiters {
        if let Some(pos) = tag.rfind(delim.as_str())
            && best.is_none_or(|(found, _)| pos > found)
        {
            best = Some((pos, delim));
        }
    }
    best
}

fn reattach(cross: Option<&str>, local: &str, file_delimiter: &str) -> String {
    match cross {
        Some(cross) => format!("{cross}{file_delimiter}{local}"),
        None => local.to_string(),
    }
}

/// Expand compact range tags into their discrete form.
///
/// A tag whose local part contains the range symbol becomes the inclusive
/// integer sequence between its bounds, each re-attached to the shared
/// prefix and cross-file envelope. Tags without the symbol pass through
/// unchanged, as do ranges with unparsable bounds or `start > end`; the
/// pass-through is a defined fallback, not an error.
///
/// # Examples
///
/// ```
/// use mdcite::tags::split_continuous_tags;
///
/// let delims = vec![".".to_string()];
/// let out = split_continuous_tags(
///     &["2^1.1.1~3".to_string()],
///     "~",
///     &delims,
///     "^",
/// );
/// assert_eq!(out, vec!["2^1.1.1", "2^1.1.2", "2^1.1.3"]);
/// ```
#[must_use]
pub fn split_continuous_tags(
    tags: &[String],
    range_symbol: &str,
    delimiters: &[String],
    file_delimiter: &str,
) -> Vec<String> {
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let (cross, local) = split_file_citation(tag, file_delimiter);
        let Some(pos) = local.find(range_symbol) else {
            out.push(tag.clone());
            continue;
        };
        let head = &local[..pos];
        let tail = &local[pos + range_symbol.len()..];
        let bounds = last_number_in_tag(head, delimiters)
            .zip(tail.parse::<u64>().ok())
            .filter(|(start, end)| start <= end);
        match bounds {
            Some((start, end)) => {
                let prefix = prefix_before_last_number(head, delimiters);
                for n in start..=end {
                    out.push(reattach(cross, &format!("{prefix}{n}"), file_delimiter));
                }
            }
            None => out.push(tag.clone()),
        }
    }
    out
}

#[derive(Clone, Hash, PartialEq, Eq)]
struct GroupKey {
    cross: Option<String>,
    prefix: String,
}

enum Slot {
    Literal(String),
    Numeric { key: GroupKey, number: u64 },
}

/// Collapse runs of consecutive discrete tags into compact range form.
///
/// Inverse of [`split_continuous_tags`]: tags are grouped by cross-file
/// prefix and then by the textual prefix preceding their trailing number,
/// sorted numerically, and maximal runs of consecutive integers merge into a
/// single `start~end` tag (a run of one stays a single tag). Output keeps
/// the input order of first appearance and emits each distinct combined form
/// exactly once. Tags without a trailing number pass through as themselves.
#[must_use]
pub fn combine_continuous_tags(
    tags: &[String],
    range_symbol: &str,
    delimiters: &[String],
    file_delimiter: &str,
) -> Vec<String> {
    let mut slots = Vec::with_capacity(tags.len());
    let mut groups: HashMap<GroupKey, BTreeSet<u64>> = HashMap::new();
    for tag in tags {
        let (cross, local) = split_file_citation(tag, file_delimiter);
        match last_number_in_tag(local, delimiters) {
            Some(number) => {
                let key = GroupKey {
                    cross: cross.map(str::to_string),
                    prefix: prefix_before_last_number(local, delimiters).to_string(),
                };
                groups.entry(key.clone()).or_default().insert(number);
                slots.push(Slot::Numeric { key, number });
            }
            None => slots.push(Slot::Literal(tag.clone())),
        }
    }

    // Map each number to the bounds of the maximal run containing it.
    let mut runs: HashMap<(GroupKey, u64), (u64, u64)> = HashMap::new();
    for (key, numbers) in &groups {
        let sorted: Vec<u64> = numbers.iter().copied().collect();
        let mut i = 0;
        while i < sorted.len() {
            let mut j = i;
            while j + 1 < sorted.len() && sorted[j + 1] == sorted[j] + 1 {
                j += 1;
            }
            for &n in &sorted[i..=j] {
                runs.insert((key.clone(), n), (sorted[i], sorted[j]));
            }
            i = j + 1;
        }
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for slot in slots {
        let rendered = match slot {
            Slot::Literal(tag) => tag,
            Slot::Numeric { key, number } => {
                let (start, end) = runs[&(key.clone(), number)];
                let local = if start == end {
                    format!("{}{start}", key.prefix)
                } else {
                    format!("{}{start}{range_symbol}{end}", key.prefix)
                };
                reattach(key.cross.as_deref(), &local, file_delimiter)
            }
        };
        if seen.insert(rendered.clone()) {
            out.push(rendered);
        }
    }
    out
}
