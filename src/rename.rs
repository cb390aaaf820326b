//! Citation rewrite engine.
//!
//! [`rename_tags`] applies an old-tag to new-tag mapping to every citation
//! in a source note and in every note that links back to it. Cross-file
//! citations are keyed by the backlink note's own footnote index for the
//! source, so each backlink gets its own synthesized map. Two optional
//! policies prune the result: unused-deletion drops tags that no longer
//! resolve to any object in the source, repeat-deletion drops tags whose
//! value would duplicate another tag's post-rename value.
//!
//! Each file is a single read, transform, write step, processed
//! sequentially; there is no rollback of files already written when a later
//! file fails.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::autonumber::{TagRename, collect_object_tags};
use crate::citations::{CitationRef, parse_citations};
use crate::config::{CitationConfig, RenamePolicy, TagFormat};
use crate::error::Error;
use crate::tags::{combine_continuous_tags, split_continuous_tags, split_file_citation};
use crate::vault::{Vault, note_stem};

/// Outcome of one rename pass across the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameReport {
    /// Files whose text actually changed.
    pub files_changed: usize,
    /// Citations changed across all files.
    pub citations_changed: usize,
    /// Per-file changed-citation counts. Files visited without effect stay
    /// in the map with a count of zero.
    pub details: BTreeMap<String, usize>,
}

/// Rewrite citations in `source` and in every backlinking note.
///
/// Inert pairs (`old == new`) are dropped before processing. A backlink
/// that no longer exists, or has no footnote pointing at the source, is
/// recorded as a zero-change entry rather than an error.
///
/// # Errors
/// Returns [`Error::FileNotFound`] when the source itself cannot be read,
/// [`Error::Config`] for an invalid configuration, or an I/O error from the
/// vault while writing.
pub fn rename_tags(
    vault: &mut dyn Vault,
    source: &str,
    pairs: &[TagRename],
    policy: RenamePolicy,
    cfg: &CitationConfig,
    format: TagFormat,
) -> Result<RenameReport, Error> {
    cfg.validate()?;
    let pairs = live_pairs(pairs);

    let source_text = vault.read(source)?;
    let valid = collect_object_tags(&source_text, format);
    let mut details = BTreeMap::new();

    let local_map: HashMap<String, String> = pairs
        .iter()
        .map(|pair| (pair.old.clone(), pair.new.clone()))
        .collect();
    let local_groups: HashSet<Option<String>> = std::iter::once(None).collect();
    let (new_text, changed) = rewrite_text(&source_text, &local_map, &local_groups, &valid, policy, cfg);
    if changed > 0 {
        vault.write(source, &new_text)?;
    }
    details.insert(source.to_string(), changed);

    for backlink in vault.backlinks(source) {
        let Ok(text) = vault.read(&backlink) else {
            details.insert(backlink, 0);
            continue;
        };
        let Some((map, groups)) = cross_file_map(vault, &backlink, source, &pairs, cfg) else {
            details.insert(backlink, 0);
            continue;
        };
        let (new_text, changed) = rewrite_text(&text, &map, &groups, &valid, policy, cfg);
        if changed > 0 {
            vault.write(&backlink, &new_text)?;
        }
        details.insert(backlink, changed);
    }

    Ok(RenameReport {
        files_changed: details.values().filter(|count| **count > 0).count(),
        citations_changed: details.values().sum(),
        details,
    })
}

/// Ask whether applying `pairs` would collapse two distinct citation tags
/// into one value anywhere in the source or its backlink network.
///
/// Pure read-only simulation of [`rename_tags`]; no file is modified. The
/// caller can use the answer to prompt before committing a rename.
///
/// # Errors
/// Returns [`Error::FileNotFound`] when the source cannot be read, or
/// [`Error::Config`] for an invalid configuration.
pub fn check_repeated_tags(
    vault: &dyn Vault,
    source: &str,
    pairs: &[TagRename],
    cfg: &CitationConfig,
) -> Result<bool, Error> {
    cfg.validate()?;
    let pairs = live_pairs(pairs);

    let source_text = vault.read(source)?;
    let local_map: HashMap<String, String> = pairs
        .iter()
        .map(|pair| (pair.old.clone(), pair.new.clone()))
        .collect();
    if would_collide(&source_text, &local_map, cfg) {
        return Ok(true);
    }

    for backlink in vault.backlinks(source) {
        let Ok(text) = vault.read(&backlink) else {
            continue;
        };
        let Some((map, _)) = cross_file_map(vault, &backlink, source, &pairs, cfg) else {
            continue;
        };
        if would_collide(&text, &map, cfg) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn live_pairs(pairs: &[TagRename]) -> Vec<TagRename> {
    pairs
        .iter()
        .filter(|pair| pair.old != pair.new)
        .cloned()
        .collect()
}

/// Build the synthesized cross-file map for one backlink: every rename pair
/// wrapped in every footnote index the backlink assigns to the source.
/// `None` when the backlink carries no footnote for the source.
fn cross_file_map(
    vault: &dyn Vault,
    backlink: &str,
    source: &str,
    pairs: &[TagRename],
    cfg: &CitationConfig,
) -> Option<(HashMap<String, String>, HashSet<Option<String>>)> {
    let stem = note_stem(source);
    let indices: Vec<u64> = vault
        .footnotes(backlink)
        .into_iter()
        .filter(|note| note_stem(&note.target) == stem)
        .map(|note| note.num)
        .collect();
    if indices.is_empty() {
        return None;
    }

    let mut map = HashMap::new();
    let mut groups = HashSet::new();
    for idx in indices {
        groups.insert(Some(idx.to_string()));
        for pair in pairs {
            map.insert(
                format!("{idx}{}{}", cfg.file_delimiter, pair.old),
                format!("{idx}{}{}", cfg.file_delimiter, pair.new),
            );
        }
    }
    Some((map, groups))
}

struct ParsedCitation {
    cite: CitationRef,
    tags: Vec<String>,
}

fn parse_for_rewrite(text: &str, cfg: &CitationConfig) -> Vec<ParsedCitation> {
    parse_citations(text)
        .into_iter()
        .filter(|cite| cite.label.starts_with(&cfg.prefix))
        .map(|cite| {
            let body = cite.label[cfg.prefix.len()..].to_string();
            let parts: Vec<String> = body
                .split(cfg.multi_delimiter.as_str())
                .map(str::to_string)
                .collect();
            let tags = split_continuous_tags(
                &parts,
                &cfg.range_symbol,
                &cfg.delimiters,
                &cfg.file_delimiter,
            );
            ParsedCitation { cite, tags }
        })
        .collect()
}

/// Rewrite every citation in one document. Returns the new text and the
/// number of citations that changed or disappeared.
fn rewrite_text(
    text: &str,
    map: &HashMap<String, String>,
    relevant_groups: &HashSet<Option<String>>,
    valid_locals: &HashSet<String>,
    policy: RenamePolicy,
    cfg: &CitationConfig,
) -> (String, usize) {
    let parsed = parse_for_rewrite(text, cfg);
    if parsed.is_empty() {
        return (text.to_string(), 0);
    }

    // Post-rename values of every tag that the map actually renames,
    // collected file-wide before any edit: repeat-deletion compares against
    // these.
    let renamed_targets: HashSet<String> = parsed
        .iter()
        .flat_map(|citation| citation.tags.iter())
        .filter_map(|tag| map.get(tag).cloned())
        .collect();

    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut changed = 0;

    // Back to front, so earlier spans keep their offsets while later spans
    // on the same line are replaced.
    for citation in parsed.iter().rev() {
        let mut survivors = Vec::new();
        for tag in &citation.tags {
            let renamed = map.get(tag);
            let value = renamed.cloned().unwrap_or_else(|| tag.clone());
            if renamed.is_none() {
                let (cross, local) = split_file_citation(&value, &cfg.file_delimiter);
                let group = cross.map(str::to_string);
                if relevant_groups.contains(&group) {
                    if policy.delete_unused && !valid_locals.contains(local) {
                        continue;
                    }
                    if policy.delete_repeated && renamed_targets.contains(&value) {
                        continue;
                    }
                }
            }
            survivors.push(value);
        }

        let combined = combine_continuous_tags(
            &survivors,
            &cfg.range_symbol,
            &cfg.delimiters,
            &cfg.file_delimiter,
        );
        let line = &mut lines[citation.cite.line];
        let span = citation.cite.start..citation.cite.start + citation.cite.full_match.len();

        if combined.is_empty() {
            line.replace_range(span, "");
            changed += 1;
            continue;
        }

        let new_label = format!("{}{}", cfg.prefix, combined.join(&cfg.multi_delimiter));
        let old_marker = format!("\\ref{{{}}}", citation.cite.label);
        let new_marker = format!("\\ref{{{new_label}}}");
        let old_span = line[span.clone()].to_string();
        let new_span = old_span.replacen(&old_marker, &new_marker, 1);
        if new_span != old_span {
            line.replace_range(span, &new_span);
            changed += 1;
        }
    }

    let mut result = lines.join("\n");
    if text.ends_with('\n') {
        result.push('\n');
    }
    (result, changed)
}

/// True when two distinct discrete tags in the text map to one value.
fn would_collide(text: &str, map: &HashMap<String, String>, cfg: &CitationConfig) -> bool {
    let mut originals: HashSet<String> = HashSet::new();
    for citation in parse_for_rewrite(text, cfg) {
        originals.extend(citation.tags);
    }
    let mut new_forms = HashSet::new();
    originals
        .iter()
        .any(|tag| !new_forms.insert(map.get(tag).unwrap_or(tag).clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;

    fn cfg() -> CitationConfig {
        CitationConfig::default()
    }

    fn pair(old: &str, new: &str) -> TagRename {
        TagRename {
            old: old.to_string(),
            new: new.to_string(),
        }
    }

    fn source_with(tags: &[&str], citations: &str) -> String {
        let mut text = String::from("# Doc\n");
        for tag in tags {
            text.push_str(&format!("$$x \\tag{{{tag}}}$$\n"));
        }
        text.push_str(citations);
        text
    }

    #[test]
    fn renames_citation_in_source() {
        let mut vault = MemoryVault::new();
        vault.insert(
            "note.md",
            &source_with(&["1.1"], "see $\\ref{eq:1.2}$"),
        );
        let report = rename_tags(
            &mut vault,
            "note.md",
            &[pair("1.2", "1.1")],
            RenamePolicy::default(),
            &cfg(),
            TagFormat::Latex,
        )
        .unwrap();
        assert_eq!(report.files_changed, 1);
        assert_eq!(report.citations_changed, 1);
        assert!(vault.get("note.md").unwrap().contains("$\\ref{eq:1.1}$"));
    }

    #[test]
    fn inert_pairs_change_nothing() {
        let mut vault = MemoryVault::new();
        vault.insert("note.md", &source_with(&["1.1"], "see $\\ref{eq:1.1}$"));
        let report = rename_tags(
            &mut vault,
            "note.md",
            &[pair("1.1", "1.1")],
            RenamePolicy::default(),
            &cfg(),
            TagFormat::Latex,
        )
        .unwrap();
        assert_eq!(report.files_changed, 0);
        assert_eq!(report.details["note.md"], 0);
    }

    #[test]
    fn expands_and_recombines_ranges() {
        let mut vault = MemoryVault::new();
        vault.insert(
            "note.md",
            &source_with(&["1.1", "1.2", "1.3"], "see $\\ref{eq:1.1~3}$"),
        );
        let report = rename_tags(
            &mut vault,
            "note.md",
            &[pair("1.2", "1.4")],
            RenamePolicy::default(),
            &cfg(),
            TagFormat::Latex,
        )
        .unwrap();
        assert_eq!(report.citations_changed, 1);
        let text = vault.get("note.md").unwrap();
        // 1.4 and the surviving 1.3 recombine into a fresh range.
        assert!(text.contains("$\\ref{eq:1.1, 1.3~4}$"));
    }

    #[test]
    fn unused_deletion_drops_dangling_tags() {
        let mut vault = MemoryVault::new();
        vault.insert(
            "note.md",
            &source_with(&["1.1"], "see $\\ref{eq:1.1, 9.9}$"),
        );
        let policy = RenamePolicy {
            delete_unused: true,
            ..RenamePolicy::default()
        };
        rename_tags(&mut vault, "note.md", &[], policy, &cfg(), TagFormat::Latex).unwrap();
        assert!(vault.get("note.md").unwrap().contains("$\\ref{eq:1.1}$"));
    }

    #[test]
    fn unused_deletion_removes_empty_citation_span() {
        let mut vault = MemoryVault::new();
        vault.insert("note.md", &source_with(&["1.1"], "see $\\ref{eq:9.9}$ end"));
        let policy = RenamePolicy {
            delete_unused: true,
            ..RenamePolicy::default()
        };
        let report =
            rename_tags(&mut vault, "note.md", &[], policy, &cfg(), TagFormat::Latex).unwrap();
        assert_eq!(report.citations_changed, 1);
        let text = vault.get("note.md").unwrap();
        assert!(text.contains("see  end"));
        assert!(!text.contains("\\ref"));
    }

    #[test]
    fn repeat_deletion_keeps_exactly_one_of_a_colliding_pair() {
        let mut vault = MemoryVault::new();
        vault.insert(
            "note.md",
            &source_with(&["1.1"], "a $\\ref{eq:1.1}$ b $\\ref{eq:1.2}$"),
        );
        let policy = RenamePolicy {
            delete_repeated: true,
            ..RenamePolicy::default()
        };
        let report = rename_tags(
            &mut vault,
            "note.md",
            &[pair("1.1", "1.1"), pair("1.2", "1.1")],
            policy,
            &cfg(),
            TagFormat::Latex,
        )
        .unwrap();
        let text = vault.get("note.md").unwrap();
        // The unrenamed 1.1 collides with 1.2's new value and is dropped;
        // the renamed citation survives.
        assert_eq!(text.matches("\\ref{eq:1.1}").count(), 1);
        assert_eq!(report.citations_changed, 2);
    }

    #[test]
    fn propagates_to_backlinks_via_footnote_index() {
        let mut vault = MemoryVault::new();
        vault.insert("source.md", &source_with(&["1.1"], ""));
        vault.insert(
            "citing.md",
            "see $\\ref{eq:3^1.2}$ and $\\ref{eq:5^1.2}$\n\n[^3]: [[source]]\n[^5]: [[elsewhere]]",
        );
        let report = rename_tags(
            &mut vault,
            "source.md",
            &[pair("1.2", "1.1")],
            RenamePolicy::default(),
            &cfg(),
            TagFormat::Latex,
        )
        .unwrap();
        let text = vault.get("citing.md").unwrap();
        assert!(text.contains("$\\ref{eq:3^1.1}$"));
        // Footnote 5 points at a different note; its citation is untouched.
        assert!(text.contains("$\\ref{eq:5^1.2}$"));
        assert_eq!(report.details["citing.md"], 1);
        assert_eq!(report.files_changed, 1);
    }

    #[test]
    fn backlink_without_relevant_footnote_counts_zero() {
        let mut vault = MemoryVault::new();
        vault.insert("source.md", &source_with(&["1.1"], ""));
        vault.insert("citing.md", "plain link to [[source]] without footnotes");
        let report = rename_tags(
            &mut vault,
            "source.md",
            &[pair("1.1", "2.1")],
            RenamePolicy::default(),
            &cfg(),
            TagFormat::Latex,
        )
        .unwrap();
        assert_eq!(report.details["citing.md"], 0);
    }

    #[test]
    fn unused_deletion_checks_cross_file_groups_against_source_tags() {
        let mut vault = MemoryVault::new();
        vault.insert("source.md", &source_with(&["1.1"], ""));
        vault.insert(
            "citing.md",
            "see $\\ref{eq:3^1.1, 3^9.9}$\n\n[^3]: [[source]]",
        );
        let policy = RenamePolicy {
            delete_unused: true,
            ..RenamePolicy::default()
        };
        rename_tags(&mut vault, "source.md", &[], policy, &cfg(), TagFormat::Latex).unwrap();
        let text = vault.get("citing.md").unwrap();
        assert!(text.contains("$\\ref{eq:3^1.1}$"));
    }

    #[test]
    fn detects_collisions_without_writing() {
        let mut vault = MemoryVault::new();
        let original = source_with(&["1.1"], "a $\\ref{eq:1.1}$ b $\\ref{eq:1.2}$");
        vault.insert("note.md", &original);
        let collides = check_repeated_tags(
            &vault,
            "note.md",
            &[pair("1.2", "1.1")],
            &cfg(),
        )
        .unwrap();
        assert!(collides);
        assert_eq!(vault.get("note.md").unwrap(), original);

        let fine = check_repeated_tags(&vault, "note.md", &[pair("1.2", "1.3")], &cfg()).unwrap();
        assert!(!fine);
    }

    #[test]
    fn citations_with_other_prefixes_are_ignored() {
        let mut vault = MemoryVault::new();
        vault.insert(
            "note.md",
            &source_with(&["1.1"], "see $\\ref{fig:1.2}$"),
        );
        let report = rename_tags(
            &mut vault,
            "note.md",
            &[pair("1.2", "1.1")],
            RenamePolicy::default(),
            &cfg(),
            TagFormat::Latex,
        )
        .unwrap();
        assert_eq!(report.citations_changed, 0);
    }
}
