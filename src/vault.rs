//! Vault boundary: file storage, backlink resolution, footnote lookup.
//!
//! The rewrite engine never touches the filesystem directly; it talks to a
//! [`Vault`]. [`MemoryVault`] backs the test suite, [`DirVault`] backs the
//! CLI with a directory of Markdown notes. Both resolve backlinks and
//! footnote indices through the same pure text parsers, so the two stay
//! behaviourally identical.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::Error;
use crate::lazy_regex;

static WIKI_LINK_RE: LazyLock<Regex> = lazy_regex!(
    r"\[\[(?P<target>[^\]|#]+)(?:#[^\]|]*)?(?:\|[^\]]*)?\]\]",
    "wiki link pattern should compile",
);

static FOOTNOTE_DEF_RE: LazyLock<Regex> = lazy_regex!(
    r"^\s*\[\^(?P<num>\d+)\]\s*:(?P<rest>.*)$",
    "footnote definition pattern should compile",
);

/// A backlink file's local footnote: its index and the note it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootNote {
    /// Footnote index as written, e.g. 3 for `[^3]`.
    pub num: u64,
    /// Link target of the definition, as written inside `[[...]]`.
    pub target: String,
}

/// Storage and link-graph boundary consumed by the rewrite engine.
pub trait Vault {
    /// Read a note's text.
    ///
    /// # Errors
    /// Returns [`Error::FileNotFound`] when the path does not resolve.
    fn read(&self, path: &str) -> Result<String, Error>;

    /// Replace a note's text.
    ///
    /// # Errors
    /// Returns an error when the note cannot be stored.
    fn write(&mut self, path: &str, text: &str) -> Result<(), Error>;

    /// Paths of every note containing at least one link to `path`.
    fn backlinks(&self, path: &str) -> Vec<String>;

    /// Footnote definitions of the note at `path` that carry a link.
    fn footnotes(&self, path: &str) -> Vec<FootNote>;
}

/// Wiki-link targets in a text, in order of appearance.
#[must_use]
pub fn wiki_link_targets(text: &str) -> Vec<String> {
    WIKI_LINK_RE
        .captures_iter(text)
        .map(|cap| cap["target"].trim().to_string())
        .collect()
}

/// Footnote definitions whose body carries a wiki link.
#[must_use]
pub fn link_footnotes(text: &str) -> Vec<FootNote> {
    let mut out = Vec::new();
    for line in text.lines() {
        let Some(cap) = FOOTNOTE_DEF_RE.captures(line) else {
            continue;
        };
        let Ok(num) = cap["num"].parse() else {
            continue;
        };
        if let Some(target) = wiki_link_targets(&cap["rest"]).into_iter().next() {
            out.push(FootNote { num, target });
        }
    }
    out
}

/// File stem used for link matching: the final path segment minus `.md`.
#[must_use]
pub fn note_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name)
}

/// In-memory vault keyed by path.
#[derive(Debug, Default)]
pub struct MemoryVault {
    notes: BTreeMap<String, String>,
}

impl MemoryVault {
    /// Empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a note.
    pub fn insert(&mut self, path: &str, text: &str) {
        self.notes.insert(path.to_string(), text.to_string());
    }

    /// Borrow a note's text, if present.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.notes.get(path).map(String::as_str)
    }
}

impl Vault for MemoryVault {
    fn read(&self, path: &str) -> Result<String, Error> {
        self.notes
            .get(path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound {
                path: path.to_string(),
            })
    }

    fn write(&mut self, path: &str, text: &str) -> Result<(), Error> {
        self.notes.insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn backlinks(&self, path: &str) -> Vec<String> {
        let stem = note_stem(path);
        self.notes
            .iter()
            .filter(|(other, _)| other.as_str() != path)
            .filter(|(_, text)| {
                wiki_link_targets(text)
                    .iter()
                    .any(|target| note_stem(target) == stem)
            })
            .map(|(other, _)| other.clone())
            .collect()
    }

    fn footnotes(&self, path: &str) -> Vec<FootNote> {
        self.notes.get(path).map(String::as_str).map_or_else(Vec::new, link_footnotes)
    }
}

/// Vault over a directory of `.md` files.
#[derive(Debug)]
pub struct DirVault {
    root: PathBuf,
}

impl DirVault {
    /// Wrap a directory root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Root-relative paths of every Markdown file under the root.
    fn note_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                out.push(rel.to_string_lossy().into_owned());
            }
        }
        out
    }

    /// Expose the scan for callers that process a whole vault.
    #[must_use]
    pub fn all_notes(&self) -> Vec<String> {
        self.note_paths()
    }
}

impl Vault for DirVault {
    fn read(&self, path: &str) -> Result<String, Error> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(Error::FileNotFound {
                path: path.to_string(),
            });
        }
        Ok(fs::read_to_string(full)?)
    }

    fn write(&mut self, path: &str, text: &str) -> Result<(), Error> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(fs::write(full, text)?)
    }

    fn backlinks(&self, path: &str) -> Vec<String> {
        let stem = note_stem(path);
        self.note_paths()
            .into_iter()
            .filter(|other| other != path)
            .filter(|other| {
                fs::read_to_string(self.resolve(other)).is_ok_and(|text| {
                    wiki_link_targets(&text)
                        .iter()
                        .any(|target| note_stem(target) == stem)
                })
            })
            .collect()
    }

    fn footnotes(&self, path: &str) -> Vec<FootNote> {
        fs::read_to_string(self.resolve(path)).map_or_else(|_| Vec::new(), |text| link_footnotes(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_wiki_link_targets() {
        let targets = wiki_link_targets("see [[Other Note]] and [[dir/Deep|alias]] and [[N#sec]]");
        assert_eq!(targets, vec!["Other Note", "dir/Deep", "N"]);
    }

    #[test]
    fn parses_linked_footnote_definitions() {
        let text = "body\n[^3]: [[Source]]\n[^4]: no link here\n  [^7]: see [[Other]]";
        let notes = link_footnotes(text);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].num, 3);
        assert_eq!(notes[0].target, "Source");
        assert_eq!(notes[1].num, 7);
    }

    #[test]
    fn stem_strips_directories_and_extension() {
        assert_eq!(note_stem("dir/Note.md"), "Note");
        assert_eq!(note_stem("Note"), "Note");
    }

    #[test]
    fn memory_vault_resolves_backlinks_by_stem() {
        let mut vault = MemoryVault::new();
        vault.insert("a.md", "no links");
        vault.insert("b.md", "see [[a]]");
        vault.insert("c.md", "see [[b]]");
        assert_eq!(vault.backlinks("a.md"), vec!["b.md".to_string()]);
    }

    #[test]
    fn missing_note_reads_as_not_found() {
        let vault = MemoryVault::new();
        assert!(matches!(
            vault.read("gone.md"),
            Err(Error::FileNotFound { .. })
        ));
    }
}
