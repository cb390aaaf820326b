//! Citation scanning.
//!
//! [`parse_citations`] walks a document line by line and returns every
//! inline-math span holding exactly one `\ref{...}` marker. Fenced code
//! blocks, inline code spans, and display math are never scanned, and a
//! span whose content touches its `$` delimiters with a space is rejected
//! outright; hand-authored citations are expected to be tight.

use std::sync::LazyLock;

use regex::Regex;

use crate::classify::classify_line;
use crate::lazy_regex;

static REF_RE: LazyLock<Regex> =
    lazy_regex!(r"\\ref\{([^}]*)\}", "ref marker pattern should compile");

/// One parsed `\ref{...}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationRef {
    /// Raw text inside the braces: prefix plus tag body, possibly several
    /// comma-joined tags.
    pub label: String,
    /// 0-based line index of the span.
    pub line: usize,
    /// Byte offset of the span's opening `$` within its line.
    pub start: usize,
    /// The whole `$...$` span text.
    pub full_match: String,
}

/// Scan a document for inline-math citations.
///
/// A document without citations returns an empty vector in one pass over
/// the text.
///
/// # Examples
///
/// ```
/// use mdcite::citations::parse_citations;
///
/// let refs = parse_citations("see $\\ref{eq:1.2}$ above");
/// assert_eq!(refs.len(), 1);
/// assert_eq!(refs[0].label, "eq:1.2");
/// assert_eq!(refs[0].full_match, "$\\ref{eq:1.2}$");
/// ```
#[must_use]
pub fn parse_citations(markdown: &str) -> Vec<CitationRef> {
    let mut out = Vec::new();
    let mut in_code = false;
    let mut in_display = false;

    for (idx, line) in markdown.lines().enumerate() {
        let info = classify_line(line, false, in_code);
        if info.toggles_code {
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }
        if in_display {
            if info.block_end {
                in_display = false;
            }
            continue;
        }
        if info.equation.is_some() {
            continue;
        }
        if info.block_start {
            in_display = true;
            continue;
        }

        for (start, end) in inline_math_spans(&info.content) {
            let inner = &info.content[start + 1..end - 1];
            if inner.starts_with(' ') || inner.ends_with(' ') {
                continue;
            }
            if inner.matches("\\ref{").count() != 1 {
                continue;
            }
            let Some(cap) = REF_RE.captures(inner) else {
                continue;
            };
            out.push(CitationRef {
                label: cap[1].to_string(),
                line: idx,
                start,
                full_match: info.content[start..end].to_string(),
            });
        }
    }
    out
}

/// Pair isolated `$` characters left to right into inline-math spans.
///
/// A `$` is isolated when neither neighbour is a `$`, which keeps every
/// `$$` display delimiter out of consideration. Returned ranges include
/// both delimiters; a trailing unpaired `$` is dropped.
fn inline_math_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut singles = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'$'
            && !(i > 0 && bytes[i - 1] == b'$')
            && bytes.get(i + 1) != Some(&b'$')
        {
            singles.push(i);
        }
    }
    singles
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1] + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn finds_citation_with_line_and_span() {
        let refs = parse_citations("intro\ntext $\\ref{eq:1.1}$ tail");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].line, 1);
        assert_eq!(refs[0].start, 5);
        assert_eq!(refs[0].label, "eq:1.1");
    }

    #[test]
    fn finds_multiple_spans_on_one_line() {
        let refs = parse_citations("$\\ref{eq:1}$ and $\\ref{eq:2}$");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].label, "eq:2");
    }

    #[rstest]
    #[case("$ \\ref{eq:1}$")]
    #[case("$\\ref{eq:1} $")]
    fn rejects_space_against_delimiters(#[case] line: &str) {
        assert!(parse_citations(line).is_empty());
    }

    #[test]
    fn rejects_multiple_refs_in_one_span() {
        assert!(parse_citations("$\\ref{a}\\ref{b}$").is_empty());
    }

    #[test]
    fn skips_fenced_code_blocks() {
        let text = "```\n$\\ref{eq:1}$\n```\n$\\ref{eq:2}$";
        let refs = parse_citations(text);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].label, "eq:2");
    }

    #[test]
    fn skips_inline_code() {
        assert!(parse_citations("`$\\ref{eq:1}$`").is_empty());
    }

    #[test]
    fn skips_display_math() {
        let text = "$$\n\\ref{eq:1}\n$$\n$$a = $\\ref{eq:2}$ b$$";
        assert!(parse_citations(text).is_empty());
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(parse_citations("").is_empty());
    }
}
