//! Heading extraction helpers.
//!
//! [`parse_headings`] walks a document once, skipping fenced code blocks,
//! and returns every ATX heading with its line number. The auto-numbering
//! engine uses the result to translate literal `#` counts into relative
//! nesting depths.

use crate::classify::classify_line;

/// One heading in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Literal `#` count, 1 to 6.
    pub level: usize,
    /// Heading text.
    pub text: String,
    /// 0-based line index.
    pub line: usize,
}

/// Collect all headings outside fenced code blocks.
#[must_use]
pub fn parse_headings(markdown: &str, parse_quotes: bool) -> Vec<Heading> {
    let mut out = Vec::new();
    let mut in_code = false;
    for (idx, line) in markdown.lines().enumerate() {
        let info = classify_line(line, parse_quotes, in_code);
        if info.toggles_code {
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }
        if let Some(heading) = info.heading {
            out.push(Heading {
                level: heading.level,
                text: heading.text,
                line: idx,
            });
        }
    }
    out
}

/// Compute each heading's position in the actual nesting sequence.
///
/// The result is 1-based and parallel to the input: a document opening with
/// `##` followed by `####` yields `[1, 2]`, regardless of the literal marker
/// counts.
#[must_use]
pub fn relative_levels(headings: &[Heading]) -> Vec<usize> {
    let mut stack: Vec<usize> = Vec::new();
    let mut out = Vec::with_capacity(headings.len());
    for heading in headings {
        while stack.last().is_some_and(|&top| top >= heading.level) {
            stack.pop();
        }
        stack.push(heading.level);
        out.push(stack.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_headings_outside_fences() {
        let text = "# One\n```\n# not real\n```\n## Two";
        let headings = parse_headings(text, false);
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[1].line, 4);
    }

    #[test]
    fn quoted_headings_need_quote_parsing() {
        let text = "> # Quoted";
        assert!(parse_headings(text, false).is_empty());
        let headings = parse_headings(text, true);
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].text, "Quoted");
    }

    #[test]
    fn relative_levels_ignore_literal_counts() {
        let headings = parse_headings("## A\n#### B\n### C\n# D", false);
        assert_eq!(relative_levels(&headings), vec![1, 2, 2, 1]);
    }
}
