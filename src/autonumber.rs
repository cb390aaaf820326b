//! Hierarchical auto-numbering of tagged objects.
//!
//! The walk visits a document once, tracking heading structure through a
//! per-level counter array, and assigns the next hierarchical tag to every
//! equation (or figure) it passes. The raw line is edited in place, so
//! quoting and spacing around an object survive untouched. The result is
//! the rewritten text plus the old-tag to new-tag mapping the citation
//! rewrite engine consumes.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::classify::{LineInfo, classify_line};
use crate::config::{NumberingOptions, NumberingStyle, TagFormat};
use crate::error::Error;
use crate::headings::{parse_headings, relative_levels};
use crate::lazy_regex;

static LATEX_TAG_RE: LazyLock<Regex> =
    lazy_regex!(r"\\tag\{([^}]*)\}", "latex tag pattern should compile");

static TYPST_LABEL_RE: LazyLock<Regex> =
    lazy_regex!(r##"#label\("([^"]*)"\)"##, "typst label pattern should compile");

/// One old-tag to new-tag substitution produced by a numbering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRename {
    /// Tag the object carried before the pass.
    pub old: String,
    /// Tag assigned by the pass.
    pub new: String,
}

/// Result of numbering one document.
#[derive(Debug, Clone)]
pub struct NumberingOutcome {
    /// Rewritten document text.
    pub text: String,
    /// Old-tag to new-tag pairs, first occurrence of each old tag only.
    pub renames: Vec<TagRename>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ObjectKind {
    Equations,
    Figures,
}

/// Number every equation in the document.
///
/// # Errors
/// Returns [`Error::IllegalNesting`] when a `$$` pair sits strictly inside
/// an equation (the document is left untouched), or [`Error::Config`] for
/// unusable options.
pub fn auto_number_equations(
    markdown: &str,
    opts: &NumberingOptions,
) -> Result<NumberingOutcome, Error> {
    walk(markdown, opts, ObjectKind::Equations)
}

/// Number every image line in the document.
///
/// Mirrors [`auto_number_equations`] exactly, with image lines as the
/// taggable object; the annotation sits at the end of the image line.
///
/// # Errors
/// Returns [`Error::Config`] for unusable options.
pub fn auto_number_figures(
    markdown: &str,
    opts: &NumberingOptions,
) -> Result<NumberingOutcome, Error> {
    walk(markdown, opts, ObjectKind::Figures)
}

/// Collect every non-empty object tag annotation in a document.
///
/// The rewrite engine checks citations against this set when pruning
/// references that no longer resolve to anything. Fenced code blocks are
/// skipped; everything else is scanned, so annotations inside multi-line
/// equation blocks are found without replaying the block state machine.
#[must_use]
pub fn collect_object_tags(markdown: &str, format: TagFormat) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut in_code = false;
    for line in markdown.lines() {
        let info = classify_line(line, false, in_code);
        if info.toggles_code {
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }
        for cap in annotation_re(format).captures_iter(&info.content) {
            let tag = &cap[1];
            if !tag.is_empty() {
                out.insert(tag.to_string());
            }
        }
    }
    out
}

/// Counters threaded through one numbering walk. Created fresh per
/// invocation and discarded afterwards.
struct Counters {
    levels: Vec<u64>,
    obj_before_heading: u64,
    obj: u64,
    depth: usize,
}

impl Counters {
    fn new(max_depth: usize) -> Self {
        Self {
            levels: vec![0; max_depth],
            obj_before_heading: 0,
            obj: 0,
            depth: 0,
        }
    }

    /// Advance the counter array for a heading at `level`.
    ///
    /// Ancestor levels still at zero are forced to one so a jump from `#`
    /// straight to `###` keeps a sane parent number. Levels beyond the
    /// counter array leave all state untouched.
    fn observe_heading(&mut self, level: usize) {
        if level == 0 || level > self.levels.len() {
            return;
        }
        for counter in &mut self.levels[..level - 1] {
            if *counter == 0 {
                *counter = 1;
            }
        }
        self.levels[level - 1] += 1;
        for counter in &mut self.levels[level..] {
            *counter = 0;
        }
        self.obj = 0;
        self.depth = level;
    }

    fn next_tag(&mut self, opts: &NumberingOptions) -> String {
        if self.depth == 0 {
            self.obj_before_heading += 1;
            return format!(
                "{}{}{}",
                opts.global_prefix, opts.no_heading_prefix, self.obj_before_heading
            );
        }
        self.obj += 1;
        let joined = self.levels[..self.depth]
            .iter()
            .filter(|counter| **counter > 0)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&opts.delimiter);
        if joined.is_empty() {
            format!("{}{}", opts.global_prefix, self.obj)
        } else {
            format!("{}{}{}{}", opts.global_prefix, joined, opts.delimiter, self.obj)
        }
    }
}

struct Block {
    line_indices: Vec<usize>,
    contents: Vec<String>,
}

fn walk(
    markdown: &str,
    opts: &NumberingOptions,
    kind: ObjectKind,
) -> Result<NumberingOutcome, Error> {
    opts.validate()?;

    let relative: HashMap<usize, usize> = if opts.style == NumberingStyle::Relative {
        let headings = parse_headings(markdown, opts.parse_quotes);
        let levels = relative_levels(&headings);
        headings
            .iter()
            .zip(levels)
            .map(|(heading, level)| (heading.line, level))
            .collect()
    } else {
        HashMap::new()
    };

    let lines: Vec<&str> = markdown.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut counters = Counters::new(opts.max_depth);
    let mut renames: Vec<TagRename> = Vec::new();
    let mut seen_old: HashSet<String> = HashSet::new();
    let mut in_code = false;
    let mut block: Option<Block> = None;

    for (idx, raw) in lines.iter().enumerate() {
        let info = classify_line(raw, opts.parse_quotes, in_code);

        if info.toggles_code && block.is_none() {
            in_code = !in_code;
            out.push((*raw).to_string());
            continue;
        }
        if in_code {
            out.push((*raw).to_string());
            continue;
        }

        if let Some(open) = &mut block {
            open.line_indices.push(idx);
            open.contents.push(info.content);
            if info.block_end {
                let closed = block.take().expect("block is open");
                finish_block(
                    &closed, &lines, &mut out, &mut counters, &mut renames, &mut seen_old, opts,
                    kind,
                )?;
            }
            continue;
        }

        if let Some(heading) = &info.heading {
            let level = match opts.style {
                NumberingStyle::Absolute => heading.level,
                NumberingStyle::Relative => relative.get(&idx).copied().unwrap_or(heading.level),
            };
            counters.observe_heading(level);
            out.push((*raw).to_string());
            continue;
        }

        match kind {
            ObjectKind::Equations => {
                if let Some(body) = &info.equation {
                    if body.contains("$$") {
                        return Err(Error::IllegalNesting { line: idx + 1 });
                    }
                    out.push(retag_single_line(
                        raw, &info, opts, &mut counters, &mut renames, &mut seen_old,
                    ));
                    continue;
                }
                if info.block_start {
                    block = Some(Block {
                        line_indices: vec![idx],
                        contents: vec![info.content],
                    });
                    continue;
                }
            }
            ObjectKind::Figures => {
                if info.block_start || info.equation.is_some() {
                    // Equations are inert in figure mode, but their bodies
                    // must not be scanned for image lines.
                    if info.equation.is_none() {
                        block = Some(Block {
                            line_indices: vec![idx],
                            contents: vec![info.content],
                        });
                    } else {
                        out.push((*raw).to_string());
                    }
                    continue;
                }
                if info.is_image {
                    out.push(retag_image_line(
                        raw, &info, opts, &mut counters, &mut renames, &mut seen_old,
                    ));
                    continue;
                }
            }
        }

        out.push((*raw).to_string());
    }

    // An unterminated block reaches the end of the document untagged.
    if let Some(open) = block {
        for &idx in &open.line_indices {
            out.push(lines[idx].to_string());
        }
    }

    let mut text = out.join("\n");
    if markdown.ends_with('\n') {
        text.push('\n');
    }
    Ok(NumberingOutcome { text, renames })
}

fn annotation_re(format: TagFormat) -> &'static Regex {
    match format {
        TagFormat::Latex => &LATEX_TAG_RE,
        TagFormat::Typst => &TYPST_LABEL_RE,
    }
}

fn format_annotation(format: TagFormat, tag: &str) -> String {
    match format {
        TagFormat::Latex => format!("\\tag{{{tag}}}"),
        TagFormat::Typst => format!("#label(\"{tag}\")"),
    }
}

/// Replace the annotation matched at `range` of a line's cleaned content
/// within the raw line. Quote stripping only ever removes a prefix and
/// inline-code blanking is length-preserving, so raw offsets are the
/// content offsets shifted by the prefix length.
fn splice_annotation(raw: &str, content: &str, range: std::ops::Range<usize>, ann: &str) -> String {
    let shift = raw.len() - content.len();
    let mut line = String::with_capacity(raw.len() + ann.len());
    line.push_str(&raw[..range.start + shift]);
    line.push_str(ann);
    line.push_str(&raw[range.end + shift..]);
    line
}

/// Insert an annotation at `pos` of the raw line, just before the closing
/// `$$`, padding with one space against preceding text.
fn insert_annotation_at(raw: &str, pos: usize, ann: &str) -> String {
    let head = &raw[..pos];
    let tail = &raw[pos..];
    if head.is_empty() || head.ends_with(' ') {
        format!("{head}{ann}{tail}")
    } else {
        format!("{head} {ann}{tail}")
    }
}

fn record_rename(
    renames: &mut Vec<TagRename>,
    seen_old: &mut HashSet<String>,
    old: &str,
    new: &str,
) {
    if !old.is_empty() && seen_old.insert(old.to_string()) {
        renames.push(TagRename {
            old: old.to_string(),
            new: new.to_string(),
        });
    }
}

fn retag_single_line(
    raw: &str,
    info: &LineInfo,
    opts: &NumberingOptions,
    counters: &mut Counters,
    renames: &mut Vec<TagRename>,
    seen_old: &mut HashSet<String>,
) -> String {
    let existing = annotation_re(opts.format).captures(&info.content);
    let old = existing
        .as_ref()
        .map_or("", |cap| cap.get(1).expect("capture group").as_str());
    if opts.tagged_only && old.is_empty() {
        return raw.to_string();
    }

    let new = counters.next_tag(opts);
    record_rename(renames, seen_old, old, &new);
    let ann = format_annotation(opts.format, &new);
    match existing {
        Some(cap) => {
            let range = cap.get(0).expect("whole match").range();
            splice_annotation(raw, &info.content, range, &ann)
        }
        None => {
            let shift = raw.len() - info.content.len();
            let pos = info.content.trim_end().len() - 2 + shift;
            insert_annotation_at(raw, pos, &ann)
        }
    }
}

fn retag_image_line(
    raw: &str,
    info: &LineInfo,
    opts: &NumberingOptions,
    counters: &mut Counters,
    renames: &mut Vec<TagRename>,
    seen_old: &mut HashSet<String>,
) -> String {
    let existing = annotation_re(opts.format).captures(&info.content);
    let old = existing
        .as_ref()
        .map_or("", |cap| cap.get(1).expect("capture group").as_str());
    if opts.tagged_only && old.is_empty() {
        return raw.to_string();
    }

    let new = counters.next_tag(opts);
    record_rename(renames, seen_old, old, &new);
    let ann = format_annotation(opts.format, &new);
    match existing {
        Some(cap) => {
            let range = cap.get(0).expect("whole match").range();
            splice_annotation(raw, &info.content, range, &ann)
        }
        None => format!("{} {ann}", raw.trim_end()),
    }
}

#[expect(clippy::too_many_arguments, reason = "walk state threaded explicitly")]
fn finish_block(
    closed: &Block,
    lines: &[&str],
    out: &mut Vec<String>,
    counters: &mut Counters,
    renames: &mut Vec<TagRename>,
    seen_old: &mut HashSet<String>,
    opts: &NumberingOptions,
    kind: ObjectKind,
) -> Result<(), Error> {
    if kind == ObjectKind::Figures {
        for &idx in &closed.line_indices {
            out.push(lines[idx].to_string());
        }
        return Ok(());
    }

    check_block_nesting(closed)?;

    let annotated = closed.contents.iter().enumerate().find_map(|(pos, content)| {
        annotation_re(opts.format)
            .captures(content)
            .map(|cap| (pos, cap))
    });
    let old = annotated
        .as_ref()
        .map_or("", |(_, cap)| cap.get(1).expect("capture group").as_str());
    if opts.tagged_only && old.is_empty() {
        for &idx in &closed.line_indices {
            out.push(lines[idx].to_string());
        }
        return Ok(());
    }

    let new = counters.next_tag(opts);
    record_rename(renames, seen_old, old, &new);
    let ann = format_annotation(opts.format, &new);

    for (pos, &idx) in closed.line_indices.iter().enumerate() {
        let raw = lines[idx];
        match &annotated {
            Some((tagged_pos, cap)) if *tagged_pos == pos => {
                let range = cap.get(0).expect("whole match").range();
                out.push(splice_annotation(raw, &closed.contents[pos], range, &ann));
            }
            Some(_) => out.push(raw.to_string()),
            None if pos == closed.line_indices.len() - 1 => {
                let content = &closed.contents[pos];
                let shift = raw.len() - content.len();
                out.push(insert_annotation_at(raw, content.len() - 2 + shift, &ann));
            }
            None => out.push(raw.to_string()),
        }
    }
    Ok(())
}

/// Reject a `$$` pair strictly between a block's opening and closing
/// delimiters.
fn check_block_nesting(closed: &Block) -> Result<(), Error> {
    let last = closed.contents.len() - 1;
    for (pos, content) in closed.contents.iter().enumerate() {
        let interior = match pos {
            0 => content.get(2..).unwrap_or(""),
            p if p == last => content.get(..content.len().saturating_sub(2)).unwrap_or(""),
            _ => content.as_str(),
        };
        if interior.contains("$$") {
            return Err(Error::IllegalNesting {
                line: closed.line_indices[pos] + 1,
            });
        }
    }
    Ok(())
}
