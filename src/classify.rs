//! Per-line Markdown classification.
//!
//! [`classify_line`] inspects one line of text together with the caller's
//! running state (inside a fenced code block, quote parsing enabled) and
//! reports everything the higher layers need to know about it: quote depth,
//! code fence toggling, heading shape, display-math boundaries, and image
//! lines. The function itself is stateless; callers thread the running flags.

use std::sync::LazyLock;

use regex::Regex;

use crate::lazy_regex;

static HEADING_RE: LazyLock<Regex> =
    lazy_regex!(r"^(#{1,6})\s+(.*)$", "heading pattern should compile");

static CALLOUT_RE: LazyLock<Regex> =
    lazy_regex!(r"^\[![^\]]*\]\s*", "callout marker pattern should compile");

/// A matched ATX heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    /// Number of `#` markers, 1 to 6.
    pub level: usize,
    /// Heading text after the markers.
    pub text: String,
}

/// Classification of a single line.
///
/// While the caller is inside a multi-line code block and the line does not
/// itself toggle the fence, only `content` and `quote_depth` are meaningful;
/// every other field reports false or empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineInfo {
    /// De-quoted content with inline code spans blanked to spaces. Byte
    /// offsets into `content` line up with the de-quoted source text.
    pub content: String,
    /// Number of leading `>` markers stripped (0 when quote parsing is off).
    pub quote_depth: usize,
    /// ATX heading match, if any.
    pub heading: Option<HeadingMatch>,
    /// The line flips fenced code block state.
    pub toggles_code: bool,
    /// Inner text of a single-line `$$...$$` equation.
    pub equation: Option<String>,
    /// The line opens a multi-line `$$` block.
    pub block_start: bool,
    /// The line closes a multi-line `$$` block.
    pub block_end: bool,
    /// The trimmed content starts with `!`.
    pub is_image: bool,
}

/// Classify one line of Markdown.
///
/// # Examples
///
/// ```
/// use mdcite::classify::classify_line;
///
/// let info = classify_line("## Results", false, false);
/// assert_eq!(info.heading.unwrap().level, 2);
///
/// let info = classify_line("$$E = mc^2$$", false, false);
/// assert_eq!(info.equation.as_deref(), Some("E = mc^2"));
/// ```
#[must_use]
pub fn classify_line(line: &str, parse_quotes: bool, in_code_block: bool) -> LineInfo {
    let (quote_depth, dequoted) = if parse_quotes {
        strip_quote_markers(line)
    } else {
        (0, line.to_string())
    };
    let dequoted = if quote_depth > 0 {
        CALLOUT_RE.replace(&dequoted, "").into_owned()
    } else {
        dequoted
    };

    // Counting runs makes the check indifferent to quote-marker prefixes.
    let toggles_code = line.matches("```").count() % 2 == 1;

    if in_code_block && !toggles_code {
        return LineInfo {
            content: dequoted,
            quote_depth,
            ..LineInfo::default()
        };
    }

    let content = blank_inline_code(&dequoted);

    let heading = HEADING_RE.captures(&content).map(|cap| HeadingMatch {
        level: cap[1].len(),
        text: cap[2].to_string(),
    });

    let equation = single_line_equation(&content).map(str::to_string);
    let (block_start, block_end) = if equation.is_some() || toggles_code {
        (false, false)
    } else {
        (opens_block(&content), closes_block(&content))
    };

    let is_image = content.trim_start().starts_with('!');

    LineInfo {
        content,
        quote_depth,
        heading,
        toggles_code,
        equation,
        block_start,
        block_end,
        is_image,
    }
}

/// Strip leading blockquote markers, returning the depth and the remainder.
///
/// Spaces interleaved with the `>` markers are ignored; a single space after
/// the final marker is consumed. A line with no marker is returned unchanged.
fn strip_quote_markers(line: &str) -> (usize, String) {
    let mut depth = 0;
    let mut end = 0;
    for (idx, ch) in line.char_indices() {
        match ch {
            '>' => {
                depth += 1;
                end = idx + 1;
            }
            ' ' | '\t' => {}
            _ => break,
        }
    }
    if depth == 0 {
        return (0, line.to_string());
    }
    let rest = line[end..].strip_prefix(' ').unwrap_or(&line[end..]);
    (depth, rest.to_string())
}

/// Blank backtick-delimited spans to spaces, honouring `\`-escaped backticks.
///
/// Every character of the span, backticks included, becomes one space per
/// byte so that column offsets into the result match the source exactly. An
/// unterminated opening backtick is left as literal text.
#[must_use]
pub fn blank_inline_code(text: &str) -> String {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut blank = vec![false; chars.len()];
    let mut i = 0;
    while i < chars.len() {
        match chars[i].1 {
            '\\' => i += 2,
            '`' => {
                let mut j = i + 1;
                let mut close = None;
                while j < chars.len() {
                    match chars[j].1 {
                        '\\' => j += 2,
                        '`' => {
                            close = Some(j);
                            break;
                        }
                        _ => j += 1,
                    }
                }
                if let Some(j) = close {
                    for flag in &mut blank[i..=j] {
                        *flag = true;
                    }
                    i = j + 1;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    let mut out = String::with_capacity(text.len());
    for (idx, &(_, ch)) in chars.iter().enumerate() {
        if blank[idx] {
            for _ in 0..ch.len_utf8() {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Match a whole-line `$$...$$` equation, rejecting `$$$` runs on either side.
fn single_line_equation(content: &str) -> Option<&str> {
    let t = content.trim();
    if t.len() < 5 || !t.starts_with("$$") || !t.ends_with("$$") {
        return None;
    }
    let inner = &t[2..t.len() - 2];
    if inner.starts_with('$') || inner.ends_with('$') {
        return None;
    }
    Some(inner)
}

fn opens_block(content: &str) -> bool {
    content.starts_with("$$") && !content[2..].starts_with('$')
}

/// A closing `$$` at end of line; an escaped `\$$` does not close.
fn closes_block(content: &str) -> bool {
    content.ends_with("$$") && !content[..content.len() - 2].ends_with('\\')
}
