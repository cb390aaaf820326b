//! Export-only HTML rendering of citations.
//!
//! [`render_citations`] replaces every inline-math citation in a document
//! with a styled span tree for PDF export. It re-derives inline-math
//! boundaries itself rather than reusing the parser's line scan, because it
//! must carry display-math state across lines: a `$` inside an open `$$`
//! block is math text, not a citation delimiter. Range handling goes
//! through the tag algebra, so `1.1, 1.2, 1.3` and `1.1~3` render the same.

use std::fmt::Write;

use crate::classify::{blank_inline_code, classify_line};
use crate::config::CitationConfig;
use crate::error::Error;
use crate::tags::{combine_continuous_tags, split_continuous_tags, split_file_citation};

/// Presentation settings for [`render_citations`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Per-tag display template; the single `#` is replaced by the tag's
    /// local part.
    pub template: String,
    /// Normalise tag lists through range compaction. Off, tags render as
    /// written.
    pub use_ranges: bool,
    /// Class of the outer container span.
    pub container_class: String,
    /// Class of each inner per-tag span.
    pub tag_class: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            template: "Eq. #".to_string(),
            use_ranges: true,
            container_class: "mdcite-citation".to_string(),
            tag_class: "mdcite-tag".to_string(),
        }
    }
}

impl RenderOptions {
    /// Check the presentation settings.
    ///
    /// # Errors
    /// Returns [`Error::Config`] unless the template contains exactly one
    /// `#` placeholder.
    pub fn validate(&self) -> Result<(), Error> {
        if self.template.matches('#').count() != 1 {
            return Err(Error::Config(
                "display template must contain exactly one '#'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replace inline-math citations with HTML spans.
///
/// Display math and fenced code pass through untouched. Inline spans that
/// are not citations (spaced content, no `\ref`, several `\ref`s) also pass
/// through as written.
///
/// # Errors
/// Returns [`Error::Config`] when either configuration value fails
/// validation.
pub fn render_citations(
    markdown: &str,
    cfg: &CitationConfig,
    opts: &RenderOptions,
) -> Result<String, Error> {
    cfg.validate()?;
    opts.validate()?;

    let mut out = Vec::new();
    let mut in_code = false;
    let mut in_display = false;

    for line in markdown.lines() {
        let info = classify_line(line, false, in_code);
        if info.toggles_code {
            in_code = !in_code;
            out.push(line.to_string());
            continue;
        }
        if in_code {
            out.push(line.to_string());
            continue;
        }
        if in_display {
            if info.block_end {
                in_display = false;
            }
            out.push(line.to_string());
            continue;
        }
        if info.equation.is_some() {
            out.push(line.to_string());
            continue;
        }
        if info.block_start {
            in_display = true;
            out.push(line.to_string());
            continue;
        }
        out.push(render_line(line, cfg, opts));
    }

    let mut text = out.join("\n");
    if markdown.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// Rewrite one line outside any code or display-math context.
fn render_line(line: &str, cfg: &CitationConfig, opts: &RenderOptions) -> String {
    let blanked = blank_inline_code(line);
    let bytes = blanked.as_bytes();
    let mut singles = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'$'
            && !(i > 0 && bytes[i - 1] == b'$')
            && bytes.get(i + 1) != Some(&b'$')
        {
            singles.push(i);
        }
    }

    let mut rendered = String::with_capacity(line.len());
    let mut cursor = 0;
    for pair in singles.chunks_exact(2) {
        let (start, end) = (pair[0], pair[1] + 1);
        let inner = &blanked[start + 1..end - 1];
        let Some(html) = citation_html(inner, cfg, opts) else {
            continue;
        };
        rendered.push_str(&line[cursor..start]);
        rendered.push_str(&html);
        cursor = end;
    }
    rendered.push_str(&line[cursor..]);
    rendered
}

/// HTML for one citation span's inner content, or `None` when the span is
/// not a citation.
fn citation_html(inner: &str, cfg: &CitationConfig, opts: &RenderOptions) -> Option<String> {
    if inner.starts_with(' ') || inner.ends_with(' ') {
        return None;
    }
    if inner.matches("\\ref{").count() != 1 {
        return None;
    }
    let open = inner.find("\\ref{")?;
    let close = inner[open..].find('}')? + open;
    let label = &inner[open + "\\ref{".len()..close];
    let body = label.strip_prefix(cfg.prefix.as_str())?;

    let mut tags: Vec<String> = body
        .split(cfg.multi_delimiter.as_str())
        .map(str::to_string)
        .collect();
    if opts.use_ranges {
        let discrete =
            split_continuous_tags(&tags, &cfg.range_symbol, &cfg.delimiters, &cfg.file_delimiter);
        tags = combine_continuous_tags(
            &discrete,
            &cfg.range_symbol,
            &cfg.delimiters,
            &cfg.file_delimiter,
        );
    }

    let mut html = format!("<span class=\"{}\">", opts.container_class);
    for (pos, tag) in tags.iter().enumerate() {
        if pos > 0 {
            html.push_str(&html_escape(&cfg.multi_delimiter));
        }
        let (cross, local) = split_file_citation(tag, &cfg.file_delimiter);
        let shown = opts.template.replacen('#', &html_escape(local), 1);
        write!(html, "<span class=\"{}\">{shown}</span>", opts.tag_class)
            .expect("write to string cannot fail");
        if let Some(index) = cross {
            write!(html, "<sup>[{}]</sup>", html_escape(index))
                .expect("write to string cannot fail");
        }
    }
    html.push_str("</span>");
    Some(html)
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CitationConfig {
        CitationConfig::default()
    }

    fn opts() -> RenderOptions {
        RenderOptions::default()
    }

    #[test]
    fn renders_single_citation_span() {
        let html = render_citations("see $\\ref{eq:1.2}$ here", &cfg(), &opts()).unwrap();
        insta::assert_snapshot!(
            html,
            @r#"see <span class="mdcite-citation"><span class="mdcite-tag">Eq. 1.2</span></span> here"#
        );
    }

    #[test]
    fn renders_cross_file_index_as_superscript() {
        let html = render_citations("$\\ref{eq:3^1.2}$", &cfg(), &opts()).unwrap();
        insta::assert_snapshot!(
            html,
            @r#"<span class="mdcite-citation"><span class="mdcite-tag">Eq. 1.2</span><sup>[3]</sup></span>"#
        );
    }

    #[test]
    fn compacts_consecutive_tags_into_a_range() {
        let html =
            render_citations("$\\ref{eq:1.1, 1.2, 1.3}$", &cfg(), &opts()).unwrap();
        assert!(html.contains("Eq. 1.1~3"));
    }

    #[test]
    fn range_compaction_can_be_disabled() {
        let options = RenderOptions {
            use_ranges: false,
            ..opts()
        };
        let html = render_citations("$\\ref{eq:1.1, 1.2, 1.3}$", &cfg(), &options).unwrap();
        assert!(html.contains("Eq. 1.1"));
        assert!(html.contains("Eq. 1.2"));
        assert!(!html.contains('~'));
    }

    #[test]
    fn display_math_and_fences_pass_through() {
        let text = "$$\n\\ref{eq:1.1}\n$$\n```\n$\\ref{eq:1.1}$\n```";
        let html = render_citations(text, &cfg(), &opts()).unwrap();
        assert_eq!(html, text);
    }

    #[test]
    fn non_citation_math_is_left_as_written() {
        let text = "inline $x + y$ math";
        assert_eq!(render_citations(text, &cfg(), &opts()).unwrap(), text);
    }

    #[test]
    fn foreign_prefix_is_left_as_written() {
        let text = "$\\ref{fig:1.1}$";
        assert_eq!(render_citations(text, &cfg(), &opts()).unwrap(), text);
    }

    #[test]
    fn template_needs_exactly_one_placeholder() {
        let options = RenderOptions {
            template: "no placeholder".to_string(),
            ..opts()
        };
        assert!(render_citations("x", &cfg(), &options).is_err());
    }

    #[test]
    fn escapes_html_in_tag_text() {
        let html = render_citations("$\\ref{eq:<b>}$", &cfg(), &opts()).unwrap();
        assert!(html.contains("Eq. &lt;b&gt;"));
    }
}
