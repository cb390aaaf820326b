//! Configuration value objects.
//!
//! Every knob the engines recognise is enumerated here and validated once at
//! the boundary. The engines themselves never re-check these values and
//! never fall back to defaults silently: a caller that supplies a config gets
//! exactly that config or an error.

use crate::error::Error;

/// Settings shared by the citation parser, rewrite engine, and renderer.
#[derive(Debug, Clone)]
pub struct CitationConfig {
    /// Label prefix marking a citation as ours, e.g. `eq:` in `\ref{eq:1.2}`.
    /// May be empty, in which case every `\ref{...}` is a citation.
    pub prefix: String,
    /// Delimiters that may separate segments of a numbering path.
    pub delimiters: Vec<String>,
    /// Separator between a footnote index and the local tag in a cross-file
    /// citation, e.g. `^` in `\ref{eq:3^1.2}`.
    pub file_delimiter: String,
    /// Symbol joining the bounds of a continuous range, e.g. `~` in `1.1~3`.
    pub range_symbol: String,
    /// Separator between multiple tags inside one citation.
    pub multi_delimiter: String,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            prefix: "eq:".to_string(),
            delimiters: vec![
                ".".to_string(),
                "-".to_string(),
                ":".to_string(),
                "_".to_string(),
            ],
            file_delimiter: "^".to_string(),
            range_symbol: "~".to_string(),
            multi_delimiter: ", ".to_string(),
        }
    }
}

impl CitationConfig {
    /// Check the configuration for internally inconsistent values.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.delimiters.is_empty() || self.delimiters.iter().any(String::is_empty) {
            return Err(Error::Config(
                "delimiters must be a non-empty list of non-empty strings".to_string(),
            ));
        }
        if self.file_delimiter.is_empty() {
            return Err(Error::Config("file delimiter must not be empty".to_string()));
        }
        if self.range_symbol.is_empty() {
            return Err(Error::Config("range symbol must not be empty".to_string()));
        }
        if self.range_symbol == self.file_delimiter {
            return Err(Error::Config(
                "range symbol and file delimiter must differ".to_string(),
            ));
        }
        if self.multi_delimiter.is_empty() {
            return Err(Error::Config(
                "multi-citation delimiter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// How heading depth is counted while numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberingStyle {
    /// Use the literal `#` count of each heading.
    Absolute,
    /// Use the heading's position in the actual nesting sequence, so a
    /// document whose top level is `##` still numbers from 1.
    Relative,
}

/// Annotation syntax written next to numbered objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    /// `\tag{1.2}`
    Latex,
    /// `#label("1.2")`
    Typst,
}

/// Settings for the auto-numbering walk.
#[derive(Debug, Clone)]
pub struct NumberingOptions {
    /// Deepest heading level that contributes a counter segment.
    pub max_depth: usize,
    /// Separator between counter segments, e.g. `.` in `1.2.3`.
    pub delimiter: String,
    /// Prefix prepended to every generated tag.
    pub global_prefix: String,
    /// Extra prefix for objects appearing before the first heading.
    pub no_heading_prefix: String,
    /// Absolute or relative heading depth.
    pub style: NumberingStyle,
    /// Annotation syntax to write.
    pub format: TagFormat,
    /// Only renumber objects that already carry a tag.
    pub tagged_only: bool,
    /// Unwrap blockquote/callout markers before classifying lines.
    pub parse_quotes: bool,
}

impl Default for NumberingOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            delimiter: ".".to_string(),
            global_prefix: String::new(),
            no_heading_prefix: String::new(),
            style: NumberingStyle::Absolute,
            format: TagFormat::Latex,
            tagged_only: false,
            parse_quotes: false,
        }
    }
}

impl NumberingOptions {
    /// Check the numbering options for unusable values.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_depth == 0 {
            return Err(Error::Config("max depth must be at least 1".to_string()));
        }
        if self.delimiter.is_empty() {
            return Err(Error::Config("numbering delimiter must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Deletion policies applied while rewriting citations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenamePolicy {
    /// Drop a citation tag whose value would duplicate another tag's
    /// post-rename value in the same cross-file group.
    pub delete_repeated: bool,
    /// Drop a citation tag that no longer resolves to any object in the
    /// cited document.
    pub delete_unused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_citation_config_is_valid() {
        assert!(CitationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_clashing_symbols() {
        let cfg = CitationConfig {
            range_symbol: "^".to_string(),
            ..CitationConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_delimiter_list() {
        let cfg = CitationConfig {
            delimiters: Vec::new(),
            ..CitationConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_depth() {
        let opts = NumberingOptions {
            max_depth: 0,
            ..NumberingOptions::default()
        };
        assert!(opts.validate().is_err());
    }
}
