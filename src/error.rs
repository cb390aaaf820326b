//! Crate error types.
//!
//! Every fatal condition carries enough context to produce a useful message
//! without a debugger. Recoverable conditions (malformed citations, invalid
//! ranges, missing backlink targets) are handled in place and never surface
//! here.

/// Errors produced by the numbering and rewrite engines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `$$` delimiter pair appeared strictly inside an equation.
    ///
    /// Numbering a document with nested display-math delimiters would
    /// silently corrupt every tag after the offending line, so the whole
    /// operation aborts before the document is touched.
    #[error("nested '$$' delimiter inside an equation at line {line}")]
    IllegalNesting {
        /// 1-based line number of the offending delimiter.
        line: usize,
    },

    /// A configuration value failed boundary validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A vault path could not be resolved to a file.
    #[error("no such file in vault: {path}")]
    FileNotFound {
        /// Vault-relative path that failed to resolve.
        path: String,
    },

    /// Underlying I/O error from the filesystem vault.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
