//! Citation numbering and rewriting for Markdown notes.
//!
//! Notes tag equations (and figures) with `\tag{...}` annotations and cite
//! them inline as `$\ref{eq:1.2}$`, including across files via footnote
//! indices (`$\ref{eq:3^1.2}$`) and compact ranges (`$\ref{eq:1.1~3}$`).
//! This crate renumbers the tagged objects from the heading structure and
//! rewrites every citation to match, in the note itself and in every note
//! that links back to it.

pub mod autonumber;
pub mod citations;
pub mod classify;
pub mod config;
pub mod error;
pub mod headings;
mod macros;
pub mod rename;
pub mod render;
pub mod tags;
mod test_utils;
pub mod vault;

pub use autonumber::{
    NumberingOutcome, TagRename, auto_number_equations, auto_number_figures, collect_object_tags,
};
pub use citations::{CitationRef, parse_citations};
pub use config::{CitationConfig, NumberingOptions, NumberingStyle, RenamePolicy, TagFormat};
pub use error::Error;
pub use rename::{RenameReport, check_repeated_tags, rename_tags};
pub use render::{RenderOptions, render_citations};
pub use vault::{DirVault, FootNote, MemoryVault, Vault};
