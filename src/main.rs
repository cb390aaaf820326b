use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use mdcite::{
    CitationConfig, DirVault, NumberingOptions, NumberingStyle, RenamePolicy, RenderOptions,
    TagFormat, Vault, auto_number_equations, auto_number_figures, check_repeated_tags,
    rename_tags, render_citations,
};

#[derive(Parser)]
#[command(about = "Number tagged equations and rewrite \\ref citations in Markdown notes")]
struct Cli {
    /// Rewrite files in place
    #[arg(long = "in-place", requires = "files")]
    in_place: bool,
    /// Vault root; renames propagate to notes that link back to each file
    #[arg(long, requires = "files")]
    vault: Option<PathBuf>,
    /// Emit citation HTML for export instead of renumbering
    #[arg(long)]
    render: bool,
    #[command(flatten)]
    opts: NumberOpts,
    /// Markdown files to process
    files: Vec<PathBuf>,
}

#[derive(clap::Args, Clone)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "CLI exposes independent toggles"
)]
struct NumberOpts {
    /// Citation label prefix
    #[arg(long, default_value = "eq:")]
    prefix: String,
    /// Deepest heading level contributing a tag segment
    #[arg(long, default_value_t = 3)]
    depth: usize,
    /// Separator between tag segments
    #[arg(long, default_value = ".")]
    delimiter: String,
    /// Prefix prepended to every generated tag
    #[arg(long = "global-prefix", default_value = "")]
    global_prefix: String,
    /// Prefix for objects appearing before the first heading
    #[arg(long = "no-heading-prefix", default_value = "")]
    no_heading_prefix: String,
    /// Count heading nesting depth instead of literal marker count
    #[arg(long)]
    relative: bool,
    /// Only renumber objects that already carry a tag
    #[arg(long = "tagged-only")]
    tagged_only: bool,
    /// Unwrap blockquote and callout markers before classifying lines
    #[arg(long)]
    quotes: bool,
    /// Write Typst #label("...") annotations instead of \tag{...}
    #[arg(long)]
    typst: bool,
    /// Number figures (image lines) instead of equations
    #[arg(long)]
    figures: bool,
    /// Drop citations that would duplicate another after renumbering
    #[arg(long = "delete-repeated")]
    delete_repeated: bool,
    /// Drop citations that no longer resolve to an object
    #[arg(long = "delete-unused")]
    delete_unused: bool,
}

impl NumberOpts {
    fn numbering(&self) -> NumberingOptions {
        NumberingOptions {
            max_depth: self.depth,
            delimiter: self.delimiter.clone(),
            global_prefix: self.global_prefix.clone(),
            no_heading_prefix: self.no_heading_prefix.clone(),
            style: if self.relative {
                NumberingStyle::Relative
            } else {
                NumberingStyle::Absolute
            },
            format: if self.typst {
                TagFormat::Typst
            } else {
                TagFormat::Latex
            },
            tagged_only: self.tagged_only,
            parse_quotes: self.quotes,
        }
    }

    fn citations(&self) -> CitationConfig {
        CitationConfig {
            prefix: self.prefix.clone(),
            ..CitationConfig::default()
        }
    }

    fn policy(&self) -> RenamePolicy {
        RenamePolicy {
            delete_repeated: self.delete_repeated,
            delete_unused: self.delete_unused,
        }
    }

    fn number(&self, text: &str) -> Result<mdcite::NumberingOutcome, mdcite::Error> {
        if self.figures {
            auto_number_figures(text, &self.numbering())
        } else {
            auto_number_equations(text, &self.numbering())
        }
    }
}

fn process_text(text: &str, cli: &Cli) -> anyhow::Result<String> {
    if cli.render {
        Ok(render_citations(
            text,
            &cli.opts.citations(),
            &RenderOptions::default(),
        )?)
    } else {
        Ok(cli.opts.number(text)?.text)
    }
}

fn process_in_vault(path: &Path, root: &Path, cli: &Cli) -> anyhow::Result<()> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not inside the vault root", path.display()))?
        .to_string_lossy()
        .into_owned();
    let cfg = cli.opts.citations();
    let mut vault = DirVault::new(root);

    let text = vault.read(&relative)?;
    let outcome = cli.opts.number(&text)?;
    vault.write(&relative, &outcome.text)?;

    if !cli.opts.delete_repeated
        && check_repeated_tags(&vault, &relative, &outcome.renames, &cfg)?
    {
        eprintln!(
            "warning: renumbering {relative} creates duplicate citations; \
             pass --delete-repeated to prune them"
        );
    }

    let report = rename_tags(
        &mut vault,
        &relative,
        &outcome.renames,
        cli.opts.policy(),
        &cfg,
        cli.opts.numbering().format,
    )?;
    println!(
        "{relative}: {} citations updated across {} files",
        report.citations_changed, report.files_changed
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.files.is_empty() {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        println!("{}", process_text(&input, &cli)?.trim_end());
        return Ok(());
    }

    for path in &cli.files {
        if let Some(root) = &cli.vault {
            if cli.render {
                anyhow::bail!("--render does not combine with --vault");
            }
            process_in_vault(path, root, &cli)?;
            continue;
        }

        let content = fs::read_to_string(path)?;
        let fixed = process_text(&content, &cli)?;
        if cli.in_place {
            fs::write(path, fixed)?;
        } else {
            println!("{}", fixed.trim_end());
        }
    }

    Ok(())
}
