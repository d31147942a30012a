//! Command line arguments.
use crate::commands::Format;
use crate::config::ColorChoice;
use clap::Parser;
use std::path::PathBuf;

/// Finds where a pointer value is stored in a core file and, when it looks like a field
/// of a C++ object, which object.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the core file
    pub core: PathBuf,

    /// Pointer value to search for, decimal or 0x prefixed hex
    #[arg(value_parser = parse_u64_expr)]
    pub pointer: u64,

    /// How to print hits
    #[arg(short, long, value_enum, default_value_t = Format::Vtable)]
    pub format: Format,

    /// Don't resolve module symbols (also disables vtable matching)
    #[arg(long)]
    pub no_symbols: bool,

    /// List every defined symbol of each module, not just vtables
    #[arg(long, conflicts_with = "no_symbols")]
    pub all_symbols: bool,

    /// Print a summary of the loaded modules before the findings
    #[arg(long)]
    pub modules: bool,

    /// Include column titles in the module summary
    #[arg(long)]
    pub titles: bool,

    /// Explain the fields in the module summary
    #[arg(long)]
    pub explain: bool,

    /// Read symbols for a module from this on-disk image instead of the core. Matched to
    /// loaded modules by file name. Can be repeated.
    #[arg(long, value_name = "PATH")]
    pub image: Vec<PathBuf>,

    /// Stop after this many hits, 0 for unlimited
    #[arg(short, long, default_value_t = 0)]
    pub max_results: usize,

    /// Warn about and skip modules whose symbols can't be read
    #[arg(short, long)]
    pub keep_going: bool,

    /// Print progress information to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// When to color output, overrides the config file
    #[arg(long, value_enum)]
    pub color: Option<ColorChoice>,
}

// TODO this should parse at least simple expressions
pub fn parse_u64_expr(s: &str) -> Result<u64, String> {
    let err = || format!("`{s}` isn't a hex or decimal number");
    if let Some(t) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(t, 16).map_err(|_| err())
    } else {
        s.parse().map_err(|_| err())
    }
}
