mod cli;
mod commands;
mod config;
mod debug;
mod elf;
mod errors;
mod scan;
#[cfg(test)]
mod test_support;
mod utils;

use clap::Parser;
use cli::Cli;
use config::Config;
use debug::{ProcessImage, VtableIndex, resolve_modules};
use elf::{ElfFile, SegmentTranslator};
use errors::{InStage, Stage};
use scan::{Findings, Scanner};
use std::error::Error;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

fn load_images(paths: &[PathBuf]) -> errors::Result<Vec<ElfFile>> {
    paths.iter().map(|p| ElfFile::new(p.clone())).collect()
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let core = ElfFile::new(cli.core.clone()).in_stage(Stage::Headers)?;
    if !core.header.is_core() {
        utils::warn(&format!(
            "{} is a {} file, not a core file",
            cli.core.display(),
            core.header.stype()
        ));
    }
    utils::note(&format!(
        "{} ({}) has {} segments, {} of them loadable",
        core.file_name(),
        core.header.machine(),
        core.segments.len(),
        core.loads().count()
    ));
    let translator = SegmentTranslator::new(&core.segments).in_stage(Stage::Headers)?;

    let process =
        ProcessImage::locate(&core, &translator, cli.keep_going).in_stage(Stage::Modules)?;

    let symbols = if cli.no_symbols {
        Vec::new()
    } else {
        let images = load_images(&cli.image).in_stage(Stage::Symbols)?;
        resolve_modules(
            &core,
            &translator,
            &process.modules,
            &images,
            cli.all_symbols,
            cli.keep_going,
        )
        .in_stage(Stage::Symbols)?
    };
    let vtables = VtableIndex::build(&process.modules, &symbols);
    utils::note(&format!("indexed {} vtables", vtables.len()));

    let mut out = BufWriter::new(io::stdout().lock());
    if cli.modules {
        commands::write_modules(&mut out, &process, &symbols, cli.titles, cli.explain)?;
        writeln!(out)?;
    }

    let scanner = Scanner::new(&core, cli.pointer, &vtables);
    scanner.describe();
    let findings = Findings {
        modules: &process.modules,
        symbols: &symbols,
        all_symbols: cli.all_symbols,
        scanner,
        max_results: cli.max_results,
    };
    let hits = commands::write_findings(&mut out, findings.iter(), cli.format)?;
    out.flush()?;
    utils::note(&format!("found {hits} hits for 0x{:x}", cli.pointer));
    Ok(())
}

fn main() {
    config::generate_config_file();

    let cli = Cli::parse();
    let config = Config::load();
    utils::init_styles(&config, cli.color);
    utils::set_verbose(cli.verbose);

    if let Err(err) = run(&cli) {
        utils::warn(&format!("{err}"));
        process::exit(1);
    }
}
