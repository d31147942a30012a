//! Writes findings as text, one line per finding (plus one line per field match).
use super::tables::{SimpleTableBuilder, TableBuilder, add_field, add_simple};
use crate::debug::{ProcessImage, ResolvedSymbol};
use crate::scan::{Finding, ScanHit};
use crate::utils::Styling;
use clap::ValueEnum;
use std::io::{self, Write};

/// How scan hits are printed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Format {
    /// @0x<addr> file offset=0x<offset> followed by any vtable matches
    #[default]
    Vtable,

    /// offset=0x<offset> ptr=0x<addr>
    Short,

    /// <segment type>[<index>] 0x<offset> 0x<addr>
    Segment,
}

/// Writes every finding and returns the number of hits.
pub fn write_findings(
    mut out: impl Write,
    findings: impl Iterator<Item = Finding>,
    format: Format,
) -> io::Result<usize> {
    let mut hits = 0;
    for finding in findings {
        if let Finding::Hit(_) = finding {
            hits += 1;
        }
        write_finding(&mut out, &finding, format)?;
    }
    Ok(hits)
}

pub fn write_finding(out: &mut impl Write, finding: &Finding, format: Format) -> io::Result<()> {
    match finding {
        Finding::Module { name } => writeln!(out, "file={}", name.module()),
        Finding::Symbol { name } => writeln!(out, "symbol={}", name.label()),
        Finding::Hit(hit) => write_hit(out, hit, format),
    }
}

fn write_hit(out: &mut impl Write, hit: &ScanHit, format: Format) -> io::Result<()> {
    let offset = format!("0x{:x}", hit.offset);
    let addr = format!("0x{:x}", hit.addr);
    match format {
        Format::Short => writeln!(out, "offset={offset} ptr={}", addr.address()),
        Format::Segment => writeln!(
            out,
            "{}[{}] {offset} {}",
            hit.segment_type.name(),
            hit.segment,
            addr.address()
        ),
        Format::Vtable => {
            writeln!(out, "@{} file offset={offset}", addr.address())?;
            for field in hit.fields.iter() {
                writeln!(
                    out,
                    "  @{} {}=0x{:x} field offset={}",
                    format!("0x{:x}", field.parent).address(),
                    field.label.label(),
                    field.slot,
                    field.field_offset
                )?;
            }
            Ok(())
        }
    }
}

/// The --modules summary. symbols is parallel to the process's modules and may be empty.
pub fn write_modules(
    mut out: impl Write,
    process: &ProcessImage,
    symbols: &[Vec<ResolvedSymbol>],
    titles: bool,
    explain: bool,
) -> io::Result<()> {
    let mut summary = SimpleTableBuilder::new();
    match process.interpreter_base {
        Some(base) => {
            add_simple!(
                summary,
                "interpreter base",
                "{:x}",
                base,
                "where the dynamic loader was mapped (AT_BASE)"
            );
        }
        None => {
            add_simple!(
                summary,
                "interpreter base",
                "none",
                "where the dynamic loader was mapped (AT_BASE), none for static executables"
            );
        }
    }
    add_simple!(
        summary,
        "r_debug",
        "{:x}",
        process.r_debug,
        "address of the loader's debug interface, from DT_DEBUG"
    );
    add_simple!(
        summary,
        "executable segments",
        process.main_headers.len(),
        "program headers of the executable, found via AT_PHDR"
    );
    add_simple!(
        summary,
        "modules",
        process.modules.len(),
        "number of modules in the loader's list"
    );
    summary.writeln(&mut out, explain)?;
    writeln!(out)?;

    let mut builder = TableBuilder::new();
    builder.add_col_l(
        "name",
        "path of the module as recorded by the loader, blank for the executable",
    );
    builder.add_col_r(
        "load bias",
        "difference between the module's link-time and run-time addresses",
    );
    builder.add_col_r(
        "dynamic",
        "run-time address of the module's dynamic section",
    );
    builder.add_col_r("node", "address of the module's link_map node");
    builder.add_col_r(
        "vtables",
        "number of vtables found in the module's dynamic symbol table",
    );

    for (i, module) in process.modules.iter().enumerate() {
        let vtables = symbols
            .get(i)
            .map(|s| s.iter().filter(|s| s.is_vtable()).count().to_string())
            .unwrap_or_else(|| "-".to_string());
        add_field!(builder, "name", module.name.module());
        add_field!(builder, "load bias", "{:x}", module.load_bias);
        add_field!(builder, "dynamic", "{:x}", module.dynamic_address);
        add_field!(builder, "node", "{:x}", module.node);
        add_field!(builder, "vtables", vtables);
    }
    builder.writeln(&mut out, titles, explain)
}
