//! The records a run produces. Formatting them is up to commands::report.
use super::Scanner;
use crate::debug::{LoadedModule, ResolvedSymbol};
use crate::elf::{Offset, SegmentType, VirtualAddr};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Finding {
    /// A module from the loader's list. The executable has an empty name.
    Module { name: String },

    /// A symbol of the preceding module.
    Symbol { name: String },

    Hit(ScanHit),
}

/// One occurrence of the pointer in the core.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanHit {
    pub offset: Offset,
    pub addr: VirtualAddr,

    /// Index of the containing segment in the core's program header table.
    pub segment: usize,
    pub segment_type: SegmentType,

    /// Vtable pointers shortly before the hit, nearest first.
    pub fields: Vec<FieldMatch>,
}

/// The hit looks like a field of an object whose vtable pointer is at parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldMatch {
    pub parent: VirtualAddr,

    /// e.g. "_ZTV3Foo+0x10"
    pub label: String,

    /// The vtable slot address stored at parent.
    pub slot: u64,

    /// Bytes from parent to the hit.
    pub field_offset: u64,
}

/// Everything needed to produce the findings for a run. iter can be called any number
/// of times, each call starts over.
pub struct Findings<'a> {
    pub modules: &'a [LoadedModule],

    /// Parallel to modules. Empty when symbols weren't resolved.
    pub symbols: &'a [Vec<ResolvedSymbol>],

    /// List every defined symbol instead of just vtables.
    pub all_symbols: bool,

    pub scanner: Scanner<'a>,

    /// Zero means no limit.
    pub max_results: usize,
}

impl<'a> Findings<'a> {
    pub fn iter(&self) -> impl Iterator<Item = Finding> + '_ {
        let limit = if self.max_results == 0 {
            usize::MAX
        } else {
            self.max_results
        };
        self.module_findings()
            .chain(self.scanner.hits().take(limit).map(Finding::Hit))
    }

    fn module_findings(&self) -> impl Iterator<Item = Finding> + '_ {
        self.modules.iter().enumerate().flat_map(move |(i, module)| {
            let symbols = self.symbols.get(i).map(|s| s.as_slice()).unwrap_or(&[]);
            let names = symbols
                .iter()
                .filter(move |s| self.all_symbols || s.is_vtable())
                .map(|s| Finding::Symbol {
                    name: s.name.clone(),
                });
            std::iter::once(Finding::Module {
                name: module.name.clone(),
            })
            .chain(names)
        })
    }
}
