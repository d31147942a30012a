//! Maps the address of every vtable slot in the process to a label like
//! "_ZTV3Foo+0x8". Polymorphic objects start with a pointer into their vtable so a
//! word that is a slot address is a good hint that an object starts there.
use super::{LoadedModule, ResolvedSymbol};
use rangemap::RangeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Eq, PartialEq)]
struct Vtable {
    name: Arc<str>,
    base: u64,
}

#[derive(Debug, Default)]
pub struct VtableIndex {
    // Values include the base so adjacent vtables aren't coalesced.
    ranges: RangeMap<u64, Vtable>,
    count: usize,
}

impl VtableIndex {
    pub fn new() -> Self {
        VtableIndex::default()
    }

    /// Indexes the vtables among each module's symbols. symbols is parallel to modules.
    pub fn build(modules: &[LoadedModule], symbols: &[Vec<ResolvedSymbol>]) -> Self {
        let mut index = VtableIndex::new();
        for (module, symbols) in modules.iter().zip(symbols.iter()) {
            for symbol in symbols.iter().filter(|s| s.is_vtable()) {
                let base = module.load_bias.wrapping_add(symbol.entry.value);
                index.add(&symbol.name, base, symbol.entry.size);
            }
        }
        index
    }

    /// Registers a vtable with size / 8 slots.
    pub fn add(&mut self, name: &str, base: u64, size: u64) {
        let slots = size / 8;
        let Some(end) = base.checked_add(slots * 8) else {
            return;
        };
        if slots > 0 {
            let vtable = Vtable {
                name: Arc::from(name),
                base,
            };
            self.ranges.insert(base..end, vtable);
            self.count += 1;
        }
    }

    /// Number of vtables added.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the label if addr is exactly one of the slots.
    pub fn lookup(&self, addr: u64) -> Option<String> {
        let vtable = self.ranges.get(&addr)?;
        let offset = addr - vtable.base;
        if offset % 8 == 0 {
            Some(format!("{}+0x{offset:x}", vtable.name))
        } else {
            None
        }
    }

    /// Every (slot address, label) in address order.
    #[cfg(test)]
    pub fn slots(&self) -> impl Iterator<Item = (u64, String)> + '_ {
        self.ranges.iter().flat_map(|(range, vtable)| {
            (range.start..range.end)
                .step_by(8)
                .map(move |addr| (addr, format!("{}+0x{:x}", vtable.name, addr - vtable.base)))
        })
    }
}
