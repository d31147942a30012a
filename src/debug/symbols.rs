//! Dynamic symbol table entries. In a core these are found through the DT_SYMTAB entry of
//! each module's dynamic section; in a standalone image through its SHT_DYNSYM section.
use super::LoadedModule;
use crate::elf::dynamic::{DT_STRTAB, DT_SYMENT, DT_SYMTAB};
use crate::elf::{
    AddressTranslator, Bytes, DynamicEntry, ElfFile, Offset, Reader, SectionIndex,
    SectionTranslator, SectionType, SegmentTranslator, Stream, StringIndex, VirtualAddr,
};
use crate::errors::{CoreError, Result};
use crate::utils;
use std::path::Path;

/// Itanium C++ ABI mangling prefix for "vtable for".
pub const VTABLE_PREFIX: &str = "_ZTV";

#[derive(Clone, Debug)]
pub struct SymbolTableEntry {
    // see https://refspecs.linuxbase.org/elf/gabi4+/ch4.symtab.html
    /// Index into the symbol string table.
    pub name: StringIndex,

    /// Can be an address, absolute value, etc.
    pub value: u64,

    /// Size of the symbol. Zero if the symbol has no or unknown size.
    pub size: u64,

    pub stype: SymbolType,

    pub index: SymbolIndex,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolIndex {
    /// Symbol has an absolute value that will not change with relocation.
    Abs,

    /// A common block that has not yet been allocated. Value has alignment.
    Common,

    /// Symbol value refers to another section at this index.
    Index(SectionIndex),

    /// Value is undefined, i.e. the symbol is defined by some other module.
    Undef,

    /// Used when Index overflows. Related section will be of type SHT_SYMTAB_SHNDX.
    XIndex,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolType {
    None,

    /// A data object, variable, array, etc. Vtables are objects.
    Object,

    /// Function or other executable code.
    Func,

    /// Another section. Used for relocation.
    Section,

    /// Source file associated with the symbol table.
    File,

    /// Uninitialized common blocks. Used by the linker.
    Common,

    /// Thread Local Storage data. Value is an offset to the data.
    Tls,

    /// For use by OS or CPU, e.g. STT_GNU_IFUNC.
    Reserved,
}

impl SymbolTableEntry {
    pub const SIZE: u64 = 24;

    pub fn new(reader: &Reader, offset: Offset) -> Result<Self> {
        let bytes = reader.slice(offset, SymbolTableEntry::SIZE, "symbol")?;
        let mut s = Stream::new(bytes, 0);
        let name = s.read_word()?; // 4
        let info = s.read_byte()?; // 1, binding in the high nibble
        let _other = s.read_byte()?; // 1, visibility
        let index = s.read_half()?; // 2
        let value = s.read_xword()?; // 8
        let size = s.read_xword()?; // 8
        Ok(SymbolTableEntry {
            name: StringIndex(name),
            value,
            size,
            stype: SymbolType::from_u8(info),
            index: SymbolIndex::from_u16(index),
        })
    }

    /// Decodes count symbols laid out entry_size bytes apart.
    pub fn read_table(
        reader: &Reader,
        offset: Offset,
        count: u64,
        entry_size: u64,
    ) -> Result<Vec<Self>> {
        if count > 0 && entry_size < SymbolTableEntry::SIZE {
            return Err(CoreError::malformed(format!(
                "symbol entry size {entry_size} is smaller than {}",
                SymbolTableEntry::SIZE
            )));
        }

        // Check the whole table up front so a garbage count doesn't allocate forever.
        let total = count.checked_mul(entry_size).ok_or_else(|| {
            CoreError::malformed(format!("symbol table with {count} entries is too large"))
        })?;
        reader.slice(offset, total, "symbol table")?;

        let mut symbols = Vec::with_capacity(count as usize);
        for i in 0..count {
            symbols.push(SymbolTableEntry::new(reader, offset + i * entry_size)?);
        }
        Ok(symbols)
    }

    pub fn is_defined(&self) -> bool {
        self.index != SymbolIndex::Undef
    }
}

impl SymbolIndex {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => SymbolIndex::Undef,
            0xfff1 => SymbolIndex::Abs,
            0xfff2 => SymbolIndex::Common,
            0xffff => SymbolIndex::XIndex,
            _ => SymbolIndex::Index(SectionIndex(value)),
        }
    }
}

impl SymbolType {
    pub fn from_u8(value: u8) -> Self {
        match value & 0xf {
            0 => SymbolType::None,
            1 => SymbolType::Object,
            2 => SymbolType::Func,
            3 => SymbolType::Section,
            4 => SymbolType::File,
            5 => SymbolType::Common,
            6 => SymbolType::Tls,
            10 | 12 | 13 | 15 => SymbolType::Reserved,
            _ => {
                utils::note(&format!("unknown symbol type: {}", value & 0xf));
                SymbolType::Reserved
            }
        }
    }
}

/// A defined symbol along with its name from the string table.
#[derive(Clone, Debug)]
pub struct ResolvedSymbol {
    pub name: String,
    pub entry: SymbolTableEntry,
}

impl ResolvedSymbol {
    pub fn is_vtable(&self) -> bool {
        self.entry.stype == SymbolType::Object && self.name.starts_with(VTABLE_PREFIX)
    }
}

/// Where a module's dynamic symbol table lives.
#[derive(Debug, Eq, PartialEq)]
struct SymbolTables {
    symtab: VirtualAddr,
    strtab: VirtualAddr,
    entry_size: u64,
}

impl SymbolTables {
    fn new(entries: &[DynamicEntry], load_bias: u64) -> Result<Self> {
        let symtab = DynamicEntry::find(entries, DT_SYMTAB)?;
        let strtab = DynamicEntry::find(entries, DT_STRTAB)?;
        let entry_size = DynamicEntry::find(entries, DT_SYMENT)?;
        if entry_size == 0 {
            return Err(CoreError::malformed("DT_SYMENT is zero"));
        }
        Ok(SymbolTables {
            symtab: relocate(symtab, load_bias),
            strtab: relocate(strtab, load_bias),
            entry_size,
        })
    }

    /// Assumes the symbol table is immediately followed by the string table, which is
    /// how linkers lay out the dynamic sections.
    fn count(&self) -> Result<u64> {
        if self.strtab < self.symtab {
            return Err(CoreError::malformed(format!(
                "string table at 0x{:x} precedes symbol table at 0x{:x}",
                self.strtab, self.symtab
            )));
        }
        Ok((self.strtab - self.symtab) / self.entry_size)
    }
}

/// The loader normally rewrites the table addresses in the dynamic section to run-time
/// addresses. Values below a non-zero bias were left as link-time addresses.
fn relocate(value: u64, load_bias: u64) -> VirtualAddr {
    if load_bias != 0 && value < load_bias {
        VirtualAddr(value.wrapping_add(load_bias))
    } else {
        VirtualAddr(value)
    }
}

/// Reads a module's symbols out of the core using the copy of its dynamic section that
/// the loader mapped into memory. Unless all_symbols is set only data objects are
/// returned.
pub fn resolve_in_core(
    core: &ElfFile,
    translator: &SegmentTranslator,
    module: &LoadedModule,
    all_symbols: bool,
) -> Result<Vec<ResolvedSymbol>> {
    let span = translator.locate(module.dynamic_address)?;
    let entries = DynamicEntry::read_all(&core.reader, span)?;
    let tables = SymbolTables::new(&entries, module.load_bias)?;
    let count = tables.count()?;
    read_symbols(&core.reader, translator, &tables, count, all_symbols)
}

/// Reads a module's symbols from the on-disk image it was loaded from. Images keep their
/// section table so addresses are translated with that and the symbol count comes from
/// the SHT_DYNSYM section.
pub fn resolve_in_image(image: &ElfFile, all_symbols: bool) -> Result<Vec<ResolvedSymbol>> {
    let translator = SectionTranslator::new(&image.sections)?;
    let dynamic = image.find_section(SectionType::Dynamic)?;
    let entries = DynamicEntry::read_all(&image.reader, dynamic.obytes)?;
    let tables = SymbolTables::new(&entries, 0)?;

    let dynsym = image.find_section(SectionType::DynamicSymbolTable)?;
    if !dynsym.vbytes.contains(tables.symtab) {
        return Err(CoreError::malformed(format!(
            "DT_SYMTAB 0x{:x} is outside the SHT_DYNSYM section",
            tables.symtab
        )));
    }
    let count = (dynsym.vbytes.end() - tables.symtab) / tables.entry_size;
    read_symbols(&image.reader, &translator, &tables, count, all_symbols)
}

/// Resolves the symbols of every module, in module order. Modules with a matching image
/// (same file name) are read from the image. With keep_going a module that can't be
/// resolved is reported and left without symbols.
pub fn resolve_modules(
    core: &ElfFile,
    translator: &SegmentTranslator,
    modules: &[LoadedModule],
    images: &[ElfFile],
    all_symbols: bool,
    keep_going: bool,
) -> Result<Vec<Vec<ResolvedSymbol>>> {
    for image in images.iter() {
        if !modules.iter().any(|m| matches_image(m, image)) {
            utils::warn(&format!(
                "{} doesn't match any loaded module",
                image.path.display()
            ));
        }
    }

    let mut resolved = Vec::with_capacity(modules.len());
    for module in modules.iter() {
        let result = match images.iter().find(|i| matches_image(module, i)) {
            Some(image) => {
                utils::note(&format!(
                    "reading symbols for {} from {}",
                    module.describe(),
                    image.path.display()
                ));
                resolve_in_image(image, all_symbols)
            }
            None => resolve_in_core(core, translator, module, all_symbols),
        };
        match result {
            Ok(symbols) => resolved.push(symbols),
            Err(err) if keep_going => {
                utils::warn(&format!("skipping symbols for {}: {err}", module.describe()));
                resolved.push(Vec::new());
            }
            Err(err) => {
                return Err(CoreError::InModule {
                    module: module.describe(),
                    source: Box::new(err),
                });
            }
        }
    }
    Ok(resolved)
}

fn matches_image(module: &LoadedModule, image: &ElfFile) -> bool {
    !module.is_main()
        && Path::new(&module.name)
            .file_name()
            .is_some_and(|n| n.to_string_lossy() == image.file_name())
}

fn read_symbols(
    reader: &Reader,
    translator: &impl AddressTranslator,
    tables: &SymbolTables,
    count: u64,
    all_symbols: bool,
) -> Result<Vec<ResolvedSymbol>> {
    let size = count.saturating_mul(tables.entry_size);
    let symtab = translator.offset_of(tables.symtab, size, "symbol table")?;
    let strtab = translator.locate(tables.strtab)?;
    let entries = SymbolTableEntry::read_table(reader, symtab, count, tables.entry_size)?;

    let mut symbols = Vec::new();
    let wanted = |e: &SymbolTableEntry| {
        e.is_defined() && (all_symbols || e.stype == SymbolType::Object)
    };
    for entry in entries.into_iter().filter(wanted) {
        let name = read_name(reader, strtab, entry.name)?;
        symbols.push(ResolvedSymbol { name, entry });
    }
    Ok(symbols)
}

/// Names must end within the file bytes backing the string table.
fn read_name(reader: &Reader, strtab: Bytes<Offset>, index: StringIndex) -> Result<String> {
    let index = index.0 as u64;
    if index >= strtab.size {
        return Err(CoreError::Truncated {
            what: "symbol name",
            offset: strtab.start.0.saturating_add(index),
            needed: 1,
            available: 0,
        });
    }
    reader.read_string(Bytes::new(strtab.start + index, strtab.size - index))
}
