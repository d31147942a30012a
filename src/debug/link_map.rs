//! Finds the modules (the executable and its shared objects) that were loaded into the
//! process. The auxiliary vector points at the executable's program headers, those lead
//! to its dynamic section, and its DT_DEBUG entry is filled in by the loader with the
//! address of an r_debug struct. The second field of that is the head of the loader's
//! doubly linked list of link_map nodes, one per module.
use crate::elf::auxv::{AT_BASE, AT_PHDR, AT_PHENT, AT_PHNUM};
use crate::elf::dynamic::DT_DEBUG;
use crate::elf::notes::{CORE_NOTE_NAME, NT_AUXV};
use crate::elf::{
    AddressTranslator, AuxvEntry, Bytes, DynamicEntry, ElfFile, Offset, ProgramHeader, Reader,
    SegmentType, Stream, VirtualAddr,
};
use crate::errors::{CoreError, Result};
use crate::utils;
use std::collections::HashSet;

/// Corrupt cores can have absurdly long lists.
const MAX_MODULES: usize = 65536;

/// One node in the loader's list, see link.h.
#[derive(Debug)]
pub struct LinkMapNode {
    /// Difference between the addresses in the module and in memory.
    pub addr: u64,

    /// Address of the module's null-terminated path. Zero (or an empty string) for the
    /// executable.
    pub name: u64,

    /// Address of the module's dynamic section.
    pub ld: u64,

    pub next: u64,
    pub prev: u64,
}

impl LinkMapNode {
    pub const SIZE: u64 = 40;

    pub fn new(reader: &Reader, offset: Offset) -> Result<Self> {
        let bytes = reader.slice(offset, LinkMapNode::SIZE, "link_map node")?;
        let mut s = Stream::new(bytes, 0);
        Ok(LinkMapNode {
            addr: s.read_xword()?,
            name: s.read_xword()?,
            ld: s.read_xword()?,
            next: s.read_xword()?,
            prev: s.read_xword()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct LoadedModule {
    /// Path as recorded by the loader. Empty for the executable.
    pub name: String,

    pub load_bias: u64,

    pub dynamic_address: VirtualAddr,

    /// Where the module's link_map node lives.
    pub node: VirtualAddr,
}

impl LoadedModule {
    pub fn is_main(&self) -> bool {
        self.name.is_empty()
    }

    /// How the module is named in messages.
    pub fn describe(&self) -> String {
        if self.is_main() {
            "the executable".to_string()
        } else {
            format!("module '{}'", self.name)
        }
    }
}

/// What the loader knew about the process when it cored.
#[derive(Debug)]
pub struct ProcessImage {
    /// The executable's program headers, found via AT_PHDR.
    pub main_headers: Vec<ProgramHeader>,

    /// Where the dynamic loader was mapped (AT_BASE). None for static executables.
    pub interpreter_base: Option<u64>,

    /// Address of the loader's r_debug struct.
    pub r_debug: VirtualAddr,

    /// In list order, typically the executable first.
    pub modules: Vec<LoadedModule>,
}

impl ProcessImage {
    /// With keep_going an unreadable module name is reported and replaced instead of
    /// failing the walk.
    pub fn locate(
        core: &ElfFile,
        translator: &impl AddressTranslator,
        keep_going: bool,
    ) -> Result<ProcessImage> {
        let reader = &core.reader;

        let notes = core.notes()?;
        let kinds: Vec<String> = notes.iter().map(|n| format!("{:?}", n.kind())).collect();
        utils::note(&format!("core notes: {}", kinds.join(", ")));
        let note = ElfFile::find_note(&notes, CORE_NOTE_NAME, NT_AUXV)?;
        let auxv = AuxvEntry::read_all(reader, note.contents)?;
        let phdr_addr = AuxvEntry::find(&auxv, AT_PHDR)?;
        let phnum = AuxvEntry::find(&auxv, AT_PHNUM)?;
        let phent = AuxvEntry::find(&auxv, AT_PHENT)?;
        let interpreter_base = AuxvEntry::find_optional(&auxv, AT_BASE)?;
        utils::note(&format!(
            "AT_PHDR is 0x{phdr_addr:x} with {phnum} entries of {phent} bytes"
        ));

        let size = phnum.saturating_mul(phent);
        let offset = translator.offset_of(VirtualAddr(phdr_addr), size, "program header table")?;
        let main_headers = ProgramHeader::read_table(reader, offset, phnum, phent)?;

        // If these disagree the core doesn't match its own auxv.
        let phdr = ProgramHeader::find(&main_headers, SegmentType::Phdr)?;
        if phdr.vaddr.0 != phdr_addr {
            return Err(CoreError::malformed(format!(
                "PT_PHDR is at 0x{:x} but AT_PHDR is 0x{phdr_addr:x}",
                phdr.vaddr
            )));
        }

        let dynamic = ProgramHeader::find(&main_headers, SegmentType::Dynamic)?;
        let span = translator.locate(dynamic.vaddr)?;
        let span = Bytes::new(span.start, span.size.min(dynamic.mem_size));
        let entries = DynamicEntry::read_all(reader, span)?;
        let r_debug = DynamicEntry::find(&entries, DT_DEBUG)?;
        if r_debug == 0 {
            return Err(CoreError::malformed(
                "DT_DEBUG is zero: the loader has not published r_debug",
            ));
        }

        // struct r_debug { int r_version; struct link_map *r_map; ... }
        let r_map = VirtualAddr(r_debug) + 8;
        let head = reader.read_xword(translator.offset_of(r_map, 8, "r_debug.r_map")?)?;
        let modules = walk(reader, translator, head, MAX_MODULES, keep_going)?;

        Ok(ProcessImage {
            main_headers,
            interpreter_base,
            r_debug: VirtualAddr(r_debug),
            modules,
        })
    }
}

fn walk(
    reader: &Reader,
    translator: &impl AddressTranslator,
    head: u64,
    limit: usize,
    keep_going: bool,
) -> Result<Vec<LoadedModule>> {
    let mut visited = HashSet::new();
    let mut modules = Vec::new();
    let mut addr = head;
    let mut prev = 0;
    while addr != 0 {
        if !visited.insert(addr) {
            return Err(CoreError::malformed(format!(
                "module list loops back to the node at 0x{addr:x}"
            )));
        }
        if modules.len() >= limit {
            return Err(CoreError::malformed(format!(
                "module list has more than {limit} entries"
            )));
        }

        let offset = translator.offset_of(VirtualAddr(addr), LinkMapNode::SIZE, "link_map node")?;
        let node = LinkMapNode::new(reader, offset)?;
        if node.prev != prev {
            // Only next is followed.
            utils::warn(&format!(
                "module 0x{addr:x} links back to 0x{:x} instead of 0x{prev:x}",
                node.prev
            ));
        }
        let name = match read_name(reader, translator, node.name) {
            Ok(name) => name,
            Err(err) if keep_going => {
                utils::warn(&format!("couldn't read the name of module 0x{addr:x}: {err}"));
                format!("<unreadable 0x{:x}>", node.name)
            }
            Err(err) => return Err(err),
        };
        utils::note(&format!("found module '{name}' with bias 0x{:x}", node.addr));

        modules.push(LoadedModule {
            name,
            load_bias: node.addr,
            dynamic_address: VirtualAddr(node.ld),
            node: VirtualAddr(addr),
        });
        prev = addr;
        addr = node.next;
    }
    Ok(modules)
}

fn read_name(reader: &Reader, translator: &impl AddressTranslator, addr: u64) -> Result<String> {
    if addr == 0 {
        Ok(String::new())
    } else {
        reader.read_string(translator.locate(VirtualAddr(addr))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::SegmentTranslator;
    use crate::test_support::*;
    use std::path::PathBuf;

    fn locate_in(core: &ElfFile) -> Result<ProcessImage> {
        let translator = SegmentTranslator::new(&core.segments)?;
        ProcessImage::locate(core, &translator, false)
    }

    fn locate(fixture: ProcessFixture) -> Result<ProcessImage> {
        let core = ElfFile::from_bytes(PathBuf::from("app.core"), fixture.build())?;
        locate_in(&core)
    }

    #[test]
    fn enumerates_modules() {
        let image = locate(ProcessFixture::default()).unwrap();
        let names: Vec<&str> = image.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["", "libfoo.so"]);

        assert!(image.modules[0].is_main());
        assert_eq!(image.modules[0].load_bias, 0);
        assert_eq!(image.modules[0].dynamic_address, VirtualAddr(MAIN_DYNAMIC));
        assert_eq!(image.modules[1].load_bias, LIB_BIAS);
        assert_eq!(image.modules[1].dynamic_address, VirtualAddr(LIB_DYNAMIC));
        assert_eq!(image.modules[1].node, VirtualAddr(SECOND_NODE));

        assert_eq!(image.main_headers.len(), 2);
        assert_eq!(image.interpreter_base, Some(INTERP_BASE));
        assert_eq!(image.r_debug, VirtualAddr(R_DEBUG));
    }

    #[test]
    fn null_name_is_the_executable() {
        let image = locate(ProcessFixture {
            null_main_name: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(image.modules[0].name, "");
        assert_eq!(image.modules[1].name, "libfoo.so");
    }

    #[test]
    fn cyclic_list_terminates() {
        let err = locate(ProcessFixture {
            cyclic: true,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::MalformedInput(ref m) if m.contains("loops back")));
    }

    #[test]
    fn long_list_is_malformed() {
        let core =
            ElfFile::from_bytes(PathBuf::from("app.core"), ProcessFixture::default().build())
                .unwrap();
        let translator = SegmentTranslator::new(&core.segments).unwrap();
        let err = walk(&core.reader, &translator, FIRST_NODE, 1, false).unwrap_err();
        assert!(matches!(err, CoreError::MalformedInput(ref m) if m.contains("more than 1 ")));

        let modules = walk(&core.reader, &translator, FIRST_NODE, 2, false).unwrap();
        assert_eq!(modules.len(), 2);
    }

    #[test]
    fn broken_back_link_is_tolerated() {
        let image = locate(ProcessFixture {
            bad_back_link: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(image.modules.len(), 2);
    }

    #[test]
    fn node_in_undumped_memory_is_truncated() {
        let mut main = Image::new(0x300);
        let mut phdrs = phdr(PT_PHDR, 4, 0x40, MAIN_PHDR, 112, 112);
        phdrs.extend(phdr(PT_DYNAMIC, 6, 0x200, MAIN_DYNAMIC, 32, 32));
        main.put(0x40, &phdrs);
        main.put(0x200, &dynamic(&[(DT_DEBUG, R_DEBUG)]));

        let mut b = CoreBuilder::new();
        b.note_segment(&note(
            "CORE",
            NT_AUXV,
            &auxv(&[(AT_PHDR, MAIN_PHDR), (AT_PHENT, 56), (AT_PHNUM, 2)]),
        ));
        b.map(MAIN_BASE, &main.bytes);

        // r_debug was dumped but the node it points at is in the zero-filled tail.
        let offset = b.append(&words(&[1, R_DEBUG + 0x20]));
        b.segment(PT_LOAD, 6, offset, R_DEBUG, 16, 0x100);
        let core = ElfFile::from_bytes(PathBuf::from("app.core"), b.build()).unwrap();

        let err = locate_in(&core).unwrap_err();
        assert!(matches!(err, CoreError::Truncated { available: 0, .. }));
    }

    #[test]
    fn unmapped_phdr_address() {
        let err = locate(ProcessFixture {
            at_phdr: 0x900000,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnmappedAddress {
                addr: 0x900000,
                table: "segment"
            }
        ));
    }

    #[test]
    fn phdr_mismatch_is_malformed() {
        let err = locate(ProcessFixture {
            phdr_mismatch: true,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::MalformedInput(ref m) if m.contains("PT_PHDR")));
    }

    #[test]
    fn missing_auxv_is_not_found() {
        let mut b = CoreBuilder::new();
        b.note_segment(&note("CORE", crate::elf::notes::NT_PRSTATUS, &[0; 16]));
        let core = ElfFile::from_bytes(PathBuf::from("app.core"), b.build()).unwrap();
        let err = locate_in(&core).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { what: "note", count: 0, .. }));
    }

    #[test]
    fn zero_dt_debug_is_malformed() {
        let mut main = Image::new(0x300);
        let mut phdrs = phdr(PT_PHDR, 4, 0x40, MAIN_PHDR, 112, 112);
        phdrs.extend(phdr(PT_DYNAMIC, 6, 0x200, MAIN_DYNAMIC, 32, 32));
        main.put(0x40, &phdrs);
        main.put(0x200, &dynamic(&[(DT_DEBUG, 0)]));

        let mut b = CoreBuilder::new();
        b.note_segment(&note(
            "CORE",
            NT_AUXV,
            &auxv(&[(AT_PHDR, MAIN_PHDR), (AT_PHENT, 56), (AT_PHNUM, 2)]),
        ));
        b.map(MAIN_BASE, &main.bytes);
        let core = ElfFile::from_bytes(PathBuf::from("app.core"), b.build()).unwrap();

        let image = locate_in(&core);
        assert!(matches!(image, Err(CoreError::MalformedInput(ref m)) if m.contains("DT_DEBUG")));
    }

    #[test]
    fn decodes_node() {
        let mut b = CoreBuilder::new();
        let offset = b.append(&words(&[0x7f00, 0x1000, 0x2000, 0x3000, 0x4000]));
        let reader = Reader::from_vec(b.build()).unwrap();
        let node = LinkMapNode::new(&reader, offset).unwrap();
        assert_eq!(node.addr, 0x7f00);
        assert_eq!(node.name, 0x1000);
        assert_eq!(node.ld, 0x2000);
        assert_eq!(node.next, 0x3000);
        assert_eq!(node.prev, 0x4000);
    }
}
