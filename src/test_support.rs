//! Builds small synthetic core files. Real cores are far too large (and too machine
//! specific) to check in so tests describe the bytes they need instead.
use crate::elf::Offset;
use crate::elf::auxv::{AT_BASE, AT_ENTRY, AT_PAGESZ, AT_PHDR, AT_PHENT, AT_PHNUM};
use crate::elf::dynamic::{DT_DEBUG, DT_NULL, DT_STRTAB, DT_SYMENT, DT_SYMTAB};
use crate::elf::notes::{NT_AUXV, NT_PRSTATUS};

pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_NOTE: u32 = 4;
pub const PT_PHDR: u32 = 6;

pub const SHT_STRTAB: u32 = 3;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_DYNSYM: u32 = 11;

pub const STT_OBJECT_GLOBAL: u8 = 0x11;
pub const STT_FUNC_GLOBAL: u8 = 0x12;

const HEADER_SIZE: usize = 64;

struct RawSegment {
    ptype: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    file_size: u64,
    mem_size: u64,
}

struct RawSection {
    name: u32,
    stype: u32,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    entry_size: u64,
}

/// Lays out an ELF header, a body of appended bytes, then the program and section
/// header tables.
pub struct CoreBuilder {
    etype: u16,
    body: Vec<u8>,
    segments: Vec<RawSegment>,
    sections: Vec<RawSection>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        CoreBuilder {
            etype: 4,
            body: Vec::new(),
            segments: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn shared_object() -> Self {
        CoreBuilder {
            etype: 3,
            ..CoreBuilder::new()
        }
    }

    /// Appends bytes at the next 8-byte aligned offset and returns where they landed.
    pub fn append(&mut self, bytes: &[u8]) -> Offset {
        while self.body.len() % 8 != 0 {
            self.body.push(0);
        }
        let offset = Offset((HEADER_SIZE + self.body.len()) as u64);
        self.body.extend_from_slice(bytes);
        offset
    }

    pub fn segment(
        &mut self,
        ptype: u32,
        flags: u32,
        offset: Offset,
        vaddr: u64,
        file_size: u64,
        mem_size: u64,
    ) -> usize {
        self.segments.push(RawSegment {
            ptype,
            flags,
            offset: offset.0,
            vaddr,
            file_size,
            mem_size,
        });
        self.segments.len() - 1
    }

    /// A read/write PT_LOAD segment.
    pub fn load(&mut self, offset: Offset, vaddr: u64, size: u64) -> usize {
        self.segment(PT_LOAD, 6, offset, vaddr, size, size)
    }

    /// Appends bytes and maps them at vaddr with a PT_LOAD segment.
    pub fn map(&mut self, vaddr: u64, bytes: &[u8]) -> Offset {
        let offset = self.append(bytes);
        self.load(offset, vaddr, bytes.len() as u64);
        offset
    }

    pub fn note_segment(&mut self, notes: &[u8]) -> Offset {
        let offset = self.append(notes);
        self.segment(PT_NOTE, 0, offset, 0, notes.len() as u64, 0);
        offset
    }

    #[allow(clippy::too_many_arguments)]
    pub fn section(
        &mut self,
        name: u32,
        stype: u32,
        addr: u64,
        offset: Offset,
        size: u64,
        link: u32,
        entry_size: u64,
    ) {
        self.sections.push(RawSection {
            name,
            stype,
            addr,
            offset: offset.0,
            size,
            link,
            entry_size,
        });
    }

    pub fn build(self) -> Vec<u8> {
        let mut bytes = vec![0; HEADER_SIZE];
        bytes.extend_from_slice(&self.body);
        while bytes.len() % 8 != 0 {
            bytes.push(0);
        }

        let ph_offset = bytes.len() as u64;
        for s in self.segments.iter() {
            bytes.extend(phdr(s.ptype, s.flags, s.offset, s.vaddr, s.file_size, s.mem_size));
        }

        let sh_offset = if self.sections.is_empty() {
            0
        } else {
            bytes.len() as u64
        };
        for s in self.sections.iter() {
            bytes.extend(&s.name.to_le_bytes());
            bytes.extend(&s.stype.to_le_bytes());
            bytes.extend(&0u64.to_le_bytes()); // flags
            bytes.extend(&s.addr.to_le_bytes());
            bytes.extend(&s.offset.to_le_bytes());
            bytes.extend(&s.size.to_le_bytes());
            bytes.extend(&s.link.to_le_bytes());
            bytes.extend(&0u32.to_le_bytes()); // info
            bytes.extend(&8u64.to_le_bytes()); // align
            bytes.extend(&s.entry_size.to_le_bytes());
        }

        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend(b"\x7fELF");
        header.extend([2, 1, 1, 0]); // 64-bit, little endian, version 1, SysV
        header.extend([0; 8]);
        header.extend(&self.etype.to_le_bytes());
        header.extend(&0x3eu16.to_le_bytes()); // x86-64
        header.extend(&1u32.to_le_bytes());
        header.extend(&0u64.to_le_bytes()); // entry
        header.extend(&ph_offset.to_le_bytes());
        header.extend(&sh_offset.to_le_bytes());
        header.extend(&0u32.to_le_bytes()); // flags
        header.extend(&64u16.to_le_bytes());
        header.extend(&56u16.to_le_bytes());
        header.extend(&(self.segments.len() as u16).to_le_bytes());
        header.extend(&64u16.to_le_bytes());
        header.extend(&(self.sections.len() as u16).to_le_bytes());
        header.extend(&0u16.to_le_bytes());
        bytes[..HEADER_SIZE].copy_from_slice(&header);
        bytes
    }
}

/// A zero filled region of memory that tests write structures into.
pub struct Image {
    pub bytes: Vec<u8>,
}

impl Image {
    pub fn new(size: usize) -> Self {
        Image {
            bytes: vec![0; size],
        }
    }

    pub fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

pub fn words(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn note(name: &str, ntype: u32, desc: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(&(name.len() as u32 + 1).to_le_bytes());
    bytes.extend(&(desc.len() as u32).to_le_bytes());
    bytes.extend(&ntype.to_le_bytes());
    bytes.extend(name.as_bytes());
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes.extend(desc);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
}

/// Auxiliary vector entries followed by AT_NULL.
pub fn auxv(entries: &[(u64, u64)]) -> Vec<u8> {
    let mut values = Vec::new();
    for (t, v) in entries {
        values.push(*t);
        values.push(*v);
    }
    values.extend([0, 0]);
    words(&values)
}

/// Dynamic entries followed by DT_NULL.
pub fn dynamic(entries: &[(i64, u64)]) -> Vec<u8> {
    let mut values = Vec::new();
    for (t, v) in entries {
        values.push(*t as u64);
        values.push(*v);
    }
    values.extend([DT_NULL as u64, 0]);
    words(&values)
}

pub fn phdr(
    ptype: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    file_size: u64,
    mem_size: u64,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(56);
    bytes.extend(&ptype.to_le_bytes());
    bytes.extend(&flags.to_le_bytes());
    bytes.extend(words(&[offset, vaddr, 0, file_size, mem_size, 0x1000]));
    bytes
}

pub fn sym(name: u32, info: u8, shndx: u16, value: u64, size: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend(&name.to_le_bytes());
    bytes.push(info);
    bytes.push(0);
    bytes.extend(&shndx.to_le_bytes());
    bytes.extend(words(&[value, size]));
    bytes
}

/// A string table starting with the empty string. Returns the table and the index of
/// each name.
pub fn strtab(names: &[&str]) -> (Vec<u8>, Vec<u32>) {
    let mut bytes = vec![0];
    let mut indexes = Vec::new();
    for name in names {
        indexes.push(bytes.len() as u32);
        bytes.extend(name.as_bytes());
        bytes.push(0);
    }
    (bytes, indexes)
}

pub const MAIN_BASE: u64 = 0x400000;
pub const MAIN_PHDR: u64 = MAIN_BASE + 0x40;
pub const MAIN_DYNAMIC: u64 = MAIN_BASE + 0x200;
pub const R_DEBUG: u64 = 0x600000;
pub const FIRST_NODE: u64 = R_DEBUG + 0x100;
pub const SECOND_NODE: u64 = R_DEBUG + 0x140;
pub const LIB_BIAS: u64 = 0x7f0000000000;
pub const LIB_DYNAMIC: u64 = LIB_BIAS + 0x200;
pub const LIB_VTABLE: u64 = LIB_BIAS + 0x500;
pub const INTERP_BASE: u64 = 0x7e0000000000;
pub const HEAP: u64 = 0x10000000;
pub const TARGET: u64 = 0x5555deadbeef0001;

/// A core for a process made of a main executable and libfoo.so. libfoo has one
/// three-slot vtable (_ZTV3Foo) and the heap holds an instance of it whose fourth word
/// (offset 24) is the target pointer. The target appears again 0xa0 bytes into the
/// heap, too far from any vtable pointer.
pub struct ProcessFixture {
    pub at_phdr: u64,

    /// Point the PT_PHDR entry somewhere other than AT_PHDR.
    pub phdr_mismatch: bool,

    /// Make the last module point back at the first.
    pub cyclic: bool,

    /// Use a null name pointer for the main executable instead of "".
    pub null_main_name: bool,

    /// libfoo's dynamic section holds link-time addresses instead of relocated ones.
    pub unrelocated_lib: bool,

    /// Omit DT_SYMENT from libfoo.
    pub lib_without_syment: bool,

    /// Give libfoo's node a prev pointer that isn't the executable's node.
    pub bad_back_link: bool,
}

impl Default for ProcessFixture {
    fn default() -> Self {
        ProcessFixture {
            at_phdr: MAIN_PHDR,
            phdr_mismatch: false,
            cyclic: false,
            null_main_name: false,
            unrelocated_lib: false,
            lib_without_syment: false,
            bad_back_link: false,
        }
    }
}

impl ProcessFixture {
    pub fn build(&self) -> Vec<u8> {
        let mut b = CoreBuilder::new();

        let mut notes = note("CORE", NT_PRSTATUS, &[0; 16]);
        notes.extend(note(
            "CORE",
            NT_AUXV,
            &auxv(&[
                (AT_PHDR, self.at_phdr),
                (AT_PHENT, 56),
                (AT_PHNUM, 2),
                (AT_PAGESZ, 4096),
                (AT_BASE, INTERP_BASE),
                (AT_ENTRY, MAIN_BASE + 0x1000),
            ]),
        ));
        b.note_segment(&notes);

        b.map(MAIN_BASE, &self.main_image().bytes);
        b.map(LIB_BIAS, &self.lib_image().bytes);
        b.map(R_DEBUG, &self.loader_image().bytes);
        b.map(HEAP, &heap().bytes);
        b.build()
    }

    fn main_image(&self) -> Image {
        let mut image = Image::new(0x400);
        let phdr_vaddr = if self.phdr_mismatch {
            MAIN_PHDR + 0x1000
        } else {
            MAIN_PHDR
        };
        let mut phdrs = phdr(PT_PHDR, 4, 0x40, phdr_vaddr, 112, 112);
        phdrs.extend(phdr(PT_DYNAMIC, 6, 0x200, MAIN_DYNAMIC, 80, 80));
        image.put(0x40, &phdrs);

        let symtab = MAIN_BASE + 0x300;
        let strtab_addr = symtab + 2 * 24;
        image.put(
            0x200,
            &dynamic(&[
                (DT_SYMTAB, symtab),
                (DT_STRTAB, strtab_addr),
                (DT_SYMENT, 24),
                (DT_DEBUG, R_DEBUG),
            ]),
        );

        let (strings, names) = strtab(&["counter"]);
        let mut syms = sym(0, 0, 0, 0, 0);
        syms.extend(sym(names[0], STT_OBJECT_GLOBAL, 20, 0x601000, 8));
        image.put(0x300, &syms);
        image.put(0x330, &strings);
        image
    }

    fn lib_image(&self) -> Image {
        let mut image = Image::new(0x600);
        let base = if self.unrelocated_lib { 0 } else { LIB_BIAS };
        let symtab = base + 0x300;
        let strtab_addr = symtab + 4 * 24;
        let mut entries = vec![(DT_SYMTAB, symtab), (DT_STRTAB, strtab_addr)];
        if !self.lib_without_syment {
            entries.push((DT_SYMENT, 24));
        }
        image.put(0x200, &dynamic(&entries));

        let (strings, names) = strtab(&["_ZTV3Foo", "_Z3barv", "_ZTV3Baz"]);
        let mut syms = sym(0, 0, 0, 0, 0);
        syms.extend(sym(names[0], STT_OBJECT_GLOBAL, 18, 0x500, 24));
        syms.extend(sym(names[1], STT_FUNC_GLOBAL, 12, 0x100, 16));
        syms.extend(sym(names[2], STT_OBJECT_GLOBAL, 0, 0, 0)); // undefined
        image.put(0x300, &syms);
        image.put(0x360, &strings);

        image.put(0x500, &words(&[0, LIB_BIAS + 0x580, LIB_BIAS + 0x100]));
        image
    }

    fn loader_image(&self) -> Image {
        let mut image = Image::new(0x300);
        image.put(0, &words(&[1, FIRST_NODE]));

        let main_name = if self.null_main_name { 0 } else { R_DEBUG + 0x200 };
        image.put(0x100, &words(&[0, main_name, MAIN_DYNAMIC, SECOND_NODE, 0]));
        let next = if self.cyclic { FIRST_NODE } else { 0 };
        let prev = if self.bad_back_link { R_DEBUG } else { FIRST_NODE };
        image.put(
            0x140,
            &words(&[LIB_BIAS, R_DEBUG + 0x210, LIB_DYNAMIC, next, prev]),
        );
        image.put(0x210, b"libfoo.so\0");
        image
    }
}

fn heap() -> Image {
    let mut image = Image::new(0x100);
    image.put(0, &words(&[LIB_VTABLE, 0x1111, 0x2222, TARGET]));
    image.put(0xa0, &words(&[TARGET]));
    image
}
