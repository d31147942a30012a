//! Generic ELF file support. These can be both core files and the executables and shared
//! objects a process loaded. Only 64-bit little endian files are supported.
//! Quick ELF reference: https://gist.github.com/x0nu11byt3/bcb35c3de461e5fb66173071a2379779
//!
//! ELF files start with an ELF header which includes:
//! * A magic number to identify the file as an ELF file.
//! * The architecture, e.g. Linux AMD x86-64.
//! * The offset to and number of program headers.
//! * The offset to and number of section headers.
//!
//! Program headers identify segments. Segments are used by the OS to load an exe into
//! memory. For a core file the Load segments are the memory of the process and a single
//! Note segment holds metadata such as the auxiliary vector.
//!
//! Section headers identify sections. Sections are used for static linking and don't
//! appear in core files.
pub mod auxv;
pub mod dynamic;
pub mod elf_file;
pub mod header;
pub mod io;
pub mod notes;
pub mod primitives;
pub mod sections;
pub mod segments;
pub mod translate;

pub use auxv::AuxvEntry;
pub use dynamic::DynamicEntry;
pub use elf_file::*;
pub use header::*;
pub use io::*;
pub use notes::Note;
pub use primitives::*;
pub use sections::*;
pub use segments::*;
pub use translate::*;
