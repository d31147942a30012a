use crate::elf::{Bytes, Offset};
use crate::errors::{CoreError, Result};
use memchr::memchr;
use memmap2::Mmap;
use std::ops::Deref;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELF_CLASS_64: u8 = 2;
const ELF_DATA_LSB: u8 = 1;

enum Storage {
    Mapped(Mmap),
    #[cfg(test)]
    Owned(Vec<u8>),
}

impl Deref for Storage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Storage::Mapped(m) => m,
            #[cfg(test)]
            Storage::Owned(v) => v,
        }
    }
}

/// Read-only access to the bytes of one ELF file. Every read takes an explicit offset:
/// there is no shared cursor.
pub struct Reader {
    bytes: Storage,
}

impl Reader {
    pub fn from_mmap(bytes: Mmap) -> Result<Self> {
        Reader::validate(Storage::Mapped(bytes))
    }

    #[cfg(test)]
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        Reader::validate(Storage::Owned(bytes))
    }

    // see https://en.wikipedia.org/wiki/Executable_and_Linkable_Format
    fn validate(bytes: Storage) -> Result<Self> {
        if bytes.len() < 64 {
            return Err(CoreError::Truncated {
                what: "ELF header",
                offset: 0,
                needed: 64,
                available: bytes.len() as u64,
            });
        }
        if bytes[0..4] != ELF_MAGIC {
            return Err(CoreError::malformed("not an ELF file (bad magic)"));
        }

        // Only 64-bit little endian files are supported.
        let ei_class = bytes[0x04];
        let ei_data = bytes[0x05];
        let ei_version = bytes[0x06];
        if ei_class != ELF_CLASS_64 {
            return Err(CoreError::malformed(format!(
                "unsupported ELF class {ei_class}: only 64-bit files are supported"
            )));
        }
        if ei_data != ELF_DATA_LSB {
            return Err(CoreError::malformed(format!(
                "unsupported ELF data encoding {ei_data}: only little endian files are supported"
            )));
        }
        if ei_version != 1 {
            return Err(CoreError::malformed(format!("bad ELF version: {ei_version}")));
        }

        Ok(Reader { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns exactly size bytes starting at offset.
    pub fn slice(&self, offset: Offset, size: u64, what: &'static str) -> Result<&[u8]> {
        let len = self.bytes.len() as u64;
        let available = len.saturating_sub(offset.0);
        if size > available {
            return Err(CoreError::Truncated {
                what,
                offset: offset.0,
                needed: size,
                available,
            });
        }
        let start = offset.0 as usize;
        Ok(&self.bytes[start..start + size as usize])
    }

    /// Returns up to size bytes starting at offset, fewer if the file ends first.
    pub fn clamped(&self, offset: Offset, size: u64) -> &[u8] {
        let len = self.bytes.len() as u64;
        let start = offset.0.min(len);
        let end = offset.0.saturating_add(size).min(len);
        &self.bytes[start as usize..end as usize]
    }

    pub fn read_xword(&self, offset: Offset) -> Result<u64> {
        let slice = self.slice(offset, 8, "xword")?;
        Ok(u64::from_le_bytes(slice.try_into().map_err(|_| {
            CoreError::malformed("xword slice has the wrong length")
        })?))
    }

    /// Read a null-terminated string that must end within span. Non-UTF8 bytes are
    /// replaced rather than rejected because paths in a core file come straight from the
    /// kernel or loader.
    pub fn read_string(&self, span: Bytes<Offset>) -> Result<String> {
        let rest = self.clamped(span.start, span.size);
        match memchr(0, rest) {
            Some(n) => Ok(String::from_utf8_lossy(&rest[..n]).into_owned()),
            None => Err(CoreError::Truncated {
                what: "null-terminated string",
                offset: span.start.0,
                needed: rest.len() as u64 + 1,
                available: rest.len() as u64,
            }),
        }
    }
}

/// Sequential little endian reads over a byte slice. Each record decoder builds one of
/// these over exactly the bytes of its record.
pub struct Stream<'a> {
    bytes: &'a [u8],
    pub offset: usize,
}

impl<'a> Stream<'a> {
    pub fn new(bytes: &'a [u8], offset: usize) -> Self {
        Stream { bytes, offset }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.offset.checked_add(N);
        match end.and_then(|end| self.bytes.get(self.offset..end)) {
            Some(slice) => {
                let mut result = [0; N];
                result.copy_from_slice(slice);
                self.offset += N;
                Ok(result)
            }
            None => Err(CoreError::Truncated {
                what: "field",
                offset: self.offset as u64,
                needed: N as u64,
                available: self.bytes.len().saturating_sub(self.offset) as u64,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// The next n bytes without consuming them.
    pub fn slice_ahead(&self, n: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(n)?;
        self.bytes.get(self.offset..end)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_half(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn read_word(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_xword(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn read_sxword(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take()?))
    }
}
