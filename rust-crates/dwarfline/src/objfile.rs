// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! ELF container access for the decoder.
//!
//! Everything DWARF-specific lives in [`crate::dwarf`]; this module only
//! maps the target binary, hands out (possibly decompressed) debug section
//! bytes, and enumerates the `.symtab` function symbols that line rows are
//! correlated against.

use crate::{AnyError, VirtAddr};

use std::borrow::Cow;
use std::io::Read as _;
use std::{fs, io, ops, path};

use flate2::read::ZlibDecoder;
use memmap2::Mmap;
use object::{Object as _, ObjectSection as _, ObjectSymbol as _};
use zstd::stream::read::Decoder as ZstdDecoder;

/// Result type shorthand.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Errors that can occur while accessing the object file.
#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Section is compressed with a scheme this tool cannot unpack")]
    UnsupportedCompressionFormat,

    #[error("Declared decompressed section size does not fit into memory")]
    SectionTooBig,

    #[error("Input is not an ELF64 little-endian executable")]
    NotElf64,

    #[error("IO error")]
    IO(#[from] io::Error),

    #[error(transparent)]
    Other(AnyError),
}

/// [`object`] errors surface type-erased: no caller branches on them, they
/// only end up in diagnostics.
impl From<object::Error> for Error {
    fn from(e: object::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

/// The target binary, memory mapped.
///
/// Mapping instead of reading keeps the common case free of copies: every
/// uncompressed section is served as a slice of the mapping.
pub struct File {
    map: Mmap,
}

impl File {
    /// Maps the binary at `path`.
    pub fn open(path: &path::Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(File { map })
    }

    /// Parses the ELF container on top of the mapping.
    pub fn reader(&self) -> Result<Reader<'_>> {
        let inner = object::File::parse(&self.map[..])?;
        Ok(Reader { inner })
    }
}

/// Parsed view of the mapped binary, created via [`File::reader`].
pub struct Reader<'obj> {
    inner: object::File<'obj>,
}

impl<'obj> Reader<'obj> {
    /// True for little-endian images.
    pub fn is_little_endian(&self) -> bool {
        self.inner.is_little_endian()
    }

    /// True when the image is 64-bit ELF.
    pub fn is_elf64(&self) -> bool {
        self.inner.format() == object::BinaryFormat::Elf && self.inner.is_64()
    }

    /// Fetches a section's bytes by name.
    ///
    /// Returns `None` when the image has no section of that name. Compressed
    /// sections are unpacked on the spot, so callers should fetch each
    /// section once and hold on to it for the whole decode.
    pub fn section(&self, name: &str) -> Result<Option<Section<'obj>>> {
        let Some(raw) = self.inner.section_by_name(name) else {
            return Ok(None);
        };

        Ok(Some(Section {
            virt_addr: raw.address(),
            data: section_bytes(&raw)?,
        }))
    }

    /// Enumerates the function symbols recorded in `.symtab`.
    ///
    /// Entries at address 0 or with no extent are dropped up front; no line
    /// row can land in them, and producers emit plenty of such placeholder
    /// records.
    pub fn function_symbols(&self) -> impl Iterator<Item = Symbol<'obj>> + '_ {
        self.inner.symbols().filter_map(|sym| {
            if sym.kind() != object::SymbolKind::Text || sym.address() == 0 || sym.size() == 0 {
                return None;
            }

            Some(Symbol {
                name: sym.name().ok()?, // non-utf8 names are dropped with their symbol
                virt_addr: sym.address(),
                length: sym.size(),
                sec_name: self.section_name_of(&sym),
            })
        })
    }

    /// Resolves the name of the section a symbol is defined in.
    fn section_name_of(&self, sym: &object::Symbol<'obj, '_>) -> Option<String> {
        let section = self.inner.section_by_index(sym.section_index()?).ok()?;
        Some(section.name().ok()?.to_owned())
    }
}

/// Bytes of one loaded section.
///
/// Borrows straight from the file mapping when the section is stored raw;
/// owns a buffer when it had to be decompressed first.
pub struct Section<'obj> {
    virt_addr: VirtAddr,
    data: Cow<'obj, [u8]>,
}

impl<'obj> Section<'obj> {
    /// Virtual address of the section's first byte.
    pub fn virt_addr(&self) -> VirtAddr {
        self.virt_addr
    }
}

/// Sections can stand in wherever a byte slice is expected.
impl<'obj> ops::Deref for Section<'obj> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<'obj> std::fmt::Debug for Section<'obj> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = match self.data {
            Cow::Borrowed(_) => "mapped",
            Cow::Owned(_) => "unpacked",
        };
        write!(
            f,
            "Section({} bytes @ {:#x}, {})",
            self.data.len(),
            self.virt_addr,
            storage
        )
    }
}

/// Pulls a section's contents out of the image, inflating zlib and zstd
/// `SHF_COMPRESSED` payloads as needed.
fn section_bytes<'obj>(sec: &object::Section<'obj, '_>) -> Result<Cow<'obj, [u8]>> {
    let compressed = sec.compressed_data()?;

    if compressed.format == object::CompressionFormat::None {
        return Ok(Cow::Borrowed(compressed.data));
    }

    let size = usize::try_from(compressed.uncompressed_size).map_err(|_| Error::SectionTooBig)?;

    // The declared size caps the read so a corrupt header can't balloon
    // the allocation past what it announced.
    let mut unpacked = Vec::with_capacity(size);
    match compressed.format {
        object::CompressionFormat::Zlib => {
            ZlibDecoder::new(compressed.data)
                .take(size as u64)
                .read_to_end(&mut unpacked)?;
        }
        object::CompressionFormat::Zstandard => {
            ZstdDecoder::new(compressed.data)?
                .take(size as u64)
                .read_to_end(&mut unpacked)?;
        }
        _ => return Err(Error::UnsupportedCompressionFormat),
    }

    Ok(Cow::Owned(unpacked))
}

/// One function symbol from the symbol table.
#[derive(Debug, Clone)]
pub struct Symbol<'obj> {
    /// Symbol name as stored, i.e. possibly mangled.
    pub name: &'obj str,
    /// Address of the function's first instruction.
    pub virt_addr: VirtAddr,
    /// Extent of the function in bytes.
    pub length: u64,
    /// Section the symbol is defined in, usually `.text`.
    pub sec_name: Option<String>,
}
