// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Decoder for the `.debug_line` section.
//!
//! Per compilation unit this decodes the line program header (include
//! directories, file table, opcode tuning parameters) and then executes the
//! byte-coded line number program. Statement rows whose address falls into a
//! function from the ELF symbol table are recorded in that function's
//! line-to-address map.
//!
//! Version quirks worth knowing about:
//! - v2/v3 headers have no `maximum_operations_per_instruction` field.
//! - v4 and earlier encode directories and files as NUL-terminated lists and
//!   use 1-based file indices.
//! - v5 headers describe their directory and file entries with explicit
//!   (content type, form) pairs and use 0-based file indices, where entry 0
//!   is the unit's primary source file.

use super::consts::*;
use super::reader::{str_at, Format, Reader};
use super::{Error, Result};
use crate::functab::{FuncTable, LineAddr};
use crate::{debug, VirtAddr};
use fallible_iterator::FallibleIterator;
use smallvec::SmallVec;
use std::collections::HashMap;

/// One file in the line program's file table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, possibly with a directory component.
    pub name: String,
    /// Index into the include directory list.
    pub dir_index: u64,
    /// Modification time, as far as the producer recorded one.
    pub last_modified: u64,
    /// File size in bytes, or 0 if not recorded.
    pub size: u64,
}

/// Decoded line program header of one compilation unit.
#[derive(Debug, Clone)]
pub struct LineHeader {
    /// Unit length as declared by the initial-length field.
    pub unit_length: u64,
    /// 32/64-bit DWARF format of this unit.
    pub format: Format,
    /// Line table version, 2 through 5.
    pub version: u16,
    /// Target address size; only present in v5 headers.
    pub address_size: Option<u8>,
    /// Segment selector size; only present in v5 headers.
    pub segment_selector_size: Option<u8>,
    /// Length of the header past this field.
    pub header_length: u64,
    /// Size of the smallest target instruction.
    pub min_inst_length: u8,
    /// Maximum operations per instruction; 1 unless VLIW. v4+ only.
    pub max_ops_per_inst: u8,
    /// Initial value of the `is_stmt` register.
    pub default_is_stmt: bool,
    /// Smallest line increment a special opcode can encode.
    pub line_base: i8,
    /// Number of distinct line increments special opcodes encode.
    pub line_range: u8,
    /// First special opcode value.
    pub opcode_base: u8,
    /// Operand counts for standard opcodes `1..opcode_base`.
    pub std_opcode_lengths: SmallVec<[u8; 12]>,
    /// Include directories. For v5 the first entry is the compilation dir.
    pub include_dirs: Vec<String>,
    /// File table.
    pub files: Vec<FileEntry>,
}

impl LineHeader {
    /// Resolves the `file` register to a file table entry.
    ///
    /// Indices are 1-based for version 4 and earlier, 0-based for version 5+.
    pub fn file(&self, file_reg: u64) -> Result<&FileEntry> {
        let idx = if self.version >= 5 {
            file_reg
        } else {
            file_reg
                .checked_sub(1)
                .ok_or(Error::InvalidFileIndex(file_reg))?
        };

        usize::try_from(idx)
            .ok()
            .and_then(|idx| self.files.get(idx))
            .ok_or(Error::InvalidFileIndex(file_reg))
    }

    /// Resolves a file's directory, or `None` for "the compilation dir" in
    /// pre-v5 tables.
    pub fn dir_name(&self, file: &FileEntry) -> Result<Option<&str>> {
        let idx = if self.version >= 5 {
            file.dir_index
        } else if file.dir_index == 0 {
            return Ok(None);
        } else {
            file.dir_index - 1
        };

        usize::try_from(idx)
            .ok()
            .and_then(|idx| self.include_dirs.get(idx))
            .map(|dir| Some(dir.as_str()))
            .ok_or(Error::InvalidDirectoryIndex(file.dir_index))
    }
}

/// State machine registers (DWARF 5, section 6.2.2).
#[derive(Debug, Clone)]
struct Registers {
    address: VirtAddr,
    op_index: u64,
    file: u64,
    line: u64,
    column: u64,
    is_stmt: bool,
    basic_block: bool,
    end_sequence: bool,
    prologue_end: bool,
    epilogue_begin: bool,
    isa: u64,
    discriminator: u64,
}

impl Registers {
    fn new(default_is_stmt: bool) -> Self {
        Registers {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
            column: 0,
            is_stmt: default_is_stmt,
            basic_block: false,
            end_sequence: false,
            prologue_end: false,
            epilogue_begin: false,
            isa: 0,
            discriminator: 0,
        }
    }
}

/// One row of the decoded line number table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    /// Machine address the row describes.
    pub address: VirtAddr,
    /// Value of the `file` register; resolve via [`LineHeader::file`].
    pub file: u64,
    /// Source line number. 0 means "no attributable line".
    pub line: u64,
    /// Whether this is a recommended breakpoint location.
    pub is_stmt: bool,
    /// Whether this row marks the first address past a sequence.
    pub end_sequence: bool,
}

/// Executes a line number program, yielding rows as they are emitted.
///
/// Created via [`LineRows::new`] with a reader positioned at the first
/// program byte. The iterator fails with [`Error::MissingEndSequence`] if
/// the program does not close its final sequence.
pub struct LineRows<'hdr, 'data> {
    hdr: &'hdr LineHeader,
    r: Reader<'data>,
    end: u64,
    regs: Registers,
    ended: bool,
}

impl<'hdr, 'data> LineRows<'hdr, 'data> {
    /// Creates an iterator for the program in `r` ending at offset `end`.
    pub fn new(hdr: &'hdr LineHeader, r: Reader<'data>, end: u64) -> Self {
        LineRows {
            regs: Registers::new(hdr.default_is_stmt),
            hdr,
            r,
            end,
            ended: false,
        }
    }

    /// Copies the current registers into an emitted row.
    fn row(&self) -> Row {
        Row {
            address: self.regs.address,
            file: self.regs.file,
            line: self.regs.line,
            is_stmt: self.regs.is_stmt,
            end_sequence: self.regs.end_sequence,
        }
    }

    /// Register resets shared by `copy` and the special opcodes.
    fn reset_row_flags(&mut self) {
        self.regs.basic_block = false;
        self.regs.prologue_end = false;
        self.regs.epilogue_begin = false;
        self.regs.discriminator = 0;
    }

    /// Executes one extended opcode, returning an emitted row if any.
    fn step_extended(&mut self) -> Result<Option<Row>> {
        let len = self.r.uleb128()?;
        let op_start = self.r.pos();
        let op_end = op_start.checked_add(len).ok_or(Error::UnexpectedEof)?;
        if op_end > self.end {
            return Err(Error::UnexpectedEof);
        }
        if len == 0 {
            return Err(Error::UnexpectedEof);
        }

        let sub = self.r.u8()?;
        let mut emitted = None;

        match sub {
            DW_LNE_END_SEQUENCE => {
                self.regs.end_sequence = true;
                emitted = Some(self.row());
                self.regs = Registers::new(self.hdr.default_is_stmt);
                self.ended = true;
            }

            DW_LNE_SET_ADDRESS => {
                self.regs.address = self.r.uint(len - 1)?;
                self.regs.op_index = 0;
            }

            DW_LNE_SET_DISCRIMINATOR => {
                self.regs.discriminator = self.r.uleb128()?;
            }

            // define_file, vendor extensions and anything unknown: the
            // declared operand length tells us how much to skip.
            other => {
                debug!("line: skipping extended opcode {:#04x}", other);
            }
        }

        // The declared length is authoritative, also for known opcodes whose
        // operands did not fill it.
        if self.r.pos() > op_end {
            return Err(Error::UnexpectedEof);
        }
        self.r.seek(op_end)?;

        Ok(emitted)
    }

    /// Executes one standard opcode, returning an emitted row if any.
    fn step_standard(&mut self, op: u8) -> Result<Option<Row>> {
        match op {
            DW_LNS_COPY => {
                let row = self.row();
                self.reset_row_flags();
                return Ok(Some(row));
            }

            DW_LNS_ADVANCE_PC => {
                let advance = self.r.uleb128()?;
                self.regs.address = self
                    .regs
                    .address
                    .wrapping_add(advance.wrapping_mul(self.hdr.min_inst_length as u64));
            }

            DW_LNS_ADVANCE_LINE => {
                let advance = self.r.sleb128()?;
                self.regs.line = self.regs.line.wrapping_add_signed(advance);
            }

            DW_LNS_SET_FILE => self.regs.file = self.r.uleb128()?,
            DW_LNS_SET_COLUMN => self.regs.column = self.r.uleb128()?,
            DW_LNS_NEGATE_STMT => self.regs.is_stmt = !self.regs.is_stmt,
            DW_LNS_SET_BASIC_BLOCK => self.regs.basic_block = true,

            DW_LNS_CONST_ADD_PC => {
                let adj = 255 - self.hdr.opcode_base;
                let advance = (adj / self.hdr.line_range) as u64;
                self.regs.address = self
                    .regs
                    .address
                    .wrapping_add(advance * self.hdr.min_inst_length as u64);
            }

            DW_LNS_FIXED_ADVANCE_PC => {
                self.regs.address = self.regs.address.wrapping_add(self.r.u16()? as u64);
                self.regs.op_index = 0;
            }

            DW_LNS_SET_PROLOGUE_END => self.regs.prologue_end = true,
            DW_LNS_SET_EPILOGUE_BEGIN => self.regs.epilogue_begin = true,
            DW_LNS_SET_ISA => self.regs.isa = self.r.uleb128()?,

            // A standard opcode we don't know; its declared operand count
            // lets us walk over it.
            other => {
                let operands = self.hdr.std_opcode_lengths[other as usize - 1];
                debug!(
                    "line: skipping unknown standard opcode {:#04x} ({} operands)",
                    other, operands
                );
                for _ in 0..operands {
                    self.r.uleb128()?;
                }
            }
        }

        Ok(None)
    }

    /// Executes one special opcode; always emits a row.
    fn step_special(&mut self, op: u8) -> Row {
        let adj = op - self.hdr.opcode_base;
        let addr_inc = (adj / self.hdr.line_range) as u64 * self.hdr.min_inst_length as u64;
        let line_inc = self.hdr.line_base as i64 + (adj % self.hdr.line_range) as i64;

        self.regs.address = self.regs.address.wrapping_add(addr_inc);
        self.regs.line = self.regs.line.wrapping_add_signed(line_inc);

        let row = self.row();
        self.reset_row_flags();
        row
    }
}

impl<'hdr, 'data> FallibleIterator for LineRows<'hdr, 'data> {
    type Item = Row;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if self.r.pos() >= self.end {
                if !self.ended {
                    return Err(Error::MissingEndSequence);
                }
                return Ok(None);
            }

            self.ended = false;
            let op = self.r.u8()?;

            let emitted = if op == 0 {
                self.step_extended()?
            } else if op < self.hdr.opcode_base {
                self.step_standard(op)?
            } else {
                Some(self.step_special(op))
            };

            if let Some(row) = emitted {
                return Ok(Some(row));
            }
        }
    }
}

/// Decoded value of one v5 directory/file entry attribute.
enum EntryValue {
    Str(String),
    Uint(u64),
    Skipped,
}

/// Reads one v5 header entry attribute of the given form.
fn read_entry_value(
    r: &mut Reader<'_>,
    form: u64,
    format: Format,
    line_str: &[u8],
    debug_str: &[u8],
) -> Result<EntryValue> {
    Ok(match form {
        DW_FORM_STRING => EntryValue::Str(r.cstr()?.into_owned()),
        DW_FORM_LINE_STRP => EntryValue::Str(str_at(line_str, r.offset(format)?)?),
        DW_FORM_STRP => EntryValue::Str(str_at(debug_str, r.offset(format)?)?),
        DW_FORM_UDATA => EntryValue::Uint(r.uleb128()?),
        DW_FORM_DATA1 => EntryValue::Uint(r.u8()? as u64),
        DW_FORM_DATA2 => EntryValue::Uint(r.u16()? as u64),
        DW_FORM_DATA4 => EntryValue::Uint(r.u32()? as u64),
        DW_FORM_DATA8 => EntryValue::Uint(r.u64()?),
        DW_FORM_DATA16 => {
            r.skip(16)?;
            EntryValue::Skipped
        }
        DW_FORM_BLOCK => {
            let len = r.uleb128()?;
            r.skip(len)?;
            EntryValue::Skipped
        }
        other => return Err(Error::UnsupportedEntryForm(other)),
    })
}

/// Reads the v5 directory or file entry list described by declared formats.
fn read_v5_entries(
    r: &mut Reader<'_>,
    format: Format,
    line_str: &[u8],
    debug_str: &[u8],
) -> Result<Vec<FileEntry>> {
    let format_count = r.u8()?;
    let mut formats = SmallVec::<[(u64, u64); 4]>::new();
    for _ in 0..format_count {
        let content_type = r.uleb128()?;
        let form = r.uleb128()?;
        formats.push((content_type, form));
    }

    let count = r.uleb128()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let mut entry = FileEntry::default();
        for &(content_type, form) in &formats {
            let value = read_entry_value(r, form, format, line_str, debug_str)?;
            match (content_type, value) {
                (DW_LNCT_PATH, EntryValue::Str(path)) => entry.name = path,
                (DW_LNCT_DIRECTORY_INDEX, EntryValue::Uint(idx)) => entry.dir_index = idx,
                (DW_LNCT_TIMESTAMP, EntryValue::Uint(t)) => entry.last_modified = t,
                (DW_LNCT_SIZE, EntryValue::Uint(sz)) => entry.size = sz,
                // MD5 hashes and vendor content types are decoded and dropped.
                _ => {}
            }
        }
        entries.push(entry);
    }

    Ok(entries)
}

/// Decodes one line program header, leaving `r` at the first program byte.
fn read_header(r: &mut Reader<'_>, line_str: &[u8], debug_str: &[u8]) -> Result<LineHeader> {
    let (unit_length, format) = r.initial_length()?;
    let version = r.u16()?;

    let (address_size, segment_selector_size) = if version >= 5 {
        (Some(r.u8()?), Some(r.u8()?))
    } else {
        (None, None)
    };

    let header_length = r.offset(format)?;
    let min_inst_length = r.u8()?;
    let max_ops_per_inst = if version >= 4 { r.u8()? } else { 1 };
    let default_is_stmt = r.u8()? != 0;
    let line_base = r.i8()?;
    let line_range = r.u8()?;
    let opcode_base = r.u8()?;

    if line_range == 0 {
        return Err(Error::BadLineHeader("line_range"));
    }
    if opcode_base == 0 {
        return Err(Error::BadLineHeader("opcode_base"));
    }

    let mut std_opcode_lengths = SmallVec::new();
    for _ in 1..opcode_base {
        std_opcode_lengths.push(r.u8()?);
    }

    let mut include_dirs = Vec::new();
    let mut files = Vec::new();

    if version >= 5 {
        for dir in read_v5_entries(r, format, line_str, debug_str)? {
            include_dirs.push(dir.name);
        }
        files = read_v5_entries(r, format, line_str, debug_str)?;
    } else {
        loop {
            let dir = r.cstr()?;
            if dir.is_empty() {
                break;
            }
            include_dirs.push(dir.into_owned());
        }

        loop {
            let name = r.cstr()?;
            if name.is_empty() {
                break;
            }
            files.push(FileEntry {
                name: name.into_owned(),
                dir_index: r.uleb128()?,
                last_modified: r.uleb128()?,
                size: r.uleb128()?,
            });
        }
    }

    Ok(LineHeader {
        unit_length,
        format,
        version,
        address_size,
        segment_selector_size,
        header_length,
        min_inst_length,
        max_ops_per_inst,
        default_is_stmt,
        line_base,
        line_range,
        opcode_base,
        std_opcode_lengths,
        include_dirs,
        files,
    })
}

/// Records one statement row in the owning function's line map.
fn record_row(hdr: &LineHeader, row: &Row, functab: &mut FuncTable) -> Result<()> {
    let Some(idx) = functab.index_for_addr(row.address) else {
        // Code outside `.symtab` functions, e.g. linker-inserted stubs.
        debug!("line: no function covers {:#010x}, row dropped", row.address);
        return Ok(());
    };

    let file = hdr.file(row.file)?;
    let dir = hdr.dir_name(file)?.unwrap_or_default().to_owned();

    let func = functab.get_mut(idx);
    func.src_dir_name = dir.clone();
    func.src_file_name = file.name.clone();
    func.line_addrs.insert(
        row.line,
        LineAddr {
            addr: row.address,
            is_stmt: row.is_stmt,
            src_dir: dir,
            src_file: file.name.clone(),
        },
    );

    Ok(())
}

/// Decodes `.debug_line`, filling the function table's line maps.
///
/// Returns the decoded headers keyed by their offset within the section;
/// `DW_AT_stmt_list` attributes in `.debug_info` refer to these offsets.
pub fn read_line_info(
    data: &[u8],
    line_str: &[u8],
    debug_str: &[u8],
    functab: &mut FuncTable,
) -> Result<HashMap<u64, LineHeader>> {
    let mut map = HashMap::new();
    let mut r = Reader::new(data);

    while !r.is_empty() {
        let hdr_start = r.pos();
        let hdr = read_header(&mut r, line_str, debug_str)?;
        let unit_end = hdr_start
            .checked_add(hdr.format.initial_length_size())
            .and_then(|x| x.checked_add(hdr.unit_length))
            .filter(|&x| x <= r.len())
            .ok_or(Error::UnexpectedEof)?;

        debug!(
            "line: unit @ {:#x} v{}, {} dir(s), {} file(s)",
            hdr_start,
            hdr.version,
            hdr.include_dirs.len(),
            hdr.files.len()
        );

        if r.pos() > unit_end {
            return Err(Error::UnexpectedEof);
        }

        if r.pos() < unit_end {
            let mut rows = LineRows::new(&hdr, r.clone(), unit_end);
            while let Some(row) = rows.next()? {
                if row.is_stmt && !row.end_sequence {
                    record_row(&hdr, &row, functab)?;
                }
            }
        }

        r.seek(unit_end)?;
        map.insert(hdr_start, hdr);
    }

    Ok(map)
}
