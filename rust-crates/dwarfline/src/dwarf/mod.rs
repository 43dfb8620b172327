// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Hand-written decoder for the DWARF debugging information format.
//!
//! The decoder is a pipeline of four independent passes sharing nothing but
//! immutable section slices and small index maps:
//!
//! 1. [`aranges`] indexes compilation units by the address ranges they cover.
//! 2. [`line`] decodes the line number programs and fills the function
//!    table's line-to-address maps.
//! 3. [`abbrev`] loads the per-unit DIE schemas (driven by [`info`]).
//! 4. [`info`] walks the DIE tree and extracts unit metadata and subprogram
//!    records, yielding one [`CuDebugInfo`] per unit.
//!
//! Decoding is fail-fast: DWARF is a coherent, indexed stream, and any
//! inconsistency makes downstream offsets meaningless, so nothing is
//! retried or resynchronized.

pub mod abbrev;
pub mod aranges;
pub mod consts;
mod expr;
pub mod info;
pub mod line;
pub mod reader;

pub use consts::Lang;
pub use info::{CuDebugInfo, CuFunc};
pub use reader::Format;

use crate::functab::FuncTable;
use crate::objfile;

/// Result type shorthand.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Errors that can occur during DWARF decoding.
#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Decoder currently doesn't support big endian binaries")]
    BigEndian,

    #[error("Section {0} not found; rebuild the target with debug info (-g) enabled")]
    MissingSection(&'static str),

    #[error("A read crossed the end of its section")]
    UnexpectedEof,

    #[error("LEB128 value does not fit into 64 bits")]
    LebTooLong,

    #[error("Reserved initial-length value {0:#010x}")]
    ReservedInitialLength(u32),

    #[error("Unsupported DWARF version {0}")]
    UnsupportedVersion(u16),

    #[error("Unsupported address size {0}")]
    UnsupportedAddressSize(u8),

    #[error("Unknown unit type {0:#04x}")]
    UnknownUnitType(u8),

    #[error("Unknown attribute form {0:#x}")]
    UnknownForm(u64),

    #[error("DIE uses abbreviation code {0} that the unit's table does not declare")]
    UnknownAbbrevCode(u64),

    #[error("No address-range entry for the unit at .debug_info offset {0:#x}")]
    UnmatchedUnit(u64),

    #[error("DW_AT_specification points at {0:#x} where no declaration is pending")]
    DanglingSpecification(u64),

    #[error("Unknown DWARF expression opcode {0:#04x}")]
    UnknownExprOpcode(u8),

    #[error("DWARF expression operands do not add up to the declared length")]
    ExprLengthMismatch,

    #[error("Line header field {0} has an invalid value")]
    BadLineHeader(&'static str),

    #[error("Line program ended without an end_sequence")]
    MissingEndSequence,

    #[error("Unsupported line-header entry form {0:#x}")]
    UnsupportedEntryForm(u64),

    #[error("String offset {0:#x} is outside its string section")]
    BadStrOffset(u64),

    #[error("File index {0} is outside the line-table file list")]
    InvalidFileIndex(u64),

    #[error("Directory index {0} is outside the include-directory list")]
    InvalidDirectoryIndex(u64),

    #[error("objfile error: {0}")]
    Objfile(#[from] objfile::Error),
}

/// The debug sections of one object file.
///
/// Created via [`DebugSections::load`]; every section this decoder consumes
/// must be present in the file.
pub struct DebugSections<'obj> {
    aranges: objfile::Section<'obj>,
    abbrev: objfile::Section<'obj>,
    info: objfile::Section<'obj>,
    debug_str: objfile::Section<'obj>,
    line: objfile::Section<'obj>,
    line_str: objfile::Section<'obj>,
}

impl<'obj> DebugSections<'obj> {
    /// Loads (and if necessary decompresses) the DWARF sections.
    pub fn load(obj: &objfile::Reader<'obj>) -> Result<Self> {
        if !obj.is_little_endian() {
            return Err(Error::BigEndian);
        }

        fn section<'obj>(
            obj: &objfile::Reader<'obj>,
            name: &'static str,
        ) -> Result<objfile::Section<'obj>> {
            obj.section(name)?.ok_or(Error::MissingSection(name))
        }

        Ok(DebugSections {
            aranges: section(obj, ".debug_aranges")?,
            abbrev: section(obj, ".debug_abbrev")?,
            info: section(obj, ".debug_info")?,
            debug_str: section(obj, ".debug_str")?,
            line: section(obj, ".debug_line")?,
            line_str: section(obj, ".debug_line_str")?,
        })
    }

    /// Runs the full decode pipeline.
    ///
    /// `functab` is enriched in place with per-function line maps and source
    /// file names; the returned list has one entry per compilation unit.
    pub fn decode(&self, functab: &mut FuncTable) -> Result<Vec<CuDebugInfo>> {
        let aranges = aranges::read_aranges(&self.aranges)?;

        let line_hdrs =
            line::read_line_info(&self.line, &self.line_str, &self.debug_str, functab)?;

        info::read_debug_info(
            &self.info,
            &self.debug_str,
            &self.line_str,
            &self.abbrev,
            &aranges,
            &line_hdrs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functab::tests::table;

    /// Drives the decoder pipeline over a hand-assembled set of sections
    /// describing one C compilation unit with a single `main` function at
    /// 0x1000 spanning 0x40 bytes.
    #[test]
    fn pipeline_end_to_end() {
        let debug_str = b"demo.c\x00/src/demo\x00gcc (GCC) 13.2.0\x00main\x00";

        // .debug_abbrev:
        //  1: compile_unit (name strp, comp_dir strp, producer strp,
        //     language data2, stmt_list sec_offset), children
        //  2: subprogram (name strp, low_pc addr, high_pc data4)
        #[rustfmt::skip]
        let abbrev: &[u8] = &[
            0x01, 0x11, 0x01,
            0x03, 0x0e,
            0x1b, 0x0e,
            0x25, 0x0e,
            0x13, 0x05,
            0x10, 0x17,
            0x00, 0x00,
            0x02, 0x2e, 0x00,
            0x03, 0x0e,
            0x11, 0x01,
            0x12, 0x06,
            0x00, 0x00,
            0x00,
        ];

        // .debug_info: one v4 unit.
        let mut dies = Vec::new();
        dies.push(0x01);
        dies.extend_from_slice(&0u32.to_le_bytes()); // "demo.c"
        dies.extend_from_slice(&7u32.to_le_bytes()); // "/src/demo"
        dies.extend_from_slice(&17u32.to_le_bytes()); // producer
        dies.extend_from_slice(&2u16.to_le_bytes()); // C
        dies.extend_from_slice(&0u32.to_le_bytes()); // stmt_list -> offset 0
        dies.push(0x02);
        dies.extend_from_slice(&34u32.to_le_bytes()); // "main"
        dies.extend_from_slice(&0x1000u64.to_le_bytes());
        dies.extend_from_slice(&0x40u32.to_le_bytes());
        dies.push(0x00); // end of compile unit children

        let mut info_body = Vec::new();
        info_body.extend_from_slice(&4u16.to_le_bytes());
        info_body.extend_from_slice(&0u32.to_le_bytes()); // abbrev offset
        info_body.push(8); // address size
        info_body.extend_from_slice(&dies);

        let mut info = Vec::new();
        info.extend_from_slice(&(info_body.len() as u32).to_le_bytes());
        info.extend_from_slice(&info_body);

        // .debug_aranges: one entry for the unit at offset 0.
        let mut ar_body = Vec::new();
        ar_body.extend_from_slice(&2u16.to_le_bytes());
        ar_body.extend_from_slice(&0u32.to_le_bytes());
        ar_body.push(8);
        ar_body.push(0);
        ar_body.extend_from_slice(&[0; 4]);
        ar_body.extend_from_slice(&0x1000u64.to_le_bytes());
        ar_body.extend_from_slice(&0x40u64.to_le_bytes());
        ar_body.extend_from_slice(&[0; 16]);

        let mut ar = Vec::new();
        ar.extend_from_slice(&(ar_body.len() as u32).to_le_bytes());
        ar.extend_from_slice(&ar_body);

        // .debug_line: v4 unit: file "demo.c", rows at lines 5 and 6.
        let mut line_hdr_rest = Vec::new();
        line_hdr_rest.push(1); // min_inst_length
        line_hdr_rest.push(1); // max_ops_per_inst
        line_hdr_rest.push(1); // default_is_stmt
        line_hdr_rest.push(0xfb); // line_base -5
        line_hdr_rest.push(14); // line_range
        line_hdr_rest.push(13); // opcode_base
        line_hdr_rest.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
        line_hdr_rest.push(0); // no include dirs
        line_hdr_rest.extend_from_slice(b"demo.c\x00\x00\x00\x00");
        line_hdr_rest.push(0); // end of file table

        let mut program = vec![0x00, 9, 0x02]; // set_address 0x1000
        program.extend_from_slice(&0x1000u64.to_le_bytes());
        program.extend_from_slice(&[0x03, 4]); // advance_line +4 -> 5
        program.push(0x01); // copy
        program.push(0xd7); // special: adj 202 -> addr +14, line +1
        program.extend_from_slice(&[0x00, 1, 0x01]); // end_sequence

        let mut line_body = Vec::new();
        line_body.extend_from_slice(&4u16.to_le_bytes());
        line_body.extend_from_slice(&(line_hdr_rest.len() as u32).to_le_bytes());
        line_body.extend_from_slice(&line_hdr_rest);
        line_body.extend_from_slice(&program);

        let mut line_sec = Vec::new();
        line_sec.extend_from_slice(&(line_body.len() as u32).to_le_bytes());
        line_sec.extend_from_slice(&line_body);

        // Run the pipeline the way `DebugSections::decode` does.
        let mut functab = table(&[("main", 0x1000, 0x40)]);
        let aranges_map = aranges::read_aranges(&ar).unwrap();
        let line_hdrs = line::read_line_info(&line_sec, &[], debug_str, &mut functab).unwrap();
        let cus =
            info::read_debug_info(&info, debug_str, &[], abbrev, &aranges_map, &line_hdrs)
                .unwrap();

        assert_eq!(aranges_map[&0].segments.len(), 1);

        assert_eq!(cus.len(), 1);
        let cu = &cus[0];
        assert_eq!(cu.file_name, "demo.c");
        assert_eq!(cu.compile_dir, "/src/demo");
        assert_eq!(cu.producer, "gcc (GCC) 13.2.0");
        assert_eq!(cu.language, Some(Lang::C));
        assert_eq!(cu.stmt_list, Some(0));
        assert_eq!(cu.funcs[&0x1000].name, "main");
        assert_eq!(cu.funcs[&0x1000].size, 0x40);

        let main = &functab.funcs()[0];
        assert_eq!(main.src_file_name, "demo.c");
        assert_eq!(main.line_addrs[&5].addr, 0x1000);
        assert_eq!(main.line_addrs[&6].addr, 0x100e);
    }
}
