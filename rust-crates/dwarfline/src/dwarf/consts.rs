// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! DWARF constant definitions.
//!
//! Only the constants that the decoders actually branch on are defined.
//! The `*_name` functions exist for debug logging and cover the encodings
//! commonly seen in the wild; everything else is formatted numerically.

#![allow(missing_docs)]

// Unit header types (DWARF 5, section 7.5.1).
pub const DW_UT_COMPILE: u8 = 0x01;
pub const DW_UT_TYPE: u8 = 0x02;
pub const DW_UT_PARTIAL: u8 = 0x03;
pub const DW_UT_SKELETON: u8 = 0x04;
pub const DW_UT_SPLIT_COMPILE: u8 = 0x05;
pub const DW_UT_SPLIT_TYPE: u8 = 0x06;

// Tags.
pub const DW_TAG_COMPILE_UNIT: u64 = 0x11;
pub const DW_TAG_SUBPROGRAM: u64 = 0x2e;

// Attributes.
pub const DW_AT_SIBLING: u64 = 0x01;
pub const DW_AT_LOCATION: u64 = 0x02;
pub const DW_AT_NAME: u64 = 0x03;
pub const DW_AT_STMT_LIST: u64 = 0x10;
pub const DW_AT_LOW_PC: u64 = 0x11;
pub const DW_AT_HIGH_PC: u64 = 0x12;
pub const DW_AT_LANGUAGE: u64 = 0x13;
pub const DW_AT_COMP_DIR: u64 = 0x1b;
pub const DW_AT_PRODUCER: u64 = 0x25;
pub const DW_AT_DECL_FILE: u64 = 0x3a;
pub const DW_AT_RANGES: u64 = 0x55;
pub const DW_AT_SPECIFICATION: u64 = 0x47;
pub const DW_AT_TYPE: u64 = 0x49;
pub const DW_AT_LINKAGE_NAME: u64 = 0x6e;
// Emitted by older GNU toolchains instead of DW_AT_linkage_name.
pub const DW_AT_MIPS_LINKAGE_NAME: u64 = 0x2007;

// Attribute forms.
pub const DW_FORM_ADDR: u64 = 0x01;
pub const DW_FORM_BLOCK2: u64 = 0x03;
pub const DW_FORM_BLOCK4: u64 = 0x04;
pub const DW_FORM_DATA2: u64 = 0x05;
pub const DW_FORM_DATA4: u64 = 0x06;
pub const DW_FORM_DATA8: u64 = 0x07;
pub const DW_FORM_STRING: u64 = 0x08;
pub const DW_FORM_BLOCK: u64 = 0x09;
pub const DW_FORM_BLOCK1: u64 = 0x0a;
pub const DW_FORM_DATA1: u64 = 0x0b;
pub const DW_FORM_FLAG: u64 = 0x0c;
pub const DW_FORM_SDATA: u64 = 0x0d;
pub const DW_FORM_STRP: u64 = 0x0e;
pub const DW_FORM_UDATA: u64 = 0x0f;
pub const DW_FORM_REF_ADDR: u64 = 0x10;
pub const DW_FORM_REF1: u64 = 0x11;
pub const DW_FORM_REF2: u64 = 0x12;
pub const DW_FORM_REF4: u64 = 0x13;
pub const DW_FORM_REF8: u64 = 0x14;
pub const DW_FORM_REF_UDATA: u64 = 0x15;
pub const DW_FORM_INDIRECT: u64 = 0x16;
pub const DW_FORM_SEC_OFFSET: u64 = 0x17;
pub const DW_FORM_EXPRLOC: u64 = 0x18;
pub const DW_FORM_FLAG_PRESENT: u64 = 0x19;
pub const DW_FORM_STRX: u64 = 0x1a;
pub const DW_FORM_ADDRX: u64 = 0x1b;
pub const DW_FORM_REF_SUP4: u64 = 0x1c;
pub const DW_FORM_STRP_SUP: u64 = 0x1d;
pub const DW_FORM_DATA16: u64 = 0x1e;
pub const DW_FORM_LINE_STRP: u64 = 0x1f;
pub const DW_FORM_REF_SIG8: u64 = 0x20;
pub const DW_FORM_IMPLICIT_CONST: u64 = 0x21;
pub const DW_FORM_LOCLISTX: u64 = 0x22;
pub const DW_FORM_RNGLISTX: u64 = 0x23;
pub const DW_FORM_REF_SUP8: u64 = 0x24;
pub const DW_FORM_STRX1: u64 = 0x25;
pub const DW_FORM_STRX2: u64 = 0x26;
pub const DW_FORM_STRX3: u64 = 0x27;
pub const DW_FORM_STRX4: u64 = 0x28;
pub const DW_FORM_ADDRX1: u64 = 0x29;
pub const DW_FORM_ADDRX2: u64 = 0x2a;
pub const DW_FORM_ADDRX3: u64 = 0x2b;
pub const DW_FORM_ADDRX4: u64 = 0x2c;

pub const DW_CHILDREN_YES: u8 = 0x01;

// Line number header entry content types (DWARF 5, table 7.27).
pub const DW_LNCT_PATH: u64 = 0x1;
pub const DW_LNCT_DIRECTORY_INDEX: u64 = 0x2;
pub const DW_LNCT_TIMESTAMP: u64 = 0x3;
pub const DW_LNCT_SIZE: u64 = 0x4;
pub const DW_LNCT_MD5: u64 = 0x5;

// Line number program standard opcodes.
pub const DW_LNS_COPY: u8 = 0x01;
pub const DW_LNS_ADVANCE_PC: u8 = 0x02;
pub const DW_LNS_ADVANCE_LINE: u8 = 0x03;
pub const DW_LNS_SET_FILE: u8 = 0x04;
pub const DW_LNS_SET_COLUMN: u8 = 0x05;
pub const DW_LNS_NEGATE_STMT: u8 = 0x06;
pub const DW_LNS_SET_BASIC_BLOCK: u8 = 0x07;
pub const DW_LNS_CONST_ADD_PC: u8 = 0x08;
pub const DW_LNS_FIXED_ADVANCE_PC: u8 = 0x09;
pub const DW_LNS_SET_PROLOGUE_END: u8 = 0x0a;
pub const DW_LNS_SET_EPILOGUE_BEGIN: u8 = 0x0b;
pub const DW_LNS_SET_ISA: u8 = 0x0c;

// Line number program extended opcodes.
pub const DW_LNE_END_SEQUENCE: u8 = 0x01;
pub const DW_LNE_SET_ADDRESS: u8 = 0x02;
pub const DW_LNE_DEFINE_FILE: u8 = 0x03;
pub const DW_LNE_SET_DISCRIMINATOR: u8 = 0x04;

// DWARF expression opcodes. Contiguous families (lit0..31, reg0..31,
// breg0..31) are handled as ranges in the expression walker and only their
// first member is named here.
pub const DW_OP_ADDR: u8 = 0x03;
pub const DW_OP_DEREF: u8 = 0x06;
pub const DW_OP_CONST1U: u8 = 0x08;
pub const DW_OP_CONST1S: u8 = 0x09;
pub const DW_OP_CONST2U: u8 = 0x0a;
pub const DW_OP_CONST2S: u8 = 0x0b;
pub const DW_OP_CONST4U: u8 = 0x0c;
pub const DW_OP_CONST4S: u8 = 0x0d;
pub const DW_OP_CONST8U: u8 = 0x0e;
pub const DW_OP_CONST8S: u8 = 0x0f;
pub const DW_OP_CONSTU: u8 = 0x10;
pub const DW_OP_CONSTS: u8 = 0x11;
pub const DW_OP_DUP: u8 = 0x12;
pub const DW_OP_DROP: u8 = 0x13;
pub const DW_OP_OVER: u8 = 0x14;
pub const DW_OP_PICK: u8 = 0x15;
pub const DW_OP_SWAP: u8 = 0x16;
pub const DW_OP_ROT: u8 = 0x17;
pub const DW_OP_XDEREF: u8 = 0x18;
pub const DW_OP_ABS: u8 = 0x19;
pub const DW_OP_PLUS: u8 = 0x22;
pub const DW_OP_PLUS_UCONST: u8 = 0x23;
pub const DW_OP_SHL: u8 = 0x24;
pub const DW_OP_SHR: u8 = 0x25;
pub const DW_OP_SHRA: u8 = 0x26;
pub const DW_OP_XOR: u8 = 0x27;
pub const DW_OP_BRA: u8 = 0x28;
pub const DW_OP_EQ: u8 = 0x29;
pub const DW_OP_NE: u8 = 0x2e;
pub const DW_OP_SKIP: u8 = 0x2f;
pub const DW_OP_LIT0: u8 = 0x30;
pub const DW_OP_LIT31: u8 = 0x4f;
pub const DW_OP_REG0: u8 = 0x50;
pub const DW_OP_REG31: u8 = 0x6f;
pub const DW_OP_BREG0: u8 = 0x70;
pub const DW_OP_BREG31: u8 = 0x8f;
pub const DW_OP_REGX: u8 = 0x90;
pub const DW_OP_FBREG: u8 = 0x91;
pub const DW_OP_BREGX: u8 = 0x92;
pub const DW_OP_PIECE: u8 = 0x93;
pub const DW_OP_DEREF_SIZE: u8 = 0x94;
pub const DW_OP_XDEREF_SIZE: u8 = 0x95;
pub const DW_OP_NOP: u8 = 0x96;
pub const DW_OP_CALL_FRAME_CFA: u8 = 0x9c;
pub const DW_OP_BIT_PIECE: u8 = 0x9d;
pub const DW_OP_IMPLICIT_VALUE: u8 = 0x9e;
pub const DW_OP_STACK_VALUE: u8 = 0x9f;
pub const DW_OP_LO_USER: u8 = 0xe0;

// Language encodings (subset; see `Lang::from_code`).
pub const DW_LANG_C89: u64 = 0x0001;
pub const DW_LANG_C: u64 = 0x0002;
pub const DW_LANG_C_PLUS_PLUS: u64 = 0x0004;
pub const DW_LANG_C99: u64 = 0x000c;
pub const DW_LANG_GO: u64 = 0x0016;
pub const DW_LANG_C_PLUS_PLUS_03: u64 = 0x0019;
pub const DW_LANG_C_PLUS_PLUS_11: u64 = 0x001a;
pub const DW_LANG_RUST: u64 = 0x001c;
pub const DW_LANG_C11: u64 = 0x001d;
pub const DW_LANG_C_PLUS_PLUS_14: u64 = 0x0021;
pub const DW_LANG_C_PLUS_PLUS_17: u64 = 0x002a;
pub const DW_LANG_C_PLUS_PLUS_20: u64 = 0x002b;
pub const DW_LANG_C17: u64 = 0x002c;

/// Name of a tag for debug logging.
pub fn tag_name(tag: u64) -> Option<&'static str> {
    Some(match tag {
        0x01 => "DW_TAG_array_type",
        0x02 => "DW_TAG_class_type",
        0x04 => "DW_TAG_enumeration_type",
        0x05 => "DW_TAG_formal_parameter",
        0x0b => "DW_TAG_lexical_block",
        0x0d => "DW_TAG_member",
        0x0f => "DW_TAG_pointer_type",
        0x10 => "DW_TAG_reference_type",
        0x11 => "DW_TAG_compile_unit",
        0x13 => "DW_TAG_structure_type",
        0x15 => "DW_TAG_subroutine_type",
        0x16 => "DW_TAG_typedef",
        0x17 => "DW_TAG_union_type",
        0x1d => "DW_TAG_inlined_subroutine",
        0x24 => "DW_TAG_base_type",
        0x26 => "DW_TAG_const_type",
        0x28 => "DW_TAG_enumerator",
        0x2e => "DW_TAG_subprogram",
        0x34 => "DW_TAG_variable",
        0x35 => "DW_TAG_volatile_type",
        0x37 => "DW_TAG_restrict_type",
        0x39 => "DW_TAG_namespace",
        0x3b => "DW_TAG_unspecified_type",
        0x42 => "DW_TAG_rvalue_reference_type",
        0x43 => "DW_TAG_template_alias",
        _ => return None,
    })
}

/// Name of an attribute for debug logging.
pub fn at_name(attr: u64) -> Option<&'static str> {
    Some(match attr {
        0x01 => "DW_AT_sibling",
        0x02 => "DW_AT_location",
        0x03 => "DW_AT_name",
        0x0b => "DW_AT_byte_size",
        0x10 => "DW_AT_stmt_list",
        0x11 => "DW_AT_low_pc",
        0x12 => "DW_AT_high_pc",
        0x13 => "DW_AT_language",
        0x1b => "DW_AT_comp_dir",
        0x1c => "DW_AT_const_value",
        0x25 => "DW_AT_producer",
        0x27 => "DW_AT_prototyped",
        0x31 => "DW_AT_abstract_origin",
        0x34 => "DW_AT_artificial",
        0x37 => "DW_AT_count",
        0x38 => "DW_AT_data_member_location",
        0x39 => "DW_AT_decl_column",
        0x3a => "DW_AT_decl_file",
        0x3b => "DW_AT_decl_line",
        0x3c => "DW_AT_declaration",
        0x3e => "DW_AT_encoding",
        0x3f => "DW_AT_external",
        0x40 => "DW_AT_frame_base",
        0x47 => "DW_AT_specification",
        0x49 => "DW_AT_type",
        0x52 => "DW_AT_entry_pc",
        0x55 => "DW_AT_ranges",
        0x58 => "DW_AT_call_file",
        0x59 => "DW_AT_call_line",
        0x6e => "DW_AT_linkage_name",
        0x2007 => "DW_AT_MIPS_linkage_name",
        _ => return None,
    })
}

/// Programming language a compilation unit was compiled from.
///
/// This only distinguishes languages the decoder special-cases, mapping all
/// other codes to [`Self::Other`]. The DWARF language attribute also encodes
/// the language "version", e.g. C11, which is collapsed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    /// C.
    C,

    /// C++.
    Cxx,

    /// Go.
    Go,

    /// Rust.
    Rust,

    /// Language is known but currently not mapped in this enum type.
    Other,
}

impl Lang {
    /// Maps a `DW_AT_language` constant to the corresponding variant.
    pub fn from_code(code: u64) -> Self {
        match code {
            DW_LANG_C | DW_LANG_C89 | DW_LANG_C99 | DW_LANG_C11 | DW_LANG_C17 => Lang::C,
            DW_LANG_C_PLUS_PLUS
            | DW_LANG_C_PLUS_PLUS_03
            | DW_LANG_C_PLUS_PLUS_11
            | DW_LANG_C_PLUS_PLUS_14
            | DW_LANG_C_PLUS_PLUS_17
            | DW_LANG_C_PLUS_PLUS_20 => Lang::Cxx,
            DW_LANG_GO => Lang::Go,
            DW_LANG_RUST => Lang::Rust,
            _ => Lang::Other,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Lang::C => "C",
            Lang::Cxx => "C++",
            Lang::Go => "Go",
            Lang::Rust => "Rust",
            Lang::Other => "other",
        })
    }
}
