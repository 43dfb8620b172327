// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Decoder for the `.debug_info` section.
//!
//! Walks the DIE tree of every compilation unit, decoding each attribute
//! according to the form declared by the unit's abbreviation table. Only
//! compile-unit metadata and subprogram entries are captured; everything
//! else is decoded purely to advance the cursor.
//!
//! C++ and Rust producers split subprograms into a declaration DIE (name,
//! no address) and a definition DIE (address, `DW_AT_specification` back
//! reference). Declarations are parked in a per-unit pending table keyed by
//! their section-relative offset and definitions inherit from it; whatever
//! is still pending when the unit ends is dropped.

use super::abbrev::{AbbrevTable, AttrSpec};
use super::aranges::ArangesEntry;
use super::consts::*;
use super::expr;
use super::line::LineHeader;
use super::reader::{str_at, Format, Reader};
use super::{Error, Result};
use crate::{debug, VirtAddr};
use std::collections::{BTreeMap, HashMap};

/// Decoded compilation unit header.
#[derive(Debug, Clone)]
pub struct CuHeader {
    /// Unit length as declared by the initial-length field.
    pub unit_length: u64,
    /// 32/64-bit DWARF format of this unit.
    pub format: Format,
    /// DWARF version, 2 through 5.
    pub version: u16,
    /// Unit type; only present in v5 headers.
    pub unit_type: Option<u8>,
    /// Offset of the unit's schema within `.debug_abbrev`.
    pub debug_abbrev_offset: u64,
    /// Size of a target address in bytes.
    pub address_size: u8,
    /// Unit ID of v5 skeleton/split units.
    pub unit_id: Option<u64>,
    /// Type signature of v5 type units.
    pub type_signature: Option<u64>,
    /// Type offset of v5 type units.
    pub type_offset: Option<u64>,
}

/// One function found in a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuFunc {
    /// Source-level name.
    pub name: String,
    /// Mangled linkage name, if the producer emitted one.
    pub linkage_name: Option<String>,
    /// Entry address (`DW_AT_low_pc`).
    pub addr: VirtAddr,
    /// Size in bytes derived from `DW_AT_high_pc`.
    pub size: u64,
}

/// Everything captured from one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct CuDebugInfo {
    /// Primary source file of the unit.
    pub file_name: String,
    /// Directory the unit was compiled in.
    pub compile_dir: String,
    /// Compiler identification string.
    pub producer: String,
    /// Source language, if the unit declared one.
    pub language: Option<Lang>,
    /// Offset of the unit's line program within `.debug_line`.
    pub stmt_list: Option<u64>,
    /// Functions keyed by entry address.
    pub funcs: BTreeMap<VirtAddr, CuFunc>,
}

/// Decoded attribute value, reduced to what the extraction needs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FormValue {
    Addr(u64),
    Uint(u64),
    Int(i64),
    Str(String),
    /// DIE reference, normalized to a section-relative offset.
    Ref(u64),
    SecOffset(u64),
    Flag(bool),
    /// Value was consumed but carries no information we use.
    Skipped,
}

/// `DW_AT_high_pc` is an end address in address form but a size in
/// constant forms (DWARF 4, section 2.17.2).
#[derive(Debug, Clone, Copy)]
enum HighPc {
    Addr(u64),
    Size(u64),
}

/// Accumulated attributes of one subprogram DIE.
#[derive(Debug, Clone, Default)]
struct FuncParts {
    name: Option<String>,
    linkage_name: Option<String>,
    low_pc: Option<u64>,
    high_pc: Option<HighPc>,
}

/// Reads one compilation unit header.
pub(crate) fn read_cu_header(r: &mut Reader<'_>) -> Result<CuHeader> {
    let (unit_length, format) = r.initial_length()?;
    let version = r.u16()?;
    if !(2..=5).contains(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    let mut hdr = CuHeader {
        unit_length,
        format,
        version,
        unit_type: None,
        debug_abbrev_offset: 0,
        address_size: 0,
        unit_id: None,
        type_signature: None,
        type_offset: None,
    };

    if version >= 5 {
        let unit_type = r.u8()?;
        hdr.unit_type = Some(unit_type);
        hdr.address_size = r.u8()?;
        hdr.debug_abbrev_offset = r.offset(format)?;

        match unit_type {
            DW_UT_COMPILE | DW_UT_PARTIAL => {}
            DW_UT_SKELETON | DW_UT_SPLIT_COMPILE => hdr.unit_id = Some(r.u64()?),
            DW_UT_TYPE | DW_UT_SPLIT_TYPE => {
                hdr.type_signature = Some(r.u64()?);
                hdr.type_offset = Some(r.offset(format)?);
            }
            other => return Err(Error::UnknownUnitType(other)),
        }
    } else {
        hdr.debug_abbrev_offset = r.offset(format)?;
        hdr.address_size = r.u8()?;
    }

    Ok(hdr)
}

/// Decodes one attribute value according to its form.
pub(crate) fn read_form_value(
    r: &mut Reader<'_>,
    spec: &AttrSpec,
    cuh: &CuHeader,
    cu_start: u64,
    debug_str: &[u8],
    line_str: &[u8],
) -> Result<FormValue> {
    let mut form = spec.form;
    loop {
        return Ok(match form {
            // The actual form is inline in the DIE; re-dispatch.
            DW_FORM_INDIRECT => {
                form = r.uleb128()?;
                continue;
            }

            DW_FORM_ADDR => FormValue::Addr(r.address(cuh.address_size)?),

            DW_FORM_BLOCK1 => {
                let len = r.u8()? as u64;
                r.skip(len)?;
                FormValue::Skipped
            }
            DW_FORM_BLOCK2 => {
                let len = r.u16()? as u64;
                r.skip(len)?;
                FormValue::Skipped
            }
            DW_FORM_BLOCK4 => {
                let len = r.u32()? as u64;
                r.skip(len)?;
                FormValue::Skipped
            }
            DW_FORM_BLOCK => {
                let len = r.uleb128()?;
                r.skip(len)?;
                FormValue::Skipped
            }

            DW_FORM_DATA1 => FormValue::Uint(r.u8()? as u64),
            DW_FORM_DATA2 => FormValue::Uint(r.u16()? as u64),
            DW_FORM_DATA4 => FormValue::Uint(r.u32()? as u64),
            DW_FORM_DATA8 => FormValue::Uint(r.u64()?),
            DW_FORM_DATA16 => {
                r.skip(16)?;
                FormValue::Skipped
            }
            DW_FORM_SDATA => FormValue::Int(r.sleb128()?),
            DW_FORM_UDATA => FormValue::Uint(r.uleb128()?),

            DW_FORM_STRING => FormValue::Str(r.cstr()?.into_owned()),
            DW_FORM_STRP => FormValue::Str(str_at(debug_str, r.offset(cuh.format)?)?),
            DW_FORM_LINE_STRP => FormValue::Str(str_at(line_str, r.offset(cuh.format)?)?),
            DW_FORM_STRP_SUP => {
                r.offset(cuh.format)?;
                FormValue::Skipped
            }

            DW_FORM_REF1 => FormValue::Ref(cu_start + r.u8()? as u64),
            DW_FORM_REF2 => FormValue::Ref(cu_start + r.u16()? as u64),
            DW_FORM_REF4 => FormValue::Ref(cu_start + r.u32()? as u64),
            DW_FORM_REF8 => FormValue::Ref(cu_start + r.u64()?),
            DW_FORM_REF_UDATA => FormValue::Ref(cu_start + r.uleb128()?),
            DW_FORM_REF_ADDR => FormValue::Ref(r.offset(cuh.format)?),
            DW_FORM_REF_SIG8 => {
                r.skip(8)?;
                FormValue::Skipped
            }
            DW_FORM_REF_SUP4 => {
                r.skip(4)?;
                FormValue::Skipped
            }
            DW_FORM_REF_SUP8 => {
                r.skip(8)?;
                FormValue::Skipped
            }

            DW_FORM_SEC_OFFSET => FormValue::SecOffset(r.offset(cuh.format)?),

            DW_FORM_FLAG => FormValue::Flag(r.u8()? != 0),
            DW_FORM_FLAG_PRESENT => FormValue::Flag(true),

            DW_FORM_EXPRLOC => {
                let len = r.uleb128()?;
                expr::skip_expression(r, len, cuh.address_size)?;
                FormValue::Skipped
            }

            DW_FORM_IMPLICIT_CONST => FormValue::Int(spec.implicit_const.unwrap_or(0)),

            // String/address/list indices resolve through v5 side tables we
            // don't load; consume the index and move on.
            DW_FORM_STRX | DW_FORM_ADDRX | DW_FORM_LOCLISTX | DW_FORM_RNGLISTX => {
                r.uleb128()?;
                FormValue::Skipped
            }
            DW_FORM_STRX1 | DW_FORM_ADDRX1 => {
                r.skip(1)?;
                FormValue::Skipped
            }
            DW_FORM_STRX2 | DW_FORM_ADDRX2 => {
                r.skip(2)?;
                FormValue::Skipped
            }
            DW_FORM_STRX3 | DW_FORM_ADDRX3 => {
                r.skip(3)?;
                FormValue::Skipped
            }
            DW_FORM_STRX4 | DW_FORM_ADDRX4 => {
                r.skip(4)?;
                FormValue::Skipped
            }

            other => return Err(Error::UnknownForm(other)),
        });
    }
}

/// Applies a decoded compile-unit attribute.
fn apply_cu_attr(cu: &mut CuDebugInfo, attr: u64, value: FormValue) {
    match (attr, value) {
        (DW_AT_NAME, FormValue::Str(s)) => cu.file_name = s,
        (DW_AT_COMP_DIR, FormValue::Str(s)) => cu.compile_dir = s,
        (DW_AT_PRODUCER, FormValue::Str(s)) => cu.producer = s,
        (DW_AT_LANGUAGE, FormValue::Uint(code)) => cu.language = Some(Lang::from_code(code)),
        (DW_AT_LANGUAGE, FormValue::Int(code)) => cu.language = Some(Lang::from_code(code as u64)),
        (DW_AT_STMT_LIST, FormValue::SecOffset(offset)) => cu.stmt_list = Some(offset),
        _ => {}
    }
}

/// Applies a decoded subprogram attribute.
fn apply_func_attr(
    parts: &mut FuncParts,
    attr: u64,
    value: FormValue,
    pending: &HashMap<u64, FuncParts>,
    cu: &CuDebugInfo,
    line_hdrs: &HashMap<u64, LineHeader>,
) -> Result<()> {
    match (attr, value) {
        (DW_AT_NAME, FormValue::Str(s)) => parts.name = Some(s),

        (DW_AT_LINKAGE_NAME | DW_AT_MIPS_LINKAGE_NAME, FormValue::Str(s)) => {
            parts.linkage_name = Some(s)
        }

        (DW_AT_LOW_PC, FormValue::Addr(addr)) => parts.low_pc = Some(addr),

        (DW_AT_HIGH_PC, FormValue::Addr(addr)) => parts.high_pc = Some(HighPc::Addr(addr)),
        (DW_AT_HIGH_PC, FormValue::Uint(size)) => parts.high_pc = Some(HighPc::Size(size)),
        (DW_AT_HIGH_PC, FormValue::Int(size)) => parts.high_pc = Some(HighPc::Size(size as u64)),

        (DW_AT_SPECIFICATION, FormValue::Ref(offset)) => {
            let Some(decl) = pending.get(&offset) else {
                return Err(Error::DanglingSpecification(offset));
            };
            if parts.name.is_none() {
                parts.name.clone_from(&decl.name);
            }
            if parts.linkage_name.is_none() {
                parts.linkage_name.clone_from(&decl.linkage_name);
            }
        }

        (DW_AT_DECL_FILE, FormValue::Uint(idx)) => log_decl_file(idx, cu, line_hdrs),
        (DW_AT_DECL_FILE, FormValue::Int(idx)) if idx >= 0 => {
            log_decl_file(idx as u64, cu, line_hdrs)
        }

        _ => {}
    }

    Ok(())
}

/// Logs which file a subprogram was declared in, if resolvable.
fn log_decl_file(idx: u64, cu: &CuDebugInfo, line_hdrs: &HashMap<u64, LineHeader>) {
    if let Some(hdr) = cu.stmt_list.and_then(|offset| line_hdrs.get(&offset)) {
        if let Ok(file) = hdr.file(idx) {
            debug!("subprogram declared in {}", file.name);
        }
    }
}

/// Files a completed subprogram DIE into the unit or the pending table.
fn finish_subprogram(
    cu: &mut CuDebugInfo,
    pending: &mut HashMap<u64, FuncParts>,
    die_offset: u64,
    parts: FuncParts,
) {
    let addr = parts.low_pc.unwrap_or(0);

    let Some(name) = parts.name.clone() else {
        // Nameless definitions still become specification targets, unless
        // something already claimed the address.
        if addr != 0 && cu.funcs.contains_key(&addr) {
            debug!("subprogram @ {:#x} already registered", addr);
        } else {
            pending.insert(die_offset, parts);
        }
        return;
    };

    if addr == 0 {
        // A declaration (or a library function that never got an address):
        // park it for a later DW_AT_specification reference.
        pending.insert(die_offset, parts);
        return;
    }

    let size = match parts.high_pc {
        Some(HighPc::Addr(high)) => high.saturating_sub(addr),
        Some(HighPc::Size(size)) => size,
        None => 0,
    };

    debug!("subprogram {} @ {:#x} ({} bytes)", name, addr, size);

    cu.funcs.insert(
        addr,
        CuFunc {
            name,
            linkage_name: parts.linkage_name,
            addr,
            size,
        },
    );
}

/// Decodes `.debug_info` into one [`CuDebugInfo`] per compilation unit.
pub fn read_debug_info(
    data: &[u8],
    debug_str: &[u8],
    line_str: &[u8],
    abbrev_data: &[u8],
    aranges: &HashMap<u64, ArangesEntry>,
    line_hdrs: &HashMap<u64, LineHeader>,
) -> Result<Vec<CuDebugInfo>> {
    let mut cus = Vec::new();
    let mut r = Reader::new(data);

    while !r.is_empty() {
        let cu_start = r.pos();

        // Aranges carries exactly one entry per unit; a unit without one
        // means the two sections disagree about the layout of .debug_info.
        if !aranges.contains_key(&cu_start) {
            return Err(Error::UnmatchedUnit(cu_start));
        }

        let cuh = read_cu_header(&mut r)?;
        let cu_end = cu_start
            .checked_add(cuh.format.initial_length_size())
            .and_then(|x| x.checked_add(cuh.unit_length))
            .filter(|&x| x <= r.len())
            .ok_or(Error::UnexpectedEof)?;

        debug!(
            "info: unit @ {:#x} v{}, abbrev @ {:#x}, address size {}",
            cu_start, cuh.version, cuh.debug_abbrev_offset, cuh.address_size
        );

        let abbrevs = AbbrevTable::read(abbrev_data, cuh.debug_abbrev_offset)?;

        let mut cu = CuDebugInfo::default();
        let mut pending: HashMap<u64, FuncParts> = HashMap::new();

        while r.pos() < cu_end {
            let die_offset = r.pos();
            let code = r.uleb128()?;
            if code == 0 {
                // Null DIE terminating a sibling chain.
                continue;
            }

            let ab = abbrevs.get(code).ok_or(Error::UnknownAbbrevCode(code))?;
            debug!(
                "[{:#08x}] {}",
                die_offset,
                tag_name(ab.tag).unwrap_or("DW_TAG_<unknown>")
            );

            let mut parts = FuncParts::default();
            for spec in &ab.attrs {
                debug!("  {}", at_name(spec.attr).unwrap_or("DW_AT_<unknown>"));
                let value = read_form_value(&mut r, spec, &cuh, cu_start, debug_str, line_str)?;
                match ab.tag {
                    DW_TAG_COMPILE_UNIT => apply_cu_attr(&mut cu, spec.attr, value),
                    DW_TAG_SUBPROGRAM => {
                        apply_func_attr(&mut parts, spec.attr, value, &pending, &cu, line_hdrs)?
                    }
                    _ => {}
                }
            }

            match ab.tag {
                DW_TAG_SUBPROGRAM => finish_subprogram(&mut cu, &mut pending, die_offset, parts),
                DW_TAG_COMPILE_UNIT => {
                    // rustc names units "src/lib.rs@crate-hash"; strip the
                    // hash so the name is an actual path.
                    if cu.language == Some(Lang::Rust) {
                        if let Some(at) = cu.file_name.rfind('@') {
                            cu.file_name.truncate(at);
                        }
                    }
                }
                _ => {}
            }
        }

        // The DIE stream must land exactly on the declared unit end, or the
        // offset of every following unit is off.
        if r.pos() != cu_end {
            return Err(Error::UnexpectedEof);
        }

        // Whatever is still pending had no definition in this unit;
        // declarations without addresses are not an error.
        if !pending.is_empty() {
            debug!("info: dropping {} unresolved declaration(s)", pending.len());
        }

        cus.push(cu);
    }

    Ok(cus)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Aranges stub covering the unit at the given offset.
    fn aranges_for(offsets: &[u64]) -> HashMap<u64, ArangesEntry> {
        offsets
            .iter()
            .map(|&offset| {
                (
                    offset,
                    ArangesEntry {
                        unit_length: 0,
                        format: Format::Dwarf32,
                        version: 2,
                        debug_info_offset: offset,
                        address_size: 8,
                        segment_size: 0,
                        segments: vec![],
                    },
                )
            })
            .collect()
    }

    /// Wraps a v4 unit body (without the header) into a full unit.
    fn v4_unit(abbrev_offset: u32, dies: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_le_bytes());
        body.extend_from_slice(&abbrev_offset.to_le_bytes());
        body.push(8); // address_size
        body.extend_from_slice(dies);

        let mut out = Vec::new();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn cu_header_v4() {
        let data = v4_unit(0x77, &[]);
        let mut r = Reader::new(&data);
        let hdr = read_cu_header(&mut r).unwrap();

        assert_eq!(hdr.version, 4);
        assert_eq!(hdr.format, Format::Dwarf32);
        assert_eq!(hdr.unit_length, 7);
        assert_eq!(hdr.debug_abbrev_offset, 0x77);
        assert_eq!(hdr.address_size, 8);
        assert_eq!(hdr.unit_type, None);
        assert_eq!(r.pos(), 11);
    }

    #[test]
    fn cu_header_v5_compile() {
        let mut body = Vec::new();
        body.extend_from_slice(&5u16.to_le_bytes());
        body.push(DW_UT_COMPILE);
        body.push(8);
        body.extend_from_slice(&0x30u32.to_le_bytes());

        let mut data = Vec::new();
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.extend_from_slice(&body);

        let hdr = read_cu_header(&mut Reader::new(&data)).unwrap();
        assert_eq!(hdr.version, 5);
        assert_eq!(hdr.unit_type, Some(DW_UT_COMPILE));
        assert_eq!(hdr.debug_abbrev_offset, 0x30);
        assert_eq!(hdr.address_size, 8);
    }

    #[test]
    fn cu_header_v5_skeleton_has_unit_id() {
        let mut body = Vec::new();
        body.extend_from_slice(&5u16.to_le_bytes());
        body.push(DW_UT_SKELETON);
        body.push(8);
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&0xdead_beef_cafe_f00du64.to_le_bytes());

        let mut data = Vec::new();
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.extend_from_slice(&body);

        let hdr = read_cu_header(&mut Reader::new(&data)).unwrap();
        assert_eq!(hdr.unit_id, Some(0xdead_beef_cafe_f00d));
    }

    #[test]
    fn rejects_unknown_unit_type() {
        let mut body = Vec::new();
        body.extend_from_slice(&5u16.to_le_bytes());
        body.push(0x7f);
        body.push(8);
        body.extend_from_slice(&0u32.to_le_bytes());

        let mut data = Vec::new();
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.extend_from_slice(&body);

        assert!(matches!(
            read_cu_header(&mut Reader::new(&data)),
            Err(Error::UnknownUnitType(0x7f))
        ));
    }

    /// Abbrev table used by the DIE walking tests:
    /// 1: compile_unit (name string, language data2)
    /// 2: subprogram declaration (name string)
    /// 3: subprogram definition (low_pc addr, high_pc data4, spec ref4)
    #[rustfmt::skip]
    const ABBREVS: &[u8] = &[
        0x01, 0x11, 0x01,
        0x03, 0x08,
        0x13, 0x05,
        0x00, 0x00,
        0x02, 0x2e, 0x00,
        0x03, 0x08,
        0x00, 0x00,
        0x03, 0x2e, 0x00,
        0x11, 0x01,
        0x12, 0x06,
        0x47, 0x13,
        0x00, 0x00,
        0x00,
    ];

    #[test]
    fn subprogram_with_specification() {
        let mut dies = Vec::new();

        // Compile unit DIE.
        dies.push(0x01);
        dies.extend_from_slice(b"test.cc\x00");
        dies.extend_from_slice(&4u16.to_le_bytes()); // C++

        // Declaration: name "foo", no address. Offsets are section-relative
        // and the v4 unit header is 11 bytes.
        let decl_offset = (11 + dies.len()) as u32;
        dies.push(0x02);
        dies.extend_from_slice(b"foo\x00");

        // Definition referencing the declaration.
        dies.push(0x03);
        dies.extend_from_slice(&0x4000u64.to_le_bytes());
        dies.extend_from_slice(&0x20u32.to_le_bytes());
        dies.extend_from_slice(&decl_offset.to_le_bytes());

        let data = v4_unit(0, &dies);
        let cus = read_debug_info(&data, &[], &[], ABBREVS, &aranges_for(&[0]), &HashMap::new())
            .unwrap();

        assert_eq!(cus.len(), 1);
        let cu = &cus[0];
        assert_eq!(cu.file_name, "test.cc");
        assert_eq!(cu.language, Some(Lang::Cxx));
        assert_eq!(cu.funcs.len(), 1);
        assert_eq!(
            cu.funcs[&0x4000],
            CuFunc {
                name: "foo".to_owned(),
                linkage_name: None,
                addr: 0x4000,
                size: 0x20,
            }
        );
    }

    #[test]
    fn dangling_specification_is_fatal() {
        let mut dies = Vec::new();
        dies.push(0x01);
        dies.extend_from_slice(b"t.cc\x00");
        dies.extend_from_slice(&4u16.to_le_bytes());

        dies.push(0x03);
        dies.extend_from_slice(&0x4000u64.to_le_bytes());
        dies.extend_from_slice(&0x20u32.to_le_bytes());
        dies.extend_from_slice(&0x9999u32.to_le_bytes()); // nothing there

        let data = v4_unit(0, &dies);
        assert!(matches!(
            read_debug_info(&data, &[], &[], ABBREVS, &aranges_for(&[0]), &HashMap::new()),
            Err(Error::DanglingSpecification(0x9999))
        ));
    }

    #[test]
    fn null_dies_are_skipped() {
        let mut dies = Vec::new();
        dies.push(0x01);
        dies.extend_from_slice(b"a.c\x00");
        dies.extend_from_slice(&2u16.to_le_bytes());
        dies.push(0x00); // end of children
        dies.push(0x00);

        let data = v4_unit(0, &dies);
        let cus = read_debug_info(&data, &[], &[], ABBREVS, &aranges_for(&[0]), &HashMap::new())
            .unwrap();
        assert_eq!(cus[0].language, Some(Lang::C));
    }

    #[test]
    fn unknown_abbrev_code_is_fatal() {
        let data = v4_unit(0, &[0x09]);
        assert!(matches!(
            read_debug_info(&data, &[], &[], ABBREVS, &aranges_for(&[0]), &HashMap::new()),
            Err(Error::UnknownAbbrevCode(9))
        ));
    }

    #[test]
    fn unit_without_aranges_entry_is_fatal() {
        let data = v4_unit(0, &[]);
        assert!(matches!(
            read_debug_info(&data, &[], &[], ABBREVS, &HashMap::new(), &HashMap::new()),
            Err(Error::UnmatchedUnit(0))
        ));
    }

    #[test]
    fn rust_unit_name_is_stripped() {
        let mut dies = Vec::new();
        dies.push(0x01);
        dies.extend_from_slice(b"src/lib.rs@mycrate-1cafef00d\x00");
        dies.extend_from_slice(&0x1cu16.to_le_bytes()); // Rust

        let data = v4_unit(0, &dies);
        let cus = read_debug_info(&data, &[], &[], ABBREVS, &aranges_for(&[0]), &HashMap::new())
            .unwrap();
        assert_eq!(cus[0].file_name, "src/lib.rs");
        assert_eq!(cus[0].language, Some(Lang::Rust));
    }

    #[test]
    fn consumes_each_unit_exactly() {
        let mut dies1 = Vec::new();
        dies1.push(0x01);
        dies1.extend_from_slice(b"one.c\x00");
        dies1.extend_from_slice(&2u16.to_le_bytes());

        let mut dies2 = Vec::new();
        dies2.push(0x01);
        dies2.extend_from_slice(b"two.c\x00");
        dies2.extend_from_slice(&2u16.to_le_bytes());

        let mut data = v4_unit(0, &dies1);
        let second_start = data.len() as u64;
        data.extend_from_slice(&v4_unit(0, &dies2));

        let cus = read_debug_info(
            &data,
            &[],
            &[],
            ABBREVS,
            &aranges_for(&[0, second_start]),
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(cus.len(), 2);
        assert_eq!(cus[0].file_name, "one.c");
        assert_eq!(cus[1].file_name, "two.c");
    }
}
