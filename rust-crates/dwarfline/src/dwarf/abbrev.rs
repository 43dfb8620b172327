// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Decoder for the `.debug_abbrev` section.
//!
//! Each compilation unit points at an abbreviation table that acts as the
//! schema for its DIEs: per abbreviation code, the tag, whether children
//! follow, and the ordered list of (attribute, form) descriptors.

use super::consts::*;
use super::reader::Reader;
use super::Result;
use smallvec::SmallVec;
use std::collections::HashMap;

/// One attribute descriptor within an abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrSpec {
    /// Attribute code (`DW_AT_*`).
    pub attr: u64,
    /// Form code (`DW_FORM_*`).
    pub form: u64,
    /// Value carried by the abbreviation itself for `DW_FORM_implicit_const`.
    pub implicit_const: Option<i64>,
}

/// One decoded abbreviation.
#[derive(Debug, Clone)]
pub struct Abbrev {
    /// Abbreviation code referenced by DIEs; nonzero.
    pub code: u64,
    /// Tag of DIEs using this abbreviation (`DW_TAG_*`).
    pub tag: u64,
    /// Whether DIEs using this abbreviation are followed by children.
    pub has_children: bool,
    /// Attribute descriptors in wire order.
    pub attrs: SmallVec<[AttrSpec; 8]>,
}

/// Abbreviation table of a single compilation unit.
#[derive(Debug, Default)]
pub struct AbbrevTable {
    entries: Vec<Abbrev>,
    by_code: HashMap<u64, usize>,
}

impl AbbrevTable {
    /// Decodes the table at `offset` within `.debug_abbrev`.
    ///
    /// The table ends at the first zero abbreviation code.
    pub fn read(data: &[u8], offset: u64) -> Result<Self> {
        let mut r = Reader::new(data);
        r.seek(offset)?;

        let mut table = AbbrevTable::default();
        loop {
            let code = r.uleb128()?;
            if code == 0 {
                break;
            }

            let tag = r.uleb128()?;
            let has_children = r.u8()? == DW_CHILDREN_YES;

            let mut attrs = SmallVec::new();
            loop {
                let attr = r.uleb128()?;
                let form = r.uleb128()?;
                if attr == 0 && form == 0 {
                    break;
                }

                let implicit_const = if form == DW_FORM_IMPLICIT_CONST {
                    Some(r.sleb128()?)
                } else {
                    None
                };

                attrs.push(AttrSpec {
                    attr,
                    form,
                    implicit_const,
                });
            }

            table.by_code.insert(code, table.entries.len());
            table.entries.push(Abbrev {
                code,
                tag,
                has_children,
                attrs,
            });
        }

        Ok(table)
    }

    /// Looks up an abbreviation by its code.
    pub fn get(&self, code: u64) -> Option<&Abbrev> {
        self.by_code.get(&code).map(|&idx| &self.entries[idx])
    }

    /// Abbreviations in wire order.
    pub fn entries(&self) -> &[Abbrev] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::super::Error;
    use super::*;

    #[test]
    fn basic_table() {
        #[rustfmt::skip]
        let data: &[u8] = &[
            // Code 1: compile_unit, has children, name=strp, stmt_list=sec_offset.
            0x01, 0x11, 0x01,
            0x03, 0x0e,
            0x10, 0x17,
            0x00, 0x00,
            // Code 2: subprogram, no children, low_pc=addr, high_pc=data4.
            0x02, 0x2e, 0x00,
            0x11, 0x01,
            0x12, 0x06,
            0x00, 0x00,
            // End of table.
            0x00,
            // Trailing bytes belonging to the next unit's table.
            0xde, 0xad,
        ];

        let table = AbbrevTable::read(data, 0).unwrap();
        assert_eq!(table.entries().len(), 2);

        let cu = table.get(1).unwrap();
        assert_eq!(cu.tag, DW_TAG_COMPILE_UNIT);
        assert!(cu.has_children);
        assert_eq!(
            cu.attrs
                .iter()
                .map(|a| (a.attr, a.form))
                .collect::<Vec<_>>(),
            [(DW_AT_NAME, DW_FORM_STRP), (DW_AT_STMT_LIST, DW_FORM_SEC_OFFSET)]
        );

        let sp = table.get(2).unwrap();
        assert_eq!(sp.tag, DW_TAG_SUBPROGRAM);
        assert!(!sp.has_children);
        assert!(table.get(3).is_none());
    }

    #[test]
    fn implicit_const() {
        #[rustfmt::skip]
        let data: &[u8] = &[
            // Code 1: subprogram, decl_file carried as implicit const -2.
            0x01, 0x2e, 0x00,
            0x3a, 0x21, 0x7e,
            0x00, 0x00,
            0x00,
        ];

        let table = AbbrevTable::read(data, 0).unwrap();
        let sp = table.get(1).unwrap();
        assert_eq!(
            sp.attrs[0],
            AttrSpec {
                attr: DW_AT_DECL_FILE,
                form: DW_FORM_IMPLICIT_CONST,
                implicit_const: Some(-2),
            }
        );
    }

    #[test]
    fn offset_into_section() {
        // Two tables back to back; the second starts at offset 4.
        #[rustfmt::skip]
        let data: &[u8] = &[
            0x01, 0x11, 0x00, 0x00, /* table 0 terminator follows */
            0x01, 0x34, 0x00,
            0x02, 0x18,
            0x00, 0x00,
            0x00,
        ];

        let table = AbbrevTable::read(data, 4).unwrap();
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.get(1).unwrap().tag, 0x34);
    }

    #[test]
    fn truncated_table() {
        // Abbreviation cut off in the middle of its attribute list.
        let data: &[u8] = &[0x01, 0x2e, 0x00, 0x11];
        assert!(matches!(
            AbbrevTable::read(data, 0),
            Err(Error::UnexpectedEof)
        ));
    }
}
