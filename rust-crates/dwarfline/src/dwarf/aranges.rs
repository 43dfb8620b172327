// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Decoder for the `.debug_aranges` section.
//!
//! Each entry maps one compilation unit (identified by its offset into
//! `.debug_info`) to the address ranges its machine code occupies. There is
//! exactly one entry per unit, which the info decoder relies on.

use super::reader::{Format, Reader};
use super::{Error, Result};
use crate::{debug, VirtAddr};
use std::collections::HashMap;

/// One `(address, length)` range covered by a compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Start address of the range.
    pub address: VirtAddr,
    /// Length of the range in bytes.
    pub length: u64,
}

/// Decoded `.debug_aranges` entry for one compilation unit.
#[derive(Debug, Clone)]
pub struct ArangesEntry {
    /// Unit length as declared by the initial-length field.
    pub unit_length: u64,
    /// 32/64-bit DWARF format of this entry.
    pub format: Format,
    /// Aranges table version (2 for all producers we have seen).
    pub version: u16,
    /// Offset of the described unit within `.debug_info`.
    pub debug_info_offset: u64,
    /// Size of an address on the target, 4 or 8.
    pub address_size: u8,
    /// Size of a segment selector; 0 for flat address spaces.
    pub segment_size: u8,
    /// Ranges covered by the unit.
    pub segments: Vec<Segment>,
}

/// Decodes `.debug_aranges`, keyed by `.debug_info` unit offset.
pub fn read_aranges(data: &[u8]) -> Result<HashMap<u64, ArangesEntry>> {
    let mut map = HashMap::new();
    let mut r = Reader::new(data);

    while !r.is_empty() {
        let entry_start = r.pos();
        let (unit_length, format) = r.initial_length()?;
        let next_entry = entry_start
            .checked_add(format.initial_length_size())
            .and_then(|x| x.checked_add(unit_length))
            .filter(|&x| x <= r.len())
            .ok_or(Error::UnexpectedEof)?;

        let version = r.u16()?;
        let debug_info_offset = r.offset(format)?;
        let address_size = r.u8()?;
        if !matches!(address_size, 4 | 8) {
            return Err(Error::UnsupportedAddressSize(address_size));
        }
        let segment_size = r.u8()?;

        // The first tuple is aligned to a multiple of twice the address size,
        // measured from the start of this entry.
        let tuple_size = 2 * address_size as u64;
        let misalign = (r.pos() - entry_start) % tuple_size;
        if misalign != 0 {
            r.skip(tuple_size - misalign)?;
        }

        // Tuples follow until an all-zero pair.
        let mut segments = Vec::new();
        loop {
            let address = r.address(address_size)?;
            let length = r.address(address_size)?;
            if address == 0 && length == 0 {
                break;
            }
            segments.push(Segment { address, length });
        }

        // Any residue up to the declared unit length is padding.
        if r.pos() > next_entry {
            return Err(Error::UnexpectedEof);
        }
        r.seek(next_entry)?;

        debug!(
            "aranges: unit @ {:#x}, {} range(s)",
            debug_info_offset,
            segments.len()
        );

        map.insert(
            debug_info_offset,
            ArangesEntry {
                unit_length,
                format,
                version,
                debug_info_offset,
                address_size,
                segment_size,
                segments,
            },
        );
    }

    Ok(map)
}
