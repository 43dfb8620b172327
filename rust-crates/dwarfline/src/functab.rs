// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Function table derived from the ELF symbol table.
//!
//! The table is built from `.symtab` before any DWARF decoding starts and is
//! then enriched in place by the line decoder: every statement row whose
//! address falls into a known function is recorded in that function's
//! line-to-address map.

use crate::{objfile, VirtAddr};
use std::collections::BTreeMap;

/// Machine address of one source line within a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineAddr {
    /// First machine address attributed to the line.
    pub addr: VirtAddr,
    /// Whether the row was a recommended breakpoint location.
    pub is_stmt: bool,
    /// Source directory the line lives in, if known.
    pub src_dir: String,
    /// Source file the line lives in.
    pub src_file: String,
}

/// One function symbol and its accumulated source line info.
#[derive(Debug, Clone)]
pub struct FuncInfo {
    /// Symbol name. Might be mangled.
    pub name: String,
    /// Start address of the function.
    pub addr: VirtAddr,
    /// Size of the function in bytes.
    pub size: u64,
    /// Name of the section the symbol lives in (usually `.text`).
    pub sec_name: String,
    /// Directory of the source file this function was compiled from.
    ///
    /// Filled by the line decoder; empty until then.
    pub src_dir_name: String,
    /// Source file this function was compiled from. Empty until decoded.
    pub src_file_name: String,
    /// Source line -> machine address mapping, filled by the line decoder.
    pub line_addrs: BTreeMap<u64, LineAddr>,
}

/// All function symbols of an executable, ordered by start address.
#[derive(Debug, Default)]
pub struct FuncTable {
    funcs: Vec<FuncInfo>,
}

impl FuncTable {
    /// Builds the table from the debug symbol table of an object file.
    pub fn from_object(obj: &objfile::Reader<'_>) -> Self {
        let mut funcs: Vec<_> = obj
            .function_symbols()
            .map(|sym| FuncInfo {
                name: sym.name.to_owned(),
                addr: sym.virt_addr,
                size: sym.length,
                sec_name: sym.sec_name.unwrap_or_default(),
                src_dir_name: String::new(),
                src_file_name: String::new(),
                line_addrs: BTreeMap::new(),
            })
            .collect();

        funcs.sort_unstable_by_key(|f| f.addr);

        FuncTable { funcs }
    }

    /// Finds the function covering the given address, if any.
    ///
    /// Addresses that belong to no `.symtab` function resolve to `None`; the
    /// line decoder silently drops the corresponding rows.
    pub fn index_for_addr(&self, addr: VirtAddr) -> Option<usize> {
        let idx = match self.funcs.binary_search_by_key(&addr, |f| f.addr) {
            Ok(idx) => idx,
            Err(idx) => idx.checked_sub(1)?,
        };

        let func = &self.funcs[idx];

        if addr - func.addr < func.size {
            Some(idx)
        } else {
            None
        }
    }

    /// Mutable access to a function record by index.
    pub fn get_mut(&mut self, idx: usize) -> &mut FuncInfo {
        &mut self.funcs[idx]
    }

    /// All function records, ordered by start address.
    pub fn funcs(&self) -> &[FuncInfo] {
        &self.funcs
    }

    /// Number of functions in the table.
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    /// Returns true if the executable had no function symbols.
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a table directly from `(name, addr, size)` triples.
    pub(crate) fn table(funcs: &[(&str, VirtAddr, u64)]) -> FuncTable {
        let mut funcs: Vec<_> = funcs
            .iter()
            .map(|&(name, addr, size)| FuncInfo {
                name: name.to_owned(),
                addr,
                size,
                sec_name: ".text".to_owned(),
                src_dir_name: String::new(),
                src_file_name: String::new(),
                line_addrs: BTreeMap::new(),
            })
            .collect();
        funcs.sort_unstable_by_key(|f| f.addr);
        FuncTable { funcs }
    }

    #[test]
    fn addr_lookup() {
        let tab = table(&[("a", 0x1000, 0x20), ("b", 0x1040, 0x10)]);

        assert_eq!(tab.index_for_addr(0x1000), Some(0));
        assert_eq!(tab.index_for_addr(0x101f), Some(0));
        assert_eq!(tab.index_for_addr(0x1020), None);
        assert_eq!(tab.index_for_addr(0x1040), Some(1));
        assert_eq!(tab.index_for_addr(0x104f), Some(1));
        assert_eq!(tab.index_for_addr(0x1050), None);
        assert_eq!(tab.index_for_addr(0xfff), None);
    }

    #[test]
    fn zero_sized_symbol_covers_nothing() {
        let tab = table(&[("marker", 0x2000, 0)]);
        assert_eq!(tab.index_for_addr(0x2000), None);
    }
}
