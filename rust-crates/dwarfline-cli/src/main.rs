// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use dwarfline::functab::FuncTable;
use dwarfline::{dwarf, objfile, AnyError};
use std::path::{Path, PathBuf};

/// Prints the function-to-source-line mapping of an ELF executable.
#[derive(Parser, Debug)]
#[clap(version)]
struct Args {
    /// Path to an ELF64 little-endian executable built with debug info.
    target: PathBuf,
}

fn main() {
    let args = Args::parse();

    if let Err(error) = run(&args.target) {
        eprintln!("ERROR: failed to read {:?}: {}", args.target, error);
        std::process::exit(1);
    }
}

fn run(path: &Path) -> Result<(), AnyError> {
    let file = objfile::File::open(path)?;
    let obj = file.reader()?;

    if !obj.is_elf64() {
        return Err(Box::new(objfile::Error::NotElf64));
    }

    let mut functab = FuncTable::from_object(&obj);
    let sections = dwarf::DebugSections::load(&obj)?;
    let cus = sections.decode(&mut functab)?;

    for cu in &cus {
        println!("CU {}/{}", cu.compile_dir, cu.file_name);
        if let Some(lang) = cu.language {
            println!("  language: {}", lang);
        }
        if !cu.producer.is_empty() {
            println!("  producer: {}", cu.producer);
        }
        println!("  subprograms: {}", cu.funcs.len());
        for func in cu.funcs.values() {
            match &func.linkage_name {
                Some(linkage) => {
                    println!("    {:#010x} {} ({})", func.addr, func.name, linkage)
                }
                None => println!("    {:#010x} {}", func.addr, func.name),
            }
        }
    }

    println!();

    for func in functab.funcs() {
        if func.line_addrs.is_empty() {
            continue;
        }

        println!(
            "{} @ {:#010x}+{:#x} [{}] {}/{}",
            func.name, func.addr, func.size, func.sec_name, func.src_dir_name, func.src_file_name,
        );
        for (line, la) in &func.line_addrs {
            println!("  line {:>6} -> {:#010x}", line, la.addr);
        }
    }

    Ok(())
}
