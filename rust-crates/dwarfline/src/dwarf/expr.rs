// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Walker for DWARF expressions embedded in `exprloc` attribute values.
//!
//! Expression values are not evaluated; the walker only consumes each
//! opcode's operands so that the enclosing DIE decode can continue at the
//! right offset. The cursor must land exactly on the declared expression
//! length, anything else is a decoding error.

use super::consts::*;
use super::reader::Reader;
use super::{Error, Result};

/// Advances `r` over one expression of `length` bytes.
pub(crate) fn skip_expression(r: &mut Reader<'_>, length: u64, address_size: u8) -> Result<()> {
    let end = r
        .pos()
        .checked_add(length)
        .filter(|&x| x <= r.len())
        .ok_or(Error::UnexpectedEof)?;

    while r.pos() < end {
        let op = r.u8()?;

        // Vendor-specific opcodes are not self-describing; the rest of the
        // expression is theirs.
        if op >= DW_OP_LO_USER {
            r.seek(end)?;
            break;
        }

        match op {
            DW_OP_ADDR => {
                r.address(address_size)?;
            }

            DW_OP_CONST1U | DW_OP_CONST1S | DW_OP_PICK | DW_OP_DEREF_SIZE | DW_OP_XDEREF_SIZE => {
                r.skip(1)?;
            }

            DW_OP_CONST2U | DW_OP_CONST2S | DW_OP_BRA | DW_OP_SKIP => {
                r.skip(2)?;
            }

            DW_OP_CONST4U | DW_OP_CONST4S => {
                r.skip(4)?;
            }

            DW_OP_CONST8U | DW_OP_CONST8S => {
                r.skip(8)?;
            }

            DW_OP_CONSTU | DW_OP_PLUS_UCONST | DW_OP_REGX | DW_OP_PIECE => {
                r.uleb128()?;
            }

            DW_OP_CONSTS | DW_OP_FBREG => {
                r.sleb128()?;
            }

            DW_OP_BREG0..=DW_OP_BREG31 => {
                r.sleb128()?;
            }

            DW_OP_BREGX => {
                r.uleb128()?;
                r.sleb128()?;
            }

            DW_OP_BIT_PIECE => {
                r.uleb128()?;
                r.uleb128()?;
            }

            DW_OP_IMPLICIT_VALUE => {
                let len = r.uleb128()?;
                r.skip(len)?;
            }

            // Stack manipulation, dereferences, arithmetic, comparisons,
            // literals and registers all take no operand bytes.
            DW_OP_DEREF
            | DW_OP_DUP
            | DW_OP_DROP
            | DW_OP_OVER
            | DW_OP_SWAP
            | DW_OP_ROT
            | DW_OP_XDEREF
            | DW_OP_ABS..=DW_OP_PLUS
            | DW_OP_SHL..=DW_OP_XOR
            | DW_OP_EQ..=DW_OP_NE
            | DW_OP_LIT0..=DW_OP_LIT31
            | DW_OP_REG0..=DW_OP_REG31
            | DW_OP_NOP
            | DW_OP_CALL_FRAME_CFA
            | DW_OP_STACK_VALUE => {}

            other => return Err(Error::UnknownExprOpcode(other)),
        }

        if r.pos() > end {
            return Err(Error::ExprLengthMismatch);
        }
    }

    if r.pos() != end {
        return Err(Error::ExprLengthMismatch);
    }

    Ok(())
}
