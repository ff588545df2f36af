//! x86 instruction decoder for the 32-bit ISA subset this VM supports.
//!
//! Decodes raw instruction bytes from guest memory into [`DecodedInst`]
//! structs consumed by `executor`. Effective addresses for memory operands
//! are resolved eagerly against the current register file while decoding,
//! so every operand the executor sees is already a flat `Register`,
//! `Memory{addr, ..}`, or `Immediate` handle — never an unresolved
//! base/index/scale/displacement tuple.

use crate::error::{Result, VmError};
use crate::flags::OperandSize;
use crate::instruction::{DecodedInst, Operand, PrefixState, RepPrefix};
use crate::memory::Memory;
use crate::registers::RegisterFile;

/// Maximum encoded instruction length this decoder will consume. x86 caps
/// at 15; nothing in this subset approaches that, but fetches are bounded
/// defensively.
const MAX_INST_LEN: u32 = 15;

/// Decodes one instruction at `eip` from `memory`, using `regs` to resolve
/// any memory operand's effective address.
pub struct Decoder;

impl Decoder {
    /// Decode the instruction at `eip`. Returns the decoded instruction;
    /// does not mutate `regs` or advance `regs.eip` — the caller does that.
    pub fn decode(memory: &Memory, regs: &RegisterFile, eip: u32) -> Result<DecodedInst> {
        let start = eip;
        let mut cur = eip;
        let mut prefix = PrefixState::default();
        let mut rep = RepPrefix::None;

        // ── Prefix bytes ──
        let opcode_byte = loop {
            let b = fetch_u8(memory, &mut cur, start)?;
            match b {
                0x66 => prefix.operand_size_override = true,
                0x67 => prefix.address_size_override = true,
                0xF0 => prefix.lock = true,
                0xF2 => rep = RepPrefix::Repne,
                0xF3 => rep = RepPrefix::Rep,
                // Segment overrides (CS/SS/DS/ES/FS/GS). Consumed and
                // dropped: memory is flat, so every segment resolves to
                // the same linear address.
                0x2E | 0x36 | 0x3E | 0x26 | 0x64 | 0x65 => {}
                _ => break b,
            }
        };

        let operand_size = if prefix.operand_size_override {
            OperandSize::Word
        } else {
            OperandSize::Dword
        };

        let mut inst = DecodedInst::empty();
        inst.prefix = prefix;
        inst.rep = rep;
        inst.operand_size = operand_size;

        let opcode: u16 = if opcode_byte == 0x0F {
            let b2 = fetch_u8(memory, &mut cur, start)?;
            0x0F00 | b2 as u16
        } else {
            opcode_byte as u16
        };
        inst.opcode = opcode;

        decode_operands(memory, regs, &mut cur, start, opcode, &mut inst)?;

        let len = cur - start;
        if len == 0 || len > MAX_INST_LEN {
            return Err(VmError::UnknownOpcode {
                opcode: opcode_byte,
                eip: start,
            });
        }
        inst.length = len as u8;
        Ok(inst)
    }
}

fn fetch_u8(memory: &Memory, cur: &mut u32, eip_for_error: u32) -> Result<u8> {
    let v = memory.read_u8(*cur, eip_for_error)?;
    *cur += 1;
    Ok(v)
}

fn fetch_i8(memory: &Memory, cur: &mut u32, eip_for_error: u32) -> Result<i8> {
    Ok(fetch_u8(memory, cur, eip_for_error)? as i8)
}

fn fetch_u16(memory: &Memory, cur: &mut u32, eip_for_error: u32) -> Result<u16> {
    let v = memory.read_u16(*cur, eip_for_error)?;
    *cur += 2;
    Ok(v)
}

fn fetch_u32(memory: &Memory, cur: &mut u32, eip_for_error: u32) -> Result<u32> {
    let v = memory.read_u32(*cur, eip_for_error)?;
    *cur += 4;
    Ok(v)
}

fn fetch_i32(memory: &Memory, cur: &mut u32, eip_for_error: u32) -> Result<i32> {
    Ok(fetch_u32(memory, cur, eip_for_error)? as i32)
}

/// Read a ModR/M byte (and, if present, a SIB byte and displacement) and
/// resolve the r/m side into an `Operand`. Returns `(operand, reg_field)`.
///
/// Implements the 32-bit addressing table from Intel SDM §2.1.5:
/// mod=11 is register-direct; mod=00/rm=5 is disp32-only; rm=4 means a SIB
/// byte follows (base + index<<scale, with the mod=00/base=5 special case
/// meaning "disp32, no base").
fn decode_modrm(
    memory: &Memory,
    regs: &RegisterFile,
    cur: &mut u32,
    eip_for_error: u32,
    width: OperandSize,
) -> Result<(Operand, u8)> {
    let modrm = fetch_u8(memory, cur, eip_for_error)?;
    let md = (modrm >> 6) & 3;
    let reg = (modrm >> 3) & 7;
    let rm = modrm & 7;

    if md == 3 {
        return Ok((Operand::Register { idx: rm, width }, reg));
    }

    let mut addr: u32;

    if rm == 4 {
        let sib = fetch_u8(memory, cur, eip_for_error)?;
        let scale = (sib >> 6) & 3;
        let index = (sib >> 3) & 7;
        let base = sib & 7;

        let index_val: u32 = if index == 4 {
            0
        } else {
            regs.read_gpr32(index) << scale
        };

        addr = if base == 5 && md == 0 {
            fetch_i32(memory, cur, eip_for_error)? as u32
        } else {
            regs.read_gpr32(base)
        };
        addr = addr.wrapping_add(index_val);
    } else if md == 0 && rm == 5 {
        addr = fetch_i32(memory, cur, eip_for_error)? as u32;
    } else {
        addr = regs.read_gpr32(rm);
    }

    match md {
        0 => {} // no additional displacement beyond what was already consumed above
        1 => {
            let disp = fetch_i8(memory, cur, eip_for_error)?;
            addr = addr.wrapping_add(disp as i32 as u32);
        }
        2 => {
            let disp = fetch_i32(memory, cur, eip_for_error)?;
            addr = addr.wrapping_add(disp as u32);
        }
        _ => unreachable!(),
    }

    Ok((Operand::Memory { addr, width }, reg))
}

/// Populates `inst.operands`/`inst.operand_count`/`inst.modrm` for the
/// given primary/secondary opcode, advancing `cur` past everything the
/// encoding consumes (ModR/M, SIB, displacement, immediates).
fn decode_operands(
    memory: &Memory,
    regs: &RegisterFile,
    cur: &mut u32,
    eip: u32,
    opcode: u16,
    inst: &mut DecodedInst,
) -> Result<()> {
    let opw = inst.operand_size;

    // Standard ALU opcode blocks: add/or/adc/sbb/and/sub/xor/cmp each
    // occupy 8 opcodes starting at 0x00/0x08/0x10/.../0x38, in the
    // Eb,Gb / Ev,Gv / Gb,Eb / Gv,Ev / AL,Ib / eAX,Iz pattern.
    if opcode < 0x40 && (opcode & 0x07) < 6 && (opcode >> 3) < 8 {
        let variant = opcode & 0x07;
        match variant {
            0 => decode_form_eg(memory, regs, cur, eip, inst, OperandSize::Byte, false)?,
            1 => decode_form_eg(memory, regs, cur, eip, inst, opw, false)?,
            2 => decode_form_eg(memory, regs, cur, eip, inst, OperandSize::Byte, true)?,
            3 => decode_form_eg(memory, regs, cur, eip, inst, opw, true)?,
            4 => decode_form_acc_imm(memory, cur, eip, inst, OperandSize::Byte)?,
            5 => decode_form_acc_imm(memory, cur, eip, inst, opw)?,
            _ => return Err(VmError::UnknownOpcode { opcode: opcode as u8, eip }),
        }
        return Ok(());
    }

    match opcode {
        // INC r32 (0x40-0x47), DEC r32 (0x48-0x4F)
        0x40..=0x4F => {
            let idx = (opcode & 0x07) as u8;
            inst.operands[0] = Operand::Register { idx, width: opw };
            inst.operand_count = 1;
        }

        // PUSH r32 (0x50-0x57), POP r32 (0x58-0x5F)
        0x50..=0x5F => {
            let idx = (opcode & 0x07) as u8;
            inst.operands[0] = Operand::Register { idx, width: opw };
            inst.operand_count = 1;
        }

        // PUSH imm32
        0x68 => {
            let imm = fetch_u32(memory, cur, eip)?;
            inst.operands[0] = Operand::Immediate { value: imm as u64, width: OperandSize::Dword };
            inst.operand_count = 1;
        }

        // IMUL Gv, Ev, Iz (3-operand form)
        0x69 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            let imm = fetch_u32(memory, cur, eip)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operands[2] = Operand::Immediate { value: imm as u64, width: opw };
            inst.operand_count = 3;
        }

        // PUSH imm8 (sign-extended)
        0x6A => {
            let imm = fetch_i8(memory, cur, eip)?;
            inst.operands[0] = Operand::Immediate { value: imm as i32 as u32 as u64, width: OperandSize::Dword };
            inst.operand_count = 1;
        }

        // IMUL Gv, Ev, Ib (3-operand form, 8-bit immediate sign-extended)
        0x6B => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            let imm = fetch_i8(memory, cur, eip)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operands[2] = Operand::Immediate { value: imm as i32 as u32 as u64, width: opw };
            inst.operand_count = 3;
        }

        // Jcc rel8
        0x70..=0x7F => {
            let rel = fetch_i8(memory, cur, eip)?;
            inst.operands[0] = Operand::RelativeOffset(rel as i32);
            inst.operand_count = 1;
        }

        // Group 1: ALU Eb, Ib (0x80) / Ev, Iz (0x81) / Ev, Ib sign-extended (0x83)
        0x80 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Byte)?;
            let imm = fetch_u8(memory, cur, eip)?;
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operands[1] = Operand::Immediate { value: imm as u64, width: OperandSize::Byte };
            inst.operand_count = 2;
        }
        0x81 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            let imm = match opw {
                OperandSize::Word => fetch_u16(memory, cur, eip)? as u64,
                _ => fetch_u32(memory, cur, eip)? as u64,
            };
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operands[1] = Operand::Immediate { value: imm, width: opw };
            inst.operand_count = 2;
        }
        0x83 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            let imm = fetch_i8(memory, cur, eip)?;
            let imm = sign_extend_to_width(imm as i32, opw);
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operands[1] = Operand::Immediate { value: imm, width: opw };
            inst.operand_count = 2;
        }

        // TEST Eb,Gb / Ev,Gv
        0x84 => decode_form_eg(memory, regs, cur, eip, inst, OperandSize::Byte, false)?,
        0x85 => decode_form_eg(memory, regs, cur, eip, inst, opw, false)?,

        // XCHG Eb,Gb / Ev,Gv
        0x86 => decode_form_eg(memory, regs, cur, eip, inst, OperandSize::Byte, false)?,
        0x87 => decode_form_eg(memory, regs, cur, eip, inst, opw, false)?,

        // MOV Eb,Gb / Ev,Gv / Gb,Eb / Gv,Ev
        0x88 => decode_form_eg(memory, regs, cur, eip, inst, OperandSize::Byte, false)?,
        0x89 => decode_form_eg(memory, regs, cur, eip, inst, opw, false)?,
        0x8A => decode_form_eg(memory, regs, cur, eip, inst, OperandSize::Byte, true)?,
        0x8B => decode_form_eg(memory, regs, cur, eip, inst, opw, true)?,

        // LEA Gv, M — decode the r/m side but it must be a memory operand
        0x8D => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operand_count = 2;
        }

        // POP r/m32 (group /0 only, but decode unconditionally — executor
        // treats any other /digit as unknown)
        0x8F => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operand_count = 1;
        }

        // NOP
        0x90 => {}

        // XCHG eAX, r32 (0x91-0x97; 0x90 itself is NOP / XCHG eAX,eAX)
        0x91..=0x97 => {
            let idx = (opcode & 0x07) as u8;
            inst.operands[0] = Operand::Register { idx: 0, width: opw };
            inst.operands[1] = Operand::Register { idx, width: opw };
            inst.operand_count = 2;
        }

        // CBW/CWDE (0x98), CWD/CDQ (0x99) — no explicit operands, driven by operand_size
        0x98 | 0x99 => {}

        // MOVSB / MOVSW (MOVSD if no 0x66 prefix is present, a natural
        // extension of the same generic string-move handler)
        0xA4 => {
            inst.operands[0] = Operand::Immediate { value: OperandSize::Byte.bits() as u64, width: OperandSize::Byte };
            inst.operand_count = 0; // width carried via operand_size field, not an operand
        }
        0xA5 => {
            inst.operand_count = 0;
        }

        // TEST AL,Ib / eAX,Iz
        0xA8 => decode_form_acc_imm(memory, cur, eip, inst, OperandSize::Byte)?,
        0xA9 => decode_form_acc_imm(memory, cur, eip, inst, opw)?,

        // MOV r8, imm8
        0xB0..=0xB7 => {
            let idx = (opcode & 0x07) as u8;
            let imm = fetch_u8(memory, cur, eip)?;
            inst.operands[0] = Operand::Register { idx, width: OperandSize::Byte };
            inst.operands[1] = Operand::Immediate { value: imm as u64, width: OperandSize::Byte };
            inst.operand_count = 2;
        }

        // MOV r32, imm32 (or r16, imm16 under the 0x66 prefix)
        0xB8..=0xBF => {
            let idx = (opcode & 0x07) as u8;
            let imm = match opw {
                OperandSize::Word => fetch_u16(memory, cur, eip)? as u64,
                _ => fetch_u32(memory, cur, eip)? as u64,
            };
            inst.operands[0] = Operand::Register { idx, width: opw };
            inst.operands[1] = Operand::Immediate { value: imm, width: opw };
            inst.operand_count = 2;
        }

        // Group 2 (shifts): Eb,Ib / Ev,Ib / Eb,1 / Ev,1 / Eb,CL / Ev,CL
        0xC0 => decode_shift_group(memory, regs, cur, eip, inst, OperandSize::Byte, ShiftSrc::Imm8)?,
        0xC1 => decode_shift_group(memory, regs, cur, eip, inst, opw, ShiftSrc::Imm8)?,
        0xD0 => decode_shift_group(memory, regs, cur, eip, inst, OperandSize::Byte, ShiftSrc::One)?,
        0xD1 => decode_shift_group(memory, regs, cur, eip, inst, opw, ShiftSrc::One)?,
        0xD2 => decode_shift_group(memory, regs, cur, eip, inst, OperandSize::Byte, ShiftSrc::Cl)?,
        0xD3 => decode_shift_group(memory, regs, cur, eip, inst, opw, ShiftSrc::Cl)?,

        // RET imm16 / RET near
        0xC2 => {
            let imm = fetch_u16(memory, cur, eip)?;
            inst.operands[0] = Operand::Immediate { value: imm as u64, width: OperandSize::Word };
            inst.operand_count = 1;
        }
        0xC3 => {}

        // Group 11 (MOV, /0 only): Eb,Ib / Ev,Iz
        0xC6 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Byte)?;
            let imm = fetch_u8(memory, cur, eip)?;
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operands[1] = Operand::Immediate { value: imm as u64, width: OperandSize::Byte };
            inst.operand_count = 2;
        }
        0xC7 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            let imm = match opw {
                OperandSize::Word => fetch_u16(memory, cur, eip)? as u64,
                _ => fetch_u32(memory, cur, eip)? as u64,
            };
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operands[1] = Operand::Immediate { value: imm, width: opw };
            inst.operand_count = 2;
        }

        // LEAVE
        0xC9 => {}

        // INT imm8
        0xCD => {
            let imm = fetch_u8(memory, cur, eip)?;
            inst.operands[0] = Operand::Immediate { value: imm as u64, width: OperandSize::Byte };
            inst.operand_count = 1;
        }

        // CALL rel32, JMP rel32
        0xE8 | 0xE9 => {
            let rel = fetch_i32(memory, cur, eip)?;
            inst.operands[0] = Operand::RelativeOffset(rel);
            inst.operand_count = 1;
        }

        // JMP rel8
        0xEB => {
            let rel = fetch_i8(memory, cur, eip)?;
            inst.operands[0] = Operand::RelativeOffset(rel as i32);
            inst.operand_count = 1;
        }

        // Flag instructions — no operands
        0xF5 | 0xF8 | 0xF9 | 0xFA | 0xFB | 0xFC | 0xFD => {}

        // Group 3: TEST/NOT/NEG/MUL/IMUL/DIV/IDIV, Eb / Ev
        0xF6 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Byte)?;
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            if reg == 0 || reg == 1 {
                let imm = fetch_u8(memory, cur, eip)?;
                inst.operands[1] = Operand::Immediate { value: imm as u64, width: OperandSize::Byte };
                inst.operand_count = 2;
            } else {
                inst.operand_count = 1;
            }
        }
        0xF7 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            if reg == 0 || reg == 1 {
                let imm = match opw {
                    OperandSize::Word => fetch_u16(memory, cur, eip)? as u64,
                    _ => fetch_u32(memory, cur, eip)? as u64,
                };
                inst.operands[1] = Operand::Immediate { value: imm, width: opw };
                inst.operand_count = 2;
            } else {
                inst.operand_count = 1;
            }
        }

        // Group 4: INC/DEC r/m8
        0xFE => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Byte)?;
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operand_count = 1;
        }

        // Group 5: INC/DEC/CALL/JMP/PUSH r/m32
        0xFF => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            inst.modrm_reg_cache(reg);
            inst.operands[0] = rm;
            inst.operand_count = 1;
        }

        // Two-byte (0x0F xx) opcodes
        0x0F80..=0x0F8F => {
            let rel = fetch_i32(memory, cur, eip)?;
            inst.operands[0] = Operand::RelativeOffset(rel);
            inst.operand_count = 1;
        }
        0x0FAF => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, opw)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operand_count = 2;
        }
        0x0FB6 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Byte)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operand_count = 2;
        }
        0x0FB7 => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Word)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operand_count = 2;
        }
        0x0FBE => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Byte)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operand_count = 2;
        }
        0x0FBF => {
            let (rm, reg) = decode_modrm(memory, regs, cur, eip, OperandSize::Word)?;
            inst.operands[0] = Operand::Register { idx: reg, width: opw };
            inst.operands[1] = rm;
            inst.operand_count = 2;
        }

        _ => {
            return Err(VmError::UnknownOpcode {
                opcode: (opcode & 0xFF) as u8,
                eip,
            });
        }
    }

    Ok(())
}

/// Source operand for the shift/rotate group (C0/C1/D0-D3).
enum ShiftSrc {
    Imm8,
    One,
    Cl,
}

fn decode_shift_group(
    memory: &Memory,
    regs: &RegisterFile,
    cur: &mut u32,
    eip: u32,
    inst: &mut DecodedInst,
    width: OperandSize,
    src: ShiftSrc,
) -> Result<()> {
    let (rm, reg) = decode_modrm(memory, regs, cur, eip, width)?;
    inst.modrm_reg_cache(reg);
    inst.operands[0] = rm;
    inst.operands[1] = match src {
        ShiftSrc::Imm8 => {
            let imm = fetch_u8(memory, cur, eip)?;
            Operand::Immediate { value: imm as u64, width: OperandSize::Byte }
        }
        ShiftSrc::One => Operand::Immediate { value: 1, width: OperandSize::Byte },
        ShiftSrc::Cl => Operand::Register { idx: 1, width: OperandSize::Byte },
    };
    inst.operand_count = 2;
    Ok(())
}

/// Decode the common `E*,G*` / `G*,E*` ModR/M form shared by most ALU,
/// MOV, TEST, and XCHG opcodes. `reg_is_dst` selects which side is the
/// destination: false means `r/m, reg` (E,G), true means `reg, r/m` (G,E).
fn decode_form_eg(
    memory: &Memory,
    regs: &RegisterFile,
    cur: &mut u32,
    eip: u32,
    inst: &mut DecodedInst,
    width: OperandSize,
    reg_is_dst: bool,
) -> Result<()> {
    let (rm, reg) = decode_modrm(memory, regs, cur, eip, width)?;
    let reg_operand = Operand::Register { idx: reg, width };
    if reg_is_dst {
        inst.operands[0] = reg_operand;
        inst.operands[1] = rm;
    } else {
        inst.operands[0] = rm;
        inst.operands[1] = reg_operand;
    }
    inst.operand_count = 2;
    Ok(())
}

/// Decode the `AL,Ib` / `eAX,Iz` accumulator-immediate form.
fn decode_form_acc_imm(
    memory: &Memory,
    cur: &mut u32,
    eip: u32,
    inst: &mut DecodedInst,
    width: OperandSize,
) -> Result<()> {
    let imm = match width {
        OperandSize::Byte => fetch_u8(memory, cur, eip)? as u64,
        OperandSize::Word => fetch_u16(memory, cur, eip)? as u64,
        OperandSize::Dword => fetch_u32(memory, cur, eip)? as u64,
    };
    inst.operands[0] = Operand::Register { idx: 0, width };
    inst.operands[1] = Operand::Immediate { value: imm, width };
    inst.operand_count = 2;
    Ok(())
}

fn sign_extend_to_width(v: i32, width: OperandSize) -> u64 {
    (v as i64 as u64) & width.mask()
}

impl DecodedInst {
    /// Stash the ModR/M byte so the executor can recover the `/digit`
    /// sub-opcode (`modrm_reg()`) for group dispatch.
    fn modrm_reg_cache(&mut self, reg: u8) {
        self.modrm = Some(reg << 3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_with(bytes: &[u8]) -> Memory {
        let mut m = Memory::new(256);
        m.set(0, bytes, 0).unwrap();
        m
    }

    #[test]
    fn decodes_mov_eax_imm32() {
        let mem = mem_with(&[0xB8, 0x05, 0x00, 0x00, 0x00]);
        let regs = RegisterFile::new();
        let inst = Decoder::decode(&mem, &regs, 0).unwrap();
        assert_eq!(inst.opcode, 0xB8);
        assert_eq!(inst.length, 5);
        match inst.operands[1] {
            Operand::Immediate { value, .. } => assert_eq!(value, 5),
            _ => panic!("expected immediate"),
        }
    }

    #[test]
    fn decodes_modrm_disp8_memory_operand() {
        // 8B 45 04 -> mov eax, [ebp+4]
        let mem = mem_with(&[0x8B, 0x45, 0x04]);
        let mut regs = RegisterFile::new();
        regs.write_gpr32(5, 0x1000); // EBP
        let inst = Decoder::decode(&mem, &regs, 0).unwrap();
        assert_eq!(inst.length, 3);
        match inst.operands[1] {
            Operand::Memory { addr, .. } => assert_eq!(addr, 0x1004),
            _ => panic!("expected memory operand"),
        }
    }

    #[test]
    fn decodes_sib_base_index_scale() {
        // 8B 04 8D 00 00 00 00 -> mov eax, [ecx*4 + 0] (mod=00, rm=4, base=5/mod0 disp32)
        let mem = mem_with(&[0x8B, 0x04, 0x8D, 0x10, 0x00, 0x00, 0x00]);
        let mut regs = RegisterFile::new();
        regs.write_gpr32(1, 2); // ECX = index
        let inst = Decoder::decode(&mem, &regs, 0).unwrap();
        match inst.operands[1] {
            Operand::Memory { addr, .. } => assert_eq!(addr, 0x10 + (2 << 3)),
            _ => panic!("expected memory operand"),
        }
    }

    #[test]
    fn decodes_past_segment_override_prefix() {
        // 64 B8 05 00 00 00 -> fs: mov eax, 5 (fs: is a no-op, flat memory)
        let mem = mem_with(&[0x64, 0xB8, 0x05, 0x00, 0x00, 0x00]);
        let regs = RegisterFile::new();
        let inst = Decoder::decode(&mem, &regs, 0).unwrap();
        assert_eq!(inst.opcode, 0xB8);
        assert_eq!(inst.length, 6);
    }

    #[test]
    fn unknown_opcode_reports_eip() {
        let mem = mem_with(&[0xD6]);
        let regs = RegisterFile::new();
        let err = Decoder::decode(&mem, &regs, 0x40).unwrap_err();
        match err {
            VmError::UnknownOpcode { opcode, eip } => {
                assert_eq!(opcode, 0xD6);
                assert_eq!(eip, 0x40);
            }
            _ => panic!("expected UnknownOpcode"),
        }
    }

    #[test]
    fn decodes_push_imm8_sign_extended() {
        let mem = mem_with(&[0x6A, 0xFF]); // push -1
        let regs = RegisterFile::new();
        let inst = Decoder::decode(&mem, &regs, 0).unwrap();
        match inst.operands[0] {
            Operand::Immediate { value, .. } => assert_eq!(value as u32, 0xFFFF_FFFF),
            _ => panic!("expected immediate"),
        }
    }
}
