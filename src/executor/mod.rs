//! Top-level instruction executor and dispatch.
//!
//! [`execute`] is the entry point the CPU's fetch-decode-execute loop calls
//! for each decoded instruction. It dispatches on the opcode — routing
//! through a `/digit` sub-dispatch on `inst.modrm_reg()` for the group
//! opcodes (0x80/0x81/0x83, 0xC0/0xC1/0xD0-0xD3, 0xF6/0xF7, 0xFE, 0xFF) —
//! to the handler in the appropriate category submodule.
//!
//! This module also holds the operand read/write helpers shared by every
//! handler: `read_operand`/`write_operand` give every category module a
//! uniform way to dereference an `Operand` regardless of whether it names
//! a register, a resolved memory address, or an immediate.

pub mod arith;
pub mod control;
pub mod data;
pub mod logic;
pub mod stack;
pub mod string;
pub mod syscall;

use crate::cpu::Cpu;
use crate::error::{Result, VmError};
use crate::flags::OperandSize;
use crate::instruction::{DecodedInst, Operand};

/// Execute a single decoded instruction against `cpu`.
///
/// Every handler is responsible for advancing `cpu.regs.eip` itself —
/// either by `inst.length` for straight-line instructions, or to an
/// absolute target for jumps/calls/returns. This mirrors how flag updates
/// are computed inline per handler rather than by a shared postlude.
pub fn execute(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    match inst.opcode {
        // ── ALU block: add/or/adc/sbb/and/sub/xor/cmp, Eb,Gb / Ev,Gv /
        // Gb,Eb / Gv,Ev / AL,Ib / eAX,Iz ──
        op if op < 0x40 && (op & 0x07) < 6 => {
            let alu_op = AluOp::from_index(((op >> 3) & 7) as u8);
            arith_or_logic(cpu, inst, alu_op)
        }

        0x40..=0x47 => arith::exec_inc(cpu, inst),
        0x48..=0x4F => arith::exec_dec(cpu, inst),

        0x50..=0x57 => stack::exec_push_reg(cpu, inst),
        0x58..=0x5F => stack::exec_pop_reg(cpu, inst),

        0x68 | 0x6A => stack::exec_push_imm(cpu, inst),
        0x69 | 0x6B => arith::exec_imul_3op(cpu, inst),

        0x70..=0x7F => control::exec_jcc(cpu, inst),

        0x80 | 0x81 | 0x83 => {
            let alu_op = AluOp::from_index(inst.modrm_reg());
            arith_or_logic(cpu, inst, alu_op)
        }

        0x84 | 0x85 => logic::exec_test(cpu, inst),
        0x86 | 0x87 => data::exec_xchg(cpu, inst),

        0x88..=0x8B => data::exec_mov(cpu, inst),
        0x8D => data::exec_lea(cpu, inst),

        0x8F => match inst.modrm_reg() {
            0 => stack::exec_pop_rm(cpu, inst),
            _ => unknown(inst, cpu.regs.eip),
        },

        0x90 => control::exec_nop(cpu, inst),
        0x91..=0x97 => data::exec_xchg(cpu, inst),

        0x98 => arith::exec_cwde(cpu, inst),
        0x99 => arith::exec_cdq(cpu, inst),

        0xA4 | 0xA5 => string::exec_movs(cpu, inst),

        0xA8 | 0xA9 => logic::exec_test(cpu, inst),

        0xB0..=0xBF => data::exec_mov(cpu, inst),

        0xC0 | 0xC1 | 0xD0..=0xD3 => logic::exec_shift(cpu, inst),

        0xC2 | 0xC3 => control::exec_ret(cpu, inst),

        0xC6 | 0xC7 => data::exec_mov(cpu, inst),

        0xC9 => stack::exec_leave(cpu, inst),

        0xCD => syscall::exec_int(cpu, inst),

        0xE8 => control::exec_call_rel(cpu, inst),
        0xE9 | 0xEB => control::exec_jmp_rel(cpu, inst),

        0xF5 => control::exec_cmc(cpu, inst),
        0xF8 => control::exec_clc(cpu, inst),
        0xF9 => control::exec_stc(cpu, inst),
        0xFA => control::exec_cli(cpu, inst),
        0xFB => control::exec_sti(cpu, inst),
        0xFC => control::exec_cld(cpu, inst),
        0xFD => control::exec_std(cpu, inst),

        0xF6 | 0xF7 => match inst.modrm_reg() {
            0 | 1 => logic::exec_test(cpu, inst),
            2 => logic::exec_not(cpu, inst),
            3 => arith::exec_neg(cpu, inst),
            4 => arith::exec_mul(cpu, inst),
            5 => arith::exec_imul_1op(cpu, inst),
            6 => arith::exec_div(cpu, inst),
            7 => arith::exec_idiv(cpu, inst),
            _ => unreachable!("3-bit field"),
        },

        0xFE => match inst.modrm_reg() {
            0 => arith::exec_inc(cpu, inst),
            1 => arith::exec_dec(cpu, inst),
            _ => unknown(inst, cpu.regs.eip),
        },

        0xFF => match inst.modrm_reg() {
            0 => arith::exec_inc(cpu, inst),
            1 => arith::exec_dec(cpu, inst),
            2 => control::exec_call_rm(cpu, inst),
            4 => control::exec_jmp_rm(cpu, inst),
            6 => stack::exec_push_rm(cpu, inst),
            _ => unknown(inst, cpu.regs.eip),
        },

        0x0F80..=0x0F8F => control::exec_jcc(cpu, inst),
        0x0FAF => arith::exec_imul_2op(cpu, inst),
        0x0FB6 | 0x0FB7 => data::exec_movzx(cpu, inst),
        0x0FBE | 0x0FBF => data::exec_movsx(cpu, inst),

        _ => unknown(inst, cpu.regs.eip),
    }
}

fn unknown(inst: &DecodedInst, eip: u32) -> Result<()> {
    Err(VmError::UnknownOpcode {
        opcode: (inst.opcode & 0xFF) as u8,
        eip,
    })
}

/// The eight ALU operations sharing the `Eb,Gb`/`Ev,Gv`/group-1 encodings,
/// indexed by the 3-bit field that selects between them (either the
/// opcode's own `(op >> 3) & 7` for the 0x00-0x3F block, or ModR/M.reg for
/// the 0x80/0x81/0x83 group).
#[derive(Debug, Clone, Copy)]
enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

impl AluOp {
    fn from_index(i: u8) -> Self {
        match i & 7 {
            0 => AluOp::Add,
            1 => AluOp::Or,
            2 => AluOp::Adc,
            3 => AluOp::Sbb,
            4 => AluOp::And,
            5 => AluOp::Sub,
            6 => AluOp::Xor,
            7 => AluOp::Cmp,
            _ => unreachable!("3-bit field"),
        }
    }
}

fn arith_or_logic(cpu: &mut Cpu, inst: &DecodedInst, op: AluOp) -> Result<()> {
    match op {
        AluOp::Add => arith::exec_add(cpu, inst),
        AluOp::Or => logic::exec_or(cpu, inst),
        AluOp::Adc => arith::exec_adc(cpu, inst),
        AluOp::Sbb => arith::exec_sbb(cpu, inst),
        AluOp::And => logic::exec_and(cpu, inst),
        AluOp::Sub => arith::exec_sub(cpu, inst),
        AluOp::Xor => logic::exec_xor(cpu, inst),
        AluOp::Cmp => arith::exec_cmp(cpu, inst),
    }
}

// ── Shared operand access ──

/// Read the current value of an operand, zero-extended to `u64`.
///
/// `Immediate` values are already sign/zero-extended as the decoder
/// produced them, so reading one is just a masked passthrough.
pub(crate) fn read_operand(cpu: &Cpu, op: &Operand) -> Result<u64> {
    match *op {
        Operand::Register { idx, width } => Ok(cpu.regs.read_gpr(idx, width)),
        Operand::Memory { addr, width } => cpu.memory.read_width(addr, width, cpu.regs.eip),
        Operand::Immediate { value, width } => Ok(value & width.mask()),
        Operand::RelativeOffset(_) | Operand::None => {
            unreachable!("relative offsets and empty slots are not readable operands")
        }
    }
}

/// Write `val` (truncated to the operand's width) back to an operand.
pub(crate) fn write_operand(cpu: &mut Cpu, op: &Operand, val: u64) -> Result<()> {
    match *op {
        Operand::Register { idx, width } => {
            cpu.regs.write_gpr(idx, width, val);
            Ok(())
        }
        Operand::Memory { addr, width } => cpu.memory.write_width(addr, width, val, cpu.regs.eip),
        Operand::Immediate { .. } | Operand::RelativeOffset(_) | Operand::None => {
            unreachable!("immediates, relative offsets, and empty slots are not writable")
        }
    }
}

/// Width of an operand, used by handlers that need to re-derive a source
/// or destination width independent of `inst.operand_size` (e.g. MOVZX/MOVSX,
/// where source and destination widths differ).
pub(crate) fn width_of(op: &Operand) -> OperandSize {
    match *op {
        Operand::Register { width, .. }
        | Operand::Memory { width, .. }
        | Operand::Immediate { width, .. } => width,
        Operand::RelativeOffset(_) | Operand::None => OperandSize::Dword,
    }
}
