//! Control-flow and flag-bit instruction handlers.
//!
//! JMP/Jcc/CALL/RET (near form only — this instruction set has no
//! segmentation, so there is no far variant), NOP, and the single-bit
//! EFLAGS instructions CMC/CLC/STC/CLI/STI/CLD/STD.

use crate::cpu::Cpu;
use crate::error::Result;
use crate::flags::{self, OperandSize};
use crate::instruction::{DecodedInst, Operand};

use super::read_operand;

fn rel_offset(inst: &DecodedInst) -> i32 {
    match inst.operands[0] {
        Operand::RelativeOffset(off) => off,
        _ => unreachable!("jump/call handlers only see RelativeOffset operands"),
    }
}

/// JMP rel8/rel32: target is relative to the address of the *next*
/// instruction, not the jump itself.
pub fn exec_jmp_rel(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let next = cpu.regs.eip.wrapping_add(inst.length as u32);
    cpu.regs.eip = next.wrapping_add(rel_offset(inst) as u32);
    Ok(())
}

/// JMP r/m32 (Group 5 `/4`): near indirect jump through a register or
/// resolved memory operand.
pub fn exec_jmp_rm(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let target = read_operand(cpu, &inst.operands[0])? as u32;
    cpu.regs.eip = target;
    Ok(())
}

/// Jcc rel8/rel32: branch taken only if the condition coded in the low
/// nibble of the opcode evaluates true against the current EFLAGS.
pub fn exec_jcc(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let cc = (inst.opcode & 0x0F) as u8;
    let next = cpu.regs.eip.wrapping_add(inst.length as u32);
    cpu.regs.eip = if flags::eval_cc(cc, cpu.regs.eflags) {
        next.wrapping_add(rel_offset(inst) as u32)
    } else {
        next
    };
    Ok(())
}

/// CALL rel32: push the return address (address of the next instruction),
/// then jump relative to it.
pub fn exec_call_rel(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let next = cpu.regs.eip.wrapping_add(inst.length as u32);
    cpu.push(next as u64, OperandSize::Dword)?;
    cpu.regs.eip = next.wrapping_add(rel_offset(inst) as u32);
    Ok(())
}

/// CALL r/m32 (Group 5 `/2`): near indirect call.
pub fn exec_call_rm(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let target = read_operand(cpu, &inst.operands[0])? as u32;
    let next = cpu.regs.eip.wrapping_add(inst.length as u32);
    cpu.push(next as u64, OperandSize::Dword)?;
    cpu.regs.eip = target;
    Ok(())
}

/// RET near, with an optional imm16 that is added to ESP after popping the
/// return address (the `ret imm16` stdcall-cleanup form).
pub fn exec_ret(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let target = cpu.pop(OperandSize::Dword)? as u32;
    if inst.operand_count > 0 {
        let extra = read_operand(cpu, &inst.operands[0])? as u32;
        cpu.regs.set_sp(cpu.regs.sp().wrapping_add(extra));
    }
    cpu.regs.eip = target;
    Ok(())
}

/// NOP (`0x90`).
pub fn exec_nop(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// CMC: complement CF.
pub fn exec_cmc(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let cf = cpu.regs.flag_get(flags::CF) != 0;
    cpu.regs.flag_set(flags::CF, !cf);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// CLC: clear CF.
pub fn exec_clc(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    cpu.regs.flag_set(flags::CF, false);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// STC: set CF.
pub fn exec_stc(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    cpu.regs.flag_set(flags::CF, true);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// CLI: clear IF. There is no interrupt controller to mask, so this only
/// flips the bit for programs that inspect EFLAGS directly.
pub fn exec_cli(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    cpu.regs.flag_set(flags::IF, false);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// STI: set IF.
pub fn exec_sti(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    cpu.regs.flag_set(flags::IF, true);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// CLD: clear DF (string operations advance ESI/EDI).
pub fn exec_cld(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    cpu.regs.flag_set(flags::DF, false);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// STD: set DF (string operations retreat ESI/EDI).
pub fn exec_std(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    cpu.regs.flag_set(flags::DF, true);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}
