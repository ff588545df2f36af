//! Data movement instruction handlers.
//!
//! MOV, LEA, XCHG, and the zero/sign-extending moves MOVZX/MOVSX.

use crate::cpu::Cpu;
use crate::error::Result;
use crate::instruction::{DecodedInst, Operand};

use super::{read_operand, width_of, write_operand};

/// MOV: `dst = src`. No flags affected.
pub fn exec_mov(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let src = read_operand(cpu, &inst.operands[1])?;
    write_operand(cpu, &inst.operands[0], src)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// LEA: `dst = effective_address(src)`. The decoder has already resolved
/// the memory operand's address, so LEA just reads that address back out
/// instead of dereferencing it — the only handler that treats a `Memory`
/// operand as a value rather than a location.
pub fn exec_lea(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let addr = match inst.operands[1] {
        Operand::Memory { addr, .. } => addr as u64,
        _ => unreachable!("LEA's source is always a decoded memory operand"),
    };
    write_operand(cpu, &inst.operands[0], addr)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// XCHG: swap the two operands. No flags affected.
pub fn exec_xchg(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let a = read_operand(cpu, &inst.operands[0])?;
    let b = read_operand(cpu, &inst.operands[1])?;
    write_operand(cpu, &inst.operands[0], b)?;
    write_operand(cpu, &inst.operands[1], a)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// MOVZX: zero-extend the (narrower) source into the (wider) destination.
pub fn exec_movzx(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let src_width = width_of(&inst.operands[1]);
    let src = read_operand(cpu, &inst.operands[1])? & src_width.mask();
    write_operand(cpu, &inst.operands[0], src)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// MOVSX: sign-extend the (narrower) source into the (wider) destination.
pub fn exec_movsx(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let src_width = width_of(&inst.operands[1]);
    let dst_width = width_of(&inst.operands[0]);
    let raw = read_operand(cpu, &inst.operands[1])? & src_width.mask();

    let sign = src_width.sign_bit();
    let extended = if raw & sign != 0 {
        raw | !src_width.mask()
    } else {
        raw
    };

    write_operand(cpu, &inst.operands[0], extended & dst_width.mask())?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}
