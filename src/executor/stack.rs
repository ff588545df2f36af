//! Stack instruction handlers.
//!
//! PUSH (register/immediate/r-m), POP (register/r-m), and LEAVE. PUSHF/POPF
//! and PUSHA/POPA are not in this instruction set.

use crate::cpu::Cpu;
use crate::error::Result;
use crate::flags::OperandSize;
use crate::instruction::DecodedInst;
use crate::registers::GprIndex;

use super::{read_operand, width_of, write_operand};

/// PUSH r32 (`0x50`-`0x57`).
pub fn exec_push_reg(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let val = read_operand(cpu, &inst.operands[0])?;
    cpu.push(val, inst.operand_size)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// POP r32 (`0x58`-`0x5F`).
pub fn exec_pop_reg(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let val = cpu.pop(inst.operand_size)?;
    write_operand(cpu, &inst.operands[0], val)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// PUSH imm8/imm32 (`0x68`/`0x6A`). The decoder has already sign-extended
/// an imm8 to the operand width.
pub fn exec_push_imm(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let val = read_operand(cpu, &inst.operands[0])?;
    cpu.push(val, inst.operand_size)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// POP r/m32 (Group `0x8F`, `/0` only).
pub fn exec_pop_rm(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let val = cpu.pop(inst.operand_size)?;
    write_operand(cpu, &inst.operands[0], val)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// PUSH r/m32 (Group 5 `0xFF`, `/6`).
pub fn exec_push_rm(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let width = width_of(&inst.operands[0]);
    let val = read_operand(cpu, &inst.operands[0])?;
    cpu.push(val, width)?;
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// LEAVE: `ESP = EBP`, then `EBP = pop()`. The standard stack-frame teardown.
pub fn exec_leave(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let ebp = cpu.regs.read_gpr32(GprIndex::Ebp as u8);
    cpu.regs.set_sp(ebp);
    let val = cpu.pop(OperandSize::Dword)?;
    cpu.regs.write_gpr32(GprIndex::Ebp as u8, val as u32);
    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Operand;

    #[test]
    fn push_reg_then_pop_reg_roundtrips() {
        let mut cpu = Cpu::new(64);
        cpu.regs.set_sp(64);
        cpu.regs.write_gpr32(0, 0xCAFE_BABE);
        let mut push = DecodedInst::empty();
        push.operand_size = OperandSize::Dword;
        push.operands[0] = Operand::Register { idx: 0, width: OperandSize::Dword };
        push.operand_count = 1;
        push.length = 1;
        exec_push_reg(&mut cpu, &push).unwrap();
        assert_eq!(cpu.regs.sp(), 60);

        let mut pop = push.clone();
        pop.operands[0] = Operand::Register { idx: 1, width: OperandSize::Dword };
        exec_pop_reg(&mut cpu, &pop).unwrap();
        assert_eq!(cpu.regs.read_gpr32(1), 0xCAFE_BABE);
        assert_eq!(cpu.regs.sp(), 64);
    }

    #[test]
    fn leave_restores_esp_from_ebp_and_pops_old_ebp() {
        let mut cpu = Cpu::new(64);
        cpu.regs.set_sp(64);
        cpu.regs.write_gpr32(GprIndex::Ebp as u8, 0x1111_1111);
        cpu.push(0x1111_1111, OperandSize::Dword).unwrap(); // old saved EBP on stack
        cpu.regs.write_gpr32(GprIndex::Ebp as u8, 40); // frame pointer points mid-stack
        let inst = DecodedInst::empty();
        exec_leave(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.regs.read_gpr32(GprIndex::Ebp as u8), 0x1111_1111);
        assert_eq!(cpu.regs.sp(), 44);
    }
}
