//! String instruction handlers.
//!
//! Only MOVSB/MOVSW/MOVSD (opcodes `0xA4`/`0xA5`) are in scope. ESI and EDI
//! are flat linear addresses here — there is no segmentation, so there is
//! no segment-base addition the way real protected-mode MOVS would do
//! through DS:ESI/ES:EDI.

use crate::cpu::Cpu;
use crate::error::Result;
use crate::flags;
use crate::flags::OperandSize;
use crate::instruction::{DecodedInst, RepPrefix};
use crate::registers::GprIndex;

/// MOVSB/MOVSW/MOVSD: copy one element from `[ESI]` to `[EDI]`, then
/// advance both by the element width (forward if DF=0, backward if DF=1).
/// A REP prefix repeats this ECX times, consuming the whole count and
/// leaving ECX=0 — there is no interrupt-driven early exit in this VM.
pub fn exec_movs(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let width = if inst.opcode == 0xA4 {
        OperandSize::Byte
    } else {
        inst.operand_size
    };

    let step: i64 = if cpu.regs.flag_get(flags::DF) != 0 {
        -(width.bytes() as i64)
    } else {
        width.bytes() as i64
    };

    let repeat = matches!(inst.rep, RepPrefix::Rep | RepPrefix::Repne);
    let count = if repeat {
        cpu.regs.read_gpr32(GprIndex::Ecx as u8)
    } else {
        1
    };

    for _ in 0..count {
        let esi = cpu.regs.read_gpr32(GprIndex::Esi as u8);
        let edi = cpu.regs.read_gpr32(GprIndex::Edi as u8);
        let val = cpu.memory.read_width(esi, width, cpu.regs.eip)?;
        cpu.memory.write_width(edi, width, val, cpu.regs.eip)?;
        cpu.regs
            .write_gpr32(GprIndex::Esi as u8, esi.wrapping_add(step as u32));
        cpu.regs
            .write_gpr32(GprIndex::Edi as u8, edi.wrapping_add(step as u32));
    }

    if repeat {
        cpu.regs.write_gpr32(GprIndex::Ecx as u8, 0);
    }

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::DecodedInst;

    fn movs_inst(opcode: u16, rep: RepPrefix, length: u8) -> DecodedInst {
        let mut inst = DecodedInst::empty();
        inst.opcode = opcode;
        inst.rep = rep;
        inst.length = length;
        inst.operand_size = OperandSize::Dword;
        inst
    }

    #[test]
    fn movsb_copies_one_byte_and_advances_forward() {
        let mut cpu = Cpu::new(64);
        cpu.memory.set(0, &[0xAB], 0).unwrap();
        cpu.regs.write_gpr32(GprIndex::Esi as u8, 0);
        cpu.regs.write_gpr32(GprIndex::Edi as u8, 10);
        let inst = movs_inst(0xA4, RepPrefix::None, 1);
        exec_movs(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.memory.get(10, 1, 0).unwrap(), &[0xAB]);
        assert_eq!(cpu.regs.read_gpr32(GprIndex::Esi as u8), 1);
        assert_eq!(cpu.regs.read_gpr32(GprIndex::Edi as u8), 11);
    }

    #[test]
    fn rep_movsb_copies_ecx_bytes_and_zeroes_ecx() {
        let mut cpu = Cpu::new(64);
        cpu.memory.set(0, b"abcd", 0).unwrap();
        cpu.regs.write_gpr32(GprIndex::Esi as u8, 0);
        cpu.regs.write_gpr32(GprIndex::Edi as u8, 20);
        cpu.regs.write_gpr32(GprIndex::Ecx as u8, 4);
        let inst = movs_inst(0xA4, RepPrefix::Rep, 2);
        exec_movs(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.memory.get(20, 4, 0).unwrap(), b"abcd");
        assert_eq!(cpu.regs.read_gpr32(GprIndex::Ecx as u8), 0);
        assert_eq!(cpu.regs.read_gpr32(GprIndex::Esi as u8), 4);
    }

    #[test]
    fn movsd_with_df_set_moves_backward() {
        let mut cpu = Cpu::new(64);
        cpu.memory.set(8, &0xDEAD_BEEFu32.to_le_bytes(), 0).unwrap();
        cpu.regs.write_gpr32(GprIndex::Esi as u8, 8);
        cpu.regs.write_gpr32(GprIndex::Edi as u8, 32);
        cpu.regs.flag_set(flags::DF, true);
        let inst = movs_inst(0xA5, RepPrefix::None, 1);
        exec_movs(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.memory.read_u32(32, 0).unwrap(), 0xDEAD_BEEF);
        assert_eq!(cpu.regs.read_gpr32(GprIndex::Esi as u8), 4);
        assert_eq!(cpu.regs.read_gpr32(GprIndex::Edi as u8), 28);
    }
}
