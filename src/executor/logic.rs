//! Logical and shift instruction handlers.
//!
//! Implements AND, OR, XOR, NOT, TEST, and the shift group SHL/SAL, SHR,
//! SAR. Rotates (ROL/ROR/RCL/RCR) share the group-2 encoding but are out
//! of scope for this instruction set; the dispatcher in `mod.rs` never
//! routes their `/digit` values here.

use crate::cpu::Cpu;
use crate::error::{Result, VmError};
use crate::flags::{self, OperandSize};
use crate::instruction::DecodedInst;

use super::{read_operand, write_operand};

/// AND: `dst &= src`. CF=OF=0; AF left unchanged (undefined by the ISA).
pub fn exec_and(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let dst_val = read_operand(cpu, &inst.operands[0])?;
    let src_val = read_operand(cpu, &inst.operands[1])?;
    let size = inst.operand_size;
    let result = (dst_val & src_val) & size.mask();

    write_operand(cpu, &inst.operands[0], result)?;

    let f = flags::flags_logic(result, size);
    flags::update_flags_preserve_af(&mut cpu.regs.eflags, f);

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// OR: `dst |= src`. CF=OF=0; AF left unchanged.
pub fn exec_or(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let dst_val = read_operand(cpu, &inst.operands[0])?;
    let src_val = read_operand(cpu, &inst.operands[1])?;
    let size = inst.operand_size;
    let result = (dst_val | src_val) & size.mask();

    write_operand(cpu, &inst.operands[0], result)?;

    let f = flags::flags_logic(result, size);
    flags::update_flags_preserve_af(&mut cpu.regs.eflags, f);

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// XOR: `dst ^= src`. CF=OF=0; AF left unchanged.
pub fn exec_xor(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let dst_val = read_operand(cpu, &inst.operands[0])?;
    let src_val = read_operand(cpu, &inst.operands[1])?;
    let size = inst.operand_size;
    let result = (dst_val ^ src_val) & size.mask();

    write_operand(cpu, &inst.operands[0], result)?;

    let f = flags::flags_logic(result, size);
    flags::update_flags_preserve_af(&mut cpu.regs.eflags, f);

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// NOT: `dst = !dst`. Changes no flags at all.
pub fn exec_not(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let dst_val = read_operand(cpu, &inst.operands[0])?;
    let size = inst.operand_size;
    let result = (!dst_val) & size.mask();

    write_operand(cpu, &inst.operands[0], result)?;

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// TEST: like AND but discards the result, only updating flags.
pub fn exec_test(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let dst_val = read_operand(cpu, &inst.operands[0])?;
    let src_val = read_operand(cpu, &inst.operands[1])?;
    let size = inst.operand_size;
    let result = (dst_val & src_val) & size.mask();

    let f = flags::flags_logic(result, size);
    flags::update_flags_preserve_af(&mut cpu.regs.eflags, f);

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// Shift group: SHL/SAL (`/4` and `/6`), SHR (`/5`), SAR (`/7`). Count is
/// masked to the low 5 bits; a masked count of 0 leaves every flag
/// untouched; OF is only well-defined (and only written) when the masked
/// count is exactly 1.
pub fn exec_shift(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let digit = inst.modrm_reg();
    let dst_val = read_operand(cpu, &inst.operands[0])?;
    let raw_count = read_operand(cpu, &inst.operands[1])?;
    let size = inst.operand_size;
    let count = (raw_count & 0x1F) as u32;

    if count == 0 {
        cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
        return Ok(());
    }

    let bits = size.bits();
    let masked = dst_val & size.mask();

    let (result, cf, of) = match digit {
        4 | 6 => {
            // SHL/SAL
            let result = masked.wrapping_shl(count) & size.mask();
            let cf = count <= bits && ((masked >> (bits - count)) & 1) != 0;
            let of = (result & size.sign_bit() != 0) != cf;
            (result, cf, of)
        }
        5 => {
            // SHR (logical)
            let result = masked.wrapping_shr(count) & size.mask();
            let cf = ((masked >> (count - 1)) & 1) != 0;
            let of = (masked & size.sign_bit()) != 0;
            (result, cf, of)
        }
        7 => {
            // SAR (arithmetic, sign-preserving)
            let shift = 64 - bits;
            let signed = ((masked << shift) as i64) >> shift;
            let result = ((signed >> count) as u64) & size.mask();
            let cf = ((masked >> (count - 1)) & 1) != 0;
            (result, cf, false)
        }
        _ => return Err(VmError::UnknownOpcode { opcode: (inst.opcode & 0xFF) as u8, eip: cpu.regs.eip }),
    };

    write_operand(cpu, &inst.operands[0], result)?;

    let f = flags::flags_shift(result, cf, of, size);
    if count == 1 {
        flags::update_flags(&mut cpu.regs.eflags, f);
    } else {
        // OF is undefined for count != 1; we leave it untouched by masking
        // it out of the bits we merge (CF/PF/ZF/SF still update normally).
        flags::update_flags(&mut cpu.regs.eflags, (f & !flags::OF) | (cpu.regs.eflags & flags::OF));
    }

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu;
    use crate::instruction::{DecodedInst, Operand};

    fn inst_rr(dst: u8, src: u8, width: OperandSize) -> DecodedInst {
        let mut inst = DecodedInst::empty();
        inst.operand_size = width;
        inst.operands[0] = Operand::Register { idx: dst, width };
        inst.operands[1] = Operand::Register { idx: src, width };
        inst.operand_count = 2;
        inst.length = 2;
        inst
    }

    #[test]
    fn and_clears_carry_and_overflow() {
        let mut cpu = Cpu::new(64);
        cpu.regs.write_gpr32(0, 0xFF);
        cpu.regs.write_gpr32(1, 0x0F);
        cpu.regs.flag_set(flags::CF, true);
        let inst = inst_rr(0, 1, OperandSize::Dword);
        exec_and(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0), 0x0F);
        assert_eq!(cpu.regs.eflags & flags::CF, 0);
        assert_eq!(cpu.regs.eflags & flags::OF, 0);
    }

    #[test]
    fn and_leaves_auxiliary_carry_untouched() {
        let mut cpu = Cpu::new(64);
        cpu.regs.write_gpr32(0, 0xFF);
        cpu.regs.write_gpr32(1, 0x0F);
        cpu.regs.flag_set(flags::AF, true);
        let inst = inst_rr(0, 1, OperandSize::Dword);
        exec_and(&mut cpu, &inst).unwrap();
        assert_ne!(cpu.regs.eflags & flags::AF, 0); // undefined by ISA, left as-is

        cpu.regs.flag_set(flags::AF, false);
        exec_and(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.regs.eflags & flags::AF, 0);
    }

    #[test]
    fn not_changes_no_flags() {
        let mut cpu = Cpu::new(64);
        cpu.regs.write_gpr32(0, 0);
        cpu.regs.flag_set(flags::ZF, true);
        let mut inst = DecodedInst::empty();
        inst.operand_size = OperandSize::Dword;
        inst.operands[0] = Operand::Register { idx: 0, width: OperandSize::Dword };
        inst.operand_count = 1;
        inst.length = 2;
        exec_not(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0), 0xFFFF_FFFF);
        assert_ne!(cpu.regs.eflags & flags::ZF, 0); // preserved, not recomputed
    }

    fn shift_inst(digit: u8, count: u64, width: OperandSize) -> DecodedInst {
        let mut inst = DecodedInst::empty();
        inst.operand_size = width;
        inst.modrm = Some(digit << 3);
        inst.operands[0] = Operand::Register { idx: 0, width };
        inst.operands[1] = Operand::Immediate { value: count, width: OperandSize::Byte };
        inst.operand_count = 2;
        inst.length = 3;
        inst
    }

    #[test]
    fn shl_by_one_sets_cf_from_top_bit() {
        let mut cpu = Cpu::new(64);
        cpu.regs.write_gpr32(0, 0x8000_0000);
        let inst = shift_inst(4, 1, OperandSize::Dword);
        exec_shift(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0), 0);
        assert_ne!(cpu.regs.eflags & flags::CF, 0);
        assert_ne!(cpu.regs.eflags & flags::ZF, 0);
    }

    #[test]
    fn shr_by_zero_leaves_flags_untouched() {
        let mut cpu = Cpu::new(64);
        cpu.regs.write_gpr32(0, 4);
        cpu.regs.flag_set(flags::CF, true);
        let inst = shift_inst(5, 0, OperandSize::Dword);
        exec_shift(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0), 4); // unchanged
        assert_ne!(cpu.regs.eflags & flags::CF, 0); // untouched
    }

    #[test]
    fn sar_preserves_sign() {
        let mut cpu = Cpu::new(64);
        cpu.regs.write_gpr32(0, 0xFFFF_FFF0); // -16
        let inst = shift_inst(7, 2, OperandSize::Dword);
        exec_shift(&mut cpu, &inst).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0) as i32, -4);
    }
}
