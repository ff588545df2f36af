//! The `int 0x80` syscall gate.
//!
//! A deliberately tiny subset of the Linux i386 syscall ABI: `exit`,
//! `read`, `write`. The register convention is the real one
//! (EAX=number, EBX/ECX/EDX=args, return value in EAX), but only three
//! numbers are recognized — anything else is a fatal error rather than
//! `ENOSYS` in EAX, since there is no kernel here to keep running past it.

use std::io::{Read, Write};

use crate::cpu::Cpu;
use crate::error::{Result, VmError};
use crate::instruction::DecodedInst;

const SYS_EXIT: u32 = 1;
const SYS_READ: u32 = 3;
const SYS_WRITE: u32 = 4;

/// `int 0x80`. Only vector 0x80 reaches here — the decoder does not accept
/// other immediate operands to `INT`, so `inst.operands[0]` is unused.
pub fn exec_int(cpu: &mut Cpu, inst: &DecodedInst) -> Result<()> {
    let eax = cpu.regs.read_gpr32(0);
    let ebx = cpu.regs.read_gpr32(3);
    let ecx = cpu.regs.read_gpr32(1);
    let edx = cpu.regs.read_gpr32(2);

    match eax {
        SYS_EXIT => {
            cpu.halted = true;
            cpu.exit_code = ebx as u8;
            log::trace!("exit({})", cpu.exit_code);
        }
        SYS_READ => {
            let n = do_read(cpu, ebx, ecx, edx)?;
            cpu.regs.write_gpr32(0, n);
        }
        SYS_WRITE => {
            let n = do_write(cpu, ebx, ecx, edx)?;
            cpu.regs.write_gpr32(0, n);
        }
        _ => {
            return Err(VmError::UnsupportedSyscall {
                eax,
                eip: cpu.regs.eip,
            })
        }
    }

    cpu.regs.eip = cpu.regs.eip.wrapping_add(inst.length as u32);
    Ok(())
}

/// `read(fd, buf, count)`. I/O failures and unsupported fds are reported
/// through EAX as `-1` (0xFFFFFFFF), matching libc's syscall convention —
/// they are not fatal to the VM.
fn do_read(cpu: &mut Cpu, fd: u32, buf: u32, count: u32) -> Result<u32> {
    let mut tmp = vec![0u8; count as usize];
    let read_result = match fd {
        0 => cpu.stdin.read(&mut tmp),
        _ => {
            log::warn!("read() on unsupported fd {fd}");
            return Ok(u32::MAX);
        }
    };

    let n = match read_result {
        Ok(n) => n,
        Err(e) => {
            log::warn!("read() failed: {e}");
            return Ok(u32::MAX);
        }
    };

    cpu.memory.set(buf as usize, &tmp[..n], cpu.regs.eip)?;
    Ok(n as u32)
}

/// `write(fd, buf, count)`. Same non-fatal error convention as `do_read`.
fn do_write(cpu: &mut Cpu, fd: u32, buf: u32, count: u32) -> Result<u32> {
    let bytes = cpu.memory.get(buf as usize, count as usize, cpu.regs.eip)?;
    let bytes = bytes.to_vec();

    let write_result = match fd {
        1 => cpu.stdout.write_all(&bytes),
        2 => cpu.stderr.write_all(&bytes),
        _ => {
            log::warn!("write() on unsupported fd {fd}");
            return Ok(u32::MAX);
        }
    };

    match write_result {
        Ok(()) => Ok(bytes.len() as u32),
        Err(e) => {
            log::warn!("write() failed: {e}");
            Ok(u32::MAX)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::DecodedInst;
    use std::io::{self, Cursor};

    fn int80(length: u8) -> DecodedInst {
        let mut inst = DecodedInst::empty();
        inst.opcode = 0xCD;
        inst.length = length;
        inst
    }

    #[test]
    fn exit_sets_halted_and_exit_code() {
        let mut cpu = Cpu::new(16);
        cpu.regs.write_gpr32(0, 1); // eax = SYS_EXIT
        cpu.regs.write_gpr32(3, 7); // ebx = 7
        exec_int(&mut cpu, &int80(2)).unwrap();
        assert!(cpu.halted);
        assert_eq!(cpu.exit_code, 7);
    }

    #[test]
    fn write_copies_memory_to_stdout() {
        let mut cpu = Cpu::with_streams(
            16,
            Box::new(io::empty()),
            Box::new(Vec::<u8>::new()),
            Box::new(io::sink()),
        );
        cpu.memory.set(0, b"hi", 0).unwrap();
        cpu.regs.write_gpr32(0, 4); // eax = SYS_WRITE
        cpu.regs.write_gpr32(3, 1); // ebx = fd 1
        cpu.regs.write_gpr32(1, 0); // ecx = buf
        cpu.regs.write_gpr32(2, 2); // edx = count
        exec_int(&mut cpu, &int80(2)).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0), 2);
    }

    #[test]
    fn read_fills_memory_from_stdin() {
        let mut cpu = Cpu::with_streams(
            16,
            Box::new(Cursor::new(b"ab".to_vec())),
            Box::new(io::sink()),
            Box::new(io::sink()),
        );
        cpu.regs.write_gpr32(0, 3); // eax = SYS_READ
        cpu.regs.write_gpr32(3, 0); // ebx = fd 0
        cpu.regs.write_gpr32(1, 4); // ecx = buf
        cpu.regs.write_gpr32(2, 2); // edx = count
        exec_int(&mut cpu, &int80(2)).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0), 2);
        assert_eq!(cpu.memory.get(4, 2, 0).unwrap(), b"ab");
    }

    #[test]
    fn unknown_syscall_is_fatal() {
        let mut cpu = Cpu::new(16);
        cpu.regs.write_gpr32(0, 99);
        let err = exec_int(&mut cpu, &int80(2)).unwrap_err();
        assert!(matches!(err, VmError::UnsupportedSyscall { eax: 99, .. }));
    }

    #[test]
    fn write_on_unsupported_fd_returns_minus_one() {
        let mut cpu = Cpu::new(16);
        cpu.regs.write_gpr32(0, 4);
        cpu.regs.write_gpr32(3, 9); // fd 9
        cpu.regs.write_gpr32(1, 0);
        cpu.regs.write_gpr32(2, 0);
        exec_int(&mut cpu, &int80(2)).unwrap();
        assert_eq!(cpu.regs.read_gpr32(0), u32::MAX);
    }
}
